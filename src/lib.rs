#![deny(missing_docs)]

//! A peer node for a Chord distributed hash table.
//!
//! Nodes arrange themselves on a logical ring of 160-bit identifiers and
//! collectively answer one question: given an identifier, which node is
//! responsible for it? Each peer keeps O(log N) routing state (a
//! successor, a predecessor and a finger table) and resolves lookups in
//! O(log N) hops. A periodic stabilization protocol repairs the ring as
//! peers join.
//!
//! # Examples
//! Create a new ring, then join it from a second node.
//! ```no_run
//! use ringkv::Node;
//!
//! # async fn demo() -> ringkv::Result<()> {
//! // The first node bootstraps a ring of one.
//! let seed = Node::new("127.0.0.1:3000");
//! let seed_handle = seed.bootstrap().await?;
//!
//! // Later nodes splice themselves in through any known peer.
//! let peer = Node::new("127.0.0.1:3001");
//! let peer_handle = peer.join("127.0.0.1:3000").await?;
//!
//! // Ask any node who is responsible for an identifier.
//! let owner = peer.find_successor(seed.id()).await?;
//! println!("{} is held by {}", seed.id(), owner.address);
//!
//! peer_handle.stop().await;
//! seed_handle.stop().await;
//! # Ok(())
//! # }
//! ```

/// Errors shared by every layer of the node.
pub mod error;
/// Exponentially spaced routing shortcuts.
pub mod finger_table;
/// The peer itself: routing state, lookups, stabilization.
pub mod node;
/// The 160-bit identifier space and its ring geometry.
pub mod ring_id;
/// The per-node block container.
pub mod store;
/// Length-delimited RPC framing over TCP.
pub mod transport;

pub use error::{Error, Result};
pub use finger_table::FingerTable;
pub use node::{Node, NodeConfig, NodeHandle, NodeInfo};
pub use ring_id::{RingId, ID_BYTES, M};
pub use store::BlockStore;
pub use transport::{Method, RpcRequest, Transport};
