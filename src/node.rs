use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::finger_table::FingerTable;
use crate::ring_id::{RingId, M};
use crate::store::BlockStore;
use crate::transport::{Method, RpcRequest, Transport};

/// An (id, address) pair: the sole form in which peers refer to each
/// other, on the wire and in routing state. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// The peer's ring identifier, SHA-1 of its address.
    #[serde(rename = "ID")]
    pub id: RingId,
    /// The peer's listening endpoint, `host:port`.
    #[serde(rename = "Address")]
    pub address: String,
}

/// Tunables for a node. The defaults match a WAN deployment; tests shrink
/// both values to drive rings quickly.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Pause between stabilization rounds.
    pub stabilize_interval: Duration,
    /// How long an outbound RPC may take before it is abandoned.
    pub rpc_deadline: Duration,
}

impl Default for NodeConfig {
    fn default() -> NodeConfig {
        NodeConfig {
            stabilize_interval: Duration::from_secs(10),
            rpc_deadline: Duration::from_secs(10),
        }
    }
}

// Successor, predecessor and fingers live behind one lock, swapped as
// whole values. The lock is never held across an await point: lookups
// snapshot what they need, release, then go to the network.
#[derive(Debug)]
struct Routing {
    successor: NodeInfo,
    predecessor: Option<NodeInfo>,
    fingers: FingerTable,
}

/// A peer in the ring.
///
/// A node is created with its listening address, which fixes its
/// identifier, then enters the ring through exactly one of
/// [`bootstrap`](Node::bootstrap) (create a new ring) or
/// [`join`](Node::join) (splice into an existing one). Both return a
/// [`NodeHandle`] that owns the background tasks.
#[derive(Debug)]
pub struct Node {
    id: RingId,
    address: String,
    routing: RwLock<Routing>,
    store: BlockStore,
    transport: Transport,
    config: NodeConfig,
}

impl Node {
    /// Creates a node listening at `address` with default configuration.
    pub fn new(address: impl Into<String>) -> Arc<Node> {
        Node::with_config(address, NodeConfig::default())
    }

    /// Creates a node with explicit tunables.
    pub fn with_config(address: impl Into<String>, config: NodeConfig) -> Arc<Node> {
        let address = address.into();
        let id = RingId::hash(&address);
        let own = NodeInfo {
            id,
            address: address.clone(),
        };
        Arc::new(Node {
            id,
            address,
            routing: RwLock::new(Routing {
                successor: own.clone(),
                predecessor: None,
                fingers: FingerTable::new(own),
            }),
            store: BlockStore::new(),
            transport: Transport::new(config.rpc_deadline),
            config,
        })
    }

    /// This node's ring identifier.
    pub fn id(&self) -> RingId {
        self.id
    }

    /// This node's listening endpoint.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// This node as a peer reference.
    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            id: self.id,
            address: self.address.clone(),
        }
    }

    /// The current successor.
    pub fn successor(&self) -> NodeInfo {
        self.routing.read().successor.clone()
    }

    /// The current predecessor, if one has been learned.
    pub fn predecessor(&self) -> Option<NodeInfo> {
        self.routing.read().predecessor.clone()
    }

    /// The current entry in finger slot `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= M`.
    pub fn finger(&self, i: usize) -> NodeInfo {
        self.routing.read().fingers.get(i).clone()
    }

    /// The node's block store.
    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Creates a new ring consisting solely of this node: successor and
    /// predecessor both point at itself, the listener comes up, and the
    /// stabilization ticker starts.
    pub async fn bootstrap(self: &Arc<Self>) -> Result<NodeHandle> {
        {
            let mut routing = self.routing.write();
            routing.successor = self.info();
            routing.predecessor = Some(self.info());
        }
        let listener = self.transport.listen(Arc::clone(self)).await?;
        info!(node_id = %self.id, addr = %self.address, "bootstrapped a new ring");
        Ok(NodeHandle {
            listener,
            stabilizer: self.spawn_stabilizer(),
        })
    }

    /// Splices this node into an existing ring through one known peer:
    /// resolve our successor through the peer, learn our predecessor from
    /// that successor, populate the finger table, and start the
    /// stabilization ticker.
    pub async fn join(self: &Arc<Self>, peer: &str) -> Result<NodeHandle> {
        let listener = self.transport.listen(Arc::clone(self)).await?;

        match self.splice_in(peer).await {
            Ok(()) => {
                info!(node_id = %self.id, addr = %self.address, peer, "joined the ring");
                Ok(NodeHandle {
                    listener,
                    stabilizer: self.spawn_stabilizer(),
                })
            }
            Err(e) => {
                listener.abort();
                Err(e)
            }
        }
    }

    async fn splice_in(&self, peer: &str) -> Result<()> {
        let req = RpcRequest::new(Method::FindSuccessor, self.id.as_bytes().to_vec());
        let reply = self.transport.invoke(peer, &req).await?;
        let successor: NodeInfo = decode_peer(peer, &reply)?;

        let req = RpcRequest::new(Method::FindPredecessor, self.id.as_bytes().to_vec());
        let reply = self.transport.invoke(&successor.address, &req).await?;
        let predecessor: NodeInfo = decode_peer(&successor.address, &reply)?;

        {
            let mut routing = self.routing.write();
            routing.successor = successor;
            routing.predecessor = Some(predecessor);
        }

        self.refresh_fingers().await;
        Ok(())
    }

    /// Returns the node responsible for `target`: ourselves for our own
    /// id, our successor when `target` falls in `(self, successor]`, and
    /// otherwise whatever the closest preceding finger answers.
    pub async fn find_successor(&self, target: RingId) -> Result<NodeInfo> {
        if target == self.id {
            return Ok(self.info());
        }

        let successor = self.successor();
        if target.in_interval(&self.id, &successor.id) {
            return Ok(successor);
        }

        let hop = self.closest_preceding_node(&target);
        let req = RpcRequest::new(Method::FindSuccessor, target.as_bytes().to_vec());
        let reply = self.transport.invoke(&hop.address, &req).await?;
        let found = decode_peer(&hop.address, &reply)?;
        debug!(node_id = %self.id, hop = %hop.address, found = %found.id, "resolved successor");
        Ok(found)
    }

    /// Returns the node preceding `target` on the ring.
    ///
    /// Asked for our own id, we answer with our stored predecessor; that
    /// is the query the stabilization protocol sends to its successor.
    /// For any other target the walk is stateless: answer ourselves when
    /// `target` falls in `(self, successor]`, otherwise relay through the
    /// closest preceding finger.
    pub async fn find_predecessor(&self, target: RingId) -> Result<NodeInfo> {
        if target == self.id {
            return Ok(self.predecessor().unwrap_or_else(|| self.info()));
        }

        let successor = self.successor();
        if target.in_interval(&self.id, &successor.id) {
            return Ok(self.info());
        }

        let hop = self.closest_preceding_node(&target);
        let req = RpcRequest::new(Method::FindPredecessor, target.as_bytes().to_vec());
        let reply = self.transport.invoke(&hop.address, &req).await?;
        decode_peer(&hop.address, &reply)
    }

    /// The finger farthest ahead of us that still precedes `target`, or
    /// our successor when no finger qualifies.
    pub fn closest_preceding_node(&self, target: &RingId) -> NodeInfo {
        let routing = self.routing.read();
        routing
            .fingers
            .closest_preceding(&self.id, target)
            .cloned()
            .unwrap_or_else(|| routing.successor.clone())
    }

    /// Refreshes every finger slot by resolving the successor of
    /// `(self.id + 2^i) mod 2^160`. A slot whose lookup fails keeps its
    /// previous entry; the remaining slots are still refreshed.
    pub async fn refresh_fingers(&self) {
        for i in 0..M {
            let start = self.id.finger_start(i);
            match self.find_successor(start).await {
                Ok(entry) => self.routing.write().fingers.set(i, entry),
                Err(e) => {
                    warn!(node_id = %self.id, slot = i, error = %e, "failed to refresh finger");
                }
            }
        }
    }

    /// Runs one stabilization round: ask the successor for its
    /// predecessor, adopt that node as successor if it sits between us,
    /// then notify the successor of our own candidacy.
    pub async fn stabilize(&self) -> Result<()> {
        let successor = self.successor();
        let req = RpcRequest::new(Method::FindPredecessor, successor.id.as_bytes().to_vec());
        let reply = self.transport.invoke(&successor.address, &req).await?;
        let candidate = decode_peer(&successor.address, &reply)?;

        if candidate
            .id
            .in_interval(&self.id.wrapping_inc(), &successor.id)
        {
            debug!(node_id = %self.id, adopted = %candidate.id, "adopting closer successor");
            self.routing.write().successor = candidate;
        }

        let successor = self.successor();
        let own = serde_json::to_vec(&self.info())?;
        let req = RpcRequest::new(Method::Notify, own);
        self.transport.invoke(&successor.address, &req).await?;
        Ok(())
    }

    /// Handles a peer's claim to be our predecessor: adopt the sender if
    /// we have no predecessor yet or its id falls strictly between our
    /// current predecessor and us.
    pub fn notify(&self, sender: NodeInfo) {
        let mut routing = self.routing.write();
        let adopt = match &routing.predecessor {
            None => true,
            Some(current) => sender.id.in_open_interval(&current.id, &self.id),
        };
        if adopt {
            debug!(node_id = %self.id, predecessor = %sender.id, "adopted new predecessor");
            routing.predecessor = Some(sender);
        }
    }

    /// Decodes an inbound request, routes it to the matching handler and
    /// returns the reply payload to frame back.
    pub(crate) async fn dispatch(&self, request: RpcRequest) -> Result<Vec<u8>> {
        match request.method {
            Method::FindSuccessor => {
                let target = RingId::from_wire(&request.data)?;
                let found = self.find_successor(target).await?;
                Ok(serde_json::to_vec(&found)?)
            }
            Method::FindPredecessor => {
                let target = RingId::from_wire(&request.data)?;
                let found = self.find_predecessor(target).await?;
                Ok(serde_json::to_vec(&found)?)
            }
            Method::Notify => {
                let sender: NodeInfo = serde_json::from_slice(&request.data)?;
                self.notify(sender);
                Ok(b"OK".to_vec())
            }
            method @ (Method::Leave | Method::Stabilize) => Err(Error::Unhandled { method }),
        }
    }

    fn spawn_stabilizer(self: &Arc<Self>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(node.config.stabilize_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = node.stabilize().await {
                    let successor = node.successor();
                    warn!(
                        node_id = %node.id,
                        addr = %successor.address,
                        method = "FindPredecessor",
                        error = %e,
                        "stabilization round failed"
                    );
                }
            }
        })
    }
}

fn decode_peer(addr: &str, reply: &[u8]) -> Result<NodeInfo> {
    serde_json::from_slice(reply).map_err(|e| Error::Lookup {
        addr: addr.to_string(),
        source: e,
    })
}

/// Owns the background tasks of a started node: the accept loop and the
/// stabilization ticker.
pub struct NodeHandle {
    listener: JoinHandle<()>,
    stabilizer: JoinHandle<()>,
}

impl NodeHandle {
    /// Stops the node: the listener is closed and the ticker halted. In
    /// flight connections finish on their own; peers repair the ring
    /// around us through their next stabilization rounds.
    pub async fn stop(self) {
        self.listener.abort();
        let _ = self.listener.await;
        self.stabilizer.abort();
        let _ = self.stabilizer.await;
    }
}
