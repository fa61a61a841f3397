use std::sync::Arc;
use std::time::Duration;

use ringkv::{Node, NodeConfig, NodeHandle, RingId};

/// Config for tests that drive stabilization by hand: the ticker only
/// fires its immediate first round and then stays out of the way.
pub fn manual_config() -> NodeConfig {
    NodeConfig {
        stabilize_interval: Duration::from_secs(3600),
        rpc_deadline: Duration::from_secs(2),
    }
}

/// Config for tests that let the background ticker converge the ring.
pub fn ticking_config() -> NodeConfig {
    NodeConfig {
        stabilize_interval: Duration::from_millis(250),
        rpc_deadline: Duration::from_secs(2),
    }
}

/// Starts a ring: the first address bootstraps, the rest join the first.
pub async fn spawn_ring(
    addrs: &[&str],
    config: NodeConfig,
) -> Vec<(Arc<Node>, NodeHandle)> {
    let mut ring = Vec::new();
    for (i, addr) in addrs.iter().enumerate() {
        let node = Node::with_config(*addr, config.clone());
        let handle = if i == 0 {
            node.bootstrap().await.expect("bootstrap should succeed")
        } else {
            node.join(addrs[0]).await.expect("join should succeed")
        };
        ring.push((node, handle));
        // Give the joiner's first stabilization round a moment to land.
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    ring
}

/// Runs one stabilization round on every node, in spawn order.
pub async fn stabilize_round(ring: &[(Arc<Node>, NodeHandle)]) {
    for (node, _) in ring {
        node.stabilize().await.expect("stabilization should succeed");
    }
}

/// Tears the ring down.
pub async fn shutdown(ring: Vec<(Arc<Node>, NodeHandle)>) {
    for (_, handle) in ring {
        handle.stop().await;
    }
}

/// The ids of the ring sorted ascending, for computing expected neighbors.
pub fn sorted_ids(ring: &[(Arc<Node>, NodeHandle)]) -> Vec<RingId> {
    let mut ids: Vec<RingId> = ring.iter().map(|(node, _)| node.id()).collect();
    ids.sort();
    ids
}

/// `(id - 1) mod 2^160`.
pub fn ring_dec(id: RingId) -> RingId {
    let mut bytes = *id.as_bytes();
    for byte in bytes.iter_mut().rev() {
        let (value, borrowed) = byte.overflowing_sub(1);
        *byte = value;
        if !borrowed {
            break;
        }
    }
    RingId::from_bytes(bytes)
}
