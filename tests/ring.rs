mod common;

use std::time::Duration;

use sha1::{Digest, Sha1};
use tokio::time::sleep;

use ringkv::{Method, Node, NodeInfo, RingId, RpcRequest, Transport, M};

#[tokio::test]
async fn single_node_ring_owns_the_whole_circle() {
    let addr = "127.0.0.1:30101";
    let node = Node::with_config(addr, common::manual_config());
    let handle = node.bootstrap().await.expect("bootstrap should succeed");

    // The id is the SHA-1 of the address, read as a big-endian integer.
    let mut hasher = Sha1::new();
    hasher.update(addr.as_bytes());
    let digest: [u8; 20] = hasher.finalize().into();
    assert_eq!(node.id(), RingId::from_bytes(digest));

    assert_eq!(node.successor(), node.info());
    assert_eq!(node.predecessor(), Some(node.info()));
    for i in 0..M {
        assert_eq!(node.finger(i), node.info());
    }

    // Refreshing fingers on an isolated node keeps every slot at self.
    node.refresh_fingers().await;
    for i in 0..M {
        assert_eq!(node.finger(i), node.info());
    }

    handle.stop().await;
}

#[tokio::test]
async fn two_nodes_become_each_others_neighbors() {
    let ring = common::spawn_ring(
        &["127.0.0.1:30201", "127.0.0.1:30202"],
        common::manual_config(),
    )
    .await;

    common::stabilize_round(&ring).await;
    common::stabilize_round(&ring).await;

    let (a, b) = (&ring[0].0, &ring[1].0);
    assert_eq!(a.successor(), b.info());
    assert_eq!(a.predecessor(), Some(b.info()));
    assert_eq!(b.successor(), a.info());
    assert_eq!(b.predecessor(), Some(a.info()));

    common::shutdown(ring).await;
}

#[tokio::test]
async fn three_node_ring_converges_under_the_ticker() {
    let ring = common::spawn_ring(
        &["127.0.0.1:30301", "127.0.0.1:30302", "127.0.0.1:30303"],
        common::ticking_config(),
    )
    .await;
    sleep(Duration::from_secs(3)).await;

    let ids = common::sorted_ids(&ring);
    for (node, _) in &ring {
        let rank = ids.iter().position(|id| *id == node.id()).unwrap();
        let successor = ids[(rank + 1) % ids.len()];
        let predecessor = ids[(rank + ids.len() - 1) % ids.len()];
        assert_eq!(node.successor().id, successor, "wrong successor");
        assert_eq!(
            node.predecessor().expect("predecessor should be learned").id,
            predecessor,
            "wrong predecessor"
        );
    }

    // The successor pointers form a single cycle over all three nodes.
    let mut seen = vec![ring[0].0.id()];
    let mut current = ring[0].0.successor().id;
    while current != ring[0].0.id() {
        assert!(!seen.contains(&current), "successor cycle revisited a node");
        seen.push(current);
        let next = ring
            .iter()
            .find(|(node, _)| node.id() == current)
            .expect("successor outside the ring");
        current = next.0.successor().id;
    }
    assert_eq!(seen.len(), ring.len());

    common::shutdown(ring).await;
}

#[tokio::test]
async fn lookups_route_through_the_ring() {
    let ring = common::spawn_ring(
        &["127.0.0.1:30401", "127.0.0.1:30402", "127.0.0.1:30403"],
        common::ticking_config(),
    )
    .await;
    sleep(Duration::from_secs(3)).await;

    let ids = common::sorted_ids(&ring);
    let smallest = ring
        .iter()
        .find(|(node, _)| node.id() == ids[0])
        .unwrap();
    let largest = *ids.last().unwrap();

    // One short of the largest id is still the largest node's territory.
    let target = common::ring_dec(largest);
    let owner = smallest.0.find_successor(target).await.unwrap();
    assert_eq!(owner.id, largest);

    common::shutdown(ring).await;
}

#[tokio::test]
async fn four_nodes_converge_within_one_round_per_node() {
    let addrs = [
        "127.0.0.1:30501",
        "127.0.0.1:30502",
        "127.0.0.1:30503",
        "127.0.0.1:30504",
    ];
    let ring = common::spawn_ring(&addrs, common::manual_config()).await;

    for _ in 0..ring.len() {
        common::stabilize_round(&ring).await;
    }

    let ids = common::sorted_ids(&ring);
    for (node, _) in &ring {
        let rank = ids.iter().position(|id| *id == node.id()).unwrap();
        assert_eq!(node.successor().id, ids[(rank + 1) % ids.len()]);
        assert_eq!(
            node.predecessor().expect("predecessor should be learned").id,
            ids[(rank + ids.len() - 1) % ids.len()]
        );
    }

    common::shutdown(ring).await;
}

#[tokio::test]
async fn rpc_round_trip_preserves_node_info_exactly() {
    let addr = "127.0.0.1:30601";
    let node = Node::with_config(addr, common::manual_config());
    let handle = node.bootstrap().await.expect("bootstrap should succeed");

    let client = Transport::new(Duration::from_secs(2));

    // A singleton ring answers every lookup with itself, so the reply must
    // be its own NodeInfo, bit for bit.
    let target = node.id().finger_start(5);
    let req = RpcRequest::new(Method::FindSuccessor, target.as_bytes().to_vec());
    let reply = client.invoke(addr, &req).await.unwrap();
    let decoded: NodeInfo = serde_json::from_slice(&reply).unwrap();
    assert_eq!(decoded, node.info());

    // Notify acknowledges with the literal bytes "OK".
    let claimant = NodeInfo {
        id: node.id().finger_start(1),
        address: "10.9.9.9:1".into(),
    };
    let req = RpcRequest::new(Method::Notify, serde_json::to_vec(&claimant).unwrap());
    let reply = client.invoke(addr, &req).await.unwrap();
    assert_eq!(reply, b"OK");
    assert_eq!(node.predecessor(), Some(claimant));

    // Methods without a handler get no reply at all.
    let req = RpcRequest::new(Method::Leave, Vec::new());
    assert!(client.invoke(addr, &req).await.is_err());

    handle.stop().await;
}
