use chordfs_node::Node;
use chordfs_proto::Id;

mod common;
use common::{
    assert_ring_converged, expected_owner, refresh_fingers, stabilize_ring, start_node,
    start_ring, NodeHandle,
};

#[tokio::test]
async fn test_ring_survives_consecutive_failures() {
    const NUM_NODES: usize = 6;

    let (nodes, handles) = start_ring(NUM_NODES).await;
    stabilize_ring(&nodes, 4 * NUM_NODES).await;
    assert_ring_converged(&nodes).await;

    let mut members: Vec<(Node, NodeHandle)> = nodes.into_iter().zip(handles).collect();
    members.sort_by_key(|(node, _)| node.id);

    // Successor lists hold three entries, so two adjacent failures are survivable.
    println!("\nKilling two consecutive nodes...");
    let victims: Vec<(Node, NodeHandle)> = members.drain(1..3).collect();
    for (node, handle) in victims {
        println!("Killing {} ({})", node.id, node.me.address());
        handle.shutdown().await;
    }
    let (survivors, _handles): (Vec<Node>, Vec<NodeHandle>) = members.into_iter().unzip();

    stabilize_ring(&survivors, 12).await;
    assert_ring_converged(&survivors).await;

    // Lookups do not route around dead fingers; a finger sweep replaces them.
    refresh_fingers(&survivors).await;

    println!("\nLooking up random keys among survivors...");
    for _ in 0..20 {
        let key = Id::from_bytes(rand::random());
        let expected = expected_owner(&survivors, key);
        for node in &survivors {
            let owner = node.find_successor(key, 0).await.expect("Lookup failed");
            assert_eq!(owner.id(), expected, "Node {} resolved {} wrongly", node.id, key);
        }
    }
}

#[tokio::test]
async fn test_join_after_node_departure() {
    let (nodes, mut handles) = start_ring(3).await;
    stabilize_ring(&nodes, 10).await;

    println!("Node {} leaving...", nodes[1].id);
    handles.remove(1).shutdown().await;
    let survivors = vec![nodes[0].clone(), nodes[2].clone()];

    stabilize_ring(&survivors, 10).await;
    assert_ring_converged(&survivors).await;
    refresh_fingers(&survivors).await;

    let (node4, _h4) = start_node().await;
    println!("Node 4: {} ({})", node4.id, node4.me.address());
    match node4.join(nodes[2].me.address()).await {
        Ok(_) => println!("Node 4 joined successfully"),
        Err(e) => panic!("Node 4 failed to join: {:?}", e),
    }

    let ring = vec![nodes[0].clone(), nodes[2].clone(), node4];
    stabilize_ring(&ring, 10).await;
    assert_ring_converged(&ring).await;
}

#[tokio::test]
async fn test_join_through_dead_introducer_fails() {
    let (node, handle) = start_node().await;
    node.create_ring().await;
    let introducer = node.me.address().to_string();
    handle.shutdown().await;

    let (late, _h) = start_node().await;
    let err = late.join(&introducer).await.unwrap_err();
    println!("Join failed as expected: {}", err);
    assert!(late.successors().await[0].same_node(&late.me));
}
