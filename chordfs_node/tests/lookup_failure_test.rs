use chordfs_node::{ChordError, Node};
use chordfs_proto::{between, Id, NodeRef, ID_BITS};
use std::time::Duration;
use tokio::net::TcpListener;

mod common;
use common::start_node_with;

/// Two standalone nodes named so that `a -> b -> past` runs clockwise.
async fn ordered_pair(past: Id) -> (Node, Node, Vec<common::NodeHandle>) {
    let (n1, h1) = start_node_with(|config| config.rpc_timeout_ms = 300).await;
    let (n2, h2) = start_node_with(|config| config.rpc_timeout_ms = 300).await;
    n1.create_ring().await;
    n2.create_ring().await;
    if between(&n1.id, &n2.id, &past, false) {
        (n1, n2, vec![h1, h2])
    } else {
        (n2, n1, vec![h1, h2])
    }
}

#[tokio::test]
async fn test_dead_finger_fails_lookup_without_touching_state() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    let dead = NodeRef::new(dead_addr, vec![], "127.0.0.1:1");

    let (a, b, _handles) = ordered_pair(dead.id()).await;
    {
        let mut state = a.state.write().await;
        state.successors = vec![b.me.clone()];
        state.fingers[ID_BITS as usize - 1] = Some(dead.clone());
    }

    // Just past the dead node: the top finger is the closest preceding hop.
    let key = dead.id().wrapping_add(&Id::from(1));
    let err = a.find_successor(key, 0).await.unwrap_err();
    assert!(
        matches!(err, ChordError::Resolution { .. }),
        "unexpected error {:?}",
        err
    );

    let state = a.state.read().await;
    assert_eq!(state.finger(ID_BITS), Some(&dead), "lookup rewrote the finger table");
    assert_eq!(state.successors, vec![b.me.clone()]);
}

#[tokio::test]
async fn test_stalled_downstream_hop_keeps_live_successor() {
    // Accepts connections through the backlog but never answers.
    let blackhole = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let stalled = NodeRef::new(
        blackhole.local_addr().unwrap().to_string(),
        vec![],
        "127.0.0.1:1",
    );

    let (a, b, _handles) = ordered_pair(stalled.id()).await;
    a.state.write().await.successors = vec![b.me.clone()];
    b.state.write().await.successors = vec![stalled.clone()];

    // a forwards to b, b forwards to the stalled node; a's own request times out first.
    let key = stalled.id().wrapping_add(&Id::from(1));
    let result = tokio::time::timeout(Duration::from_secs(10), a.find_successor(key, 0))
        .await
        .expect("lookup did not honour its timeout");
    let err = result.unwrap_err();
    assert!(
        matches!(err, ChordError::Resolution { .. }),
        "unexpected error {:?}",
        err
    );

    assert_eq!(a.successors().await, vec![b.me.clone()]);
    drop(blackhole);
}
