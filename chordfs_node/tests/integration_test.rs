use chordfs_node::client::RingClient;
use chordfs_proto::chord::chord_client::ChordClient;
use chordfs_proto::chord::{Empty, FindSuccessorRequest, GetFileRequest, StoreFileRequest};
use chordfs_proto::{hash, Id, NodeRef};
use std::time::Duration;
use tonic::{Code, Request};

mod common;
use common::{assert_ring_converged, expected_owner, stabilize_ring, start_node, start_ring};

#[tokio::test]
async fn test_chord_ring_formation_and_routing() {
    let (nodes, _handles) = start_ring(3).await;

    stabilize_ring(&nodes, 10).await;
    assert_ring_converged(&nodes).await;

    for node in &nodes {
        let state = node.state.read().await;
        println!("Node {} successor is {}", node.id, state.successor());
    }

    for name in ["alpha", "beta", "gamma", "delta"] {
        let key = hash(name);
        for node in &nodes {
            let owner = node.find_successor(key, 0).await.expect("Lookup failed");
            assert_eq!(owner.id(), expected_owner(&nodes, key), "Wrong owner for {}", name);
        }
    }
}

#[tokio::test]
async fn test_store_and_get_file_over_rpc() {
    let (nodes, _handles) = start_ring(3).await;
    stabilize_ring(&nodes, 10).await;

    let mut client = ChordClient::connect(format!("http://{}", nodes[0].me.address()))
        .await
        .expect("Failed to connect to Node 0");

    let name = "notes/today.txt";
    let data = b"remember the milk".to_vec();
    let reply = client
        .store_file(Request::new(StoreFileRequest {
            name: name.to_string(),
            data: data.clone(),
        }))
        .await
        .expect("StoreFile failed")
        .into_inner();

    assert_eq!(reply.key, hash(name).to_vec());
    assert_eq!(reply.placements.len(), 3);
    assert!(reply.placements.iter().all(|p| p.stored));
    assert_eq!(reply.placements[0].target, hash(name).to_vec());

    // Every owner named in the reply holds the bytes under the original key.
    for placement in &reply.placements {
        let owner = NodeRef::from(placement.owner.clone().expect("Stored placement without owner"));
        let holder = nodes
            .iter()
            .find(|n| n.me.same_node(&owner))
            .expect("Owner is not a ring member");
        let stored = holder.local_store().read(&hash(name)).await.unwrap();
        assert_eq!(stored, data);
    }

    let mut client = ChordClient::connect(format!("http://{}", nodes[2].me.address()))
        .await
        .expect("Failed to connect to Node 2");
    let reply = client
        .get_file(Request::new(GetFileRequest {
            name: name.to_string(),
        }))
        .await
        .expect("GetFile failed")
        .into_inner();
    assert_eq!(reply.data, data);
    assert!(reply.owner.is_some());

    let state = client
        .get_state(Request::new(Empty {}))
        .await
        .expect("GetState failed")
        .into_inner();
    assert_eq!(state.id, nodes[2].id.to_vec());
    assert_eq!(state.successors.len(), 3);
    assert!(!state.fingers.is_empty());
}

#[tokio::test]
async fn test_get_missing_file_is_not_found() {
    let (nodes, _handles) = start_ring(2).await;
    stabilize_ring(&nodes, 5).await;

    let mut client = ChordClient::connect(format!("http://{}", nodes[1].me.address()))
        .await
        .unwrap();
    let status = client
        .get_file(Request::new(GetFileRequest {
            name: "never-stored".to_string(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}

#[tokio::test]
async fn test_malformed_identifier_is_rejected() {
    let (node, _handle) = start_node().await;
    node.create_ring().await;

    let mut client = ChordClient::connect(format!("http://{}", node.me.address()))
        .await
        .unwrap();
    let status = client
        .find_successor(Request::new(FindSuccessorRequest {
            id: vec![1, 2, 3],
            hops: 0,
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_routing_queries_between_peers() {
    let (nodes, _handles) = start_ring(4).await;
    stabilize_ring(&nodes, 12).await;

    let client = RingClient::new(Duration::from_secs(1));
    let target = &nodes[1];

    assert!(client.ping(target.me.address()).await.unwrap());

    let remote_list = client.get_successor_list(target.me.address()).await.unwrap();
    assert_eq!(remote_list, target.successors().await);
    assert_eq!(remote_list.len(), 3);
    assert!(remote_list.iter().all(|s| !s.same_node(&target.me)));

    // Asking a node about its own id: the closest preceding node is never
    // past the key, and the remote answer matches the local one.
    let key = target.id.wrapping_sub(&Id::from(1));
    let remote = client
        .closest_preceding_node(target.me.address(), key)
        .await
        .unwrap();
    assert_eq!(remote, target.closest_preceding_node(key).await);

    let owner = client
        .find_successor(nodes[3].me.address(), key, 0)
        .await
        .unwrap();
    assert_eq!(owner.id(), target.id);
}
