#![allow(dead_code)]

use chordfs_node::server::{serve, ServerHandle};
use chordfs_node::{Config, Node};
use chordfs_proto::{Id, NodeRef, ID_BITS};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Keeps a test node's listeners and storage directory alive.
pub struct NodeHandle {
    pub server: ServerHandle,
    _storage: TempDir,
}

impl NodeHandle {
    /// Stops serving; peers see connection refused from now on.
    pub async fn shutdown(self) {
        self.server.shutdown().await;
    }
}

/// Binds ephemeral RPC and transfer ports, then starts a node serving on them.
/// The node has not created or joined a ring yet.
pub async fn start_node() -> (Node, NodeHandle) {
    start_node_with(|_| {}).await
}

pub async fn start_node_with(tweak: impl FnOnce(&mut Config)) -> (Node, NodeHandle) {
    let rpc_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let transfer_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = rpc_listener.local_addr().unwrap().to_string();

    let storage = tempfile::tempdir().unwrap();

    let mut config = Config {
        address,
        transfer_address: transfer_listener.local_addr().unwrap().to_string(),
        storage_dir: Some(storage.path().to_path_buf()),
        rpc_timeout_ms: 1000,
        ..Config::default()
    };
    tweak(&mut config);

    let node = Node::new(config, vec![]).unwrap();
    let server = serve(&node, rpc_listener, transfer_listener, None).unwrap();

    // Give the listeners a moment to start accepting
    tokio::time::sleep(Duration::from_millis(50)).await;
    (
        node,
        NodeHandle {
            server,
            _storage: storage,
        },
    )
}

/// Starts `count` nodes; the first creates the ring and the rest join through it.
pub async fn start_ring(count: usize) -> (Vec<Node>, Vec<NodeHandle>) {
    start_ring_with(count, |_| {}).await
}

pub async fn start_ring_with(
    count: usize,
    tweak: impl Fn(&mut Config),
) -> (Vec<Node>, Vec<NodeHandle>) {
    let mut nodes = Vec::new();
    let mut handles = Vec::new();
    for i in 0..count {
        let (node, handle) = start_node_with(&tweak).await;
        if i == 0 {
            node.create_ring().await;
        } else {
            let introducer: &Node = &nodes[0];
            node.join(introducer.me.address())
                .await
                .unwrap_or_else(|e| panic!("Node {} failed to join: {}", i, e));
        }
        println!("Node {}: {} ({})", i, node.id, node.me.address());
        nodes.push(node);
        handles.push(handle);
    }
    (nodes, handles)
}

pub async fn stabilize_ring(nodes: &[Node], rounds: usize) {
    println!("Stabilizing ring for {} rounds...", rounds);
    for _ in 0..rounds {
        for node in nodes {
            node.stabilize().await;
            node.fix_fingers().await;
            node.check_predecessor().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Runs one full sweep of the finger cursor on every node, slot by slot across
/// the ring, so each lookup only routes through fingers already refreshed.
pub async fn refresh_fingers(nodes: &[Node]) {
    for node in nodes {
        node.state.write().await.next_finger = 0;
    }
    for _ in 0..ID_BITS {
        for node in nodes {
            node.fix_fingers().await;
        }
    }
}

/// The live node responsible for `key`: the first id at or after it, wrapping.
pub fn expected_owner(nodes: &[Node], key: Id) -> Id {
    let mut ids: Vec<Id> = nodes.iter().map(|n| n.id).collect();
    ids.sort();
    ids.iter().copied().find(|id| *id >= key).unwrap_or(ids[0])
}

/// Asserts that successor and predecessor pointers form the single sorted cycle.
pub async fn assert_ring_converged(nodes: &[Node]) {
    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by_key(|n| n.id);
    let n = sorted.len();
    for (i, node) in sorted.iter().enumerate() {
        let next = sorted[(i + 1) % n];
        let prev = sorted[(i + n - 1) % n];
        let state = node.state.read().await;
        assert_eq!(
            state.successor().id(),
            next.id,
            "Node {} has wrong successor",
            node.id
        );
        assert_eq!(
            state.predecessor.as_ref().map(NodeRef::id),
            Some(prev.id),
            "Node {} has wrong predecessor",
            node.id
        );
    }
}
