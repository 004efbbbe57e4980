use crate::client::RingClient;
use crate::config::Config;
use crate::constants::MAX_LOOKUP_HOPS;
use crate::error::{ChordError, Result};
use crate::local_store::LocalStore;
use crate::storage::ReplicationFlags;
use crate::transfer::{FileTransfer, GrpcTransfer};
use chordfs_proto::{between, Id, NodeRef, ID_BITS};
use log::{debug, info, warn};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct Node {
    pub id: Id,
    pub me: NodeRef,
    pub state: Arc<RwLock<NodeState>>,
    pub(crate) config: Arc<Config>,
    pub(crate) client: RingClient,
    pub(crate) store: Arc<LocalStore>,
    pub(crate) transfer: Arc<dyn FileTransfer>,
    pub(crate) replication: Arc<ReplicationFlags>,
}

#[derive(Debug)]
pub struct NodeState {
    pub predecessor: Option<NodeRef>,
    /// Never empty; holds only `me` while the node is alone.
    pub successors: Vec<NodeRef>,
    /// Finger `k` (1-based) lives at index `k - 1`.
    pub fingers: Vec<Option<NodeRef>>,
    pub next_finger: u32,
}

impl NodeState {
    fn new(me: &NodeRef) -> Self {
        NodeState {
            predecessor: None,
            successors: vec![me.clone()],
            fingers: vec![None; ID_BITS as usize],
            next_finger: 0,
        }
    }

    pub fn successor(&self) -> &NodeRef {
        &self.successors[0]
    }

    pub fn finger(&self, index: u32) -> Option<&NodeRef> {
        let slot = (index as usize).checked_sub(1)?;
        self.fingers.get(slot)?.as_ref()
    }

    /// Drops every reference to `dead` outside the predecessor slot. Returns
    /// whether the successor list changed.
    fn forget(&mut self, dead: &NodeRef, me: &NodeRef) -> bool {
        for slot in self.fingers.iter_mut() {
            if slot.as_ref().is_some_and(|f| f.same_node(dead)) {
                *slot = None;
            }
        }
        let before = self.successors.len();
        self.successors.retain(|s| !s.same_node(dead));
        let changed = self.successors.len() != before;
        if self.successors.is_empty() {
            self.successors.push(me.clone());
        }
        changed
    }
}

/// `[head] + peer_list[..r-1]`, keeping the first occurrence of each address.
pub fn merge_successor_list(head: &NodeRef, peer_list: Vec<NodeRef>, r: usize) -> Vec<NodeRef> {
    let mut list = vec![head.clone()];
    for node in peer_list.into_iter().take(r.saturating_sub(1)) {
        if !list.iter().any(|n| n.same_node(&node)) {
            list.push(node);
        }
    }
    list
}

fn same_addresses(a: &[NodeRef], b: &[NodeRef]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_node(y))
}

impl Node {
    pub fn new(config: Config, public_key: Vec<u8>) -> Result<Self> {
        let transfer = Arc::new(GrpcTransfer::new(config.rpc_timeout()));
        Self::with_transfer(config, public_key, transfer)
    }

    pub fn with_transfer(
        config: Config,
        public_key: Vec<u8>,
        transfer: Arc<dyn FileTransfer>,
    ) -> Result<Self> {
        let me = NodeRef::new(
            config.address.clone(),
            public_key,
            config.transfer_address.clone(),
        );
        let store = LocalStore::open(config.storage_dir())?;
        Ok(Node {
            id: me.id(),
            state: Arc::new(RwLock::new(NodeState::new(&me))),
            me,
            client: RingClient::new(config.rpc_timeout()),
            config: Arc::new(config),
            store: Arc::new(store),
            transfer,
            replication: Arc::new(ReplicationFlags::default()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn local_store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub async fn successors(&self) -> Vec<NodeRef> {
        self.state.read().await.successors.clone()
    }

    pub async fn predecessor(&self) -> Option<NodeRef> {
        self.state.read().await.predecessor.clone()
    }

    pub async fn create_ring(&self) {
        let mut state = self.state.write().await;
        state.predecessor = None;
        state.successors = vec![self.me.clone()];
        info!("Node {}: created a new ring at {}", self.id.short(), self.me.address());
    }

    pub async fn join(&self, introducer: &str) -> Result<()> {
        let successor = self
            .client
            .find_successor(introducer, self.id, 0)
            .await
            .map_err(|e| ChordError::Resolution {
                addr: introducer.to_string(),
                source: e.into(),
            })?;

        let mut state = self.state.write().await;
        state.predecessor = None;
        state.successors = vec![successor.clone()];
        info!(
            "Node {}: joined via {}, successor is {}",
            self.id.short(),
            introducer,
            successor
        );
        Ok(())
    }

    /// Resolves the node owning `key`. `hops` counts how often the query has
    /// already been forwarded.
    ///
    /// A failed hop fails the whole lookup. Routing state is left alone; the
    /// maintenance duties are what drop dead peers.
    pub async fn find_successor(&self, key: Id, hops: u32) -> Result<NodeRef> {
        if hops > MAX_LOOKUP_HOPS {
            return Err(ChordError::HopLimitExceeded(hops));
        }

        let next = {
            let state = self.state.read().await;
            let successor = state.successor();
            if between(&self.id, &key, &successor.id(), true) {
                return Ok(successor.clone());
            }
            let next = self.closest_preceding(&state, &key);
            if next.same_node(&self.me) {
                return Ok(successor.clone());
            }
            next
        };

        self.client
            .find_successor(next.address(), key, hops + 1)
            .await
            .map_err(|e| {
                debug!(
                    "Node {}: lookup of {} via {} failed: {}",
                    self.id.short(),
                    key.short(),
                    next,
                    e
                );
                ChordError::Resolution {
                    addr: next.address().to_string(),
                    source: e.into(),
                }
            })
    }

    pub async fn closest_preceding_node(&self, key: Id) -> NodeRef {
        let state = self.state.read().await;
        self.closest_preceding(&state, &key)
    }

    fn closest_preceding(&self, state: &NodeState, key: &Id) -> NodeRef {
        for finger in state.fingers.iter().rev().flatten() {
            if between(&self.id, &finger.id(), key, false) {
                return finger.clone();
            }
        }
        let successor = state.successor();
        if between(&self.id, &successor.id(), key, false) {
            successor.clone()
        } else {
            self.me.clone()
        }
    }

    pub async fn stabilize(&self) {
        let successor = self.state.read().await.successor().clone();

        let candidate = if successor.same_node(&self.me) {
            self.state.read().await.predecessor.clone()
        } else {
            match self.client.get_predecessor(successor.address()).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(
                        "Node {}: successor {} failed: {}",
                        self.id.short(),
                        successor,
                        e
                    );
                    self.forget(&successor).await;
                    return;
                }
            }
        };

        let successor = match candidate {
            Some(p) if between(&self.id, &p.id(), &successor.id(), false) => {
                let mut state = self.state.write().await;
                if state.successor().same_node(&successor) {
                    info!(
                        "Node {}: successor {} -> {}",
                        self.id.short(),
                        successor,
                        p
                    );
                    state.successors[0] = p.clone();
                    drop(state);
                    self.schedule_replication();
                    p
                } else {
                    state.successor().clone()
                }
            }
            _ => successor,
        };

        if successor.same_node(&self.me) {
            return;
        }

        match self.client.notify(successor.address(), &self.me).await {
            Ok((_, peer_list)) => self.adopt_successor_list(&successor, peer_list).await,
            Err(e) => {
                warn!(
                    "Node {}: failed to notify successor {}: {}",
                    self.id.short(),
                    successor,
                    e
                );
                self.forget(&successor).await;
            }
        }
    }

    async fn adopt_successor_list(&self, successor: &NodeRef, peer_list: Vec<NodeRef>) {
        let list = merge_successor_list(successor, peer_list, self.config.successors);
        let changed = {
            let mut state = self.state.write().await;
            if !state.successor().same_node(successor) {
                // Head moved while we were talking to it; next round fixes the tail.
                return;
            }
            let changed = !same_addresses(&state.successors, &list);
            state.successors = list;
            changed
        };
        if changed {
            debug!("Node {}: successor list updated", self.id.short());
            self.schedule_replication();
        }
    }

    /// `candidate` claims to be our predecessor. Returns whether it now is.
    pub async fn notify(&self, candidate: NodeRef) -> bool {
        if candidate.id() == self.id {
            return false;
        }
        let previous = {
            let mut state = self.state.write().await;
            let accept = match &state.predecessor {
                None => true,
                Some(p) if p.same_node(&candidate) => return true,
                Some(p) => between(&p.id(), &candidate.id(), &self.id, false),
            };
            if !accept {
                return false;
            }
            state.predecessor.replace(candidate.clone())
        };
        info!(
            "Node {}: predecessor is now {}",
            self.id.short(),
            candidate
        );
        self.schedule_replication();
        self.hand_off(candidate, previous);
        true
    }

    /// Refreshes one finger per call, cycling through `1..=ID_BITS`.
    pub async fn fix_fingers(&self) {
        let index = {
            let mut state = self.state.write().await;
            state.next_finger = state.next_finger % ID_BITS + 1;
            state.next_finger
        };
        let target = self.id.finger_start(index);
        match self.find_successor(target, 0).await {
            Ok(node) => {
                let mut state = self.state.write().await;
                state.fingers[(index - 1) as usize] = Some(node);
            }
            Err(e) => debug!(
                "Node {}: finger {} not refreshed: {}",
                self.id.short(),
                index,
                e
            ),
        }
    }

    pub async fn check_predecessor(&self) {
        let Some(predecessor) = self.predecessor().await else {
            return;
        };
        let alive = match self.client.ping(predecessor.address()).await {
            Ok(alive) => alive,
            Err(e) => {
                debug!("Node {}: ping {} failed: {}", self.id.short(), predecessor, e);
                false
            }
        };
        if !alive {
            let mut state = self.state.write().await;
            if state
                .predecessor
                .as_ref()
                .is_some_and(|p| p.same_node(&predecessor))
            {
                warn!(
                    "Node {}: predecessor {} is gone",
                    self.id.short(),
                    predecessor
                );
                state.predecessor = None;
            }
        }
    }

    async fn forget(&self, dead: &NodeRef) {
        if dead.same_node(&self.me) {
            return;
        }
        let changed = self.state.write().await.forget(dead, &self.me);
        if changed {
            self.schedule_replication();
        }
    }

    /// Human readable dump of the routing state.
    pub async fn describe(&self) -> String {
        let state = self.state.read().await;
        let mut out = String::new();
        let _ = writeln!(out, "Node {}", self.id);
        let _ = writeln!(
            out,
            "  address {}  transfer {}",
            self.me.address(),
            self.me.transfer_address()
        );
        match &state.predecessor {
            Some(p) => {
                let _ = writeln!(out, "  predecessor {} {}", p.id(), p.address());
            }
            None => {
                let _ = writeln!(out, "  predecessor -");
            }
        }
        let _ = writeln!(out, "  successors");
        for (i, s) in state.successors.iter().enumerate() {
            let _ = writeln!(out, "    [{}] {} {}", i, s.id(), s.address());
        }
        let _ = writeln!(out, "  fingers");
        // Consecutive slots usually point at the same node; print them as ranges.
        let mut start = 1u32;
        while start <= ID_BITS {
            let current = state.finger(start);
            let mut end = start;
            while end < ID_BITS
                && match (current, state.finger(end + 1)) {
                    (Some(a), Some(b)) => a.same_node(b),
                    (None, None) => true,
                    _ => false,
                }
            {
                end += 1;
            }
            if let Some(f) = current {
                let _ = writeln!(out, "    [{}..={}] {} {}", start, end, f.id(), f.address());
            }
            start = end + 1;
        }
        out
    }
}
