//! Replicated placement of blobs on the ring.
//!
//! A key is placed at `replicas` independent ring positions: the key itself,
//! then repeated hashes of it. Each position is resolved to its owner through
//! the ring, and the bytes go out over the transfer channel. Every replica is
//! stored under the original key, so any holder can serve a fetch.

use crate::error::{ChordError, Result};
use crate::node::Node;
use chordfs_proto::{between, hash, Id, NodeRef};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};

/// `[key, hash(key), hash(hash(key)), ...]`, `replicas` entries long.
pub fn placement_targets(key: Id, replicas: usize) -> Vec<Id> {
    let mut targets = Vec::with_capacity(replicas);
    let mut current = key;
    for _ in 0..replicas {
        targets.push(current);
        current = hash(current.as_bytes());
    }
    targets
}

/// Outcome of one placement target during a store.
#[derive(Debug, Clone)]
pub struct Placement {
    pub target: Id,
    pub owner: Option<NodeRef>,
    pub error: Option<String>,
}

impl Placement {
    pub fn is_stored(&self) -> bool {
        self.owner.is_some() && self.error.is_none()
    }
}

/// Coalesces re-propagation requests into at most one running pass plus one
/// queued pass.
#[derive(Debug, Default)]
pub struct ReplicationFlags {
    running: AtomicBool,
    pending: AtomicBool,
}

impl ReplicationFlags {
    /// Queues a pass. Returns true when no runner is active and the caller
    /// has to start one.
    fn request(&self) -> bool {
        self.pending.store(true, Ordering::SeqCst);
        !self.running.swap(true, Ordering::SeqCst)
    }

    /// Claims the queued pass, if there is one.
    fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }

    /// Called by the runner once the queue looks empty. Returns true when a
    /// request slipped in meanwhile and the runner has to keep going.
    fn finish(&self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        self.pending.load(Ordering::SeqCst) && !self.running.swap(true, Ordering::SeqCst)
    }
}

impl Node {
    /// Places `data` at every target of `key`. Individual failures are logged
    /// and reported per target; the call itself does not fail.
    pub async fn store(&self, key: Id, data: &[u8]) -> Vec<Placement> {
        let mut placements: Vec<Placement> = Vec::new();
        for target in placement_targets(key, self.config.replicas) {
            let owner = match self.find_successor(target, 0).await {
                Ok(owner) => owner,
                Err(e) => {
                    warn!(
                        "Node {}: no owner for target {} of {}: {}",
                        self.id.short(),
                        target.short(),
                        key.short(),
                        e
                    );
                    placements.push(Placement {
                        target,
                        owner: None,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            let already_sent = placements
                .iter()
                .any(|p| p.is_stored() && p.owner.as_ref().is_some_and(|o| o.same_node(&owner)));
            let error = if already_sent {
                None
            } else {
                match self.transfer.send(&owner, key, data.to_vec()).await {
                    Ok(()) => {
                        debug!(
                            "Node {}: placed {} on {} (target {})",
                            self.id.short(),
                            key.short(),
                            owner,
                            target.short()
                        );
                        None
                    }
                    Err(e) => {
                        warn!(
                            "Node {}: sending {} to {} failed: {}",
                            self.id.short(),
                            key.short(),
                            owner,
                            e
                        );
                        Some(e.to_string())
                    }
                }
            };
            placements.push(Placement {
                target,
                owner: Some(owner),
                error,
            });
        }
        placements
    }

    /// Fetches `key` from the first reachable placement target.
    pub async fn get_file(&self, key: Id) -> Result<(NodeRef, Vec<u8>)> {
        let targets = placement_targets(key, self.config.replicas);
        let attempts = targets.len();
        for target in targets {
            let owner = match self.find_successor(target, 0).await {
                Ok(owner) => owner,
                Err(e) => {
                    debug!("Node {}: target {} unresolved: {}", self.id.short(), target.short(), e);
                    continue;
                }
            };
            match self.transfer.fetch(&owner, key).await {
                Ok(data) => return Ok((owner, data)),
                Err(e) => debug!(
                    "Node {}: fetching {} from {} failed: {}",
                    self.id.short(),
                    key.short(),
                    owner,
                    e
                ),
            }
        }
        Err(ChordError::StorageExhausted { key, attempts })
    }

    /// Queues a pass that re-stores every locally held key. Called whenever
    /// the successor list or the predecessor changes.
    pub(crate) fn schedule_replication(&self) {
        if !self.replication.request() {
            return;
        }
        let node = self.clone();
        tokio::spawn(async move {
            loop {
                while node.replication.take_pending() {
                    if let Err(e) = node.repropagate().await {
                        warn!("Node {}: re-propagation failed: {}", node.id.short(), e);
                    }
                }
                if !node.replication.finish() {
                    break;
                }
            }
        });
    }

    /// `new` just became our predecessor, taking over the targets in
    /// `(previous, new]`. Keys placed on any of those targets are sent to it
    /// directly, without waiting for lookups elsewhere on the ring to catch up.
    pub(crate) fn hand_off(&self, new: NodeRef, previous: Option<NodeRef>) {
        let node = self.clone();
        tokio::spawn(async move {
            match node.hand_off_keys(&new, previous.as_ref()).await {
                Ok(0) => {}
                Ok(moved) => info!(
                    "Node {}: handed {} keys to new predecessor {}",
                    node.id.short(),
                    moved,
                    new
                ),
                Err(e) => warn!(
                    "Node {}: hand-off to {} failed: {}",
                    node.id.short(),
                    new,
                    e
                ),
            }
        });
    }

    async fn hand_off_keys(&self, new: &NodeRef, previous: Option<&NodeRef>) -> Result<usize> {
        let mut moved = 0;
        for key in self.store.keys().await? {
            // Without a previous predecessor everything outside (new, self] moved.
            let taken_over = placement_targets(key, self.config.replicas)
                .iter()
                .any(|target| match previous {
                    Some(p) => between(&p.id(), target, &new.id(), true),
                    None => !between(&new.id(), target, &self.id, true),
                });
            if !taken_over {
                continue;
            }
            let data = match self.store.read(&key).await {
                Ok(data) => data,
                Err(ChordError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            self.transfer.send(new, key, data).await?;
            moved += 1;
        }
        Ok(moved)
    }

    async fn repropagate(&self) -> Result<()> {
        let keys = self.store.keys().await?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut placed = 0;
        for key in &keys {
            let data = match self.store.read(key).await {
                Ok(data) => data,
                Err(ChordError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            placed += self
                .store(*key, &data)
                .await
                .iter()
                .filter(|p| p.is_stored())
                .count();
        }
        info!(
            "Node {}: re-propagated {} keys ({} placements)",
            self.id.short(),
            keys.len(),
            placed
        );
        Ok(())
    }
}
