use crate::node::Node;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Handles of the periodic ring duties. Dropping them leaves the tasks running.
pub struct Maintenance {
    pub stabilize: JoinHandle<()>,
    pub fix_fingers: JoinHandle<()>,
    pub check_predecessor: JoinHandle<()>,
}

impl Maintenance {
    /// Starts stabilize, fix-fingers and check-predecessor, each on its own
    /// configured interval.
    pub fn start(node: &Node) -> Self {
        let config = node.config();
        let n = node.clone();
        let stabilize = every(config.stabilize_interval(), move || {
            let n = n.clone();
            async move { n.stabilize().await }
        });
        let n = node.clone();
        let fix_fingers = every(config.fix_fingers_interval(), move || {
            let n = n.clone();
            async move { n.fix_fingers().await }
        });
        let n = node.clone();
        let check_predecessor = every(config.check_predecessor_interval(), move || {
            let n = n.clone();
            async move { n.check_predecessor().await }
        });
        Maintenance {
            stabilize,
            fix_fingers,
            check_predecessor,
        }
    }

    pub fn abort(&self) {
        self.stabilize.abort();
        self.fix_fingers.abort();
        self.check_predecessor.abort();
    }
}

/// Runs `duty` every `period`. A slow run delays the next tick instead of
/// letting runs pile up.
fn every<F, Fut>(period: Duration, duty: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            duty().await;
        }
    })
}
