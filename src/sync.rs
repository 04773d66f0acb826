//! Background chain synchronization
//!
//! Runs consensus resolution against the registered peers on a fixed interval
//! until the node shuts down, keeping simple counters for observability.

use crate::consensus::PeerChainSource;
use crate::node::Node;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Sync statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub rounds: u64,
    pub replacements: u64,
    pub failures: u64,
    pub last_length: u64,
}

/// Handle to a running resolution loop.
pub struct NodeSynchronizer {
    stats: Arc<RwLock<SyncStats>>,
    task: JoinHandle<()>,
}

impl NodeSynchronizer {
    /// Start resolving every `interval`. The first round runs after one interval.
    pub fn spawn<S>(node: Arc<Node<S>>, interval: Duration) -> Self
    where
        S: PeerChainSource + 'static,
    {
        let stats = Arc::new(RwLock::new(SyncStats::default()));
        let task_stats = stats.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "chain synchronizer started");

            loop {
                ticker.tick().await;
                if node.is_shutting_down() {
                    break;
                }
                if node.peers().is_empty() {
                    debug!("no peers registered, skipping resolution round");
                    continue;
                }

                let outcome = node.resolve_conflicts().await;
                let mut stats = task_stats.write();
                stats.rounds += 1;
                match outcome {
                    Ok((replaced, chain)) => {
                        stats.last_length = chain.len() as u64;
                        if replaced {
                            stats.replacements += 1;
                        }
                    }
                    Err(e) => {
                        stats.failures += 1;
                        warn!(error = %e, "resolution round failed");
                    }
                }
            }

            info!("chain synchronizer stopped");
        });

        Self { stats, task }
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop without waiting for the node's shutdown flag.
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Drop for NodeSynchronizer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
