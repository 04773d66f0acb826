//! Longest-valid-chain resolution against peer replicas
//!
//! Peers are polled concurrently. Each successful reply is a [`ChainSnapshot`];
//! unreachable or slow peers are skipped for the round. The snapshots are then
//! considered in peer order and a candidate only wins when it is strictly longer
//! than the best chain seen so far and passes [`ChainValidator`]. Equal lengths
//! never displace the local chain.

use crate::blockchain::{Block, ChainValidator};
use crate::error::ChainError;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Payload returned by the fetch-chain operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub chain: Vec<Block>,
    pub length: u64,
}

impl ChainSnapshot {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len() as u64;
        ChainSnapshot { chain, length }
    }
}

/// Ability to ask one peer for its full chain.
pub trait PeerChainSource: Send + Sync {
    fn fetch_chain(&self, peer: &str) -> impl Future<Output = Result<ChainSnapshot, ChainError>> + Send;
}

/// Outcome of one resolution round.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub replaced: bool,
    pub chain: Vec<Block>,
}

#[derive(Debug, Clone)]
pub struct ConsensusResolver {
    validator: ChainValidator,
    fetch_timeout: Duration,
    max_concurrent_fetches: usize,
}

impl ConsensusResolver {
    pub fn new(validator: ChainValidator, fetch_timeout: Duration, max_concurrent_fetches: usize) -> Self {
        ConsensusResolver {
            validator,
            fetch_timeout,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
        }
    }

    pub fn validator(&self) -> &ChainValidator {
        &self.validator
    }

    /// Compare `local` against every peer and return the chain to keep.
    pub async fn resolve<S: PeerChainSource>(&self, local: &[Block], source: &S, peers: &[String]) -> Resolution {
        let candidates = self.collect_candidates(source, peers).await;

        match self.select_longest(local.len() as u64, candidates) {
            Some(chain) => {
                info!(local = local.len(), adopted = chain.len(), "found longer valid chain");
                Resolution { replaced: true, chain }
            }
            None => Resolution {
                replaced: false,
                chain: local.to_vec(),
            },
        }
    }

    /// Fetch every peer's chain, at most `max_concurrent_fetches` at a time.
    ///
    /// Failed fetches are dropped. The rest come back in the order of `peers`.
    pub async fn collect_candidates<S: PeerChainSource>(&self, source: &S, peers: &[String]) -> Vec<ChainSnapshot> {
        let fetch_timeout = self.fetch_timeout;
        let fetches: Vec<BoxFuture<'_, (usize, String, Result<ChainSnapshot, ChainError>)>> = peers
            .iter()
            .cloned()
            .enumerate()
            .map(|(position, peer)| {
                async move {
                    let reply = match tokio::time::timeout(fetch_timeout, source.fetch_chain(&peer)).await {
                        Ok(result) => result,
                        Err(_) => Err(ChainError::PeerTimeout(peer.clone())),
                    };
                    (position, peer, reply)
                }
                .boxed()
            })
            .collect();

        let mut replies: Vec<(usize, ChainSnapshot)> = stream::iter(fetches)
            .buffer_unordered(self.max_concurrent_fetches)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .filter_map(|(position, peer, reply)| match reply {
                Ok(snapshot) => {
                    debug!(%peer, length = snapshot.length, "fetched peer chain");
                    Some((position, snapshot))
                }
                Err(e) => {
                    warn!(%peer, error = %e, "skipping peer for this round");
                    None
                }
            })
            .collect();

        replies.sort_by_key(|(position, _)| *position);
        replies.into_iter().map(|(_, snapshot)| snapshot).collect()
    }

    /// Pick the longest valid candidate strictly longer than `local_len`.
    pub fn select_longest(&self, local_len: u64, candidates: Vec<ChainSnapshot>) -> Option<Vec<Block>> {
        let mut best_length = local_len;
        let mut best = None;

        for snapshot in candidates {
            if snapshot.length <= best_length {
                continue;
            }
            if snapshot.length != snapshot.chain.len() as u64 {
                warn!(
                    reported = snapshot.length,
                    actual = snapshot.chain.len(),
                    "discarding chain with inconsistent length"
                );
                continue;
            }
            if let Err(e) = self.validator.validate(&snapshot.chain) {
                warn!(error = %e, "discarding invalid candidate chain");
                continue;
            }
            best_length = snapshot.length;
            best = Some(snapshot.chain);
        }

        best
    }
}
