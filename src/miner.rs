//! Proof-of-work search and verification
//!
//! A proof for a new block is a nonce `n` such that
//! `sha256("{last_proof}{n}{last_hash}")` starts with `difficulty` hex zeros, where
//! `last_proof` and `last_hash` belong to the block being extended. Verification is
//! one hash; finding a proof takes about `16^difficulty` attempts.

use crate::blockchain::Block;
use crate::crypto::sha256_hex;
use crate::error::ChainError;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub const DEFAULT_DIFFICULTY: usize = 4;

/// Length of a hex SHA-256 digest; no difficulty above this can be met.
pub const MAX_DIFFICULTY: usize = 64;

/// Candidates tried between two looks at the stop flag.
const STOP_CHECK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: usize,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork {
            difficulty: DEFAULT_DIFFICULTY,
        }
    }
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Result<Self, ChainError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(ChainError::InvalidInput(format!(
                "Difficulty {} exceeds digest length {}",
                difficulty, MAX_DIFFICULTY
            )));
        }
        Ok(ProofOfWork { difficulty })
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn valid_proof(&self, last_proof: u64, proof: u64, last_hash: &str) -> bool {
        let guess = format!("{}{}{}", last_proof, proof, last_hash);
        let digest = sha256_hex(guess.as_bytes());
        digest.bytes().take(self.difficulty).all(|b| b == b'0')
    }

    /// Find the smallest proof extending `last_block`. Blocks until one is found.
    pub fn search(&self, last_block: &Block) -> u64 {
        let last_hash = last_block.hash();
        let mut proof = 0u64;
        while !self.valid_proof(last_block.proof, proof, &last_hash) {
            proof += 1;
        }
        proof
    }

    /// Like [`search`](Self::search), but gives up with `None` once `stop` is set.
    pub fn search_until(&self, last_block: &Block, stop: &AtomicBool) -> Option<u64> {
        let last_hash = last_block.hash();
        let mut proof = 0u64;
        loop {
            if proof % STOP_CHECK_INTERVAL == 0 && stop.load(Ordering::Relaxed) {
                tracing::debug!(proof, "proof search interrupted");
                return None;
            }
            if self.valid_proof(last_block.proof, proof, &last_hash) {
                return Some(proof);
            }
            proof = proof.checked_add(1)?;
        }
    }

    /// Search with `workers` interleaved strides on the rayon pool.
    ///
    /// Worker `k` tries `k, k + workers, k + 2 * workers, ...`. Workers publish hits
    /// into a shared minimum and quit once their next candidate is above it, so the
    /// result is the same nonce [`search`](Self::search) returns.
    pub fn search_parallel(&self, last_block: &Block, workers: usize, stop: &AtomicBool) -> Option<u64> {
        let workers = workers.max(1) as u64;
        if workers == 1 {
            return self.search_until(last_block, stop);
        }

        let last_hash = last_block.hash();
        let best = AtomicU64::new(u64::MAX);

        (0..workers).into_par_iter().for_each(|offset| {
            let mut candidate = offset;
            let mut tried = 0u64;
            while candidate < best.load(Ordering::Acquire) {
                if tried % STOP_CHECK_INTERVAL == 0 && stop.load(Ordering::Relaxed) {
                    return;
                }
                if self.valid_proof(last_block.proof, candidate, &last_hash) {
                    best.fetch_min(candidate, Ordering::AcqRel);
                    return;
                }
                tried += 1;
                candidate = match candidate.checked_add(workers) {
                    Some(next) => next,
                    None => return,
                };
            }
        });

        if stop.load(Ordering::Relaxed) {
            return None;
        }
        match best.load(Ordering::Acquire) {
            u64::MAX => None,
            proof => Some(proof),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pow(difficulty: usize) -> ProofOfWork {
        ProofOfWork::new(difficulty).unwrap()
    }

    #[test]
    fn test_valid_proof_matches_digest_prefix() {
        let pow = pow(2);
        let last_hash = "deadbeef";
        for n in 0..2000u64 {
            let digest = sha256_hex(format!("100{}{}", n, last_hash).as_bytes());
            assert_eq!(pow.valid_proof(100, n, last_hash), digest.starts_with("00"));
        }
    }

    #[test]
    fn test_valid_proof_rejects_crafted_nonce() {
        let pow = pow(1);
        let last_hash = "cafe";
        let bad = (0u64..)
            .find(|n| !sha256_hex(format!("7{}{}", n, last_hash).as_bytes()).starts_with('0'))
            .unwrap();
        assert!(!pow.valid_proof(7, bad, last_hash));
    }

    #[test]
    fn test_difficulty_zero_accepts_everything() {
        let pow = pow(0);
        assert!(pow.valid_proof(1, 2, "anything"));
        assert_eq!(pow.search(&Block::genesis()), 0);
    }

    #[test]
    fn test_difficulty_bounds() {
        assert_eq!(ProofOfWork::default().difficulty(), DEFAULT_DIFFICULTY);
        assert!(ProofOfWork::new(MAX_DIFFICULTY).is_ok());
        assert!(matches!(ProofOfWork::new(MAX_DIFFICULTY + 1), Err(ChainError::InvalidInput(_))));
    }

    #[test]
    fn test_search_finds_smallest_valid_proof() {
        let pow = pow(3);
        let genesis = Block::genesis();
        let proof = pow.search(&genesis);
        let last_hash = genesis.hash();

        assert!(pow.valid_proof(genesis.proof, proof, &last_hash));
        assert!((0..proof).all(|n| !pow.valid_proof(genesis.proof, n, &last_hash)));
        assert_eq!(pow.search(&genesis), proof);
    }

    #[test]
    fn test_parallel_search_agrees_with_sequential() {
        let pow = pow(3);
        let genesis = Block::genesis();
        let stop = AtomicBool::new(false);

        let expected = pow.search(&genesis);
        for workers in [1, 2, 3, 8] {
            assert_eq!(pow.search_parallel(&genesis, workers, &stop), Some(expected));
        }
        assert_eq!(pow.search_until(&genesis, &stop), Some(expected));
    }

    #[test]
    fn test_stopped_search_returns_none() {
        let pow = pow(MAX_DIFFICULTY);
        let genesis = Block::genesis();
        let stop = AtomicBool::new(true);

        assert_eq!(pow.search_until(&genesis, &stop), None);
        assert_eq!(pow.search_parallel(&genesis, 4, &stop), None);
    }
}
