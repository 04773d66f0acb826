use crate::blockchain::core::chain::Block;
use crate::error::ChainError;
use crate::miner::ProofOfWork;
use serde::Deserialize;

/// Which hash of the predecessor feeds the proof check during validation.
///
/// Blocks are always mined against the computed digest of their predecessor.
/// `StoredPreviousHash` reproduces the historical validator, which checked proofs
/// against the predecessor's own `previous_hash` field instead. Under that rule an
/// honestly mined chain almost never validates, while a chain mined against the
/// stored field does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofHashSource {
    #[default]
    ComputedDigest,
    StoredPreviousHash,
}

/// Checks link and proof integrity of a whole candidate chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainValidator {
    pow: ProofOfWork,
    hash_source: ProofHashSource,
}

impl ChainValidator {
    pub fn new(pow: ProofOfWork, hash_source: ProofHashSource) -> Self {
        ChainValidator { pow, hash_source }
    }

    pub fn hash_source(&self) -> ProofHashSource {
        self.hash_source
    }

    pub fn is_valid(&self, chain: &[Block]) -> bool {
        match self.validate(chain) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "chain rejected");
                false
            }
        }
    }

    /// Walk every `(prev, cur)` pair after the genesis block, stopping at the first
    /// failing link or proof.
    pub fn validate(&self, chain: &[Block]) -> Result<(), ChainError> {
        if chain.is_empty() {
            return Err(ChainError::InvalidChain("Chain has no genesis block".to_string()));
        }

        for pair in chain.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            let prev_hash = prev.hash();

            if cur.previous_hash != prev_hash {
                return Err(ChainError::InvalidChain(format!(
                    "Block {} links to {}, but block {} hashes to {}",
                    cur.index, cur.previous_hash, prev.index, prev_hash
                )));
            }

            let proof_hash = match self.hash_source {
                ProofHashSource::ComputedDigest => prev_hash.as_str(),
                ProofHashSource::StoredPreviousHash => prev.previous_hash.as_str(),
            };
            if !self.pow.valid_proof(prev.proof, cur.proof, proof_hash) {
                return Err(ChainError::InvalidChain(format!(
                    "Block {} carries an invalid proof {}",
                    cur.index, cur.proof
                )));
            }
        }

        Ok(())
    }
}
