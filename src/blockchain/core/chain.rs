use crate::crypto::{hash_block, HexDigest};
use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "1";
/// `proof` of the genesis block.
pub const GENESIS_PROOF: u64 = 100;

/// A sealed block. Its hash is not stored; see [`hash_block`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    /// Seconds since the Unix epoch, microsecond resolution.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    pub fn new(index: u64, transactions: Vec<Transaction>, proof: u64, previous_hash: String) -> Self {
        Block {
            index,
            timestamp: now_seconds(),
            transactions,
            proof,
            previous_hash,
        }
    }

    pub fn genesis() -> Self {
        Block::new(1, Vec::new(), GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string())
    }

    pub fn hash(&self) -> HexDigest {
        hash_block(self)
    }
}

fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// The local chain plus the pool of transactions waiting for the next block.
///
/// A `Ledger` has no interior locking. Callers that share one wrap it in a single
/// lock so that submit, seal and replace are atomic with respect to each other.
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create a ledger holding only the genesis block.
    pub fn new() -> Self {
        Ledger {
            chain: vec![Block::genesis()],
            pending: Vec::new(),
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false for a correctly constructed ledger.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Queue a transaction and return the index of the block expected to contain it.
    pub fn submit_transaction(&mut self, tx: Transaction) -> u64 {
        self.pending.push(tx);
        self.chain.len() as u64 + 1
    }

    pub fn last_block(&self) -> Result<&Block, ChainError> {
        self.chain.last().ok_or(ChainError::EmptyChain)
    }

    /// Seal every pending transaction into a new block and append it.
    ///
    /// An absent or empty `previous_hash` is replaced by the digest of the current
    /// last block. The pool is emptied in the same call.
    pub fn seal_block(&mut self, proof: u64, previous_hash: Option<&str>) -> Result<Block, ChainError> {
        let previous_hash = match previous_hash {
            Some(hash) if !hash.is_empty() => hash.to_string(),
            _ => self.last_block()?.hash(),
        };

        let transactions = std::mem::take(&mut self.pending);
        let block = Block::new(self.chain.len() as u64 + 1, transactions, proof, previous_hash);

        self.chain.push(block.clone());
        Ok(block)
    }

    /// Swap in a whole new chain. Pending transactions are kept.
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<(), ChainError> {
        if chain.is_empty() {
            return Err(ChainError::InvalidChain("Replacement chain is empty".to_string()));
        }
        self.chain = chain;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_invariant() {
        let ledger = Ledger::new();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.pending().is_empty());

        let genesis = ledger.last_block().unwrap();
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions.is_empty());
    }

    #[test]
    fn test_submit_returns_next_block_index() {
        let mut ledger = Ledger::new();
        assert_eq!(ledger.submit_transaction(Transaction::new("A", "B", 5)), 2);
        assert_eq!(ledger.submit_transaction(Transaction::new("A", "B", 5)), 2);
        assert_eq!(ledger.pending().len(), 2);

        ledger.seal_block(1, None).unwrap();
        assert_eq!(ledger.submit_transaction(Transaction::new("B", "C", 1)), 3);
    }

    #[test]
    fn test_seal_clears_pool_in_submission_order() {
        let mut ledger = Ledger::new();
        let submitted = vec![
            Transaction::new("A", "B", 5),
            Transaction::new("C", "D", 0),
            Transaction::new("A", "B", 5),
        ];
        for tx in &submitted {
            ledger.submit_transaction(tx.clone());
        }

        let block = ledger.seal_block(42, Some("abc")).unwrap();
        assert_eq!(block.index, 2);
        assert_eq!(block.proof, 42);
        assert_eq!(block.previous_hash, "abc");
        assert_eq!(block.transactions, submitted);
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.last_block().unwrap(), &block);
    }

    #[test]
    fn test_seal_falls_back_to_computed_previous_hash() {
        let mut ledger = Ledger::new();
        let genesis_hash = ledger.last_block().unwrap().hash();

        let block = ledger.seal_block(7, None).unwrap();
        assert_eq!(block.previous_hash, genesis_hash);

        let second_hash = block.hash();
        let block = ledger.seal_block(8, Some("")).unwrap();
        assert_eq!(block.previous_hash, second_hash);
        assert_eq!(block.index, 3);
    }

    #[test]
    fn test_replace_chain_keeps_pending() {
        let mut ledger = Ledger::new();
        ledger.submit_transaction(Transaction::new("A", "B", 5));

        let mut other = Ledger::new();
        other.seal_block(1, None).unwrap();
        other.seal_block(2, None).unwrap();

        ledger.replace_chain(other.chain().to_vec()).unwrap();
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.pending().len(), 1);

        assert!(matches!(ledger.replace_chain(Vec::new()), Err(ChainError::InvalidChain(_))));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_block_round_trips_through_json() {
        let mut ledger = Ledger::new();
        ledger.submit_transaction(Transaction::new("A", "B", 5));
        let block = ledger.seal_block(3, None).unwrap();

        let decoded: Block = serde_json::from_str(&serde_json::to_string(&block).unwrap()).unwrap();
        assert_eq!(decoded.hash(), block.hash());
    }
}
