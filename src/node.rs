//! The node service: one ledger, its peers and the operations clients call

use crate::blockchain::{Block, ChainValidator, Ledger};
use crate::config::Config;
use crate::consensus::{ChainSnapshot, ConsensusResolver, PeerChainSource};
use crate::error::ChainError;
use crate::miner::ProofOfWork;
use crate::network::{HttpPeerClient, PeerSet};
use crate::transaction::Transaction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Random node identity: a UUID v4 as 32 hex characters.
pub fn generate_node_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub struct Node<S: PeerChainSource = HttpPeerClient> {
    pub config: Config,
    node_id: String,
    ledger: Arc<RwLock<Ledger>>,
    peers: PeerSet,
    pow: ProofOfWork,
    resolver: ConsensusResolver,
    source: S,
    shutdown: Arc<AtomicBool>,
}

impl Node<HttpPeerClient> {
    /// Build a node that talks to its peers over HTTP.
    pub fn new(config: Config) -> Result<Self, ChainError> {
        let client = HttpPeerClient::new(config.consensus.fetch_timeout)?;
        Self::with_source(config, client)
    }
}

impl<S: PeerChainSource> Node<S> {
    pub fn with_source(config: Config, source: S) -> Result<Self, ChainError> {
        config.validate()?;

        let pow = ProofOfWork::new(config.mining.difficulty)?;
        let validator = ChainValidator::new(pow, config.consensus.proof_hash_source);
        let resolver = ConsensusResolver::new(
            validator,
            config.consensus.fetch_timeout,
            config.consensus.max_concurrent_fetches,
        );

        let peers = PeerSet::new();
        peers.register_all(&config.consensus.peers)?;

        let node_id = config.node.node_id.clone().unwrap_or_else(generate_node_id);
        info!(%node_id, difficulty = pow.difficulty(), "node initialised");

        Ok(Self {
            config,
            node_id,
            ledger: Arc::new(RwLock::new(Ledger::new())),
            peers,
            pow,
            resolver,
            source,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    pub fn ledger(&self) -> &Arc<RwLock<Ledger>> {
        &self.ledger
    }

    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Stop in-flight proof searches and background loops.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Queue a transaction; returns the index of the block expected to hold it.
    pub async fn submit_transaction(&self, tx: Transaction) -> u64 {
        self.ledger.write().await.submit_transaction(tx)
    }

    /// Run one mine-and-seal cycle and return the sealed block.
    ///
    /// The ledger stays write-locked from the proof search to the seal, so the
    /// pending pool the block is built from cannot change underneath it.
    pub async fn mine(&self) -> Result<Block, ChainError> {
        let mut ledger = self.ledger.write().await;
        let last_block = ledger.last_block()?.clone();

        let pow = self.pow;
        let workers = self.config.mining.workers;
        let stop = self.shutdown.clone();
        let search_from = last_block.clone();
        let proof = tokio::task::spawn_blocking(move || pow.search_parallel(&search_from, workers, &stop))
            .await
            .map_err(|e| ChainError::Internal(format!("Proof search task failed: {}", e)))?
            .ok_or(ChainError::Cancelled)?;

        ledger.submit_transaction(Transaction::reward(self.node_id.clone(), self.config.mining.reward));

        let previous_hash = last_block.hash();
        let block = ledger.seal_block(proof, Some(&previous_hash))?;
        info!(
            index = block.index,
            proof,
            transactions = block.transactions.len(),
            "new block forged"
        );
        Ok(block)
    }

    /// The full chain in fetch-chain payload form.
    pub async fn full_chain(&self) -> ChainSnapshot {
        ChainSnapshot::new(self.ledger.read().await.chain().to_vec())
    }

    pub async fn pending_count(&self) -> usize {
        self.ledger.read().await.pending().len()
    }

    /// Register peers; the whole batch is rejected if any address is invalid.
    pub fn register_peers<I, A>(&self, addresses: I) -> Result<Vec<String>, ChainError>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<str>,
    {
        self.peers.register_all(addresses)?;
        Ok(self.peers.list())
    }

    /// Reconcile with every registered peer.
    ///
    /// Peer chains are fetched without holding the ledger lock. The swap happens
    /// under the lock and only if the winner is still longer than the local chain.
    pub async fn resolve_conflicts(&self) -> Result<(bool, Vec<Block>), ChainError> {
        let local = self.ledger.read().await.chain().to_vec();
        let peers = self.peers.list();

        let resolution = self.resolver.resolve(&local, &self.source, &peers).await;
        if !resolution.replaced {
            return Ok((false, local));
        }

        let mut ledger = self.ledger.write().await;
        if resolution.chain.len() <= ledger.len() {
            warn!(
                candidate = resolution.chain.len(),
                local = ledger.len(),
                "local chain grew during resolution, keeping it"
            );
            return Ok((false, ledger.chain().to_vec()));
        }

        ledger.replace_chain(resolution.chain)?;
        info!(length = ledger.len(), "our chain was replaced");
        Ok((true, ledger.chain().to_vec()))
    }
}
