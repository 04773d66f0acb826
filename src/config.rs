//! Configuration management for powledger

use crate::blockchain::ProofHashSource;
use crate::error::ChainError;
use crate::miner::DEFAULT_DIFFICULTY;
use crate::network::normalize_peer_address;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Highest difficulty accepted from configuration. Each step multiplies the
/// expected search time by 16.
pub const MAX_CONFIG_DIFFICULTY: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Fixed node identity. A random one is generated when unset.
    #[serde(default)]
    pub node_id: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_port: default_api_port(),
            node_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiningConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_reward")]
    pub reward: u64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            workers: default_workers(),
            reward: default_reward(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default = "default_fetch_timeout", deserialize_with = "deserialize_duration")]
    pub fetch_timeout: Duration,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Run resolution in the background at this interval when set.
    #[serde(default, deserialize_with = "deserialize_optional_duration")]
    pub resolve_interval: Option<Duration>,
    #[serde(default)]
    pub proof_hash_source: ProofHashSource,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            fetch_timeout: default_fetch_timeout(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            resolve_interval: None,
            proof_hash_source: ProofHashSource::default(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.mining.difficulty > MAX_CONFIG_DIFFICULTY {
            return Err(ChainError::Config(format!(
                "mining.difficulty must be at most {}, got {}",
                MAX_CONFIG_DIFFICULTY, self.mining.difficulty
            )));
        }
        if self.mining.workers == 0 {
            return Err(ChainError::Config("mining.workers must be at least 1".to_string()));
        }
        if self.consensus.max_concurrent_fetches == 0 {
            return Err(ChainError::Config(
                "consensus.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.consensus.fetch_timeout.is_zero() {
            return Err(ChainError::Config("consensus.fetch_timeout must be positive".to_string()));
        }
        if matches!(self.consensus.resolve_interval, Some(d) if d.is_zero()) {
            return Err(ChainError::Config("consensus.resolve_interval must be positive".to_string()));
        }
        if matches!(&self.node.node_id, Some(id) if id.trim().is_empty()) {
            return Err(ChainError::Config("node.node_id must not be empty".to_string()));
        }
        for peer in &self.consensus.peers {
            normalize_peer_address(peer)
                .map_err(|e| ChainError::Config(format!("consensus.peers: {}", e)))?;
        }
        Ok(())
    }
}

/// Load `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }

    let text = fs::read_to_string(path)?;
    Config::from_toml(&text)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration(deserializer).map(Some)
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_difficulty() -> usize {
    DEFAULT_DIFFICULTY
}

fn default_workers() -> usize {
    1
}

fn default_reward() -> u64 {
    1
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_concurrent_fetches() -> usize {
    8
}
