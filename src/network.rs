//! Peer bookkeeping and the HTTP client used to fetch peer chains

use crate::consensus::{ChainSnapshot, PeerChainSource};
use crate::error::ChainError;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::time::Duration;
use url::Url;

/// Default connection timeout for peer requests.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Normalize a peer address to `host[:port]`.
///
/// Accepts either a full URL (`http://10.0.0.5:5000/`) or a bare network location
/// (`10.0.0.5:5000`). Paths, queries and credentials are not allowed on the bare form.
pub fn normalize_peer_address(address: &str) -> Result<String, ChainError> {
    let address = address.trim();
    let invalid = || ChainError::InvalidInput(format!("Invalid URL: '{}'", address));

    if address.is_empty() || address.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let parsed = if address.contains("://") {
        Url::parse(address).map_err(|_| invalid())?
    } else {
        let url = Url::parse(&format!("http://{}", address)).map_err(|_| invalid())?;
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() || !url.username().is_empty() {
            return Err(invalid());
        }
        url
    };

    let host = parsed.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// The set of peers this node reconciles with.
#[derive(Debug, Default)]
pub struct PeerSet {
    peers: RwLock<BTreeSet<String>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer, returning its normalized address.
    pub fn register(&self, address: &str) -> Result<String, ChainError> {
        let peer = normalize_peer_address(address)?;
        if self.peers.write().insert(peer.clone()) {
            tracing::info!(%peer, "registered peer");
        }
        Ok(peer)
    }

    /// Register every address or none of them.
    pub fn register_all<I, S>(&self, addresses: I) -> Result<Vec<String>, ChainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized = addresses
            .into_iter()
            .map(|a| normalize_peer_address(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut peers = self.peers.write();
        for peer in &normalized {
            peers.insert(peer.clone());
        }
        Ok(normalized)
    }

    /// Peers in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.peers.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

/// Fetches `GET http://{peer}/chain` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    http_client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| ChainError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }
}

impl PeerChainSource for HttpPeerClient {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainSnapshot, ChainError> {
        let url = format!("http://{}/chain", peer);

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ChainError::PeerTimeout(peer.to_string())
            } else {
                ChainError::UnreachablePeer {
                    peer: peer.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(ChainError::UnreachablePeer {
                peer: peer.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        response
            .json::<ChainSnapshot>()
            .await
            .map_err(|e| ChainError::InvalidChain(format!("Malformed chain from {}: {}", peer, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_full_url() {
        assert_eq!(normalize_peer_address("http://192.168.0.5:5000").unwrap(), "192.168.0.5:5000");
        assert_eq!(normalize_peer_address("http://node.local:5000/").unwrap(), "node.local:5000");
        assert_eq!(normalize_peer_address("https://example.org").unwrap(), "example.org");
    }

    #[test]
    fn test_normalize_bare_location() {
        assert_eq!(normalize_peer_address("192.168.0.5:5000").unwrap(), "192.168.0.5:5000");
        assert_eq!(normalize_peer_address("localhost:5001").unwrap(), "localhost:5001");
        assert_eq!(normalize_peer_address("  peer-a  ").unwrap(), "peer-a");
    }

    #[test]
    fn test_invalid_addresses_are_rejected() {
        for bad in ["", "   ", "http://", "a b:5000", "host:5000/path", "host:notaport"] {
            assert!(
                matches!(normalize_peer_address(bad), Err(ChainError::InvalidInput(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_peer_set_deduplicates() {
        let peers = PeerSet::new();
        peers.register("http://10.0.0.1:5000").unwrap();
        peers.register("10.0.0.1:5000").unwrap();
        peers.register("10.0.0.2:5000").unwrap();

        assert_eq!(peers.len(), 2);
        assert_eq!(peers.list(), vec!["10.0.0.1:5000", "10.0.0.2:5000"]);
    }

    #[test]
    fn test_register_all_is_all_or_nothing() {
        let peers = PeerSet::new();
        assert!(peers.register_all(["10.0.0.1:5000", "http://"]).is_err());
        assert!(peers.is_empty());

        let added = peers.register_all(vec!["10.0.0.1:5000".to_string()]).unwrap();
        assert_eq!(added, vec!["10.0.0.1:5000"]);
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_reported() {
        tokio::time::timeout(Duration::from_secs(10), async {
            // Nothing listens on port 1 of the loopback interface.
            let client = HttpPeerClient::new(Duration::from_secs(2)).unwrap();
            let err = client.fetch_chain("127.0.0.1:1").await.unwrap_err();
            assert!(matches!(
                err,
                ChainError::UnreachablePeer { .. } | ChainError::PeerTimeout(_)
            ));
        })
        .await
        .expect("test_unreachable_peer_is_reported timed out");
    }

    #[test]
    fn test_client_builds_with_configured_timeout() {
        assert!(HttpPeerClient::new(Duration::from_millis(250)).is_ok());
        assert!(HttpPeerClient::new(Duration::from_secs(30)).is_ok());
    }
}
