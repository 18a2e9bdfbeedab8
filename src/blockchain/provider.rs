//! RPC endpoint management with failover.
//!
//! # Responsibilities
//! - Hold an ordered endpoint list per network (primary + failovers)
//! - Serve the last-known-good endpoint first, advancing on failure
//! - Bound every attempt with a timeout so a dead endpoint never blocks
//!   while alternates exist
//!
//! Endpoint counts and ordering are not exposed to callers; they see one
//! logical connection per network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use tokio::time::timeout;

use crate::blockchain::types::{ChainError, ChainResult, Network};
use crate::config::schema::RpcConfig;
use crate::observability::metrics;

struct NetworkEndpoints {
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    /// Index of the endpoint that last answered successfully.
    active: AtomicUsize,
}

/// Per-network RPC endpoint pool with last-known-good failover.
pub struct ProviderManager {
    networks: HashMap<Network, NetworkEndpoints>,
    timeout_duration: Duration,
}

impl ProviderManager {
    /// Build endpoint pools from comma-delimited URL lists.
    ///
    /// Every network needs at least one parseable URL; the config validation
    /// pass enforces this before construction in normal operation.
    pub fn from_config(config: &RpcConfig) -> ChainResult<Self> {
        let mut networks = HashMap::new();
        for &network in Network::all() {
            let list = match network {
                Network::Base => &config.base_rpc_urls,
                Network::Ethereum => &config.ethereum_rpc_urls,
            };
            networks.insert(network, Self::build_endpoints(network, list)?);
        }

        Ok(Self {
            networks,
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
        })
    }

    fn build_endpoints(network: Network, list: &str) -> ChainResult<NetworkEndpoints> {
        let mut providers: Vec<Arc<dyn Provider + Send + Sync>> = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match entry.parse::<url::Url>() {
                Ok(url) => {
                    providers.push(Arc::new(ProviderBuilder::new().connect_http(url))
                        as Arc<dyn Provider + Send + Sync>);
                }
                Err(e) => {
                    tracing::warn!(network = %network, url = %entry, error = %e, "Ignoring invalid RPC URL");
                }
            }
        }

        if providers.is_empty() {
            return Err(ChainError::Config(format!(
                "no usable RPC endpoints configured for {}",
                network
            )));
        }

        tracing::info!(
            network = %network,
            endpoints = providers.len(),
            "RPC endpoint pool initialized"
        );

        Ok(NetworkEndpoints {
            providers,
            active: AtomicUsize::new(0),
        })
    }

    fn slot(&self, network: Network) -> ChainResult<&NetworkEndpoints> {
        self.networks.get(&network).ok_or_else(|| {
            ChainError::Config(format!("network {} not configured", network))
        })
    }

    fn note_success(&self, slot: &NetworkEndpoints, idx: usize, advanced: bool, network: Network) {
        if advanced {
            slot.active.store(idx, Ordering::Relaxed);
            metrics::record_rpc_failover(network.as_str());
            tracing::info!(network = %network, endpoint_idx = idx, "Failed over to alternate RPC endpoint");
        }
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self, network: Network) -> ChainResult<u64> {
        let slot = self.slot(network)?;
        let start = slot.active.load(Ordering::Relaxed);
        let count = slot.providers.len();
        for offset in 0..count {
            let idx = (start + offset) % count;
            let fut = slot.providers[idx].get_block_number();
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(block)) => {
                    self.note_success(slot, idx, offset != 0, network);
                    return Ok(block);
                }
                Ok(Err(e)) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, error = %e, "RPC error, trying next endpoint")
                }
                Err(_) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, "RPC timeout, trying next endpoint")
                }
            }
        }
        Err(ChainError::RpcExhausted { network })
    }

    /// Get the transaction count (next nonce) for an address.
    pub async fn get_transaction_count(
        &self,
        network: Network,
        address: Address,
    ) -> ChainResult<u64> {
        let slot = self.slot(network)?;
        let start = slot.active.load(Ordering::Relaxed);
        let count = slot.providers.len();
        for offset in 0..count {
            let idx = (start + offset) % count;
            let fut = slot.providers[idx].get_transaction_count(address);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(nonce)) => {
                    self.note_success(slot, idx, offset != 0, network);
                    return Ok(nonce);
                }
                Ok(Err(e)) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, error = %e, "RPC error, trying next endpoint")
                }
                Err(_) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, "RPC timeout, trying next endpoint")
                }
            }
        }
        Err(ChainError::RpcExhausted { network })
    }

    /// Get a transaction receipt by hash, if mined.
    pub async fn get_transaction_receipt(
        &self,
        network: Network,
        tx_hash: TxHash,
    ) -> ChainResult<Option<TransactionReceipt>> {
        let slot = self.slot(network)?;
        let start = slot.active.load(Ordering::Relaxed);
        let count = slot.providers.len();
        for offset in 0..count {
            let idx = (start + offset) % count;
            let fut = slot.providers[idx].get_transaction_receipt(tx_hash);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(receipt)) => {
                    self.note_success(slot, idx, offset != 0, network);
                    return Ok(receipt);
                }
                Ok(Err(e)) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, error = %e, "RPC error, trying next endpoint")
                }
                Err(_) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, "RPC timeout, trying next endpoint")
                }
            }
        }
        Err(ChainError::RpcExhausted { network })
    }

    /// Get the current suggested gas price in wei.
    pub async fn get_gas_price(&self, network: Network) -> ChainResult<u128> {
        let slot = self.slot(network)?;
        let start = slot.active.load(Ordering::Relaxed);
        let count = slot.providers.len();
        for offset in 0..count {
            let idx = (start + offset) % count;
            let fut = slot.providers[idx].get_gas_price();
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(price)) => {
                    self.note_success(slot, idx, offset != 0, network);
                    return Ok(price);
                }
                Ok(Err(e)) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, error = %e, "RPC error, trying next endpoint")
                }
                Err(_) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, "RPC timeout, trying next endpoint")
                }
            }
        }
        Err(ChainError::RpcExhausted { network })
    }

    /// Estimate gas for a call as a pre-flight check.
    pub async fn estimate_gas(
        &self,
        network: Network,
        request: TransactionRequest,
    ) -> ChainResult<u64> {
        let slot = self.slot(network)?;
        let start = slot.active.load(Ordering::Relaxed);
        let count = slot.providers.len();
        for offset in 0..count {
            let idx = (start + offset) % count;
            let fut = slot.providers[idx].estimate_gas(request.clone());
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(gas)) => {
                    self.note_success(slot, idx, offset != 0, network);
                    return Ok(gas);
                }
                Ok(Err(e)) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, error = %e, "RPC error, trying next endpoint")
                }
                Err(_) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, "RPC timeout, trying next endpoint")
                }
            }
        }
        Err(ChainError::RpcExhausted { network })
    }

    /// Broadcast a signed, EIP-2718-encoded transaction.
    pub async fn send_raw_transaction(
        &self,
        network: Network,
        encoded: &[u8],
    ) -> ChainResult<TxHash> {
        let slot = self.slot(network)?;
        let start = slot.active.load(Ordering::Relaxed);
        let count = slot.providers.len();
        for offset in 0..count {
            let idx = (start + offset) % count;
            let fut = slot.providers[idx].send_raw_transaction(encoded);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(pending)) => {
                    self.note_success(slot, idx, offset != 0, network);
                    return Ok(*pending.tx_hash());
                }
                Ok(Err(e)) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, error = %e, "RPC error, trying next endpoint")
                }
                Err(_) => {
                    tracing::warn!(network = %network, endpoint_idx = idx, "RPC timeout, trying next endpoint")
                }
            }
        }
        Err(ChainError::RpcExhausted { network })
    }

    /// Check whether a network is reachable through any configured endpoint.
    pub async fn is_healthy(&self, network: Network) -> bool {
        let healthy = self.get_block_number(network).await.is_ok();
        metrics::record_rpc_health(network.as_str(), healthy);
        healthy
    }
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts = f.debug_struct("ProviderManager");
        for (network, slot) in &self.networks {
            counts.field(network.as_str(), &slot.providers.len());
        }
        counts.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_rpc_config() -> RpcConfig {
        RpcConfig {
            base_rpc_urls: "http://127.0.0.1:1".to_string(),
            ethereum_rpc_urls: "http://127.0.0.1:1,http://127.0.0.1:2".to_string(),
            rpc_timeout_secs: 1,
        }
    }

    #[test]
    fn test_construction_from_config() {
        let manager = ProviderManager::from_config(&test_rpc_config()).unwrap();
        // Both networks configured; endpoint counts are internal but Debug
        // shows the pools exist.
        let debug = format!("{:?}", manager);
        assert!(debug.contains("base"));
        assert!(debug.contains("ethereum"));
    }

    #[test]
    fn test_invalid_urls_are_skipped_not_fatal() {
        let config = RpcConfig {
            base_rpc_urls: "not-a-url, http://127.0.0.1:1".to_string(),
            ethereum_rpc_urls: "http://127.0.0.1:1".to_string(),
            rpc_timeout_secs: 1,
        };
        assert!(ProviderManager::from_config(&config).is_ok());
    }

    #[test]
    fn test_no_usable_urls_is_fatal() {
        let config = RpcConfig {
            base_rpc_urls: String::new(),
            ethereum_rpc_urls: "http://127.0.0.1:1".to_string(),
            rpc_timeout_secs: 1,
        };
        let result = ProviderManager::from_config(&config);
        assert!(matches!(result, Err(ChainError::Config(_))));
    }

    #[tokio::test]
    async fn test_exhaustion_after_all_endpoints_fail() {
        let manager = ProviderManager::from_config(&test_rpc_config()).unwrap();
        let result = manager.get_block_number(Network::Ethereum).await;
        assert!(matches!(
            result,
            Err(ChainError::RpcExhausted {
                network: Network::Ethereum
            })
        ));
    }

    #[tokio::test]
    async fn test_unhealthy_when_unreachable() {
        let manager = ProviderManager::from_config(&test_rpc_config()).unwrap();
        assert!(!manager.is_healthy(Network::Base).await);
    }
}
