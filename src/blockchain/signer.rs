//! Signing identity resolution.
//!
//! # Security
//! - The custody-backed strategy never brings key material into the process;
//!   signing happens inside the custody service
//! - The raw-key fallback refuses to operate in production and logs an
//!   explicit warning on every use elsewhere
//! - Key values are never logged, in any branch, at any level

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signature;
use async_trait::async_trait;

use crate::blockchain::types::{ChainError, ChainResult, Network};
use crate::blockchain::wallet::NetworkWallet;
use crate::config::schema::{Environment, SignerConfig};

/// Remote custody collaborator. The private key lives inside the custody
/// service; callers see only the public address and a signing capability.
#[async_trait]
pub trait CustodyClient: Send + Sync {
    /// Public address of the key registered under `key_id`.
    async fn address(&self, key_id: &str) -> ChainResult<Address>;

    /// Sign a 32-byte hash with the key registered under `key_id`.
    async fn sign_hash(&self, key_id: &str, hash: B256) -> ChainResult<Signature>;
}

/// Resolves a signing-capable wallet for a network.
///
/// The two implementations are interchangeable; callers never learn which
/// strategy is behind the handle they receive.
#[async_trait]
pub trait SignerProvider: Send + Sync {
    async fn wallet(&self, network: Network) -> ChainResult<NetworkWallet>;
}

/// Custody-service-backed signer provider.
pub struct CustodySignerProvider {
    client: Arc<dyn CustodyClient>,
    key_id: String,
}

impl CustodySignerProvider {
    /// A missing key identifier is a fatal construction error, not a
    /// first-refund surprise.
    pub fn new(client: Arc<dyn CustodyClient>, key_id: &str) -> ChainResult<Self> {
        let key_id = key_id.trim();
        if key_id.is_empty() {
            return Err(ChainError::Config(
                "custody key identifier is not configured".to_string(),
            ));
        }
        Ok(Self {
            client,
            key_id: key_id.to_string(),
        })
    }
}

#[async_trait]
impl SignerProvider for CustodySignerProvider {
    async fn wallet(&self, network: Network) -> ChainResult<NetworkWallet> {
        let address = self.client.address(&self.key_id).await?;
        tracing::info!(
            network = %network,
            address = %address,
            "Resolved custody-backed wallet"
        );
        Ok(NetworkWallet::custody(
            network,
            address,
            self.client.clone(),
            self.key_id.clone(),
        ))
    }
}

/// Raw-key fallback signer provider for non-production environments.
pub struct LocalKeySignerProvider {
    signer: PrivateKeySigner,
}

impl LocalKeySignerProvider {
    /// Parse a hex-encoded key (with or without 0x prefix).
    ///
    /// Refuses to construct in production.
    pub fn new(private_key_hex: &str, environment: Environment) -> ChainResult<Self> {
        if environment.is_production() {
            return Err(ChainError::Config(
                "raw-key signing is not permitted in production".to_string(),
            ));
        }

        let key_hex = private_key_hex
            .strip_prefix("0x")
            .unwrap_or(private_key_hex);
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ChainError::Signer(format!("invalid private key format: {}", e)))?;

        tracing::warn!(
            address = %signer.address(),
            environment = %environment,
            "Raw-key signing enabled; key material is held in process memory"
        );

        Ok(Self { signer })
    }
}

#[async_trait]
impl SignerProvider for LocalKeySignerProvider {
    async fn wallet(&self, network: Network) -> ChainResult<NetworkWallet> {
        tracing::warn!(
            network = %network,
            "Resolving wallet from raw key material; not safe for production"
        );
        Ok(NetworkWallet::local(network, self.signer.clone()))
    }
}

/// Select the signing strategy from configuration.
///
/// This is the only place environment-based routing is decided. Production
/// with custody disabled, or with the custody collaborator missing, fails
/// here — at construction — never on the first refund attempt.
pub fn signer_provider_from_config(
    config: &SignerConfig,
    environment: Environment,
    custody: Option<Arc<dyn CustodyClient>>,
) -> ChainResult<Arc<dyn SignerProvider>> {
    if config.use_custody {
        let key_id = config.custody_key_id.as_deref().unwrap_or_default();
        let client = custody.ok_or_else(|| {
            ChainError::Config("custody signing enabled but no custody client wired".to_string())
        })?;
        return Ok(Arc::new(CustodySignerProvider::new(client, key_id)?));
    }

    if environment.is_production() {
        return Err(ChainError::Config(
            "custody signing disabled in production".to_string(),
        ));
    }

    let raw_key = config.raw_signer_key.as_deref().ok_or_else(|| {
        ChainError::Config("no raw signer key configured for fallback signing".to_string())
    })?;
    Ok(Arc::new(LocalKeySignerProvider::new(raw_key, environment)?))
}
