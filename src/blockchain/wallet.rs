//! Wallet handles and the per-network wallet cache.
//!
//! # Security
//! - A wallet handle exposes only the address and a signing operation;
//!   raw key material stays behind the signer strategy
//! - Keys are never logged or serialized

use std::collections::HashMap;
use std::sync::Arc;

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, Signer};
use tokio::sync::Mutex;

use crate::blockchain::signer::{CustodyClient, SignerProvider};
use crate::blockchain::types::{ChainError, ChainResult, Network};

enum WalletSigner {
    Local(PrivateKeySigner),
    Custody {
        client: Arc<dyn CustodyClient>,
        key_id: String,
    },
}

/// A signing-capable handle bound to exactly one network.
///
/// Handles are never shared across networks; the chain id used for EIP-155
/// replay protection is fixed at resolution time.
pub struct NetworkWallet {
    network: Network,
    address: Address,
    signer: WalletSigner,
}

impl NetworkWallet {
    pub(crate) fn local(network: Network, signer: PrivateKeySigner) -> Self {
        Self {
            network,
            address: signer.address(),
            signer: WalletSigner::Local(signer),
        }
    }

    pub(crate) fn custody(
        network: Network,
        address: Address,
        client: Arc<dyn CustodyClient>,
        key_id: String,
    ) -> Self {
        Self {
            network,
            address,
            signer: WalletSigner::Custody { client, key_id },
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id()
    }

    /// Sign a prepared EIP-1559 transaction, producing a broadcastable
    /// envelope.
    pub async fn sign_transaction(&self, tx: TxEip1559) -> ChainResult<TxEnvelope> {
        let sig_hash = tx.signature_hash();
        let signature: Signature = match &self.signer {
            WalletSigner::Local(signer) => {
                tracing::warn!(
                    network = %self.network,
                    "Signing with raw key material; not safe for production"
                );
                signer
                    .sign_hash(&sig_hash)
                    .await
                    .map_err(|e| ChainError::Signer(format!("signing failed: {}", e)))?
            }
            WalletSigner::Custody { client, key_id } => {
                client.sign_hash(key_id, sig_hash).await?
            }
        };
        Ok(tx.into_signed(signature).into())
    }
}

impl std::fmt::Debug for NetworkWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkWallet")
            .field("network", &self.network)
            .field("address", &self.address)
            .finish()
    }
}

/// Lazily-populated map of one wallet per network.
///
/// Owned by the executor instance, never process-global. The lock is held
/// across first resolution so two requests racing on an empty slot cannot
/// duplicate the custody call.
pub struct WalletCache {
    signer_provider: Arc<dyn SignerProvider>,
    wallets: Mutex<HashMap<Network, Arc<NetworkWallet>>>,
}

impl WalletCache {
    pub fn new(signer_provider: Arc<dyn SignerProvider>) -> Self {
        Self {
            signer_provider,
            wallets: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the wallet for a network, consulting the signer provider only
    /// on first use.
    pub async fn wallet(&self, network: Network) -> ChainResult<Arc<NetworkWallet>> {
        let mut wallets = self.wallets.lock().await;
        if let Some(wallet) = wallets.get(&network) {
            return Ok(wallet.clone());
        }

        let wallet = Arc::new(self.signer_provider.wallet(network).await?);
        wallets.insert(network, wallet.clone());
        tracing::debug!(network = %network, address = %wallet.address(), "Cached wallet for network");
        Ok(wallet)
    }
}
