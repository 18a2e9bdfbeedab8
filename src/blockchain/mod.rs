//! Blockchain subsystem.
//!
//! # Data Flow
//! ```text
//! RefundExecutor
//!     → provider.rs (RPC endpoint selection + failover)
//!     → signer.rs   (signing identity resolution, custody or raw key)
//!     → wallet.rs   (per-network wallet cache)
//!     → nonce.rs    (optional cross-process nonce serialization)
//! ```
//!
//! # Design Decisions
//! - One wallet per network, never shared across chains
//! - Failover is driven by explicit per-call errors and timeouts
//! - Secret key material never crosses a module boundary

pub mod nonce;
pub mod provider;
pub mod signer;
pub mod types;
pub mod wallet;

pub use provider::ProviderManager;
pub use signer::{signer_provider_from_config, CustodyClient, SignerProvider};
pub use types::{ChainError, ChainResult, Network, Token};
pub use wallet::{NetworkWallet, WalletCache};
