//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the refund
//! gateway core. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

/// Deployment environment. Decides fatal-vs-degraded behavior for signer and
/// network stack failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    #[default]
    Development,
}

impl Environment {
    /// True when running against real customer funds.
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Production => write!(f, "production"),
            Environment::Staging => write!(f, "staging"),
            Environment::Development => write!(f, "development"),
        }
    }
}

/// Root configuration for the refund gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment environment.
    pub environment: Environment,

    /// Signing identity configuration.
    pub signer: SignerConfig,

    /// Per-network RPC endpoint configuration.
    pub rpc: RpcConfig,

    /// Daily outflow limits.
    pub limits: LimitConfig,

    /// Executor tuning (confirmation polling, gas margins).
    pub executor: ExecutorConfig,
}

/// Signing identity configuration.
///
/// Exactly one of two strategies is active: custody-service-backed signing
/// (key material never enters the process) or a raw-key fallback for
/// non-production environments.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Route signing through the custody service.
    pub use_custody: bool,

    /// Key identifier registered with the custody service. Required when
    /// `use_custody` is set.
    pub custody_key_id: Option<String>,

    /// Raw hex-encoded signing key. Populated from the environment by the
    /// loader, never from config files, and never serialized.
    #[serde(skip)]
    pub raw_signer_key: Option<String>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            use_custody: true,
            custody_key_id: None,
            raw_signer_key: None,
        }
    }
}

/// Per-network RPC endpoint configuration.
///
/// Each field is a comma-delimited, ordered list of endpoint URLs. The first
/// entry is the preferred endpoint; the rest are failovers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Base endpoints (comma-delimited).
    pub base_rpc_urls: String,

    /// Ethereum endpoints (comma-delimited).
    pub ethereum_rpc_urls: String,

    /// Per-attempt RPC timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            base_rpc_urls: String::new(),
            ethereum_rpc_urls: String::new(),
            rpc_timeout_secs: 10,
        }
    }
}

/// Daily outflow limit configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LimitConfig {
    /// Daily refund cap as a decimal USD string (e.g. "10000"). Falls back
    /// to the built-in default cap when unset.
    pub daily_refund_limit_usd: Option<String>,
}

/// Executor tuning knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Receipt poll interval while waiting for the first confirmation.
    pub confirmation_poll_secs: u64,

    /// Maximum time to wait for the first confirmation after broadcast.
    pub confirmation_timeout_secs: u64,

    /// Safety multiplier applied to the node's suggested gas price.
    pub gas_price_multiplier: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            confirmation_poll_secs: 2,
            confirmation_timeout_secs: 180,
            gas_price_multiplier: 1.2,
        }
    }
}
