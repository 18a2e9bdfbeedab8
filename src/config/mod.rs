//! Configuration subsystem.
//!
//! # Responsibilities
//! - Define the configuration schema (serde structs)
//! - Load configuration from TOML files with environment overrides
//! - Validate configuration before any component is constructed
//!
//! # Design Decisions
//! - Secrets (raw signer key) come from environment variables only and are
//!   never serialized back out
//! - Validation runs once at load time; components may assume a valid config

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{Environment, GatewayConfig, LimitConfig, RpcConfig, SignerConfig};
