//! Stablecoin refund execution core.
//!
//! Moves merchant-custodied stablecoins back to a customer address, safely:
//! key custody behind a narrow signer abstraction, RPC endpoint failover,
//! race-free daily spend limits, and a two-phase completion model that
//! separates broadcast success from chain finality.
//!
//! # Architecture Overview
//!
//! ```text
//!   RefundOrchestrator ──▶ RefundExecutor ──▶ SpendLimitGuard ──▶ CounterStore
//!          │                     │
//!          │                     ├──▶ ProviderManager (RPC failover)
//!          │                     ├──▶ WalletCache ──▶ SignerProvider
//!          │                     └──▶ NonceManager (optional)
//!          │
//!          ├──▶ FinalityTracker ──▶ ConfirmationMonitor
//!          ├──▶ RefundStore (persistence collaborator)
//!          └──▶ WebhookDispatcher (notification collaborator)
//! ```
//!
//! Broadcast success persists `PROCESSING`; only the finality tracker, once
//! the network-specific confirmation depth is reached, promotes a refund to
//! `COMPLETED`.

pub mod blockchain;
pub mod config;
pub mod observability;
pub mod refunds;
pub mod store;

pub use config::schema::GatewayConfig;
pub use refunds::executor::RefundExecutor;
pub use refunds::orchestrator::RefundOrchestrator;
pub use refunds::types::{RefundRequest, RefundResult};
