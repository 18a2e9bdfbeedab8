//! Refund execution subsystem.
//!
//! # Data Flow
//! ```text
//! orchestrator.rs (state machine, side-effect coordination)
//!     → executor.rs    (validate → reserve → broadcast → 1 confirmation)
//!     → finality.rs    (confirmation depth → COMPLETED promotion)
//!     → persistence.rs (refund + payment session collaborator)
//!     → webhook.rs     (notification collaborator)
//!
//! executor.rs
//!     → spend_guard.rs (atomic daily outflow reservation)
//!     → amounts.rs     (decimal-string money arithmetic)
//! ```
//!
//! # Design Decisions
//! - Broadcast success is not finality; the two are separate operations
//!   with separate notifications
//! - Business-rule failures are result values, never errors; only
//!   configuration and misuse errors propagate

pub mod amounts;
pub mod executor;
pub mod finality;
pub mod orchestrator;
pub mod persistence;
pub mod spend_guard;
pub mod types;
pub mod webhook;

pub use executor::RefundExecutor;
pub use finality::{ConfirmationMonitor, FinalityTracker};
pub use orchestrator::RefundOrchestrator;
pub use persistence::RefundStore;
pub use spend_guard::SpendLimitGuard;
pub use types::{Refund, RefundRequest, RefundResult, RefundStatus};
pub use webhook::WebhookDispatcher;
