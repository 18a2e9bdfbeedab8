//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, file, remote)
//!     → Metrics endpoint (Prometheus scrape, wired by the host process)
//! ```
//!
//! # Design Decisions
//! - Structured logging via tracing; fields, not format strings
//! - Metric updates are cheap (atomic increments behind the metrics facade)
//! - Secret material (signer keys) never reaches either sink

pub mod logging;
pub mod metrics;
