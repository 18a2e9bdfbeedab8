//! Refund domain types and error definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::types::{ChainError, Network, Token};

/// A request to move tokens back to a customer address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub network: Network,
    pub token: Token,
    /// Customer address, hex-encoded. Validated syntactically before any
    /// external call.
    pub recipient_address: String,
    /// Decimal USD string; string representation avoids precision loss.
    pub amount_usd: String,
}

/// Outcome of a refund execution attempt.
///
/// Business-rule failures land here with `success == false`; they are
/// values, not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResult {
    pub success: bool,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    /// Confirmations still outstanding before the refund is final.
    pub pending_confirmations: Option<u64>,
    pub error: Option<String>,
}

impl RefundResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tx_hash: None,
            block_number: None,
            gas_used: None,
            pending_confirmations: None,
            error: Some(error.into()),
        }
    }

    /// A mined-but-reverted transfer: failed, but the hash is kept for the
    /// audit trail.
    pub fn on_chain_failure(error: impl Into<String>, tx_hash: String, gas_used: Option<u64>) -> Self {
        Self {
            success: false,
            tx_hash: Some(tx_hash),
            block_number: None,
            gas_used,
            pending_confirmations: None,
            error: Some(error.into()),
        }
    }
}

/// Lifecycle states of a persisted refund.
///
/// Transitions are monotonic: `Pending → Processing → Completed`, or to
/// `Failed` from either non-terminal state. Nothing moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RefundStatus {
    /// Whether a transition to `next` respects the monotonic state machine.
    pub fn can_transition_to(&self, next: RefundStatus) -> bool {
        matches!(
            (self, next),
            (RefundStatus::Pending, RefundStatus::Processing)
                | (RefundStatus::Pending, RefundStatus::Failed)
                | (RefundStatus::Processing, RefundStatus::Completed)
                | (RefundStatus::Processing, RefundStatus::Failed)
        )
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefundStatus::Pending => "PENDING",
            RefundStatus::Processing => "PROCESSING",
            RefundStatus::Completed => "COMPLETED",
            RefundStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Persisted refund entity. Field shapes only; storage schema is the
/// persistence collaborator's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: RefundStatus,
    /// Decimal USD string.
    pub amount_usd: String,
    pub reason: String,
    pub payment_session_id: String,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    /// Captured error for failed refunds; keeps them queryable.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The refund's origin transaction context. Read-only from this core except
/// for the fully-refunded flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    pub network: Network,
    pub token: Token,
    pub customer_address: String,
    /// Decimal USD string.
    pub amount_usd: String,
    pub user_id: String,
    pub fully_refunded: bool,
}

/// Errors that propagate past the executor boundary: configuration,
/// collaborator, and misuse failures.
#[derive(Debug, Error)]
pub enum RefundError {
    #[error("refund {0} not found")]
    NotFound(String),

    #[error("payment session {0} not found")]
    SessionNotFound(String),

    #[error("refund {id} is {actual}, expected {expected}")]
    InvalidStatus {
        id: String,
        actual: RefundStatus,
        expected: RefundStatus,
    },

    #[error("illegal status transition {from} → {to}")]
    InvalidTransition { from: RefundStatus, to: RefundStatus },

    #[error("blockchain stack unavailable: {0}")]
    Unavailable(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(RefundStatus::Pending.can_transition_to(RefundStatus::Processing));
        assert!(RefundStatus::Pending.can_transition_to(RefundStatus::Failed));
        assert!(RefundStatus::Processing.can_transition_to(RefundStatus::Completed));
        assert!(RefundStatus::Processing.can_transition_to(RefundStatus::Failed));
    }

    #[test]
    fn test_backward_and_terminal_transitions_rejected() {
        assert!(!RefundStatus::Processing.can_transition_to(RefundStatus::Pending));
        assert!(!RefundStatus::Completed.can_transition_to(RefundStatus::Failed));
        assert!(!RefundStatus::Completed.can_transition_to(RefundStatus::Processing));
        assert!(!RefundStatus::Failed.can_transition_to(RefundStatus::Processing));
        assert!(!RefundStatus::Pending.can_transition_to(RefundStatus::Completed));
    }

    #[test]
    fn test_status_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&RefundStatus::Processing).unwrap(),
            "\"PROCESSING\""
        );
    }
}
