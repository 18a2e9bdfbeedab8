//! Persistence collaborator for refunds and payment sessions.
//!
//! Storage schema and migrations live outside this core; the trait exposes
//! only the field shapes and operations the refund state machine needs.
//! Implementations must enforce the monotonic status transition rules.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::refunds::amounts::usd_to_cents;
use crate::refunds::types::{PaymentSession, Refund, RefundError, RefundStatus};

/// Read/update access to refund and payment-session records.
#[async_trait]
pub trait RefundStore: Send + Sync {
    async fn refund(&self, id: &str) -> Result<Option<Refund>, RefundError>;

    async fn payment_session(&self, id: &str) -> Result<Option<PaymentSession>, RefundError>;

    /// Persist an updated refund. Fails with `InvalidTransition` when the
    /// update would move the status backwards.
    async fn update_refund(&self, refund: Refund) -> Result<(), RefundError>;

    /// Sum of completed refund amounts for a session, in cents.
    async fn completed_refund_total_cents(&self, session_id: &str) -> Result<u64, RefundError>;

    /// Set the session's fully-refunded flag.
    async fn mark_session_fully_refunded(&self, session_id: &str) -> Result<(), RefundError>;
}

/// In-memory refund store for tests and local runs.
#[derive(Default)]
pub struct InMemoryRefundStore {
    refunds: DashMap<String, Refund>,
    sessions: DashMap<String, PaymentSession>,
}

impl InMemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a refund record (test/setup helper, bypasses transition checks).
    pub fn put_refund(&self, refund: Refund) {
        self.refunds.insert(refund.id.clone(), refund);
    }

    /// Seed a payment session record.
    pub fn put_session(&self, session: PaymentSession) {
        self.sessions.insert(session.id.clone(), session);
    }
}

#[async_trait]
impl RefundStore for InMemoryRefundStore {
    async fn refund(&self, id: &str) -> Result<Option<Refund>, RefundError> {
        Ok(self.refunds.get(id).map(|r| r.value().clone()))
    }

    async fn payment_session(&self, id: &str) -> Result<Option<PaymentSession>, RefundError> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()))
    }

    async fn update_refund(&self, refund: Refund) -> Result<(), RefundError> {
        if let Some(existing) = self.refunds.get(&refund.id) {
            let from = existing.status;
            if from != refund.status && !from.can_transition_to(refund.status) {
                return Err(RefundError::InvalidTransition {
                    from,
                    to: refund.status,
                });
            }
        }
        self.refunds.insert(refund.id.clone(), refund);
        Ok(())
    }

    async fn completed_refund_total_cents(&self, session_id: &str) -> Result<u64, RefundError> {
        let mut total: u64 = 0;
        for entry in self.refunds.iter() {
            let refund = entry.value();
            if refund.payment_session_id == session_id && refund.status == RefundStatus::Completed {
                let cents = usd_to_cents(&refund.amount_usd)
                    .map_err(|e| RefundError::Persistence(e.to_string()))?;
                total += cents;
            }
        }
        Ok(total)
    }

    async fn mark_session_fully_refunded(&self, session_id: &str) -> Result<(), RefundError> {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.fully_refunded = true;
                Ok(())
            }
            None => Err(RefundError::SessionNotFound(session_id.to_string())),
        }
    }
}

/// Shared handle alias used across the subsystem.
pub type SharedRefundStore = Arc<dyn RefundStore>;
