//! Finality promotion for broadcast refunds.
//!
//! A refund is persisted as PROCESSING after one confirmation; this module
//! promotes it to COMPLETED once the network's finality depth is reached.
//! Checks under the threshold mutate nothing and can be retried freely.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::blockchain::provider::ProviderManager;
use crate::blockchain::types::{ChainResult, Network};
use crate::observability::metrics;
use crate::refunds::amounts::usd_to_cents;
use crate::refunds::persistence::SharedRefundStore;
use crate::refunds::types::{RefundError, RefundStatus};
use crate::refunds::webhook::{self, WebhookDispatcher, EVENT_REFUND_COMPLETED};

/// Where a transaction sits relative to the chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationInfo {
    pub block_number: u64,
    pub confirmations: u64,
}

/// Confirmation depth lookup for a broadcast transaction.
#[async_trait]
pub trait ConfirmationMonitor: Send + Sync {
    /// `None` when the transaction has no receipt (still pending, or
    /// dropped in a reorg).
    async fn confirmations(
        &self,
        network: Network,
        tx_hash: &str,
    ) -> ChainResult<Option<ConfirmationInfo>>;
}

/// Monitor backed by the RPC provider pool.
pub struct RpcConfirmationMonitor {
    providers: Arc<ProviderManager>,
}

impl RpcConfirmationMonitor {
    pub fn new(providers: Arc<ProviderManager>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl ConfirmationMonitor for RpcConfirmationMonitor {
    async fn confirmations(
        &self,
        network: Network,
        tx_hash: &str,
    ) -> ChainResult<Option<ConfirmationInfo>> {
        let hash = tx_hash
            .parse()
            .map_err(|_| crate::blockchain::types::ChainError::Rpc(format!(
                "malformed transaction hash '{}'",
                tx_hash
            )))?;
        let receipt = match self.providers.get_transaction_receipt(network, hash).await? {
            Some(receipt) => receipt,
            None => return Ok(None),
        };
        let Some(block_number) = receipt.block_number else {
            return Ok(None);
        };
        let head = self.providers.get_block_number(network).await?;
        Ok(Some(ConfirmationInfo {
            block_number,
            confirmations: head.saturating_sub(block_number) + 1,
        }))
    }
}

/// Outcome of a finality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalityStatus {
    /// Depth not yet reached; nothing was mutated.
    Pending { confirmations: u64, required: u64 },
    /// The refund is final and persisted as COMPLETED, with the depth
    /// observed at promotion time.
    Completed {
        block_number: u64,
        confirmations: u64,
    },
}

/// Promotes PROCESSING refunds to COMPLETED at finality depth.
pub struct FinalityTracker {
    monitor: Arc<dyn ConfirmationMonitor>,
    store: SharedRefundStore,
    webhooks: Arc<dyn WebhookDispatcher>,
}

impl FinalityTracker {
    pub fn new(
        monitor: Arc<dyn ConfirmationMonitor>,
        store: SharedRefundStore,
        webhooks: Arc<dyn WebhookDispatcher>,
    ) -> Self {
        Self {
            monitor,
            store,
            webhooks,
        }
    }

    /// Check a refund's confirmation depth and promote it when final.
    ///
    /// Under-threshold checks are read-only and can be retried freely.
    /// A refund that is not PROCESSING is a caller error.
    pub async fn confirm_refund_finality(
        &self,
        refund_id: &str,
    ) -> Result<FinalityStatus, RefundError> {
        let mut refund = self
            .store
            .refund(refund_id)
            .await?
            .ok_or_else(|| RefundError::NotFound(refund_id.to_string()))?;

        // Only a broadcast-but-not-final refund can be checked; this guard
        // is also what makes the completion webhook exactly-once.
        if refund.status != RefundStatus::Processing {
            return Err(RefundError::InvalidStatus {
                id: refund_id.to_string(),
                actual: refund.status,
                expected: RefundStatus::Processing,
            });
        }

        let tx_hash = refund.tx_hash.clone().ok_or_else(|| {
            RefundError::Persistence(format!("processing refund {} has no tx hash", refund_id))
        })?;

        let session = self
            .store
            .payment_session(&refund.payment_session_id)
            .await?
            .ok_or_else(|| RefundError::SessionNotFound(refund.payment_session_id.clone()))?;

        let required = session.network.required_confirmations();
        let info = match self
            .monitor
            .confirmations(session.network, &tx_hash)
            .await?
        {
            Some(info) => info,
            None => {
                // No receipt yet (or a reorg dropped it); try again later.
                return Ok(FinalityStatus::Pending {
                    confirmations: 0,
                    required,
                });
            }
        };

        if info.confirmations < required {
            tracing::debug!(
                refund_id = refund_id,
                confirmations = info.confirmations,
                required = required,
                "Refund not yet final"
            );
            return Ok(FinalityStatus::Pending {
                confirmations: info.confirmations,
                required,
            });
        }

        refund.status = RefundStatus::Completed;
        refund.block_number = Some(info.block_number);
        refund.completed_at = Some(Utc::now());
        self.store.update_refund(refund.clone()).await?;
        metrics::record_refund_finality(session.network.as_str());

        tracing::info!(
            refund_id = refund_id,
            tx_hash = %tx_hash,
            block_number = info.block_number,
            confirmations = info.confirmations,
            "Refund reached finality"
        );

        webhook::dispatch(
            self.webhooks.as_ref(),
            EVENT_REFUND_COMPLETED,
            json!({
                "refund_id": refund.id,
                "payment_session_id": refund.payment_session_id,
                "user_id": session.user_id,
                "status": refund.status,
                "amount_usd": refund.amount_usd,
                "tx_hash": tx_hash,
                "block_number": info.block_number,
                "network": session.network,
                "token": session.token,
            }),
        )
        .await;

        // The session flag is bookkeeping on top of an already-final refund;
        // a failure here is logged, not propagated.
        if let Err(e) = self.refresh_fully_refunded(&refund.payment_session_id, &session.amount_usd).await {
            tracing::warn!(
                session_id = %refund.payment_session_id,
                error = %e,
                "Failed to refresh fully-refunded flag"
            );
        }

        Ok(FinalityStatus::Completed {
            block_number: info.block_number,
            confirmations: info.confirmations,
        })
    }

    async fn refresh_fully_refunded(
        &self,
        session_id: &str,
        session_amount_usd: &str,
    ) -> Result<(), RefundError> {
        let refunded_cents = self.store.completed_refund_total_cents(session_id).await?;
        let session_cents = usd_to_cents(session_amount_usd)
            .map_err(|e| RefundError::Persistence(e.to_string()))?;
        if refunded_cents >= session_cents {
            self.store.mark_session_fully_refunded(session_id).await?;
            tracing::info!(session_id = session_id, "Payment session fully refunded");
        }
        Ok(())
    }
}
