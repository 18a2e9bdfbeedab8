//! Refund state machine and side-effect coordinator.
//!
//! # Responsibilities
//! - Drive `PENDING → PROCESSING → {COMPLETED | FAILED}` through persistence
//! - Hand broadcast work to the executor, finality checks to the tracker
//! - Emit the processing notification (completion belongs to finality)
//! - Decide fatal-vs-degraded behavior per deployment environment
//!
//! A broken signer/network stack fails construction in production. In
//! non-production it degrades: the orchestrator starts without an executor
//! and `process_refund` skips broadcast so the rest of the pipeline stays
//! exercisable without real keys or networks.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::blockchain::nonce::NonceManager;
use crate::blockchain::provider::ProviderManager;
use crate::blockchain::signer::{signer_provider_from_config, CustodyClient};
use crate::blockchain::types::ChainError;
use crate::config::schema::{Environment, GatewayConfig};
use crate::refunds::executor::RefundExecutor;
use crate::refunds::persistence::SharedRefundStore;
use crate::refunds::spend_guard::SpendLimitGuard;
use crate::refunds::types::{RefundError, RefundRequest, RefundResult, RefundStatus};
use crate::refunds::webhook::{self, WebhookDispatcher, EVENT_REFUND_PROCESSING};
use crate::store::CounterStore;

/// Broadcast seam between the orchestrator and the executor.
#[async_trait]
pub trait RefundExecution: Send + Sync {
    async fn execute_refund(&self, request: &RefundRequest) -> Result<RefundResult, RefundError>;
}

#[async_trait]
impl RefundExecution for RefundExecutor {
    async fn execute_refund(&self, request: &RefundRequest) -> Result<RefundResult, RefundError> {
        RefundExecutor::execute_refund(self, request).await
    }
}

/// Coordinates refund execution against persistence and notifications.
pub struct RefundOrchestrator {
    executor: Option<Arc<dyn RefundExecution>>,
    store: SharedRefundStore,
    webhooks: Arc<dyn WebhookDispatcher>,
    environment: Environment,
}

impl RefundOrchestrator {
    /// Assemble the full blockchain stack from configuration.
    ///
    /// Stack construction failure is fatal in production and degraded
    /// elsewhere.
    pub fn from_config(
        config: &GatewayConfig,
        store: SharedRefundStore,
        webhooks: Arc<dyn WebhookDispatcher>,
        custody: Option<Arc<dyn CustodyClient>>,
        counter_store: Arc<dyn CounterStore>,
        nonce_manager: Option<Arc<dyn NonceManager>>,
    ) -> Result<Self, RefundError> {
        let environment = config.environment;
        match Self::build_executor(config, custody, counter_store, nonce_manager) {
            Ok(executor) => Ok(Self {
                executor: Some(Arc::new(executor)),
                store,
                webhooks,
                environment,
            }),
            Err(e) if environment.is_production() => {
                tracing::error!(error = %e, "Refusing to start: blockchain stack unavailable");
                Err(e.into())
            }
            Err(e) => {
                tracing::warn!(
                    environment = %environment,
                    error = %e,
                    "Blockchain stack unavailable; starting in degraded mode"
                );
                Ok(Self {
                    executor: None,
                    store,
                    webhooks,
                    environment,
                })
            }
        }
    }

    /// Wire a pre-built executor (tests, custom assembly).
    pub fn new(
        executor: Option<Arc<dyn RefundExecution>>,
        store: SharedRefundStore,
        webhooks: Arc<dyn WebhookDispatcher>,
        environment: Environment,
    ) -> Self {
        Self {
            executor,
            store,
            webhooks,
            environment,
        }
    }

    fn build_executor(
        config: &GatewayConfig,
        custody: Option<Arc<dyn CustodyClient>>,
        counter_store: Arc<dyn CounterStore>,
        nonce_manager: Option<Arc<dyn NonceManager>>,
    ) -> Result<RefundExecutor, ChainError> {
        let providers = Arc::new(ProviderManager::from_config(&config.rpc)?);
        let signer = signer_provider_from_config(&config.signer, config.environment, custody)?;
        let spend_guard = SpendLimitGuard::new(
            counter_store,
            config.limits.daily_refund_limit_usd.as_deref(),
        )
        .map_err(|e| ChainError::Config(format!("invalid daily refund limit: {}", e)))?;
        Ok(RefundExecutor::new(
            providers,
            signer,
            spend_guard,
            nonce_manager,
            config.executor.clone(),
        ))
    }

    /// Whether the broadcast stack was constructed successfully.
    pub fn is_blockchain_available(&self) -> bool {
        self.executor.is_some()
    }

    /// Execute a PENDING refund and advance its state.
    ///
    /// Returns `Ok(None)` when a degraded non-production instance skipped
    /// broadcast; in production a missing stack is an error, never a silent
    /// skip.
    pub async fn process_refund(
        &self,
        refund_id: &str,
    ) -> Result<Option<RefundResult>, RefundError> {
        let mut refund = self
            .store
            .refund(refund_id)
            .await?
            .ok_or_else(|| RefundError::NotFound(refund_id.to_string()))?;

        if refund.status != RefundStatus::Pending {
            return Err(RefundError::InvalidStatus {
                id: refund_id.to_string(),
                actual: refund.status,
                expected: RefundStatus::Pending,
            });
        }

        let session = self
            .store
            .payment_session(&refund.payment_session_id)
            .await?
            .ok_or_else(|| RefundError::SessionNotFound(refund.payment_session_id.clone()))?;

        let Some(executor) = &self.executor else {
            if self.environment.is_production() {
                return Err(RefundError::Unavailable(
                    "blockchain stack not constructed".to_string(),
                ));
            }
            tracing::warn!(
                refund_id = refund_id,
                environment = %self.environment,
                "Blockchain unavailable; skipping refund broadcast"
            );
            return Ok(None);
        };

        let request = RefundRequest {
            network: session.network,
            token: session.token,
            recipient_address: session.customer_address.clone(),
            amount_usd: refund.amount_usd.clone(),
        };

        // A configuration error propagating here leaves the refund PENDING
        // for a retry once the deployment is fixed.
        let result = executor.execute_refund(&request).await?;

        if result.success {
            refund.status = RefundStatus::Processing;
            refund.tx_hash = result.tx_hash.clone();
            refund.block_number = result.block_number;
            self.store.update_refund(refund.clone()).await?;

            tracing::info!(
                refund_id = refund_id,
                tx_hash = ?result.tx_hash,
                pending_confirmations = ?result.pending_confirmations,
                "Refund broadcast, awaiting finality"
            );

            // Broadcast success is not finality: this is the processing
            // event, never the completed one.
            webhook::dispatch(
                self.webhooks.as_ref(),
                EVENT_REFUND_PROCESSING,
                json!({
                    "refund_id": refund.id,
                    "payment_session_id": refund.payment_session_id,
                    "user_id": session.user_id,
                    "status": refund.status,
                    "amount_usd": refund.amount_usd,
                    "tx_hash": result.tx_hash,
                    "pending_confirmations": result.pending_confirmations,
                }),
            )
            .await;
        } else {
            refund.status = RefundStatus::Failed;
            refund.error = result.error.clone();
            refund.tx_hash = result.tx_hash.clone();
            self.store.update_refund(refund).await?;

            tracing::warn!(
                refund_id = refund_id,
                error = ?result.error,
                "Refund failed; no completion notification emitted"
            );
        }

        Ok(Some(result))
    }
}
