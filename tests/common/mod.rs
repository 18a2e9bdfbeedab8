//! Shared fixtures for integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use refund_gateway::blockchain::types::{ChainResult, Network, Token};
use refund_gateway::refunds::finality::{ConfirmationInfo, ConfirmationMonitor};
use refund_gateway::refunds::persistence::InMemoryRefundStore;
use refund_gateway::refunds::types::{PaymentSession, Refund, RefundStatus};
use refund_gateway::refunds::webhook::{WebhookDispatcher, WebhookError};

/// Anvil's first well-known development key; never holds real funds.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub const CUSTOMER_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Captures every queued webhook for assertions.
pub struct RecordingDispatcher {
    pub events: Mutex<Vec<(String, Value)>>,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl WebhookDispatcher for RecordingDispatcher {
    async fn queue_webhook(&self, event: &str, payload: Value) -> Result<(), WebhookError> {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), payload));
        Ok(())
    }
}

/// Confirmation monitor whose depth the test advances by hand.
pub struct ScriptedConfirmations {
    info: Mutex<Option<ConfirmationInfo>>,
}

impl ScriptedConfirmations {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            info: Mutex::new(None),
        })
    }

    pub fn set(&self, block_number: u64, confirmations: u64) {
        *self.info.lock().unwrap() = Some(ConfirmationInfo {
            block_number,
            confirmations,
        });
    }
}

#[async_trait]
impl ConfirmationMonitor for ScriptedConfirmations {
    async fn confirmations(
        &self,
        _network: Network,
        _tx_hash: &str,
    ) -> ChainResult<Option<ConfirmationInfo>> {
        Ok(*self.info.lock().unwrap())
    }
}

/// A refund store seeded with one session and one pending refund for it.
pub fn seeded_store(session_amount: &str, refund_amount: &str) -> Arc<InMemoryRefundStore> {
    let store = Arc::new(InMemoryRefundStore::new());
    store.put_session(PaymentSession {
        id: "sess-1".to_string(),
        network: Network::Base,
        token: Token::Usdc,
        customer_address: CUSTOMER_ADDRESS.to_string(),
        amount_usd: session_amount.to_string(),
        user_id: "user-1".to_string(),
        fully_refunded: false,
    });
    store.put_refund(Refund {
        id: "r1".to_string(),
        status: RefundStatus::Pending,
        amount_usd: refund_amount.to_string(),
        reason: "customer request".to_string(),
        payment_session_id: "sess-1".to_string(),
        tx_hash: None,
        block_number: None,
        error: None,
        created_at: Utc::now(),
        completed_at: None,
    });
    store
}
