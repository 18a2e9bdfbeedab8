//! Refund transaction execution.
//!
//! # Responsibilities
//! - Validate requests before any external system is touched
//! - Reserve daily spend budget atomically
//! - Resolve provider, wallet, and (optionally) an explicit nonce
//! - Estimate gas as a pre-flight check, broadcast, await one confirmation
//!
//! # Error Boundary
//! Business-rule and external-service failures are returned as
//! `RefundResult { success: false, .. }`. Only configuration and
//! programming errors (missing registry entries, broken signer setup)
//! propagate as `Err`.

use std::sync::Arc;
use std::time::Duration;

use alloy::consensus::TxEip1559;
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, TxHash, TxKind, U256};
use alloy::rpc::types::{TransactionInput, TransactionReceipt, TransactionRequest};
use alloy::sol;
use alloy::sol_types::SolCall;
use tokio::time::{interval, timeout};

use crate::blockchain::nonce::NonceManager;
use crate::blockchain::provider::ProviderManager;
use crate::blockchain::signer::SignerProvider;
use crate::blockchain::types::{token_contract, ChainError, ChainResult, Network};
use crate::blockchain::wallet::WalletCache;
use crate::config::schema::ExecutorConfig;
use crate::observability::metrics;
use crate::refunds::amounts::to_smallest_units;
use crate::refunds::spend_guard::SpendLimitGuard;
use crate::refunds::types::{RefundError, RefundRequest, RefundResult};

sol! {
    /// Minimal ERC-20 surface the executor needs.
    interface IErc20 {
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Priority fee offered when the network's suggested gas price allows it.
const PRIORITY_FEE_WEI: u128 = 1_500_000_000;

/// Orchestrates a single refund broadcast end to end.
pub struct RefundExecutor {
    providers: Arc<ProviderManager>,
    wallets: WalletCache,
    spend_guard: SpendLimitGuard,
    nonce_manager: Option<Arc<dyn NonceManager>>,
    config: ExecutorConfig,
}

impl RefundExecutor {
    pub fn new(
        providers: Arc<ProviderManager>,
        signer_provider: Arc<dyn SignerProvider>,
        spend_guard: SpendLimitGuard,
        nonce_manager: Option<Arc<dyn NonceManager>>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            providers,
            wallets: WalletCache::new(signer_provider),
            spend_guard,
            nonce_manager,
            config,
        }
    }

    /// Execute a refund transfer.
    ///
    /// Never errors for business-rule failures; see the module-level error
    /// boundary notes.
    pub async fn execute_refund(&self, request: &RefundRequest) -> Result<RefundResult, RefundError> {
        let result = self.run(request).await?;
        metrics::record_refund_execution(request.network.as_str(), result.success);
        if let Some(error) = &result.error {
            tracing::warn!(
                network = %request.network,
                token = %request.token,
                error = %error,
                "Refund execution failed"
            );
        }
        Ok(result)
    }

    async fn run(&self, request: &RefundRequest) -> Result<RefundResult, RefundError> {
        // Validation first; no external system is touched until both checks
        // pass.
        let token_units = match to_smallest_units(&request.amount_usd, request.token.decimals()) {
            Ok(0) => {
                return Ok(RefundResult::failure(
                    "refund amount must be greater than zero",
                ))
            }
            Ok(units) => units,
            Err(e) => return Ok(RefundResult::failure(format!("invalid refund amount: {}", e))),
        };

        let recipient: Address = match request.recipient_address.parse() {
            Ok(address) => address,
            Err(_) => {
                return Ok(RefundResult::failure(format!(
                    "invalid recipient address '{}'",
                    request.recipient_address
                )))
            }
        };

        if !self.spend_guard.check_and_reserve(&request.amount_usd).await {
            return Ok(RefundResult::failure(
                "daily refund limit reached; manual approval required",
            ));
        }

        let network = request.network;
        if !self.providers.is_healthy(network).await {
            return Ok(RefundResult::failure(format!(
                "no reachable RPC endpoint for {}",
                network
            )));
        }

        let wallet = match self.wallets.wallet(network).await {
            Ok(wallet) => wallet,
            Err(e) => return Self::chain_failure("wallet resolution failed", e),
        };

        // A registry miss past input validation is a configuration bug;
        // guessing an address would risk funds on the wrong contract.
        let contract = token_contract(network, request.token).ok_or(
            ChainError::UnsupportedPair {
                network,
                token: request.token,
            },
        )?;

        let amount = U256::from(token_units);
        let calldata = IErc20::transferCall {
            to: recipient,
            amount,
        }
        .abi_encode();

        // Pre-flight: a transfer that cannot be estimated would revert on
        // chain and still burn fees.
        let estimate_request = TransactionRequest {
            from: Some(wallet.address()),
            to: Some(TxKind::Call(contract)),
            input: TransactionInput::new(calldata.clone().into()),
            ..Default::default()
        };
        let gas_estimate = match self.providers.estimate_gas(network, estimate_request).await {
            Ok(gas) => gas,
            Err(e) => return Self::chain_failure("gas estimation failed", e),
        };

        let gas_price = match self.providers.get_gas_price(network).await {
            Ok(price) => price,
            Err(e) => return Self::chain_failure("gas price lookup failed", e),
        };
        let max_fee_per_gas = (gas_price as f64 * self.config.gas_price_multiplier) as u128;
        let max_priority_fee_per_gas = PRIORITY_FEE_WEI.min(max_fee_per_gas);

        let chain_next = match self
            .providers
            .get_transaction_count(network, wallet.address())
            .await
        {
            Ok(nonce) => nonce,
            Err(e) => return Self::chain_failure("nonce lookup failed", e),
        };
        let nonce = match &self.nonce_manager {
            Some(manager) => match manager.next_nonce(wallet.address(), chain_next).await {
                Ok(nonce) => nonce,
                Err(e) => return Self::chain_failure("nonce reservation failed", e),
            },
            // Without a nonce manager the node's pending count assigns the
            // sequence number; concurrent senders accept the race.
            None => chain_next,
        };

        let tx = TxEip1559 {
            chain_id: wallet.chain_id(),
            nonce,
            gas_limit: gas_estimate + gas_estimate / 5,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to: TxKind::Call(contract),
            value: U256::ZERO,
            input: calldata.into(),
            ..Default::default()
        };

        let envelope = match wallet.sign_transaction(tx).await {
            Ok(envelope) => envelope,
            Err(e) => return Self::chain_failure("transaction signing failed", e),
        };

        let raw = envelope.encoded_2718();
        let tx_hash = match self.providers.send_raw_transaction(network, &raw).await {
            Ok(hash) => hash,
            Err(e) => return Self::chain_failure("broadcast failed", e),
        };
        let tx_hash_hex = format!("{:#x}", tx_hash);

        tracing::info!(
            network = %network,
            token = %request.token,
            tx_hash = %tx_hash_hex,
            amount_usd = %request.amount_usd,
            "Refund broadcast, awaiting first confirmation"
        );

        // One confirmation only; promotion to finality is a separate step.
        let receipt = match self.wait_for_mining(network, tx_hash).await {
            Ok(Some(receipt)) => receipt,
            Ok(None) => {
                return Ok(RefundResult::on_chain_failure(
                    "transaction not mined within the confirmation window",
                    tx_hash_hex,
                    None,
                ))
            }
            Err(e) => {
                return Ok(RefundResult::on_chain_failure(
                    format!("receipt polling failed: {}", e),
                    tx_hash_hex,
                    None,
                ))
            }
        };

        if let Some(manager) = &self.nonce_manager {
            if let Err(e) = manager.confirm_nonce(wallet.address(), nonce).await {
                tracing::warn!(error = %e, "Nonce confirmation bookkeeping failed");
            }
        }

        let gas_used = Some(receipt.gas_used as u64);
        if !receipt.status() {
            // Mined but reverted: a failure result, with the hash kept for
            // the audit trail.
            return Ok(RefundResult::on_chain_failure(
                "transfer transaction reverted on-chain",
                tx_hash_hex,
                gas_used,
            ));
        }

        Ok(RefundResult {
            success: true,
            tx_hash: Some(tx_hash_hex),
            block_number: receipt.block_number,
            gas_used,
            pending_confirmations: Some(network.required_confirmations().saturating_sub(1)),
            error: None,
        })
    }

    /// Poll for the transaction receipt until mined or the confirmation
    /// window elapses.
    async fn wait_for_mining(
        &self,
        network: Network,
        tx_hash: TxHash,
    ) -> ChainResult<Option<TransactionReceipt>> {
        let window = Duration::from_secs(self.config.confirmation_timeout_secs);
        let poll = Duration::from_secs(self.config.confirmation_poll_secs);

        let mined = timeout(window, async {
            let mut ticker = interval(poll);
            loop {
                ticker.tick().await;
                match self.providers.get_transaction_receipt(network, tx_hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => {
                        tracing::debug!(tx_hash = %tx_hash, "Transaction pending");
                    }
                    Err(e) => return Err(e),
                }
            }
        })
        .await;

        match mined {
            Ok(Ok(receipt)) => Ok(Some(receipt)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Map a chain error at an execution step: configuration errors
    /// propagate, everything else becomes a failure result.
    fn chain_failure(context: &str, error: ChainError) -> Result<RefundResult, RefundError> {
        match error {
            e @ (ChainError::Config(_) | ChainError::UnsupportedPair { .. }) => Err(e.into()),
            e => Ok(RefundResult::failure(format!("{}: {}", context, e))),
        }
    }
}
