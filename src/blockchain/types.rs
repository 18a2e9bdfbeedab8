//! Chain-specific types, static registries, and error definitions.

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A blockchain the gateway can refund on. Static, configuration-time set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Fast, cheap L2; shallow finality requirement.
    Base,
    /// Conservative L1; deep finality requirement.
    Ethereum,
}

impl Network {
    /// Chain ID for EIP-155 replay protection.
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Base => 8453,
            Network::Ethereum => 1,
        }
    }

    /// Confirmation depth at which a transaction is treated as final.
    pub fn required_confirmations(&self) -> u64 {
        match self {
            Network::Base => 3,
            Network::Ethereum => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::Ethereum => "ethereum",
        }
    }

    /// Every supported network, for registry iteration.
    pub fn all() -> &'static [Network] {
        &[Network::Base, Network::Ethereum]
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stablecoin asset. Both supported tokens carry 6 fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Token {
    Usdc,
    Usdt,
}

impl Token {
    /// Fractional digits in the token's smallest unit.
    pub fn decimals(&self) -> u32 {
        6
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Token::Usdc => "usdc",
            Token::Usdt => "usdt",
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static contract registry: the only `(network, token)` pairs the gateway
/// will ever send to. Unknown combinations are rejected outright so funds
/// can never be sent to an unintended contract on the wrong network.
pub fn token_contract(network: Network, token: Token) -> Option<Address> {
    match (network, token) {
        (Network::Ethereum, Token::Usdc) => {
            Some(address!("A0b86991c6218b36c1d19D4a2e9eb0cE3606eB48"))
        }
        (Network::Ethereum, Token::Usdt) => {
            Some(address!("dAC17F958D2ee523a2206206994597C13D831ec7"))
        }
        (Network::Base, Token::Usdc) => {
            Some(address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"))
        }
        // USDT is not issued natively on Base; refunds for it are not
        // executable there.
        (Network::Base, Token::Usdt) => None,
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC request failed on a single endpoint.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Every configured endpoint for a network failed.
    #[error("all RPC endpoints failed for {network}")]
    RpcExhausted { network: Network },

    /// Missing or inconsistent signer/network configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Signing identity resolution or signing failed.
    #[error("signer error: {0}")]
    Signer(String),

    /// Remote custody service call failed.
    #[error("custody error: {0}")]
    Custody(String),

    /// Nonce allocation failed.
    #[error("nonce error: {0}")]
    Nonce(String),

    /// `(network, token)` pair absent from the contract registry.
    #[error("no contract registered for {token} on {network}")]
    UnsupportedPair { network: Network, token: Token },
}

/// Result type for blockchain operations.
pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_requirements_differ_by_network() {
        assert!(Network::Ethereum.required_confirmations() > Network::Base.required_confirmations());
    }

    #[test]
    fn test_registry_covers_claimed_pairs_only() {
        assert!(token_contract(Network::Ethereum, Token::Usdc).is_some());
        assert!(token_contract(Network::Ethereum, Token::Usdt).is_some());
        assert!(token_contract(Network::Base, Token::Usdc).is_some());
        assert!(token_contract(Network::Base, Token::Usdt).is_none());
    }

    #[test]
    fn test_registry_addresses_are_distinct() {
        let eth_usdc = token_contract(Network::Ethereum, Token::Usdc).unwrap();
        let eth_usdt = token_contract(Network::Ethereum, Token::Usdt).unwrap();
        let base_usdc = token_contract(Network::Base, Token::Usdc).unwrap();
        assert_ne!(eth_usdc, eth_usdt);
        assert_ne!(eth_usdc, base_usdc);
    }

    #[test]
    fn test_network_serde() {
        let network: Network = serde_json::from_str("\"base\"").unwrap();
        assert_eq!(network, Network::Base);
        assert_eq!(serde_json::to_string(&Network::Ethereum).unwrap(), "\"ethereum\"");
    }
}
