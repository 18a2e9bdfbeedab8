//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check signer strategy coherence (custody flag vs. key id)
//! - Validate endpoint URLs and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before any component is constructed

use crate::config::schema::GatewayConfig;
use crate::refunds::amounts::usd_to_cents;

/// A single validation failure, with the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a full gateway configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.signer.use_custody {
        match &config.signer.custody_key_id {
            Some(id) if !id.trim().is_empty() => {}
            _ => errors.push(ValidationError {
                field: "signer.custody_key_id".to_string(),
                message: "required when use_custody is enabled".to_string(),
            }),
        }
    } else if config.environment.is_production() {
        errors.push(ValidationError {
            field: "signer.use_custody".to_string(),
            message: "raw-key signing is not permitted in production".to_string(),
        });
    }

    validate_endpoint_list(&config.rpc.base_rpc_urls, "rpc.base_rpc_urls", &mut errors);
    validate_endpoint_list(
        &config.rpc.ethereum_rpc_urls,
        "rpc.ethereum_rpc_urls",
        &mut errors,
    );

    if config.rpc.rpc_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "rpc.rpc_timeout_secs".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if let Some(limit) = &config.limits.daily_refund_limit_usd {
        match usd_to_cents(limit) {
            Ok(0) | Err(_) => errors.push(ValidationError {
                field: "limits.daily_refund_limit_usd".to_string(),
                message: format!("'{}' is not a positive decimal USD amount", limit),
            }),
            Ok(_) => {}
        }
    }

    if config.executor.confirmation_poll_secs == 0 {
        errors.push(ValidationError {
            field: "executor.confirmation_poll_secs".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if config.executor.gas_price_multiplier < 1.0 {
        errors.push(ValidationError {
            field: "executor.gas_price_multiplier".to_string(),
            message: "must be at least 1.0".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_endpoint_list(list: &str, field: &str, errors: &mut Vec<ValidationError>) {
    let entries: Vec<&str> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if entries.is_empty() {
        errors.push(ValidationError {
            field: field.to_string(),
            message: "at least one RPC endpoint URL is required".to_string(),
        });
        return;
    }

    for entry in entries {
        if entry.parse::<url::Url>().is_err() {
            errors.push(ValidationError {
                field: field.to_string(),
                message: format!("'{}' is not a valid URL", entry),
            });
        }
    }
}
