//! Quote provider capability
//!
//! One hop, one price: `quote(token_in, token_out, amount_in)` against a
//! pluggable backend. Failures never cross this boundary as errors - every
//! outcome is a `QuoteResult`, so one bad hop can never take a tick down.

mod oneinch;
mod uniswap_v3;

pub use oneinch::OneinchQuoteProvider;
pub use uniswap_v3::UniswapV3QuoteProvider;

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::Serialize;

/// Pool-level diagnostics from the on-chain backend
#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolChecks {
    pub exists: bool,
    pub liquidity: Option<u128>,
    pub slot0_ok: bool,
    pub incomplete_pool_state: bool,
}

/// Per-quote diagnostic metadata, attached to the winning attempt
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuoteMeta {
    /// REST backend: endpoint hit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// REST backend: final HTTP status observed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// REST backend: upstream routing detail, passed through untouched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocols: Option<serde_json::Value>,
    /// Upstream gas estimate for executing this hop, when reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_gas: Option<u64>,
    /// On-chain backend: winning fee tier (hundredths of a bip)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_tier_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_address: Option<String>,
    /// Which quoter method served the result ("QuoterV2" or "Quoter")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoter_used: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_checks: Option<PoolChecks>,
}

/// Outcome of a single hop quote. Value object, built once, never mutated.
#[derive(Debug, Clone)]
pub struct QuoteResult {
    pub ok: bool,
    pub amount_in: U256,
    pub amount_out: U256,
    pub token_in: String,
    pub token_out: String,
    pub meta: QuoteMeta,
    pub error: Option<String>,
}

impl QuoteResult {
    pub fn success(
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        amount_out: U256,
        meta: QuoteMeta,
    ) -> Self {
        Self {
            ok: true,
            amount_in,
            amount_out,
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            meta,
            error: None,
        }
    }

    pub fn failure(
        token_in: &str,
        token_out: &str,
        amount_in: U256,
        meta: QuoteMeta,
        error: impl Into<String>,
    ) -> Self {
        Self {
            ok: false,
            amount_in,
            amount_out: U256::ZERO,
            token_in: token_in.to_string(),
            token_out: token_out.to_string(),
            meta,
            error: Some(error.into()),
        }
    }
}

/// Backend-agnostic quote capability.
///
/// Shared read-only across every in-flight evaluation in a tick, so
/// implementations must be safe for concurrent invocation.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Price one hop. Must not panic and must not error - all failure is
    /// encoded in the returned [`QuoteResult`].
    async fn quote(&self, token_in: &str, token_out: &str, amount_in: U256) -> QuoteResult;

    /// Release backend-specific resources at shutdown. Default: nothing to do.
    async fn shutdown(&self) {}
}
