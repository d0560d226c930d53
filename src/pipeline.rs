//! Route evaluation pipeline
//!
//! One route, one probe amount, one tick: chain the hop quotes, apply the
//! sanity and liquidity policy, then price the outcome in USD net of gas and
//! a slippage buffer. The result is a single auditable record; failures stop
//! the hop chain but always produce a record, never an error.

use alloy_primitives::{I256, U256};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::debug;

use crate::amounts::{from_base_units, to_base_units};
use crate::config::Config;
use crate::pricing::{estimate_amount_usd, infer_native_usd, infer_token_usd};
use crate::quote::{QuoteMeta, QuoteProvider};
use crate::routes::{Route, RouteKind};

/// Fallback tag when a provider fails without naming a reason
const DEFAULT_QUOTE_ERROR: &str = "quote_failed";

// ============================================
// EVALUATION RECORD
// ============================================

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EvalFlags {
    pub suspicious: bool,
    pub low_liquidity: bool,
    pub incomplete_pricing: bool,
    pub incomplete_pool_state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalStatus {
    Ok,
    Error,
}

/// One executed hop, normalized for the record
#[derive(Debug, Clone, Serialize)]
pub struct HopRecord {
    pub token_in: String,
    pub token_out: String,
    /// Base units as decimal strings; JSON numbers would lose precision
    pub amount_in_wei: String,
    pub amount_out_wei: String,
    pub quote_meta: QuoteMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceSource {
    pub token_usd: String,
    pub eth_usd: String,
}

/// The one entity that crosses the core/sink boundary: a full account of a
/// single (route, amount, tick) evaluation. Immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct RouteEvaluation {
    pub ts_iso: String,
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    pub source: String,
    pub route_type: RouteKind,
    pub route_symbols: Vec<String>,
    pub amount_in_human: f64,
    pub amount_in_wei: String,
    pub hops: Vec<HopRecord>,
    pub gross_return_wei: String,
    pub gross_return_usd_est: Option<f64>,
    pub gas_price_wei: Option<u128>,
    pub gas_units_est: u64,
    pub gas_cost_usd_est: Option<f64>,
    pub buffer_bps: u32,
    pub buffer_usd_est: Option<f64>,
    pub net_usd_est: Option<f64>,
    pub flags: EvalFlags,
    pub status: EvalStatus,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_source: Option<PriceSource>,
}

// ============================================
// PIPELINE
// ============================================

struct EvalContext<'a> {
    cfg: &'a Config,
    route: &'a Route,
    amount_in_human: f64,
    amount_in_base: U256,
    gas_units: u64,
}

impl EvalContext<'_> {
    /// Terminal-failure record: the hop prefix completed so far, no USD
    /// figures, gas price left unknown.
    fn error_record(&self, hops: Vec<HopRecord>, flags: EvalFlags, message: String) -> RouteEvaluation {
        RouteEvaluation {
            ts_iso: Utc::now().to_rfc3339(),
            chain_id: self.cfg.chain_id,
            source: self.cfg.quote_source.to_string(),
            route_type: self.route.kind,
            route_symbols: self.route.route_symbols(),
            amount_in_human: self.amount_in_human,
            amount_in_wei: self.amount_in_base.to_string(),
            hops,
            gross_return_wei: "0".to_string(),
            gross_return_usd_est: None,
            gas_price_wei: None,
            gas_units_est: self.gas_units,
            gas_cost_usd_est: None,
            buffer_bps: self.cfg.slippage_bps_buffer,
            buffer_usd_est: None,
            net_usd_est: None,
            flags,
            status: EvalStatus::Error,
            error_message: Some(message),
            price_source: None,
        }
    }
}

/// Lossy but monotonic conversion for ratio comparisons only; never used
/// for amounts that end up in a record.
fn u256_to_f64(v: U256) -> f64 {
    v.to_string().parse::<f64>().unwrap_or(f64::INFINITY)
}

fn signed_delta(end: U256, start: U256) -> I256 {
    if end >= start {
        I256::try_from(end - start).unwrap_or(I256::MAX)
    } else {
        -I256::try_from(start - end).unwrap_or(I256::MAX)
    }
}

/// Evaluate one route at one probe amount. `gas_price_wei` is resolved once
/// per tick by the orchestrator and shared by every evaluation in it.
pub async fn process_route(
    provider: &dyn QuoteProvider,
    cfg: &Config,
    gas_price_wei: u128,
    route: &Route,
    amount_in_human: f64,
) -> RouteEvaluation {
    let gas_units = match route.kind {
        RouteKind::Loop2 => cfg.gas_units_estimate.loop2,
        RouteKind::Triangle3 => cfg.gas_units_estimate.triangle3,
    };

    let start_symbol = route.start_symbol().to_string();
    let start_token = match cfg.tokens.get(&start_symbol) {
        Some(t) => t.clone(),
        None => {
            // enumeration whitelists symbols, so this is a config/enum bug
            let ctx = EvalContext {
                cfg,
                route,
                amount_in_human,
                amount_in_base: U256::ZERO,
                gas_units,
            };
            return ctx.error_record(Vec::new(), EvalFlags::default(), "unknown_token".to_string());
        }
    };

    let amount_in_base = match to_base_units(amount_in_human, start_token.decimals) {
        Ok(v) => v,
        Err(e) => {
            let ctx = EvalContext {
                cfg,
                route,
                amount_in_human,
                amount_in_base: U256::ZERO,
                gas_units,
            };
            return ctx.error_record(Vec::new(), EvalFlags::default(), format!("bad_amount: {}", e));
        }
    };

    let ctx = EvalContext {
        cfg,
        route,
        amount_in_human,
        amount_in_base,
        gas_units,
    };

    let mut flags = EvalFlags::default();
    let mut hops: Vec<HopRecord> = Vec::new();
    let mut current_in = amount_in_base;

    // ---- hop state machine ----
    for (token_in, token_out) in route.hop_pairs() {
        let q = provider.quote(&token_in, &token_out, current_in).await;

        if !q.ok || q.amount_out.is_zero() {
            let message = q.error.unwrap_or_else(|| DEFAULT_QUOTE_ERROR.to_string());
            debug!(
                "hop {}->{} ({} in) failed: {}",
                q.token_in, q.token_out, q.amount_in, message
            );
            return ctx.error_record(hops, flags, message);
        }

        if cfg.sanity.enabled {
            let ceiling = u256_to_f64(current_in) * cfg.sanity.max_jump_ratio;
            if u256_to_f64(q.amount_out) > ceiling {
                // a 1000x hop is corrupted upstream data, not free money
                flags.suspicious = true;
                return ctx.error_record(hops, flags, "suspicious_quote_jump".to_string());
            }
        }

        if let Some(checks) = &q.meta.pool_checks {
            if checks.liquidity == Some(0) {
                flags.low_liquidity = true;
            }
            if checks.incomplete_pool_state {
                flags.incomplete_pool_state = true;
            }
        }

        hops.push(HopRecord {
            token_in,
            token_out,
            amount_in_wei: current_in.to_string(),
            amount_out_wei: q.amount_out.to_string(),
            quote_meta: q.meta,
        });
        current_in = q.amount_out;
    }

    // ---- full cycle succeeded: USD accounting ----
    let gross_wei = signed_delta(current_in, amount_in_base);
    let gross_abs = if current_in >= amount_in_base {
        current_in - amount_in_base
    } else {
        amount_in_base - current_in
    };
    let gross_human = from_base_units(gross_abs, start_token.decimals)
        .ok()
        .and_then(|d| d.to_f64())
        .map(|v| if gross_wei.is_negative() { -v } else { v });

    let (token_usd, token_price_src) = infer_token_usd(
        &start_symbol,
        cfg,
        provider,
        cfg.pricing.token_price_mode,
    )
    .await;

    let amount_usd = estimate_amount_usd(amount_in_human, &start_token, token_usd);
    if amount_usd.is_none() {
        flags.incomplete_pricing = true;
    }

    // Known approximation: the current inferred price converts both the
    // principal and the profit leg.
    let gross_usd = if start_token.is_stable {
        gross_human
    } else {
        match (gross_human, token_usd) {
            (Some(g), Some(px)) => Some(g * px),
            _ => None,
        }
    };

    let (eth_usd, eth_price_src) = infer_native_usd(cfg, provider, &cfg.pricing).await;
    let gas_cost_usd = match eth_usd {
        Some(px) => Some((gas_units as f64) * (gas_price_wei as f64) * px / 1e18),
        None => {
            flags.incomplete_pricing = true;
            None
        }
    };

    let buffer_usd = amount_usd.map(|usd| usd * (cfg.slippage_bps_buffer as f64 / 10_000.0));

    let net_usd = match (gross_usd, gas_cost_usd, buffer_usd) {
        (Some(g), Some(c), Some(b)) => Some(g - c - b),
        _ => None,
    };

    RouteEvaluation {
        ts_iso: Utc::now().to_rfc3339(),
        chain_id: cfg.chain_id,
        source: cfg.quote_source.to_string(),
        route_type: route.kind,
        route_symbols: route.route_symbols(),
        amount_in_human,
        amount_in_wei: amount_in_base.to_string(),
        hops,
        gross_return_wei: gross_wei.to_string(),
        gross_return_usd_est: gross_usd,
        gas_price_wei: Some(gas_price_wei),
        gas_units_est: gas_units,
        gas_cost_usd_est: gas_cost_usd,
        buffer_bps: cfg.slippage_bps_buffer,
        buffer_usd_est: buffer_usd,
        net_usd_est: net_usd,
        flags,
        status: EvalStatus::Ok,
        error_message: None,
        price_source: Some(PriceSource {
            token_usd: token_price_src,
            eth_usd: eth_price_src,
        }),
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PriceMode, Config};
    use crate::quote::{PoolChecks, QuoteResult};
    use async_trait::async_trait;
    use std::collections::HashMap;

    const GAS_PRICE_WEI: u128 = 10_000_000_000; // 10 gwei

    /// Deterministic provider keyed on (token_in, token_out, amount_in)
    struct FakeQuoteProvider {
        responses: HashMap<(String, String, U256), QuoteResult>,
    }

    impl FakeQuoteProvider {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
            }
        }

        fn with(mut self, token_in: &str, token_out: &str, amount_in: U256, result: QuoteResult) -> Self {
            self.responses
                .insert((token_in.to_string(), token_out.to_string(), amount_in), result);
            self
        }
    }

    #[async_trait]
    impl QuoteProvider for FakeQuoteProvider {
        async fn quote(&self, token_in: &str, token_out: &str, amount_in: U256) -> QuoteResult {
            let key = (token_in.to_string(), token_out.to_string(), amount_in);
            match self.responses.get(&key) {
                Some(r) => r.clone(),
                None => QuoteResult::failure(
                    token_in,
                    token_out,
                    amount_in,
                    QuoteMeta::default(),
                    "missing_fake_quote",
                ),
            }
        }
    }

    fn ok_quote(token_in: &str, token_out: &str, amount_in: U256, amount_out: U256) -> QuoteResult {
        QuoteResult::success(token_in, token_out, amount_in, amount_out, QuoteMeta::default())
    }

    fn base_cfg() -> Config {
        let mut cfg: Config = toml::from_str(crate::config::tests::minimal_toml()).unwrap();
        cfg.sanity.enabled = false;
        cfg.pricing.token_price_mode = PriceMode::Static;
        cfg.pricing.static_prices.insert("WETH".to_string(), 3000.0);
        cfg.pricing.eth_usd_static = Some(3000.0);
        cfg.gas_price_gwei_override = Some(10.0);
        cfg
    }

    fn loop_route() -> Route {
        Route {
            kind: RouteKind::Loop2,
            symbols: vec!["USDC".to_string(), "WETH".to_string()],
        }
    }

    fn usdc(amount: u64) -> U256 {
        U256::from(amount)
    }

    const USDC_IN: u64 = 100_000_000; // 100.000000
    const WETH_OUT: u128 = 33_500_000_000_000_000; // 0.0335
    const ONE_WETH: u128 = 1_000_000_000_000_000_000;

    #[tokio::test]
    async fn profitable_loop_produces_consistent_record() {
        let cfg = base_cfg();
        let provider = FakeQuoteProvider::new()
            .with("USDC", "WETH", usdc(USDC_IN), ok_quote("USDC", "WETH", usdc(USDC_IN), U256::from(WETH_OUT)))
            .with(
                "WETH",
                "USDC",
                U256::from(WETH_OUT),
                ok_quote("WETH", "USDC", U256::from(WETH_OUT), usdc(101_000_000)),
            )
            // native-asset inference: 1 WETH -> 3000 USDC
            .with(
                "WETH",
                "USDC",
                U256::from(ONE_WETH),
                ok_quote("WETH", "USDC", U256::from(ONE_WETH), U256::from(3_000_000_000u64)),
            );

        let eval = process_route(&provider, &cfg, GAS_PRICE_WEI, &loop_route(), 100.0).await;

        assert_eq!(eval.status, EvalStatus::Ok);
        assert_eq!(eval.error_message, None);
        assert!(!eval.flags.suspicious);
        assert_eq!(eval.hops.len(), 2);
        assert_eq!(eval.gross_return_wei, "1000000");
        assert!(eval.gross_return_usd_est.unwrap() > 0.0);
        assert_eq!(eval.gas_price_wei, Some(GAS_PRICE_WEI));

        let net = eval.net_usd_est.expect("net must be computed");
        let expected = eval.gross_return_usd_est.unwrap()
            - eval.gas_cost_usd_est.unwrap()
            - eval.buffer_usd_est.unwrap();
        assert!((net - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn hop_failure_truncates_chain_and_reports_tag() {
        let cfg = base_cfg();
        let provider = FakeQuoteProvider::new()
            .with("USDC", "WETH", usdc(USDC_IN), ok_quote("USDC", "WETH", usdc(USDC_IN), U256::from(WETH_OUT)))
            .with(
                "WETH",
                "USDC",
                U256::from(WETH_OUT),
                QuoteResult::failure("WETH", "USDC", U256::from(WETH_OUT), QuoteMeta::default(), "upstream_timeout"),
            );

        let eval = process_route(&provider, &cfg, GAS_PRICE_WEI, &loop_route(), 100.0).await;

        assert_eq!(eval.status, EvalStatus::Error);
        assert_eq!(eval.error_message.as_deref(), Some("upstream_timeout"));
        assert_eq!(eval.hops.len(), 1);
        assert_eq!(eval.net_usd_est, None);
        assert_eq!(eval.gas_price_wei, None);
        assert_eq!(eval.gross_return_wei, "0");
    }

    #[tokio::test]
    async fn suspicious_jump_rejected_by_sanity_policy() {
        let mut cfg = base_cfg();
        cfg.sanity.enabled = true;
        cfg.sanity.max_jump_ratio = 2.0;

        let provider = FakeQuoteProvider::new().with(
            "USDC",
            "WETH",
            usdc(USDC_IN),
            ok_quote("USDC", "WETH", usdc(USDC_IN), usdc(USDC_IN * 3)),
        );

        let eval = process_route(&provider, &cfg, GAS_PRICE_WEI, &loop_route(), 100.0).await;

        assert_eq!(eval.status, EvalStatus::Error);
        assert!(eval.flags.suspicious);
        assert_eq!(eval.error_message.as_deref(), Some("suspicious_quote_jump"));
        assert!(eval.hops.is_empty());
    }

    #[tokio::test]
    async fn pool_state_flags_are_informational_not_fatal() {
        let cfg = base_cfg();
        let mut degraded = ok_quote("USDC", "WETH", usdc(USDC_IN), U256::from(WETH_OUT));
        degraded.meta.pool_checks = Some(PoolChecks {
            exists: true,
            liquidity: Some(0),
            slot0_ok: false,
            incomplete_pool_state: true,
        });

        let provider = FakeQuoteProvider::new()
            .with("USDC", "WETH", usdc(USDC_IN), degraded)
            .with(
                "WETH",
                "USDC",
                U256::from(WETH_OUT),
                ok_quote("WETH", "USDC", U256::from(WETH_OUT), usdc(99_000_000)),
            )
            .with(
                "WETH",
                "USDC",
                U256::from(ONE_WETH),
                ok_quote("WETH", "USDC", U256::from(ONE_WETH), U256::from(3_000_000_000u64)),
            );

        let eval = process_route(&provider, &cfg, GAS_PRICE_WEI, &loop_route(), 100.0).await;

        assert_eq!(eval.status, EvalStatus::Ok);
        assert!(eval.flags.low_liquidity);
        assert!(eval.flags.incomplete_pool_state);
        // a losing cycle still ranks: gross is negative, not an error
        assert!(eval.gross_return_usd_est.unwrap() < 0.0);
    }

    #[tokio::test]
    async fn unknown_native_price_leaves_net_null() {
        let mut cfg = base_cfg();
        cfg.pricing.eth_usd_static = None;

        let provider = FakeQuoteProvider::new()
            .with("USDC", "WETH", usdc(USDC_IN), ok_quote("USDC", "WETH", usdc(USDC_IN), U256::from(WETH_OUT)))
            .with(
                "WETH",
                "USDC",
                U256::from(WETH_OUT),
                ok_quote("WETH", "USDC", U256::from(WETH_OUT), usdc(101_000_000)),
            );
        // no 1-WETH inference quote either, so eth_usd stays unknown

        let eval = process_route(&provider, &cfg, GAS_PRICE_WEI, &loop_route(), 100.0).await;

        assert_eq!(eval.status, EvalStatus::Ok);
        assert!(eval.flags.incomplete_pricing);
        assert_eq!(eval.gas_cost_usd_est, None);
        assert_eq!(eval.net_usd_est, None);
        // buffer is known - the notional was a stable amount
        assert_eq!(eval.buffer_usd_est, Some(0.1));
    }

    #[tokio::test]
    async fn error_record_serializes_nulls_and_strings() {
        let cfg = base_cfg();
        let provider = FakeQuoteProvider::new();

        let eval = process_route(&provider, &cfg, GAS_PRICE_WEI, &loop_route(), 100.0).await;
        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&eval).unwrap()).unwrap();

        assert_eq!(json["status"], "error");
        assert_eq!(json["error_message"], "missing_fake_quote");
        assert_eq!(json["amount_in_wei"], "100000000");
        assert_eq!(json["gross_return_wei"], "0");
        assert!(json["net_usd_est"].is_null());
        assert!(json["gas_price_wei"].is_null());
        assert_eq!(json["route_type"], "loop2");
        assert_eq!(json["chainId"], 8453);
        assert!(json.get("price_source").is_none());
    }
}
