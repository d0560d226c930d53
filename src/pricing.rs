//! USD pricing inference
//!
//! A token's USD value comes from one of three places: the stable-asset peg,
//! a static override, or a live one-unit quote against the configured stable
//! asset. Inference runs through the same provider instance as route hops,
//! so the REST/on-chain backend choice is transparent here. Every price is
//! tagged with its source for the audit record.

use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use crate::amounts::{from_base_units, to_base_units};
use crate::config::{Config, PriceMode, PricingConfig, TokenConfig};
use crate::quote::QuoteProvider;

/// First stable-asset symbol in the (sorted) token table
pub fn find_stable_symbol(cfg: &Config) -> Option<&str> {
    cfg.tokens
        .values()
        .find(|t| t.is_stable)
        .map(|t| t.symbol.as_str())
}

/// Resolve a token's USD price; returns the price (if known) and a source
/// tag: `stable_peg`, `static`, `static_missing`, `infer_no_stable`,
/// `infer_failed`, or `infer_via_<STABLE>`.
pub async fn infer_token_usd(
    symbol: &str,
    cfg: &Config,
    provider: &dyn QuoteProvider,
    mode: PriceMode,
) -> (Option<f64>, String) {
    let token = match cfg.tokens.get(symbol) {
        Some(t) => t,
        None => return (None, "unknown_token".to_string()),
    };

    if token.is_stable {
        return (Some(1.0), "stable_peg".to_string());
    }

    if mode == PriceMode::Static {
        let price = token
            .static_price_usd
            .or_else(|| cfg.pricing.static_prices.get(symbol).copied());
        return match price {
            Some(p) => (Some(p), "static".to_string()),
            None => (None, "static_missing".to_string()),
        };
    }

    let stable = match find_stable_symbol(cfg) {
        Some(s) => s,
        None => return (None, "infer_no_stable".to_string()),
    };

    let one_unit = match to_base_units(1.0, token.decimals) {
        Ok(v) => v,
        Err(_) => return (None, "infer_failed".to_string()),
    };

    let q = provider.quote(symbol, stable, one_unit).await;
    if !q.ok || q.amount_out.is_zero() {
        debug!("USD inference quote {}->{} failed: {:?}", symbol, stable, q.error);
        return (None, "infer_failed".to_string());
    }

    let stable_decimals = match cfg.tokens.get(stable) {
        Some(t) => t.decimals,
        None => return (None, "infer_failed".to_string()),
    };
    match from_base_units(q.amount_out, stable_decimals)
        .ok()
        .and_then(|d| d.to_f64())
    {
        Some(px) => (Some(px), format!("infer_via_{}", stable)),
        None => (None, "infer_failed".to_string()),
    }
}

/// Resolve the native asset's USD price via the wrapped-native token,
/// falling back to the configured static value.
pub async fn infer_native_usd(
    cfg: &Config,
    provider: &dyn QuoteProvider,
    pricing: &PricingConfig,
) -> (Option<f64>, String) {
    let weth_symbol = cfg
        .tokens
        .keys()
        .find(|s| s.eq_ignore_ascii_case("WETH"))
        .cloned();

    if let Some(sym) = weth_symbol {
        let (px, src) = infer_token_usd(&sym, cfg, provider, PriceMode::Infer).await;
        if px.is_some() {
            return (px, src);
        }
    }

    match pricing.eth_usd_static {
        Some(px) => (Some(px), "static".to_string()),
        None => (None, "missing".to_string()),
    }
}

/// USD notional of the probe amount. A stable starting token is its own
/// notional; otherwise the inferred price scales the human amount.
pub fn estimate_amount_usd(
    amount_in_human: f64,
    start_token: &TokenConfig,
    token_usd: Option<f64>,
) -> Option<f64> {
    if start_token.is_stable {
        return Some(amount_in_human);
    }
    token_usd.map(|px| amount_in_human * px)
}
