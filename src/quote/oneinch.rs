//! 1inch aggregator quote backend
//!
//! Calls the swap v6 `/quote` endpoint with bounded retry. Server-side
//! throttling and transient failures (429/5xx, transport errors) back off
//! exponentially with jitter; everything else is terminal on the spot.

use alloy_primitives::U256;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Config, TokenConfig};
use crate::quote::{QuoteMeta, QuoteProvider, QuoteResult};

/// Base backoff delay; attempt n waits `BASE * 2^n` plus jitter
const BACKOFF_BASE_SECS: f64 = 0.25;

/// Uniform jitter ceiling added to every backoff delay
const BACKOFF_JITTER_SECS: f64 = 0.2;

/// Statuses worth retrying; any other non-success is terminal
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub(crate) fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

fn backoff_delay(attempt: u32) -> Duration {
    let jitter: f64 = rand::thread_rng().gen_range(0.0..BACKOFF_JITTER_SECS);
    Duration::from_secs_f64(BACKOFF_BASE_SECS * 2f64.powi(attempt as i32) + jitter)
}

pub struct OneinchQuoteProvider {
    client: Client,
    chain_id: u64,
    tokens: BTreeMap<String, TokenConfig>,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl OneinchQuoteProvider {
    pub fn new(cfg: &Config) -> eyre::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs_f64(cfg.oneinch.timeout_sec))
            .build()?;

        Ok(Self {
            client,
            chain_id: cfg.chain_id,
            tokens: cfg.tokens.clone(),
            base_url: cfg.oneinch.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.oneinch.api_key.clone(),
            max_retries: cfg.oneinch.max_retries,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}/quote", self.base_url, self.chain_id)
    }

    /// The output amount moved fields across API revisions; accept both.
    fn extract_dst_amount(payload: &serde_json::Value) -> Option<Result<U256, ()>> {
        let raw = payload.get("dstAmount").or_else(|| payload.get("toTokenAmount"))?;
        let parsed = match raw {
            serde_json::Value::String(s) => U256::from_str(s).map_err(|_| ()),
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(U256::from)
                .ok_or(())
                .or_else(|_| U256::from_str(&n.to_string()).map_err(|_| ())),
            _ => Err(()),
        };
        Some(parsed)
    }
}

#[async_trait]
impl QuoteProvider for OneinchQuoteProvider {
    async fn quote(&self, token_in: &str, token_out: &str, amount_in: U256) -> QuoteResult {
        let endpoint = self.endpoint();
        let meta_for = |status: Option<u16>| QuoteMeta {
            endpoint: Some(endpoint.clone()),
            http_status: status,
            ..Default::default()
        };

        let (src, dst) = match (self.tokens.get(token_in), self.tokens.get(token_out)) {
            (Some(a), Some(b)) => (a.address.clone(), b.address.clone()),
            _ => {
                return QuoteResult::failure(
                    token_in,
                    token_out,
                    amount_in,
                    meta_for(None),
                    "unknown_token",
                )
            }
        };

        let amount = amount_in.to_string();
        let mut last_error = "unknown".to_string();
        let mut last_status: Option<u16> = None;

        for attempt in 0..=self.max_retries {
            let mut req = self
                .client
                .get(&endpoint)
                .query(&[("src", src.as_str()), ("dst", dst.as_str()), ("amount", &amount)])
                .header("accept", "application/json");
            if !self.api_key.is_empty() {
                req = req.bearer_auth(&self.api_key);
            }

            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    // transport-level failure: retryable
                    last_error = e.to_string();
                    if attempt < self.max_retries {
                        let delay = backoff_delay(attempt);
                        debug!(
                            "1inch transport error ({}), retrying in {:?}: {}",
                            attempt + 1,
                            delay,
                            last_error
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    break;
                }
            };

            let status = resp.status().as_u16();
            last_status = Some(status);

            if is_retryable_status(status) {
                last_error = format!("retryable_http_{}", status);
                if attempt < self.max_retries {
                    let delay = backoff_delay(attempt);
                    debug!("1inch HTTP {} ({}), retrying in {:?}", status, attempt + 1, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
                break;
            }

            if !resp.status().is_success() {
                warn!("1inch quote rejected with HTTP {}", status);
                return QuoteResult::failure(
                    token_in,
                    token_out,
                    amount_in,
                    meta_for(last_status),
                    format!("http_{}", status),
                );
            }

            let payload: serde_json::Value = match resp.json().await {
                Ok(v) => v,
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                    break;
                }
            };

            return match Self::extract_dst_amount(&payload) {
                None => QuoteResult::failure(
                    token_in,
                    token_out,
                    amount_in,
                    meta_for(last_status),
                    "missing_dst_amount",
                ),
                Some(Err(())) => QuoteResult::failure(
                    token_in,
                    token_out,
                    amount_in,
                    meta_for(last_status),
                    "invalid_dst_amount",
                ),
                Some(Ok(amount_out)) => {
                    let meta = QuoteMeta {
                        endpoint: Some(endpoint.clone()),
                        http_status: last_status,
                        protocols: payload.get("protocols").cloned(),
                        estimated_gas: payload
                            .get("estimatedGas")
                            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok())),
                        ..Default::default()
                    };
                    QuoteResult::success(token_in, token_out, amount_in, amount_out, meta)
                }
            };
        }

        warn!(
            "1inch quote {}->{} exhausted {} retries: {}",
            token_in, token_out, self.max_retries, last_error
        );
        QuoteResult::failure(token_in, token_out, amount_in, meta_for(last_status), last_error)
    }

    async fn shutdown(&self) {
        // reqwest pools close on drop; nothing to flush
        debug!("closing 1inch HTTP client");
    }
}
