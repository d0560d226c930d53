//! Poll-loop orchestration
//!
//! Each tick: expand the configured route universe, resolve the gas price
//! once, fan the (route, amount) grid out over a bounded number of
//! concurrent evaluations, persist every record, and print the top ranked
//! cycles. The loop survives any per-evaluation failure; only a bad config
//! stops it.

use console::style;
use eyre::Result;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::gas_oracle::GasOracle;
use crate::pipeline::{process_route, EvalStatus, RouteEvaluation};
use crate::quote::QuoteProvider;
use crate::routes::{enumerate_loops2, enumerate_triangles3, Route};
use crate::sink::JsonlSink;

/// The (route, probe amount) grid for one tick
pub fn build_work_items(cfg: &Config) -> Vec<(Route, f64)> {
    let mut routes = enumerate_loops2(cfg);
    routes.extend(enumerate_triangles3(cfg));

    let mut items = Vec::new();
    for route in routes {
        let amounts = match cfg.amounts.get(route.start_symbol()) {
            Some(a) if !a.is_empty() => a.clone(),
            _ => {
                warn!("no probe amounts configured for {}, skipping route", route.start_symbol());
                continue;
            }
        };
        for amount in amounts {
            items.push((route.clone(), amount));
        }
    }
    items
}

pub struct Orchestrator {
    cfg: Arc<Config>,
    provider: Arc<dyn QuoteProvider>,
    gas: GasOracle,
    sink: JsonlSink,
}

impl Orchestrator {
    pub fn new(cfg: Config, provider: Arc<dyn QuoteProvider>) -> Result<Self> {
        let gas = GasOracle::new(cfg.gas_price_gwei_override, cfg.rpc_url.clone());
        let sink = JsonlSink::new(&cfg.logs_dir)?;
        Ok(Self {
            cfg: Arc::new(cfg),
            provider,
            gas,
            sink,
        })
    }

    /// One full scan pass. Evaluation failures become error records; a gas
    /// price read failure skips the whole tick since nothing could be
    /// costed.
    pub async fn tick(&mut self) -> Result<()> {
        let items = build_work_items(&self.cfg);
        if items.is_empty() {
            warn!("route universe is empty, nothing to scan");
            return Ok(());
        }

        let gas_price_wei = match self.gas.gas_price_wei().await {
            Ok(wei) => wei,
            Err(e) => {
                error!("gas price unavailable, skipping tick: {}", e);
                return Ok(());
            }
        };

        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.cfg.max_concurrency));
        let mut handles = Vec::with_capacity(items.len());

        for (route, amount) in items {
            let permit = semaphore.clone().acquire_owned();
            let cfg = self.cfg.clone();
            let provider = self.provider.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit.await;
                process_route(provider.as_ref(), &cfg, gas_price_wei, &route, amount).await
            }));
        }

        let mut evals: Vec<RouteEvaluation> = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(eval) => evals.push(eval),
                Err(e) => error!("evaluation task panicked: {}", e),
            }
        }

        for eval in &evals {
            if let Err(e) = self.sink.write(eval) {
                error!("failed to persist evaluation: {}", e);
            }
        }

        let ok_count = evals.iter().filter(|e| e.status == EvalStatus::Ok).count();
        info!(
            "tick: {} evaluations ({} ok) in {:?} at gas {} wei",
            evals.len(),
            ok_count,
            started.elapsed(),
            gas_price_wei
        );
        self.print_top(&evals);
        Ok(())
    }

    fn print_top(&self, evals: &[RouteEvaluation]) {
        let mut ranked: Vec<&RouteEvaluation> =
            evals.iter().filter(|e| e.net_usd_est.is_some()).collect();
        ranked.sort_by(|a, b| {
            b.net_usd_est
                .partial_cmp(&a.net_usd_est)
                .unwrap_or(Ordering::Equal)
        });

        if ranked.is_empty() {
            println!("{}", style("  no fully-priced evaluations this tick").dim());
            return;
        }

        for (i, eval) in ranked.iter().take(self.cfg.top_n).enumerate() {
            let net = match eval.net_usd_est {
                Some(v) => v,
                None => continue,
            };
            let net_str = format!("{:+.4} USD", net);
            let net_styled = if net > 0.0 {
                style(net_str).green().bold()
            } else {
                style(net_str).dim()
            };
            println!(
                "  {:>2}. {} {} @ {} {} → {}",
                i + 1,
                eval.route_type,
                eval.route_symbols.join("→"),
                eval.amount_in_human,
                eval.route_symbols[0],
                net_styled
            );
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(
            "starting scan loop: {} source, every {}s",
            self.cfg.quote_source, self.cfg.loop_interval_sec
        );
        loop {
            if let Err(e) = self.tick().await {
                error!("tick failed: {}", e);
            }
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs_f64(self.cfg.loop_interval_sec)) => {}
            }
        }
        self.provider.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::minimal_toml;
    use crate::routes::RouteKind;

    #[test]
    fn work_items_cross_routes_with_amounts() {
        let cfg: Config = toml::from_str(minimal_toml()).unwrap();
        // one loop x two USDC amounts
        let items = build_work_items(&cfg);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|(r, _)| r.kind == RouteKind::Loop2));
        let amounts: Vec<f64> = items.iter().map(|(_, a)| *a).collect();
        assert_eq!(amounts, vec![10.0, 50.0]);
    }

    #[test]
    fn routes_without_amounts_are_skipped() {
        let mut cfg: Config = toml::from_str(minimal_toml()).unwrap();
        cfg.amounts.clear();
        assert!(build_work_items(&cfg).is_empty());
    }
}
