//! Route model and enumeration
//!
//! Routes are cyclic hop sequences over whitelisted tokens: a `loop2` on
//! (A,B) is A→B→A, a `triangle3` on (A,B,C) is A→B→C→A. They are pure
//! functions of configuration, recomputed every tick, and carry no identity
//! beyond a single tick's evaluation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::HashSet;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Loop2,
    Triangle3,
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteKind::Loop2 => write!(f, "loop2"),
            RouteKind::Triangle3 => write!(f, "triangle3"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub kind: RouteKind,
    /// The 2 or 3 distinct symbols; the closing hop back to the start is
    /// implied, see [`Route::route_symbols`].
    pub symbols: Vec<String>,
}

impl Route {
    pub fn start_symbol(&self) -> &str {
        &self.symbols[0]
    }

    /// Ordered (token_in, token_out) hop pairs closing the cycle
    pub fn hop_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.symbols.len());
        for i in 0..self.symbols.len() {
            let next = (i + 1) % self.symbols.len();
            pairs.push((self.symbols[i].clone(), self.symbols[next].clone()));
        }
        pairs
    }

    /// Closed symbol sequence for reporting, e.g. [A, B, A]
    pub fn route_symbols(&self) -> Vec<String> {
        let mut seq = self.symbols.clone();
        seq.push(self.symbols[0].clone());
        seq
    }
}

fn all_whitelisted(cfg: &Config, symbols: &[String]) -> bool {
    symbols.iter().all(|s| cfg.tokens.contains_key(s))
}

/// Expand configured 2-token loops; malformed or non-whitelisted entries
/// are skipped, not errors.
pub fn enumerate_loops2(cfg: &Config) -> Vec<Route> {
    let mut routes = Vec::new();
    for pair in &cfg.route_sets.loops2 {
        if pair.len() != 2 {
            continue;
        }
        if all_whitelisted(cfg, pair) {
            routes.push(Route {
                kind: RouteKind::Loop2,
                symbols: pair.clone(),
            });
        }
    }
    routes
}

/// Expand configured triangles, applying the path enumeration rules:
/// whitelist filter, per-base-token cap, and sorted-symbol dedup.
pub fn enumerate_triangles3(cfg: &Config) -> Vec<Route> {
    let rules = &cfg.path_enum_rules;
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut per_base: HashMap<String, usize> = HashMap::new();
    let mut routes = Vec::new();

    for tri in &cfg.route_sets.triangles3 {
        if tri.len() != 3 {
            continue;
        }
        if rules.triangle_only_if_all_tokens_whitelisted && !all_whitelisted(cfg, tri) {
            continue;
        }

        // cap is charged against the starting token, checked before dedup
        let base = &tri[0];
        if per_base.get(base).copied().unwrap_or(0) >= rules.max_triangles_per_base_token {
            continue;
        }

        let key = if rules.dedup_by_sorted_symbols {
            let mut sorted = tri.clone();
            sorted.sort();
            sorted
        } else {
            tri.clone()
        };
        if !seen.insert(key) {
            continue;
        }

        *per_base.entry(base.clone()).or_insert(0) += 1;
        routes.push(Route {
            kind: RouteKind::Triangle3,
            symbols: tri.clone(),
        });
    }

    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::minimal_toml;

    fn cfg_with_triangles(triangles: &[[&str; 3]]) -> Config {
        let mut cfg: Config = toml::from_str(minimal_toml()).unwrap();
        cfg.tokens.insert(
            "DAI".to_string(),
            crate::config::TokenConfig {
                symbol: "DAI".into(),
                address: "0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb".into(),
                decimals: 18,
                is_stable: true,
                static_price_usd: None,
            },
        );
        cfg.route_sets.triangles3 = triangles
            .iter()
            .map(|t| t.iter().map(|s| s.to_string()).collect())
            .collect();
        cfg
    }

    #[test]
    fn loop_expands_to_closed_cycle() {
        let cfg: Config = toml::from_str(minimal_toml()).unwrap();
        let loops = enumerate_loops2(&cfg);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].route_symbols(), vec!["USDC", "WETH", "USDC"]);
        assert_eq!(
            loops[0].hop_pairs(),
            vec![
                ("USDC".to_string(), "WETH".to_string()),
                ("WETH".to_string(), "USDC".to_string())
            ]
        );
    }

    #[test]
    fn non_whitelisted_loop_dropped() {
        let mut cfg: Config = toml::from_str(minimal_toml()).unwrap();
        cfg.route_sets.loops2.push(vec!["USDC".into(), "SHADY".into()]);
        assert_eq!(enumerate_loops2(&cfg).len(), 1);
    }

    #[test]
    fn triangle_hops_close_the_cycle() {
        let cfg = cfg_with_triangles(&[["USDC", "WETH", "DAI"]]);
        let tris = enumerate_triangles3(&cfg);
        assert_eq!(tris.len(), 1);
        assert_eq!(tris[0].route_symbols(), vec!["USDC", "WETH", "DAI", "USDC"]);
        assert_eq!(tris[0].hop_pairs().len(), 3);
    }

    #[test]
    fn sorted_symbol_dedup() {
        // same symbol set in a different rotation is a duplicate
        let cfg = cfg_with_triangles(&[["USDC", "WETH", "DAI"], ["WETH", "DAI", "USDC"]]);
        assert_eq!(enumerate_triangles3(&cfg).len(), 1);
    }

    #[test]
    fn dedup_can_be_disabled() {
        let mut cfg = cfg_with_triangles(&[["USDC", "WETH", "DAI"], ["WETH", "DAI", "USDC"]]);
        cfg.path_enum_rules.dedup_by_sorted_symbols = false;
        assert_eq!(enumerate_triangles3(&cfg).len(), 2);
    }

    #[test]
    fn per_base_token_cap_enforced() {
        let mut cfg = cfg_with_triangles(&[["USDC", "WETH", "DAI"], ["USDC", "DAI", "WETH"]]);
        cfg.path_enum_rules.max_triangles_per_base_token = 1;
        cfg.path_enum_rules.dedup_by_sorted_symbols = false;
        assert_eq!(enumerate_triangles3(&cfg).len(), 1);
    }

    #[test]
    fn malformed_lengths_skipped() {
        let mut cfg: Config = toml::from_str(minimal_toml()).unwrap();
        cfg.route_sets.loops2.push(vec!["USDC".into()]);
        cfg.route_sets.triangles3.push(vec!["USDC".into(), "WETH".into()]);
        assert_eq!(enumerate_loops2(&cfg).len(), 1);
        assert!(enumerate_triangles3(&cfg).is_empty());
    }
}
