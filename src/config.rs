//! Scanner configuration
//!
//! The whole scan surface lives in one TOML file: token whitelist, route
//! sets, probe amounts, backend connection parameters, and the sanity /
//! pricing policy knobs. Configuration errors fail fast at startup - the
//! poll loop never starts on a bad config.

use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::Path;

// ============================================
// QUOTE BACKEND
// ============================================

/// Which quote backend prices the hops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSource {
    /// 1inch aggregator REST API
    Oneinch,

    /// On-chain Uniswap V3 factory + quoter contracts
    Uniswap,
}

impl std::fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteSource::Oneinch => write!(f, "oneinch"),
            QuoteSource::Uniswap => write!(f, "uniswap"),
        }
    }
}

// ============================================
// SUB-SECTIONS
// ============================================

/// One whitelisted token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
    pub is_stable: bool,
    #[serde(default)]
    pub static_price_usd: Option<f64>,
}

/// Configured route definitions, expanded each tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteSets {
    #[serde(default)]
    pub loops2: Vec<Vec<String>>,
    #[serde(default)]
    pub triangles3: Vec<Vec<String>>,
}

/// Gas units charged per route kind when estimating cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasUnitsEstimate {
    pub loop2: u64,
    pub triangle3: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathEnumRules {
    #[serde(default = "default_true")]
    pub triangle_only_if_all_tokens_whitelisted: bool,
    #[serde(default = "default_max_triangles")]
    pub max_triangles_per_base_token: usize,
    #[serde(default = "default_true")]
    pub dedup_by_sorted_symbols: bool,
}

impl Default for PathEnumRules {
    fn default() -> Self {
        Self {
            triangle_only_if_all_tokens_whitelisted: true,
            max_triangles_per_base_token: default_max_triangles(),
            dedup_by_sorted_symbols: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneinchConfig {
    #[serde(default = "default_oneinch_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_oneinch_timeout")]
    pub timeout_sec: f64,
    #[serde(default = "default_oneinch_retries")]
    pub max_retries: u32,
}

impl Default for OneinchConfig {
    fn default() -> Self {
        Self {
            base_url: default_oneinch_base_url(),
            api_key: String::new(),
            timeout_sec: default_oneinch_timeout(),
            max_retries: default_oneinch_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniswapConfig {
    #[serde(default)]
    pub factory_address: String,
    #[serde(default)]
    pub quoter_v2_address: String,
    #[serde(default)]
    pub quoter_address: String,
    #[serde(default = "default_true")]
    pub check_pool_state: bool,
}

/// How a token's USD value is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    /// Static override table only
    Static,
    /// Live quote against the configured stable asset
    Infer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_price_mode")]
    pub token_price_mode: PriceMode,
    #[serde(default)]
    pub static_prices: HashMap<String, f64>,
    #[serde(default)]
    pub eth_usd_static: Option<f64>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            token_price_mode: PriceMode::Infer,
            static_prices: HashMap::new(),
            eth_usd_static: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_jump_ratio")]
    pub max_jump_ratio: f64,
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_jump_ratio: default_max_jump_ratio(),
        }
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    pub rpc_url: String,
    pub chain_id: u64,

    // ========== Quote Backend ==========
    pub quote_source: QuoteSource,

    /// Token whitelist keyed by symbol. BTreeMap keeps stable-asset lookup
    /// deterministic when several stables are configured.
    pub tokens: BTreeMap<String, TokenConfig>,

    // ========== Route Universe ==========
    pub route_sets: RouteSets,

    /// Probe amounts (human units) per starting symbol
    pub amounts: HashMap<String, Vec<f64>>,

    #[serde(default)]
    pub path_enum_rules: PathEnumRules,

    // ========== Output ==========
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    // ========== Polling ==========
    pub loop_interval_sec: f64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    // ========== Cost Model ==========
    pub slippage_bps_buffer: u32,
    pub gas_units_estimate: GasUnitsEstimate,
    #[serde(default)]
    pub gas_price_gwei_override: Option<f64>,

    // ========== Liquidity Policy ==========
    #[serde(default)]
    pub min_pool_liquidity_usd: Option<f64>,

    // ========== Backend Connection ==========
    #[serde(default)]
    pub oneinch: OneinchConfig,
    #[serde(default)]
    pub uniswap: UniswapConfig,

    // ========== Pricing / Sanity Policy ==========
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub sanity: SanityConfig,
}

fn default_true() -> bool {
    true
}

fn default_max_triangles() -> usize {
    50
}

fn default_oneinch_base_url() -> String {
    "https://api.1inch.dev/swap/v6.0".to_string()
}

fn default_oneinch_timeout() -> f64 {
    8.0
}

fn default_oneinch_retries() -> u32 {
    4
}

fn default_price_mode() -> PriceMode {
    PriceMode::Infer
}

fn default_max_jump_ratio() -> f64 {
    1000.0
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

fn default_max_concurrency() -> usize {
    8
}

fn default_top_n() -> usize {
    10
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment overrides after loading `.env`.
    ///
    /// `RPC_URL` and `ONEINCH_API_KEY` win over the file, so secrets can be
    /// kept out of checked-in configs.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("RPC_URL") {
            if !url.is_empty() {
                self.rpc_url = url;
            }
        }
        if let Ok(key) = env::var("ONEINCH_API_KEY") {
            if !key.is_empty() {
                self.oneinch.api_key = key;
            }
        }
    }

    /// Validate configuration before starting the poll loop
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre!("rpc_url must be set to a real RPC endpoint"));
        }
        if self.tokens.is_empty() {
            return Err(eyre!("tokens must be a non-empty table"));
        }
        for (symbol, token) in &self.tokens {
            if token.address.is_empty() {
                return Err(eyre!("token {} has an empty address", symbol));
            }
            if token.symbol != *symbol {
                return Err(eyre!(
                    "token key {} does not match its symbol field {}",
                    symbol,
                    token.symbol
                ));
            }
        }
        if self.max_concurrency == 0 {
            return Err(eyre!("max_concurrency must be at least 1"));
        }
        if self.loop_interval_sec <= 0.0 {
            return Err(eyre!("loop_interval_sec must be positive"));
        }
        if self.quote_source == QuoteSource::Uniswap
            && (self.uniswap.factory_address.is_empty()
                || self.uniswap.quoter_v2_address.is_empty()
                || self.uniswap.quoter_address.is_empty())
        {
            return Err(eyre!(
                "uniswap backend requires factory_address, quoter_v2_address and quoter_address"
            ));
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              CYCLESCAN - CONFIGURATION                     ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain ID:          {:^40} ║", self.chain_id);
        println!("║ Quote Source:      {:^40} ║", self.quote_source.to_string());
        println!("║ Tokens:            {:^40} ║", self.tokens.len());
        println!(
            "║ Routes:            {:^40} ║",
            format!(
                "{} loops / {} triangles",
                self.route_sets.loops2.len(),
                self.route_sets.triangles3.len()
            )
        );
        println!(
            "║ Interval:          {:^40} ║",
            format!("{}s", self.loop_interval_sec)
        );
        println!("║ Concurrency:       {:^40} ║", self.max_concurrency);
        println!(
            "║ Buffer:            {:^40} ║",
            format!("{} bps", self.slippage_bps_buffer)
        );
        println!(
            "║ Gas Override:      {:^40} ║",
            match self.gas_price_gwei_override {
                Some(g) => format!("{} gwei", g),
                None => "live eth_gasPrice".to_string(),
            }
        );
        println!(
            "║ Sanity Check:      {:^40} ║",
            if self.sanity.enabled {
                format!("on (max jump {}x)", self.sanity.max_jump_ratio)
            } else {
                "off".to_string()
            }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn minimal_toml() -> &'static str {
        r#"
            rpc_url = "https://rpc.example.org"
            chain_id = 8453
            quote_source = "oneinch"
            loop_interval_sec = 2.0
            slippage_bps_buffer = 10

            [tokens.USDC]
            symbol = "USDC"
            address = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
            decimals = 6
            is_stable = true

            [tokens.WETH]
            symbol = "WETH"
            address = "0x4200000000000000000000000000000000000006"
            decimals = 18
            is_stable = false

            [route_sets]
            loops2 = [["USDC", "WETH"]]
            triangles3 = []

            [amounts]
            USDC = [10.0, 50.0]

            [gas_units_estimate]
            loop2 = 180000
            triangle3 = 260000
        "#
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let cfg: Config = toml::from_str(minimal_toml()).unwrap();
        assert!(cfg.validate().is_ok());

        assert_eq!(cfg.max_concurrency, 8);
        assert_eq!(cfg.top_n, 10);
        assert_eq!(cfg.oneinch.max_retries, 4);
        assert_eq!(cfg.pricing.token_price_mode, PriceMode::Infer);
        assert!(cfg.sanity.enabled);
        assert_eq!(cfg.sanity.max_jump_ratio, 1000.0);
        assert_eq!(cfg.path_enum_rules.max_triangles_per_base_token, 50);
        assert_eq!(cfg.logs_dir, "logs");
        assert!(cfg.gas_price_gwei_override.is_none());
        assert!(cfg.min_pool_liquidity_usd.is_none());
    }

    #[test]
    fn missing_required_section_is_an_error() {
        let broken = minimal_toml().replace("[gas_units_estimate]", "[gas_units_wrong]");
        assert!(toml::from_str::<Config>(&broken).is_err());
    }

    #[test]
    fn uniswap_backend_requires_contract_addresses() {
        let mut cfg: Config = toml::from_str(minimal_toml()).unwrap();
        cfg.quote_source = QuoteSource::Uniswap;
        assert!(cfg.validate().is_err());

        cfg.uniswap.factory_address = "0x1F98431c8aD98523631AE4a59f267346ea31F984".into();
        cfg.uniswap.quoter_v2_address = "0x61fFE014bA17989E743c5F6cB21bF9697530B21e".into();
        cfg.uniswap.quoter_address = "0xb27308f9F90D607463bb33eA1BeBb41C27CE5AB6".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_token_table_rejected() {
        let mut cfg: Config = toml::from_str(minimal_toml()).unwrap();
        cfg.tokens.clear();
        assert!(cfg.validate().is_err());
    }
}
