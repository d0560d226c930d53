//! Gas price source
//!
//! Either a configured gwei override or a live `eth_gasPrice` read. The
//! orchestrator resolves this once per tick; a failed live read is fatal to
//! that tick since no evaluation in it could price gas.

use eyre::{eyre, Result};
use tracing::{debug, warn};

/// Minimum sane gas price (wei) - below this the chain read is suspect
const MIN_SANE_WEI: u128 = 10_000_000; // 0.01 gwei

/// Maximum sane gas price (wei) - extreme congestion territory
const MAX_SANE_WEI: u128 = 1_000_000_000_000; // 1000 gwei

pub struct GasOracle {
    override_wei: Option<u128>,
    rpc_url: String,
}

impl GasOracle {
    pub fn new(gas_price_gwei_override: Option<f64>, rpc_url: String) -> Self {
        Self {
            override_wei: gas_price_gwei_override.map(|gwei| (gwei * 1e9) as u128),
            rpc_url,
        }
    }

    /// Current gas price in wei: the override if configured, otherwise a
    /// live RPC read. Out-of-range live readings are reported as-is - the
    /// record must reflect the chain - but logged loudly.
    pub async fn gas_price_wei(&self) -> Result<u128> {
        if let Some(wei) = self.override_wei {
            debug!("using gas price override: {} wei", wei);
            return Ok(wei);
        }

        let wei = self.fetch_from_rpc().await?;
        if !(MIN_SANE_WEI..=MAX_SANE_WEI).contains(&wei) {
            warn!("gas price {} wei outside sane range, recording anyway", wei);
        }
        Ok(wei)
    }

    async fn fetch_from_rpc(&self) -> Result<u128> {
        use alloy_provider::{Provider, ProviderBuilder};

        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);

        let gas_price_wei = provider
            .get_gas_price()
            .await
            .map_err(|e| eyre!("eth_gasPrice failed: {}", e))?;

        debug!("gas price from RPC: {} wei", gas_price_wei);
        Ok(gas_price_wei)
    }
}
