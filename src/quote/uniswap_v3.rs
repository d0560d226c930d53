//! Uniswap V3 quote backend
//!
//! Prices a hop on-chain: resolve the pool per fee tier through the factory,
//! optionally inspect pool state and liquidity, then simulate the swap via
//! the QuoterV2 contract with the legacy Quoter as fallback. The tier with
//! the largest non-zero output wins.

use alloy_primitives::{aliases::U24, Address, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

use crate::config::{Config, TokenConfig};
use crate::quote::{PoolChecks, QuoteMeta, QuoteProvider, QuoteResult};

/// Fee tiers probed per pair: 0.05%, 0.3%, 1%
const FEE_TIERS: [u32; 3] = [500, 3000, 10_000];

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    interface IUniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee)
            external view returns (address pool);
    }

    interface IUniswapV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96, int24 tick, uint16 observationIndex,
            uint16 observationCardinality, uint16 observationCardinalityNext,
            uint8 feeProtocol, bool unlocked
        );
        function liquidity() external view returns (uint128);
    }

    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (
                uint256 amountOut,
                uint160 sqrtPriceX96After,
                uint32 initializedTicksCrossed,
                uint256 gasEstimate
            );
    }

    /// Legacy single-return quoter, kept as fallback
    interface IQuoter {
        function quoteExactInputSingle(
            address tokenIn, address tokenOut, uint24 fee,
            uint256 amountIn, uint160 sqrtPriceLimitX96
        ) external returns (uint256 amountOut);
    }
}

/// One fee tier's attempt, before best-tier selection
struct TierAttempt {
    amount_out: U256,
    pool: Option<Address>,
    checks: PoolChecks,
    quoter_used: Option<&'static str>,
    estimated_gas: Option<u64>,
    error: Option<String>,
}

impl TierAttempt {
    fn failed(pool: Option<Address>, checks: PoolChecks, error: impl Into<String>) -> Self {
        Self {
            amount_out: U256::ZERO,
            pool,
            checks,
            quoter_used: None,
            estimated_gas: None,
            error: Some(error.into()),
        }
    }
}

pub struct UniswapV3QuoteProvider {
    rpc_url: String,
    tokens: BTreeMap<String, TokenConfig>,
    factory: Address,
    quoter_v2: Address,
    quoter: Address,
    check_pool_state: bool,
    min_pool_liquidity: Option<u128>,
}

impl UniswapV3QuoteProvider {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            rpc_url: cfg.rpc_url.clone(),
            tokens: cfg.tokens.clone(),
            factory: Address::from_str(&cfg.uniswap.factory_address)
                .map_err(|e| eyre!("bad factory address: {}", e))?,
            quoter_v2: Address::from_str(&cfg.uniswap.quoter_v2_address)
                .map_err(|e| eyre!("bad quoter_v2 address: {}", e))?,
            quoter: Address::from_str(&cfg.uniswap.quoter_address)
                .map_err(|e| eyre!("bad quoter address: {}", e))?,
            check_pool_state: cfg.uniswap.check_pool_state,
            min_pool_liquidity: cfg.min_pool_liquidity_usd.map(|v| v as u128),
        })
    }

    async fn call_contract(&self, to: Address, calldata: Vec<u8>) -> Result<Vec<u8>> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);

        let tx = TransactionRequest::default().to(to).input(calldata.into());

        let result = provider
            .call(tx)
            .await
            .map_err(|e| eyre!("eth_call failed: {}", e))?;

        Ok(result.to_vec())
    }

    async fn get_pool(&self, token_a: Address, token_b: Address, fee: u32) -> Result<Address> {
        let calldata = IUniswapV3Factory::getPoolCall {
            tokenA: token_a,
            tokenB: token_b,
            fee: U24::try_from(fee).unwrap_or(U24::ZERO),
        }
        .abi_encode();

        let output = self.call_contract(self.factory, calldata).await?;
        IUniswapV3Factory::getPoolCall::abi_decode_returns(&output)
            .map_err(|e| eyre!("failed to decode getPool: {}", e))
    }

    /// Read slot0 + liquidity; either read failing marks the state incomplete
    async fn pool_state(&self, pool: Address) -> (bool, Option<u128>) {
        let slot0_ok = match self.call_contract(pool, IUniswapV3Pool::slot0Call {}.abi_encode()).await
        {
            Ok(output) => IUniswapV3Pool::slot0Call::abi_decode_returns(&output).is_ok(),
            Err(_) => false,
        };

        let liquidity = match self
            .call_contract(pool, IUniswapV3Pool::liquidityCall {}.abi_encode())
            .await
        {
            Ok(output) => IUniswapV3Pool::liquidityCall::abi_decode_returns(&output).ok(),
            Err(_) => None,
        };

        (slot0_ok, liquidity)
    }

    async fn quote_one_tier(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
    ) -> TierAttempt {
        let pool = match self.get_pool(token_in, token_out, fee).await {
            Ok(p) => p,
            Err(e) => {
                return TierAttempt::failed(None, PoolChecks::default(), e.to_string());
            }
        };
        if pool == Address::ZERO {
            return TierAttempt::failed(
                None,
                PoolChecks {
                    exists: false,
                    ..Default::default()
                },
                "pool_not_found",
            );
        }

        let mut checks = PoolChecks {
            exists: true,
            ..Default::default()
        };
        if self.check_pool_state {
            let (slot0_ok, liquidity) = self.pool_state(pool).await;
            checks.slot0_ok = slot0_ok;
            checks.liquidity = liquidity;
            checks.incomplete_pool_state = !slot0_ok || liquidity.is_none();
        }

        if let (Some(min), Some(liq)) = (self.min_pool_liquidity, checks.liquidity) {
            if liq < min {
                debug!("pool {:?} tier {} below liquidity floor ({} < {})", pool, fee, liq, min);
                return TierAttempt::failed(Some(pool), checks, "low_liquidity");
            }
        }

        // primary: QuoterV2 simulated call
        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amountIn: amount_in,
            fee: U24::try_from(fee).unwrap_or(U24::ZERO),
            sqrtPriceLimitX96: alloy_primitives::Uint::<160, 3>::ZERO,
        };
        let calldata = IQuoterV2::quoteExactInputSingleCall { params }.abi_encode();

        let v2_error = match self.call_contract(self.quoter_v2, calldata).await {
            Ok(output) => match IQuoterV2::quoteExactInputSingleCall::abi_decode_returns(&output) {
                Ok(decoded) => {
                    return TierAttempt {
                        amount_out: decoded.amountOut,
                        pool: Some(pool),
                        checks,
                        quoter_used: Some("QuoterV2"),
                        estimated_gas: Some(decoded.gasEstimate.to::<u64>()),
                        error: None,
                    };
                }
                Err(e) => e.to_string(),
            },
            // the quoter reverts when the swap itself would fail
            Err(e) => e.to_string(),
        };

        // fallback: legacy quoter, single return value
        debug!("QuoterV2 failed on tier {} ({}), trying legacy quoter", fee, v2_error);
        let calldata = IQuoter::quoteExactInputSingleCall {
            tokenIn: token_in,
            tokenOut: token_out,
            fee: U24::try_from(fee).unwrap_or(U24::ZERO),
            amountIn: amount_in,
            sqrtPriceLimitX96: alloy_primitives::Uint::<160, 3>::ZERO,
        }
        .abi_encode();

        match self.call_contract(self.quoter, calldata).await {
            Ok(output) => match IQuoter::quoteExactInputSingleCall::abi_decode_returns(&output) {
                Ok(amount_out) => TierAttempt {
                    amount_out,
                    pool: Some(pool),
                    checks,
                    quoter_used: Some("Quoter"),
                    estimated_gas: None,
                    error: None,
                },
                Err(e) => TierAttempt::failed(Some(pool), checks, e.to_string()),
            },
            Err(e) => TierAttempt::failed(Some(pool), checks, e.to_string()),
        }
    }
}

#[async_trait]
impl QuoteProvider for UniswapV3QuoteProvider {
    async fn quote(&self, token_in: &str, token_out: &str, amount_in: U256) -> QuoteResult {
        let (addr_in, addr_out) = match (self.tokens.get(token_in), self.tokens.get(token_out)) {
            (Some(a), Some(b)) => match (Address::from_str(&a.address), Address::from_str(&b.address))
            {
                (Ok(a), Ok(b)) => (a, b),
                _ => {
                    return QuoteResult::failure(
                        token_in,
                        token_out,
                        amount_in,
                        QuoteMeta::default(),
                        "invalid_token_address",
                    )
                }
            },
            _ => {
                return QuoteResult::failure(
                    token_in,
                    token_out,
                    amount_in,
                    QuoteMeta::default(),
                    "unknown_token",
                )
            }
        };

        let mut best_out = U256::ZERO;
        let mut best_meta = QuoteMeta::default();
        let mut last_error: Option<String> = None;

        for fee in FEE_TIERS {
            let attempt = self.quote_one_tier(addr_in, addr_out, amount_in, fee).await;

            if attempt.amount_out > best_out {
                best_out = attempt.amount_out;
                best_meta = QuoteMeta {
                    fee_tier_used: Some(fee),
                    pool_address: attempt.pool.map(|p| format!("{:?}", p)),
                    quoter_used: attempt.quoter_used,
                    estimated_gas: attempt.estimated_gas,
                    pool_checks: Some(attempt.checks),
                    ..Default::default()
                };
            } else if let Some(err) = attempt.error {
                last_error = Some(err);
            }
        }

        if best_out > U256::ZERO {
            QuoteResult::success(token_in, token_out, amount_in, best_out, best_meta)
        } else {
            QuoteResult::failure(
                token_in,
                token_out,
                amount_in,
                best_meta,
                last_error.unwrap_or_else(|| "no_viable_fee_tier".to_string()),
            )
        }
    }

    async fn shutdown(&self) {
        // providers are built per call; nothing held open
        debug!("uniswap v3 backend shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_tiers_cover_standard_pools() {
        assert_eq!(FEE_TIERS, [500, 3000, 10_000]);
    }

    #[test]
    fn quoter_v2_params_encode_in_contract_order() {
        // tokenIn, tokenOut, amountIn, fee, sqrtPriceLimitX96 - the deployed
        // struct layout, not the ABI-doc ordering some SDKs use
        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: Address::repeat_byte(0x11),
            tokenOut: Address::repeat_byte(0x22),
            amountIn: U256::from(1_000u64),
            fee: U24::try_from(3000u32).unwrap(),
            sqrtPriceLimitX96: alloy_primitives::Uint::<160, 3>::ZERO,
        };
        let encoded = IQuoterV2::quoteExactInputSingleCall { params }.abi_encode();
        // selector + 5 words
        assert_eq!(encoded.len(), 4 + 5 * 32);
    }

    #[test]
    fn provider_construction_rejects_bad_addresses() {
        let mut cfg: Config = toml::from_str(crate::config::tests::minimal_toml()).unwrap();
        cfg.uniswap.factory_address = "not-an-address".into();
        cfg.uniswap.quoter_v2_address = "0x61fFE014bA17989E743c5F6cB21bF9697530B21e".into();
        cfg.uniswap.quoter_address = "0xb27308f9F90D607463bb33eA1BeBb41C27CE5AB6".into();
        assert!(UniswapV3QuoteProvider::new(&cfg).is_err());
    }
}
