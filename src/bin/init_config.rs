//! Starter Config Generator
//!
//! Run with: cargo run --bin init-config -- --chain base --out config.toml
//!
//! Emits a ready-to-edit scanner configuration for a known chain preset
//! (tokens, routes, probe amounts, Uniswap V3 contract addresses). Refuses
//! to overwrite an existing file unless --force is given.

use clap::Parser;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "init-config", about = "Write a starter cyclescan config")]
struct Args {
    /// Chain preset: base or ethereum
    #[arg(short = 'n', long, default_value = "base")]
    chain: String,

    /// Output path for the TOML file
    #[arg(short, long, default_value = "config.toml")]
    out: String,

    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

struct TokenPreset {
    symbol: &'static str,
    address: &'static str,
    decimals: u8,
    is_stable: bool,
}

struct ChainPreset {
    name: &'static str,
    chain_id: u64,
    tokens: &'static [TokenPreset],
}

// Uniswap V3 deploys the same periphery addresses on both chains' mainnets
const UNISWAP_FACTORY: &str = "0x1F98431c8aD98523631AE4a59f267346ea31F984";
const UNISWAP_QUOTER_V2: &str = "0x61fFE014bA17989E743c5F6cB21bF9697530B21e";
const UNISWAP_QUOTER: &str = "0xb27308f9F90D607463bb33eA1BeBb41C27CE5AB6";

const BASE: ChainPreset = ChainPreset {
    name: "base",
    chain_id: 8453,
    tokens: &[
        TokenPreset {
            symbol: "USDC",
            address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            decimals: 6,
            is_stable: true,
        },
        TokenPreset {
            symbol: "WETH",
            address: "0x4200000000000000000000000000000000000006",
            decimals: 18,
            is_stable: false,
        },
        TokenPreset {
            symbol: "DAI",
            address: "0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb",
            decimals: 18,
            is_stable: true,
        },
    ],
};

const ETHEREUM: ChainPreset = ChainPreset {
    name: "ethereum",
    chain_id: 1,
    tokens: &[
        TokenPreset {
            symbol: "USDC",
            address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            decimals: 6,
            is_stable: true,
        },
        TokenPreset {
            symbol: "WETH",
            address: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            decimals: 18,
            is_stable: false,
        },
        TokenPreset {
            symbol: "DAI",
            address: "0x6B175474E89094C44Da98b954EedcdeCB5BE3830",
            decimals: 18,
            is_stable: true,
        },
    ],
};

fn render(preset: &ChainPreset) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        r#"# cyclescan starter configuration ({} preset)
# Set RPC_URL and ONEINCH_API_KEY in .env to override the values below.

rpc_url = "https://YOUR_RPC_ENDPOINT"
chain_id = {}
quote_source = "oneinch"

loop_interval_sec = 2.0
max_concurrency = 8
top_n = 10
logs_dir = "logs"

slippage_bps_buffer = 10
min_pool_liquidity_usd = 20000.0

"#,
        preset.name, preset.chain_id
    ));

    for t in preset.tokens {
        out.push_str(&format!(
            r#"[tokens.{sym}]
symbol = "{sym}"
address = "{addr}"
decimals = {dec}
is_stable = {stable}

"#,
            sym = t.symbol,
            addr = t.address,
            dec = t.decimals,
            stable = t.is_stable
        ));
    }

    out.push_str(
        r#"[route_sets]
loops2 = [["USDC", "WETH"], ["USDC", "DAI"]]
triangles3 = [["USDC", "WETH", "DAI"]]

[amounts]
USDC = [10.0, 20.0, 50.0]
DAI = [10.0, 50.0]

[gas_units_estimate]
loop2 = 180000
triangle3 = 260000

[oneinch]
# base_url = "https://api.1inch.dev/swap/v6.0"
api_key = ""
timeout_sec = 8.0
max_retries = 4

"#,
    );

    out.push_str(&format!(
        r#"[uniswap]
factory_address = "{factory}"
quoter_v2_address = "{quoter_v2}"
quoter_address = "{quoter}"
check_pool_state = true

[pricing]
token_price_mode = "infer"
eth_usd_static = 3000.0

[pricing.static_prices]
WETH = 3000.0

[sanity]
enabled = true
max_jump_ratio = 1000.0
"#,
        factory = UNISWAP_FACTORY,
        quoter_v2 = UNISWAP_QUOTER_V2,
        quoter = UNISWAP_QUOTER
    ));

    out
}

fn main() -> ExitCode {
    let args = Args::parse();

    let preset = match args.chain.as_str() {
        "base" => &BASE,
        "ethereum" => &ETHEREUM,
        other => {
            eprintln!("unknown chain preset '{}' (expected: base, ethereum)", other);
            return ExitCode::FAILURE;
        }
    };

    if Path::new(&args.out).exists() && !args.force {
        eprintln!("{} already exists, pass --force to overwrite", args.out);
        return ExitCode::FAILURE;
    }

    let content = render(preset);
    if let Err(e) = fs::write(&args.out, &content) {
        eprintln!("failed to write {}: {}", args.out, e);
        return ExitCode::FAILURE;
    }

    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║          CYCLESCAN CONFIG GENERATOR                        ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("✓ Wrote {} ({} preset, chain id {})", args.out, preset.name, preset.chain_id);
    println!();
    println!("Next steps:");
    println!("   1. Put your RPC endpoint in .env:       RPC_URL=...");
    println!("   2. Put your 1inch key in .env:          ONEINCH_API_KEY=...");
    println!("   3. Trim the token/route lists to taste");
    println!("   4. cargo run -- --config {}", args.out);
    println!();
    ExitCode::SUCCESS
}
