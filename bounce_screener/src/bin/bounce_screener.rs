use std::path::PathBuf;

use anyhow::{Context, Result};
use bounce_screener::{
    Screener, ScreenerConfig,
    config::RuleName,
    report::{render_table, write_chart_payloads},
};
use clap::{Parser, ValueEnum};
use shared_utils::env::get_optional_env_var;
use tracing::info;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

const CONFIG_ENV_VAR: &str = "BOUNCE_SCREENER_CONFIG";

#[derive(Parser)]
#[command(
    version,
    about = "Find stocks bouncing off key moving averages (cash-secured put candidates)"
)]
struct Cli {
    /// TOML config file; falls back to $BOUNCE_SCREENER_CONFIG
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Comma-separated tickers (e.g. "AAPL,MSFT"); replaces the configured list
    #[arg(long, value_delimiter = ',')]
    tickers: Vec<String>,

    /// Text file with one ticker per line
    #[arg(long, value_name = "FILE")]
    tickers_file: Option<PathBuf>,

    /// Moving average to scan, in order (repeatable, e.g. --ma 50-SMA --ma 5-EMA)
    #[arg(long = "ma", value_name = "LABEL")]
    moving_averages: Vec<String>,

    /// Bounce rule
    #[arg(long, value_enum)]
    rule: Option<RuleArg>,

    /// Skip the implied volatility lookup
    #[arg(long)]
    no_iv: bool,

    /// Tickers screened in parallel
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write one chart JSON document per match into this directory
    #[arg(long, value_name = "DIR")]
    chart_dir: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleArg {
    Pierce,
    NearTouch,
}

impl From<RuleArg> for RuleName {
    fn from(rule: RuleArg) -> Self {
        match rule {
            RuleArg::Pierce => RuleName::Pierce,
            RuleArg::NearTouch => RuleName::NearTouch,
        }
    }
}

impl Cli {
    fn load_config(&self) -> Result<ScreenerConfig> {
        let path = self
            .config
            .clone()
            .or_else(|| get_optional_env_var(CONFIG_ENV_VAR).map(PathBuf::from));

        let mut config = match path {
            Some(path) => ScreenerConfig::load(&path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ScreenerConfig::default(),
        };

        if !self.tickers.is_empty() || self.tickers_file.is_some() {
            config.tickers = self.tickers.clone();
            config.tickers_file = self.tickers_file.clone();
        }
        if !self.moving_averages.is_empty() {
            config.moving_averages = self.moving_averages.clone();
        }
        if let Some(rule) = self.rule {
            config.rule = rule.into();
        }
        if self.no_iv {
            config.enrich_implied_volatility = false;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.load_config()?;
    let screener = Screener::alpaca(&config)?;

    let batch = screener
        .run(|progress| {
            info!(
                completed = progress.completed,
                total = progress.total,
                ticker = %progress.ticker,
                "processed"
            );
        })
        .await;

    print!("{}", render_table(&batch));

    if !batch.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &batch.warnings {
            eprintln!("  {warning}");
        }
    }

    if let Some(dir) = &cli.chart_dir {
        let written = write_chart_payloads(dir, &batch)
            .with_context(|| format!("writing charts to {}", dir.display()))?;
        info!(count = written.len(), dir = %dir.display(), "chart payloads written");
    }

    eprintln!(
        "\nSUMMARY: {} matched, {} without result, {} warnings",
        batch.instruments.len(),
        batch.skipped.len(),
        batch.warnings.len()
    );
    Ok(())
}
