//! Farsight CLI — download, forecast, and job/cache inspection commands.
//!
//! Commands:
//! - `download` — fetch daily OHLCV from Yahoo Finance into the Parquet cache
//! - `import` — ingest a CSV file into the cache (offline fallback)
//! - `forecast` — submit a prediction job and poll it to completion
//! - `status` — print the stored projection of a job id
//! - `cache-status` — report which tickers are cached and their ranges

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use farsight_core::data::{import_csv, MarketDataProvider, PriceCache, YahooProvider};
use farsight_runner::{
    JobRequest, JobStatus, JsonJobStore, Orchestrator, PipelineConfig, StderrObserver,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "farsight",
    about = "Farsight CLI — multi-horizon price forecasting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download daily OHLCV history into the Parquet cache.
    Download {
        /// Tickers to download (e.g., SPY QQQ AAPL).
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Import a CSV file (date,open,high,low,close,volume) into the cache.
    Import {
        /// Path to the CSV file.
        #[arg(long)]
        file: PathBuf,

        /// Ticker to store the rows under.
        #[arg(long)]
        ticker: String,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Submit a prediction job and poll until it completes or fails.
    Forecast {
        /// Ticker symbol.
        #[arg(long)]
        ticker: String,

        /// Comma-separated horizon labels (1mo,6mo,1yr,2yr,3yr,4yr,5yr).
        #[arg(long, default_value = "1mo,1yr,5yr")]
        horizons: String,

        /// Path to a TOML pipeline config. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory for job documents. Defaults to ./jobs.
        #[arg(long, default_value = "jobs")]
        jobs_dir: PathBuf,

        /// Print the full job document as JSON instead of a summary table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the stored client projection of a job.
    Status {
        /// Job id returned by `forecast`.
        id: String,

        /// Directory for job documents. Defaults to ./jobs.
        #[arg(long, default_value = "jobs")]
        jobs_dir: PathBuf,
    },
    /// Report cached tickers, their date ranges, and row counts.
    CacheStatus {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Download { tickers, cache_dir } => download(&tickers, cache_dir),
        Commands::Import {
            file,
            ticker,
            cache_dir,
        } => {
            let cache = PriceCache::new(cache_dir);
            let count = import_csv(&file, &ticker.to_uppercase(), &cache)
                .with_context(|| format!("importing {}", file.display()))?;
            println!("Imported {count} rows for {}", ticker.to_uppercase());
            Ok(())
        }
        Commands::Forecast {
            ticker,
            horizons,
            config,
            jobs_dir,
            json,
        } => forecast(ticker, &horizons, config, jobs_dir, json),
        Commands::Status { id, jobs_dir } => status(&id, jobs_dir),
        Commands::CacheStatus { cache_dir } => cache_status(cache_dir),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(p) => {
            PipelineConfig::from_toml_file(&p).with_context(|| format!("loading {}", p.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn download(tickers: &[String], cache_dir: PathBuf) -> Result<()> {
    let cache = PriceCache::new(&cache_dir);
    let provider = YahooProvider::default();
    let today = chrono::Local::now().date_naive();
    let start = today - chrono::Duration::days(365 * 10);

    let total = tickers.len();
    let mut failed = 0usize;

    for (i, ticker) in tickers.iter().enumerate() {
        let ticker = ticker.to_uppercase();
        println!("[{}/{total}] Fetching {ticker}...", i + 1);
        match provider.fetch(&ticker, start, today) {
            Ok(bars) => match cache.write(&ticker, &bars) {
                Ok(()) => println!("  OK: {ticker} ({} bars)", bars.len()),
                Err(e) => {
                    println!("  FAIL: {ticker}: cache write failed: {e}");
                    failed += 1;
                }
            },
            Err(e) => {
                println!("  FAIL: {ticker}: {e}");
                failed += 1;
            }
        }
    }

    println!(
        "\nDownload complete: {}/{total} succeeded, {failed} failed",
        total - failed
    );
    if failed > 0 {
        bail!("{failed} download(s) failed");
    }
    Ok(())
}

fn forecast(
    ticker: String,
    horizons: &str,
    config_path: Option<PathBuf>,
    jobs_dir: PathBuf,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let cache = Arc::new(PriceCache::new(&config.data.cache_dir));
    let provider = Arc::new(YahooProvider::new(
        config.data.max_retries,
        Duration::from_millis(config.data.base_delay_ms),
    ));
    let store = Arc::new(JsonJobStore::new(&jobs_dir));

    let orchestrator = Orchestrator::new(
        store,
        provider,
        cache,
        config,
        Arc::new(StderrObserver),
    );

    let request = JobRequest {
        ticker,
        horizons: horizons.split(',').map(|s| s.trim().to_string()).collect(),
    };
    let id = orchestrator.submit(request)?;
    println!("Job {id} submitted, polling...");

    let view = orchestrator
        .poll_until_terminal(&id, Duration::from_secs(3600), Duration::from_millis(500))?
        .context("job record vanished while polling")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_summary(&view);
    }

    match view.status {
        JobStatus::Completed => Ok(()),
        status => bail!("job {id} ended in state {status:?}"),
    }
}

fn print_summary(view: &farsight_runner::JobView) {
    println!("\n{} — {:?}", view.ticker, view.status);
    if view.results.is_empty() {
        return;
    }
    println!(
        "{:<6} {:>12} {:>12} {:>12} {:>9} {:>7}  scenario (p10..p90)",
        "hrzn", "predicted", "lower", "upper", "chg %", "conf"
    );
    for fc in &view.results {
        let band = fc
            .monte_carlo
            .as_ref()
            .map(|b| format!("{:.2} .. {:.2}", b.p10, b.p90))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:>12.2} {:>12.2} {:>12.2} {:>8.2}% {:>7.3}  {band}",
            fc.horizon.label(),
            fc.predicted_price,
            fc.lower_bound,
            fc.upper_bound,
            fc.change_percent,
            fc.confidence,
        );
    }
}

fn status(id: &str, jobs_dir: PathBuf) -> Result<()> {
    use farsight_runner::JobStore;
    let store = JsonJobStore::new(jobs_dir);
    match store.get(id)? {
        Some(job) => {
            println!("{}", serde_json::to_string_pretty(&job.view())?);
            Ok(())
        }
        None => bail!("no job with id '{id}'"),
    }
}

fn cache_status(cache_dir: PathBuf) -> Result<()> {
    let cache = PriceCache::new(&cache_dir);
    let entries = match std::fs::read_dir(&cache_dir) {
        Ok(entries) => entries,
        Err(_) => {
            println!("Cache directory {} is empty", cache_dir.display());
            return Ok(());
        }
    };

    let mut found = false;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(ticker) = name.strip_prefix("ticker=") else {
            continue;
        };
        found = true;
        match cache.get_meta(ticker) {
            Some(meta) => println!(
                "{:<8} {} .. {}  ({} bars, cached {})",
                meta.ticker, meta.start_date, meta.end_date, meta.bar_count, meta.cached_at
            ),
            None => println!("{ticker:<8} (no metadata sidecar)"),
        }
    }

    if !found {
        println!("No cached tickers under {}", cache_dir.display());
    }
    Ok(())
}
