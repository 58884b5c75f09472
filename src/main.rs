//! Triarb Bot Binary
//! Mission: Wire config, client and controller together and run until ctrl-c
//! Philosophy: The binary ships with a paper client; plugging in a live
//! venue is a one-line swap behind the ExchangeClient trait

use anyhow::{ensure, Context, Result};
use clap::Parser;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use triarb::config::{Config, WorkersFile};
use triarb::exchange::paper::PaperExchange;
use triarb::exchange::{BookTicker, Precision, Symbol};
use triarb::strategy::{StrategyController, TriangularStrategy};

#[derive(Parser, Debug)]
#[command(name = "triarb", about = "Triangular arbitrage engine")]
struct Args {
    /// Path to the workers TOML file (overrides TRIARB_WORKERS_FILE).
    #[arg(long)]
    workers_file: Option<String>,
}

/// Seed the paper client with a flat book for every configured pair so the
/// engine initializes and idles (flat prices never produce positive spread).
fn seed_paper(paper: &PaperExchange, workers: &[triarb::config::WorkerConfig]) -> Result<()> {
    for worker in workers {
        for pair in &worker.pairs {
            let symbol = Symbol::parse(pair)?;
            paper.seed_ticker(
                &symbol.name,
                BookTicker::new(dec!(1), dec!(1), dec!(1), dec!(1)),
            );
            paper.seed_precision(
                &symbol.name,
                Precision {
                    base_dp: 8,
                    quote_dp: 8,
                },
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TRIARB_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let workers_file = args.workers_file.unwrap_or(config.workers_file);
    let file = WorkersFile::load(&workers_file)?;
    let workers = file.resolve();
    ensure!(!workers.is_empty(), "no workers configured in {}", workers_file);

    let paper = Arc::new(PaperExchange::new());
    seed_paper(&paper, &workers)?;

    let strategy = TriangularStrategy::new(paper, workers);
    info!(workers = strategy.worker_count(), file = %workers_file, "triarb_starting");

    let shutdown = CancellationToken::new();
    let controller = Arc::new(StrategyController::new(strategy, shutdown.clone()));

    let runner = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run_until_shutdown().await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    info!("shutdown_signal_received");
    shutdown.cancel();

    runner.await.context("joining strategy runner")?;
    info!(status = %controller.status().await, "triarb_exited");
    Ok(())
}
