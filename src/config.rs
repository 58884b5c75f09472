//! Configuration
//! Mission: Environment entry point plus a TOML workers file. Strategy
//! defaults once, per-worker overrides where they differ

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

/// Process-level configuration, resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub workers_file: String,
}

impl Config {
    pub fn from_env() -> Config {
        dotenv::dotenv().ok();
        let workers_file =
            std::env::var("TRIARB_WORKERS_FILE").unwrap_or_else(|_| "./workers.toml".to_string());
        Config { workers_file }
    }
}

fn default_min_profitability() -> Decimal {
    dec!(0.002)
}

/// `[strategy]` section: defaults every worker inherits.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyDefaults {
    pub holding_asset: String,
    pub order_amount: Decimal,
    pub fee: Decimal,
    #[serde(default = "default_min_profitability")]
    pub min_profitability: Decimal,
}

/// One `[[worker]]` entry: a named cycle plus optional overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSpec {
    pub name: String,
    pub pairs: Vec<String>,
    pub holding_asset: Option<String>,
    pub order_amount: Option<Decimal>,
    pub fee: Option<Decimal>,
    pub min_profitability: Option<Decimal>,
}

/// Parsed workers file.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkersFile {
    pub strategy: StrategyDefaults,
    #[serde(default, rename = "worker")]
    pub workers: Vec<WorkerSpec>,
}

/// Fully resolved configuration for one worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub name: String,
    pub pairs: Vec<String>,
    pub holding_asset: String,
    pub order_amount: Decimal,
    pub fee: Decimal,
    pub min_profitability: Decimal,
}

impl WorkersFile {
    pub fn load(path: impl AsRef<Path>) -> Result<WorkersFile> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading workers file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing workers file {}", path.display()))
    }

    /// Merge strategy defaults into each worker spec.
    pub fn resolve(&self) -> Vec<WorkerConfig> {
        self.workers
            .iter()
            .map(|w| WorkerConfig {
                name: w.name.clone(),
                pairs: w.pairs.clone(),
                holding_asset: w
                    .holding_asset
                    .clone()
                    .unwrap_or_else(|| self.strategy.holding_asset.clone()),
                order_amount: w.order_amount.unwrap_or(self.strategy.order_amount),
                fee: w.fee.unwrap_or(self.strategy.fee),
                min_profitability: w
                    .min_profitability
                    .unwrap_or(self.strategy.min_profitability),
            })
            .collect()
    }
}
