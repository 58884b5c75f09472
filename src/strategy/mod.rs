//! Strategy Lifecycle
//! Mission: Start, stop and restart the worker fleet as one unit
//! Philosophy: One async lock serializes every control request; one
//! cancellation scope per run, derived from process shutdown, so a manual
//! stop and a ctrl-c cancel the same thing

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::exchange::ExchangeClient;
use crate::worker::{ArbitrageWorker, WorkerHandle};

/// Upper bound on waiting for a worker to finish its terminate path.
pub const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds and launches one [`ArbitrageWorker`] per configured cycle.
pub struct TriangularStrategy {
    client: Arc<dyn ExchangeClient>,
    workers: Vec<WorkerConfig>,
}

impl TriangularStrategy {
    pub fn new(client: Arc<dyn ExchangeClient>, workers: Vec<WorkerConfig>) -> Self {
        Self { client, workers }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Spawn every worker on the given run token. Fresh workers each run:
    /// a worker that failed initialization is rebuilt, not resumed.
    fn launch(&self, token: &CancellationToken) -> (Vec<WorkerHandle>, Vec<JoinHandle<()>>) {
        let mut handles = Vec::with_capacity(self.workers.len());
        let mut tasks = Vec::with_capacity(self.workers.len());
        for config in &self.workers {
            let worker = ArbitrageWorker::new(config.clone(), Arc::clone(&self.client));
            handles.push(worker.handle());
            tasks.push(tokio::spawn(worker.execute(token.clone())));
        }
        (handles, tasks)
    }
}

/// One live run of the strategy.
struct Run {
    token: CancellationToken,
    handles: Vec<WorkerHandle>,
    tasks: Vec<JoinHandle<()>>,
}

/// Top-level lifecycle controller.
///
/// `start`/`stop`/`restart` are idempotent and applied one at a time in
/// arrival order under a single async lock, so a manual stop racing the
/// initial startup cannot interleave with it.
pub struct StrategyController {
    strategy: TriangularStrategy,
    shutdown: CancellationToken,
    run: Mutex<Option<Run>>,
}

impl StrategyController {
    pub fn new(strategy: TriangularStrategy, shutdown: CancellationToken) -> Self {
        Self {
            strategy,
            shutdown,
            run: Mutex::new(None),
        }
    }

    /// Start the strategy. No-op if already running or shutdown began.
    pub async fn start_strategy(&self) {
        let mut run = self.run.lock().await;
        self.start_locked(&mut run);
    }

    /// Stop the strategy. No-op if not running.
    pub async fn stop_strategy(&self) {
        let mut run = self.run.lock().await;
        let Some(current) = run.take() else {
            debug!("stop requested but strategy is not running");
            return;
        };
        Self::halt(current).await;
    }

    /// Stop (if running) and start again with freshly built workers, as one
    /// serialized control request.
    pub async fn restart_strategy(&self) {
        let mut run = self.run.lock().await;
        if let Some(current) = run.take() {
            Self::halt(current).await;
        }
        self.start_locked(&mut run);
    }

    /// Human-readable per-worker status, one line per worker.
    pub async fn status(&self) -> String {
        let run = self.run.lock().await;
        match run.as_ref() {
            Some(current) => current
                .handles
                .iter()
                .map(|h| h.state_line())
                .collect::<Vec<_>>()
                .join("\n"),
            None => "strategy stopped".to_string(),
        }
    }

    /// The initial run: start, hold until process shutdown, then stop.
    pub async fn run_until_shutdown(&self) {
        self.start_strategy().await;
        self.shutdown.cancelled().await;
        self.stop_strategy().await;
    }

    fn start_locked(&self, run: &mut Option<Run>) {
        if run.is_some() {
            debug!("start requested but strategy is already running");
            return;
        }
        if self.shutdown.is_cancelled() {
            warn!("start refused, shutdown in progress");
            return;
        }

        // Child of the process token: ctrl-c and a manual stop cancel the
        // same scope.
        let token = self.shutdown.child_token();
        let (handles, tasks) = self.strategy.launch(&token);
        info!(workers = handles.len(), "strategy_started");
        *run = Some(Run {
            token,
            handles,
            tasks,
        });
    }

    /// Cancel the run scope and join every worker, each under a timeout so
    /// a stuck terminate path cannot wedge the control surface.
    async fn halt(run: Run) {
        run.token.cancel();
        for task in run.tasks {
            match timeout(TERMINATE_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "worker_task_failed"),
                Err(_) => warn!("worker_terminate_timeout"),
            }
        }
        info!("strategy_stopped");
    }
}
