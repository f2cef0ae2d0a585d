use crate::{
    config::ConversionConfig,
    debounce::EventDebouncer,
    engine::Transcoder,
    file_op::{event_to_ops, FsEvent},
    filter::PathClassifier,
    pipeline::{scan_tree, Reconciler},
    stats::{RunStatistics, ScanSummary},
};
use anyhow::{anyhow, Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch::Ref;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const SETTLED_CHANNEL_CAPACITY: usize = 256;

/// Public handle returned to callers for controlling a running mirror task.
#[derive(Debug)]
pub struct MirrorTaskHandle {
    cfg: ConversionConfig,
    ctrl_tx: mpsc::Sender<TaskCommand>,
    state_rx: watch::Receiver<TaskState>,
    stats: Arc<RunStatistics>,
    join: JoinHandle<()>,
}

impl MirrorTaskHandle {
    pub fn config(&self) -> &ConversionConfig {
        &self.cfg
    }

    /// Ask the task to stop. A conversion already running is allowed to finish.
    pub fn stop(&self) {
        let _ = self.ctrl_tx.try_send(TaskCommand::Stop);
    }

    pub fn state(&self) -> Ref<'_, TaskState> {
        self.state_rx.borrow()
    }

    /// Resolves on every state change; useful to wait for the initial scan.
    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state_rx.clone()
    }

    pub fn stats(&self) -> ScanSummary {
        self.stats.snapshot()
    }

    /// Wait for the task to wind down after [`stop`](Self::stop).
    pub async fn join(self) -> Result<()> {
        self.join.await.map_err(|e| anyhow!("mirror task panicked: {e}"))
    }
}

#[derive(Debug, Clone)]
pub enum TaskCommand {
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Scanning,
    /// Initial scan finished; reacting to live events.
    Watching(ScanSummary),
    Stopped,
    Error(String),
}

pub(crate) struct MirrorTask<T> {
    cfg: ConversionConfig,
    transcoder: T,
    stats: Arc<RunStatistics>,
}

impl<T: Transcoder> MirrorTask<T> {
    pub fn new(cfg: ConversionConfig, transcoder: T, stats: Arc<RunStatistics>) -> Self {
        Self {
            cfg,
            transcoder,
            stats,
        }
    }

    pub async fn run(
        self,
        mut ctrl_rx: mpsc::Receiver<TaskCommand>,
        state_tx: watch::Sender<TaskState>,
    ) {
        let cfg = match prepare_roots(&self.cfg).await {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("{e:#}");
                let _ = state_tx.send(TaskState::Error(format!("{e:#}")));
                return;
            }
        };
        let root = cfg.input_dir.clone();
        let reconciler = Reconciler::new(&cfg, self.transcoder);

        // Initial full reconciliation before watching
        let _ = state_tx.send(TaskState::Scanning);
        let mut stop_requested = false;
        let summary = scan_tree(&reconciler, &self.stats, || {
            if matches!(ctrl_rx.try_recv(), Ok(TaskCommand::Stop)) {
                stop_requested = true;
            }
            !stop_requested
        })
        .await;
        info!("Initial scan complete: {summary}");
        if stop_requested {
            let _ = state_tx.send(TaskState::Stopped);
            return;
        }

        let (event_tx, event_rx) = mpsc::channel::<FsEvent>(EVENT_CHANNEL_CAPACITY);
        let (settled_tx, mut settled_rx) = mpsc::channel::<PathBuf>(SETTLED_CHANNEL_CAPACITY);
        let debouncer = EventDebouncer::new(cfg.debounce()).spawn(event_rx, settled_tx);

        // spawn watcher
        let mut watcher = match spawn_watcher(&root, reconciler.classifier().clone(), event_tx) {
            Ok(w) => w,
            Err(e) => {
                error!("{e:#}");
                let _ = state_tx.send(TaskState::Error(format!("watch error: {e:#}")));
                debouncer.abort();
                return;
            }
        };
        info!("Watching {} for changes", root.display());
        let _ = state_tx.send(TaskState::Watching(summary));

        loop {
            tokio::select! {
                Some(cmd) = ctrl_rx.recv() => {
                    match cmd {
                        TaskCommand::Stop => break,
                    }
                }
                Some(path) = settled_rx.recv() => {
                    let outcome = reconciler.reconcile(&path).await;
                    debug!("live change handled: {}", outcome.source().display());
                    self.stats.record(&outcome);
                }
                else => break,
            }
        }

        info!("Stopping watcher...");
        // the debouncer may be parked on a full settled queue, with notify's
        // thread parked behind it; closing the queue first releases both
        drop(settled_rx);
        if let Err(e) = watcher.unwatch(&root) {
            warn!("unwatch {}: {e}", root.display());
        }
        drop(watcher);
        let _ = debouncer.await;
        let _ = state_tx.send(TaskState::Stopped);
    }
}

/// Resolve the input root to its canonical form (notify reports absolute
/// paths) and make sure the output root exists.
async fn prepare_roots(cfg: &ConversionConfig) -> Result<ConversionConfig> {
    let input_dir = tokio::fs::canonicalize(&cfg.input_dir)
        .await
        .with_context(|| format!("input directory {} is not accessible", cfg.input_dir.display()))?;
    tokio::fs::create_dir_all(&cfg.output_dir)
        .await
        .with_context(|| format!("cannot create output directory {}", cfg.output_dir.display()))?;
    let output_dir = tokio::fs::canonicalize(&cfg.output_dir).await?;
    Ok(ConversionConfig {
        input_dir,
        output_dir,
        ..cfg.clone()
    })
}

fn spawn_watcher(
    root: &Path,
    classifier: PathClassifier,
    event_tx: mpsc::Sender<FsEvent>,
) -> Result<RecommendedWatcher> {
    let mut watcher: RecommendedWatcher = RecommendedWatcher::new(
        move |res| match res {
            Ok(event) => {
                for op in event_to_ops(event) {
                    let path = op.path();
                    if path.is_dir() || !classifier.is_candidate(path) {
                        continue;
                    }
                    // blocks notify's thread when the pipeline falls behind
                    let _ = event_tx.blocking_send(op);
                }
            }
            Err(e) => error!("watch error: {e}"),
        },
        notify::Config::default(),
    )
    .map_err(|e| anyhow!(e))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| anyhow!(e))?;
    Ok(watcher)
}

/// Start mirroring `cfg.input_dir` into `cfg.output_dir` on the current runtime.
pub fn spawn_task<T: Transcoder>(cfg: ConversionConfig, transcoder: T) -> MirrorTaskHandle {
    let (ctrl_tx, ctrl_rx) = mpsc::channel(4);
    let (state_tx, state_rx) = watch::channel(TaskState::Idle);
    let stats = Arc::new(RunStatistics::new());
    let task = MirrorTask::new(cfg.clone(), transcoder, stats.clone());
    let join = tokio::spawn(task.run(ctrl_rx, state_tx));
    MirrorTaskHandle {
        cfg,
        ctrl_tx,
        state_rx,
        stats,
        join,
    }
}
