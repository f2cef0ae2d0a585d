use crate::{
    config::ConversionConfig,
    engine::Transcoder,
    executor::{ensure_parent, ConversionExecutor, ConversionTask},
    filter::PathClassifier,
    mapping::map_destination,
    staleness::{self, Freshness},
    stats::{RunStatistics, ScanSummary},
};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Result of reconciling one source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Converted {
        source: PathBuf,
        destination: PathBuf,
    },
    Skipped {
        source: PathBuf,
        destination: Option<PathBuf>,
        reason: SkipReason,
    },
    Failed {
        source: PathBuf,
        destination: PathBuf,
        attempts: u32,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a JPEG, or a hidden/temporary file.
    NotCandidate,
    UpToDate,
    SourceVanished,
    /// Path does not live under the input root.
    InvalidPath,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::NotCandidate => "not a candidate",
            SkipReason::UpToDate => "already processed",
            SkipReason::SourceVanished => "source disappeared",
            SkipReason::InvalidPath => "outside input root",
        };
        f.write_str(s)
    }
}

impl Outcome {
    pub fn source(&self) -> &Path {
        match self {
            Outcome::Converted { source, .. }
            | Outcome::Skipped { source, .. }
            | Outcome::Failed { source, .. } => source,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Outcome::Converted { .. })
    }

    fn skipped(source: &Path, destination: Option<PathBuf>, reason: SkipReason) -> Self {
        Outcome::Skipped {
            source: source.to_path_buf(),
            destination,
            reason,
        }
    }

    fn log(&self) {
        match self {
            Outcome::Converted {
                source,
                destination,
            } => info!("[Converted] {} → {}", source.display(), destination.display()),
            Outcome::Skipped {
                reason: SkipReason::NotCandidate,
                source,
                ..
            } => debug!("Ignored: {}", source.display()),
            Outcome::Skipped {
                source,
                destination,
                reason,
            } => {
                let dest = destination
                    .as_deref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_else(|| "-".to_string());
                info!("Skipping ({reason}): {} → {dest}", source.display());
            }
            Outcome::Failed {
                source,
                destination,
                attempts,
                reason,
            } => error!(
                "[Failed] {} → {} after {attempts} attempt(s): {reason}",
                source.display(),
                destination.display()
            ),
        }
    }
}

/// Classify, map, check and (when stale) convert a single source path.
///
/// Safe to call any number of times for the same path: an unchanged source
/// is never converted twice.
#[derive(Debug)]
pub struct Reconciler<T> {
    classifier: PathClassifier,
    input_root: PathBuf,
    output_root: PathBuf,
    executor: ConversionExecutor<T>,
}

impl<T: Transcoder> Reconciler<T> {
    pub fn new(config: &ConversionConfig, transcoder: T) -> Self {
        Self {
            classifier: PathClassifier::new(),
            input_root: config.input_dir.clone(),
            output_root: config.output_dir.clone(),
            executor: ConversionExecutor::new(
                transcoder,
                config.webp_params(),
                config.retry_policy(),
            ),
        }
    }

    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    pub async fn reconcile(&self, source: &Path) -> Outcome {
        let outcome = self.decide(source).await;
        outcome.log();
        outcome
    }

    async fn decide(&self, source: &Path) -> Outcome {
        if !self.classifier.is_candidate(source) {
            return Outcome::skipped(source, None, SkipReason::NotCandidate);
        }

        let destination = match map_destination(source, &self.input_root, &self.output_root) {
            Ok(dest) => dest,
            Err(e) => {
                error!("{e}");
                return Outcome::skipped(source, None, SkipReason::InvalidPath);
            }
        };

        if let Err(e) = ensure_parent(&destination).await {
            return Outcome::Failed {
                source: source.to_path_buf(),
                destination,
                attempts: 0,
                reason: format!("cannot create output directory: {e}"),
            };
        }

        let freshness = match staleness::check(source, &destination).await {
            Ok(f) => f,
            Err(e) => {
                return Outcome::Failed {
                    source: source.to_path_buf(),
                    destination,
                    attempts: 0,
                    reason: format!("cannot read metadata: {e}"),
                }
            }
        };

        match freshness {
            Freshness::SourceGone => {
                Outcome::skipped(source, Some(destination), SkipReason::SourceVanished)
            }
            Freshness::UpToDate => Outcome::skipped(source, Some(destination), SkipReason::UpToDate),
            Freshness::Missing | Freshness::Stale => {
                let task = ConversionTask {
                    source: source.to_path_buf(),
                    destination,
                };
                self.executor.execute(&task).await
            }
        }
    }
}

/// Walk the whole input tree once, reconciling every file in name order.
///
/// Every outcome is also recorded into `stats`; the returned summary counts
/// this pass alone. `keep_going` is polled between files so a shutdown
/// request stops the walk without interrupting the conversion in progress.
pub async fn scan_tree<T: Transcoder>(
    reconciler: &Reconciler<T>,
    stats: &RunStatistics,
    mut keep_going: impl FnMut() -> bool,
) -> ScanSummary {
    let pass = RunStatistics::new();
    for entry in WalkDir::new(reconciler.input_root()).sort_by_file_name() {
        if !keep_going() {
            warn!("Initial scan interrupted");
            break;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("scan error: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let outcome = reconciler.reconcile(entry.path()).await;
        pass.record(&outcome);
        stats.record(&outcome);
    }
    pass.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebpParams;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use filetime::{set_file_mtime, FileTime};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    /// Copies the input bytes, standing in for the real encoder.
    #[derive(Default, Clone)]
    struct CopyEngine {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Transcoder for CopyEngine {
        async fn transcode(&self, input: &Path, output: &Path, _params: &WebpParams) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::copy(input, output).await?;
            Ok(())
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl Transcoder for FailingEngine {
        async fn transcode(&self, _input: &Path, _output: &Path, _params: &WebpParams) -> Result<()> {
            Err(anyhow!("corrupt JPEG data"))
        }
    }

    fn config_for(root: &Path) -> ConversionConfig {
        ConversionConfig {
            input_dir: root.join("input"),
            output_dir: root.join("output"),
            retry_attempts: 2,
            retry_delay_secs: 0,
            ..Default::default()
        }
    }

    fn write_jpeg(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"\xFF\xD8\xFFjpeg").unwrap();
        // keep the source clearly older than anything written by the engine
        let past = SystemTime::now() - Duration::from_secs(3600);
        set_file_mtime(path, FileTime::from_system_time(past)).unwrap();
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        let src = cfg.input_dir.join("photos/a.jpg");
        write_jpeg(&src);
        let engine = CopyEngine::default();
        let reconciler = Reconciler::new(&cfg, engine.clone());

        let first = reconciler.reconcile(&src).await;
        assert_eq!(
            first,
            Outcome::Converted {
                source: src.clone(),
                destination: cfg.output_dir.join("photos/a.webp"),
            }
        );
        for _ in 0..3 {
            let again = reconciler.reconcile(&src).await;
            assert!(matches!(
                again,
                Outcome::Skipped {
                    reason: SkipReason::UpToDate,
                    ..
                }
            ));
        }
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn newer_source_is_converted_again() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        let src = cfg.input_dir.join("a.jpg");
        write_jpeg(&src);
        let reconciler = Reconciler::new(&cfg, CopyEngine::default());
        let first = reconciler.reconcile(&src).await;
        assert!(first.is_converted());
        assert_eq!(first.source(), src.as_path());

        let future = SystemTime::now() + Duration::from_secs(3600);
        set_file_mtime(&src, FileTime::from_system_time(future)).unwrap();
        assert!(reconciler.reconcile(&src).await.is_converted());
    }

    #[tokio::test]
    async fn non_candidates_never_reach_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        let engine = CopyEngine::default();
        let reconciler = Reconciler::new(&cfg, engine.clone());
        for name in ["notes.txt", ".hidden.jpg", "~lock.jpg", "b.png"] {
            let path = cfg.input_dir.join(name);
            write_jpeg(&path);
            let outcome = reconciler.reconcile(&path).await;
            assert!(matches!(
                outcome,
                Outcome::Skipped {
                    reason: SkipReason::NotCandidate,
                    ..
                }
            ));
        }
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert!(!cfg.output_dir.exists());
    }

    #[tokio::test]
    async fn path_outside_root_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        let stray = dir.path().join("elsewhere/a.jpg");
        write_jpeg(&stray);
        let reconciler = Reconciler::new(&cfg, CopyEngine::default());
        let outcome = reconciler.reconcile(&stray).await;
        assert!(matches!(
            outcome,
            Outcome::Skipped {
                reason: SkipReason::InvalidPath,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn vanished_source_is_a_quiet_skip() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        let reconciler = Reconciler::new(&cfg, CopyEngine::default());
        let outcome = reconciler.reconcile(&cfg.input_dir.join("gone.jpg")).await;
        assert!(matches!(
            outcome,
            Outcome::Skipped {
                reason: SkipReason::SourceVanished,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn scans_report_per_pass_counts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        let src = cfg.input_dir.join("photos/a.jpg");
        write_jpeg(&src);
        write_jpeg(&cfg.input_dir.join("photos/readme.txt"));
        let reconciler = Reconciler::new(&cfg, CopyEngine::default());
        let stats = RunStatistics::new();

        let first = scan_tree(&reconciler, &stats, || true).await;
        assert_eq!(first, ScanSummary::new(1, 0, 0));
        assert!(cfg.output_dir.join("photos/a.webp").is_file());

        let second = scan_tree(&reconciler, &stats, || true).await;
        assert_eq!(second, ScanSummary::new(0, 1, 0));

        let later = SystemTime::now() + Duration::from_secs(3600);
        set_file_mtime(&src, FileTime::from_system_time(later)).unwrap();
        let third = scan_tree(&reconciler, &stats, || true).await;
        assert_eq!(third, ScanSummary::new(1, 0, 0));

        assert_eq!(stats.snapshot(), ScanSummary::new(2, 1, 0));
    }

    #[tokio::test]
    async fn one_bad_file_does_not_stop_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        write_jpeg(&cfg.input_dir.join("a.jpg"));
        write_jpeg(&cfg.input_dir.join("b.jpg"));
        let reconciler = Reconciler::new(&cfg, FailingEngine);
        let stats = RunStatistics::new();

        let summary = scan_tree(&reconciler, &stats, || true).await;

        assert_eq!(summary, ScanSummary::new(0, 0, 2));
        assert!(!cfg.output_dir.join("a.webp").exists());
    }

    #[tokio::test]
    async fn scan_stops_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_for(dir.path());
        write_jpeg(&cfg.input_dir.join("a.jpg"));
        write_jpeg(&cfg.input_dir.join("b.jpg"));
        let reconciler = Reconciler::new(&cfg, CopyEngine::default());
        let stats = RunStatistics::new();

        let summary = scan_tree(&reconciler, &stats, || false).await;

        assert_eq!(summary, ScanSummary::default());
    }
}
