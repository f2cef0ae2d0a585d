use crate::{
    config::{RetryPolicy, WebpParams},
    engine::Transcoder,
    error::SyncError,
    mapping::staging_path,
    pipeline::{Outcome, SkipReason},
    retry::{retry, Exhausted},
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// One source/destination pair scheduled for conversion. Lives only for the
/// duration of a single reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub source: PathBuf,
    pub destination: PathBuf,
}

enum Attempt {
    Written,
    SourceGone,
}

/// Runs the transcoding engine for a task under a bounded retry policy.
///
/// The engine writes to a hidden staging file which is renamed over the
/// destination only once it reports success, so a destination is never
/// half-written.
#[derive(Debug)]
pub struct ConversionExecutor<T> {
    transcoder: T,
    params: WebpParams,
    policy: RetryPolicy,
}

impl<T: Transcoder> ConversionExecutor<T> {
    pub fn new(transcoder: T, params: WebpParams, policy: RetryPolicy) -> Self {
        Self {
            transcoder,
            params,
            policy,
        }
    }

    pub async fn execute(&self, task: &ConversionTask) -> Outcome {
        if let Err(e) = ensure_parent(&task.destination).await {
            return Outcome::Failed {
                source: task.source.clone(),
                destination: task.destination.clone(),
                attempts: 0,
                reason: format!("cannot create output directory: {e}"),
            };
        }

        let staged = staging_path(&task.destination);
        let staged = staged.as_path();
        let label = task.source.display().to_string();
        let result = retry(self.policy, &label, |attempt| self.attempt(task, staged, attempt)).await;

        match result {
            Ok(Attempt::Written) => Outcome::Converted {
                source: task.source.clone(),
                destination: task.destination.clone(),
            },
            Ok(Attempt::SourceGone) => Outcome::Skipped {
                source: task.source.clone(),
                destination: Some(task.destination.clone()),
                reason: SkipReason::SourceVanished,
            },
            Err(Exhausted {
                attempts,
                last_error,
            }) => {
                remove_if_present(staged).await;
                let err = SyncError::RetriesExhausted {
                    source_path: task.source.clone(),
                    attempts,
                    reason: last_error.to_string(),
                };
                error!("{err}");
                Outcome::Failed {
                    source: task.source.clone(),
                    destination: task.destination.clone(),
                    attempts,
                    reason: last_error.to_string(),
                }
            }
        }
    }

    async fn attempt(
        &self,
        task: &ConversionTask,
        staged: &Path,
        attempt: u32,
    ) -> Result<Attempt, SyncError> {
        if !tokio::fs::try_exists(&task.source).await.unwrap_or(true) {
            return Ok(Attempt::SourceGone);
        }
        // leftovers from an earlier failed attempt
        remove_if_present(staged).await;
        debug!("attempt {attempt}: {:?} -> {:?}", task.source, staged);

        if let Err(e) = self
            .transcoder
            .transcode(&task.source, staged, &self.params)
            .await
        {
            remove_if_present(staged).await;
            return Err(SyncError::Transcode {
                source_path: task.source.clone(),
                reason: format!("{e:#}"),
            });
        }
        if let Err(e) = tokio::fs::rename(staged, &task.destination).await {
            remove_if_present(staged).await;
            return Err(e.into());
        }
        Ok(Attempt::Written)
    }
}

/// Create the destination's parent directory tree if it is missing.
pub(crate) async fn ensure_parent(destination: &Path) -> std::io::Result<()> {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

async fn remove_if_present(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            debug!("could not remove {:?}: {e}", path);
        }
    }
}
