//! Core library for webpsync – keeps a WebP mirror of a JPEG directory tree.

mod config;
mod debounce;
mod engine;
mod error;
mod executor;
mod file_op;
mod filter;
mod mapping;
mod pipeline;
mod retry;
mod staleness;
mod stats;
mod task;

pub use config::{ConversionConfig, RetryPolicy, WebpParams};
pub use debounce::EventDebouncer;
pub use engine::{build_args, MagickTranscoder, Transcoder};
pub use error::{Result, SyncError};
pub use executor::{ConversionExecutor, ConversionTask};
pub use file_op::{event_to_ops, FsEvent};
pub use filter::PathClassifier;
pub use mapping::{map_destination, staging_path};
pub use pipeline::{scan_tree, Outcome, Reconciler, SkipReason};
pub use retry::{retry, Exhausted};
pub use staleness::{check as check_freshness, needs_conversion, Freshness};
pub use stats::{RunStatistics, ScanSummary};
pub use task::{spawn_task, MirrorTaskHandle, TaskCommand, TaskState};
