use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for one mirrored tree. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    #[serde(default = "ConversionConfig::default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "ConversionConfig::default_output_dir")]
    pub output_dir: PathBuf,
    /// Lossy quality, 0..=100. Ignored when `lossless` is set.
    #[serde(default = "ConversionConfig::default_quality")]
    pub quality: u8,
    /// Encoder effort, 0..=6.
    #[serde(default = "ConversionConfig::default_method")]
    pub method: u8,
    #[serde(default)]
    pub lossless: bool,
    /// Adds the `auto-filter` and `image-hint=photo` defines to lossy encodes.
    #[serde(default = "ConversionConfig::default_auto_filter")]
    pub auto_filter: bool,
    /// Total attempts per conversion, including the first one.
    #[serde(default = "ConversionConfig::default_retry_attempts")]
    pub retry_attempts: u32,
    /// Seconds to sleep between attempts (linear, not exponential).
    #[serde(default = "ConversionConfig::default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Quiet period before a changed path is reconciled.
    #[serde(default = "ConversionConfig::default_debounce_ms")]
    pub debounce_ms: u64,
    /// Transcoding engine program.
    #[serde(default = "ConversionConfig::default_engine")]
    pub engine: String,
}

impl ConversionConfig {
    fn default_input_dir() -> PathBuf { PathBuf::from("/data/input") }
    fn default_output_dir() -> PathBuf { PathBuf::from("/data/output") }
    fn default_quality() -> u8 { 82 }
    fn default_method() -> u8 { 6 }
    fn default_auto_filter() -> bool { true }
    fn default_retry_attempts() -> u32 { 3 }
    fn default_retry_delay_secs() -> u64 { 2 }
    fn default_debounce_ms() -> u64 { 150 }
    fn default_engine() -> String { "magick".to_string() }

    /// Reject values the engine would refuse or that make the mirror loop on itself.
    pub fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(SyncError::Config(format!(
                "quality must be within 0..=100, got {}",
                self.quality
            )));
        }
        if self.method > 6 {
            return Err(SyncError::Config(format!(
                "method must be within 0..=6, got {}",
                self.method
            )));
        }
        if self.engine.trim().is_empty() {
            return Err(SyncError::Config("engine program must not be empty".into()));
        }
        if self.input_dir == self.output_dir {
            return Err(SyncError::Config(format!(
                "input and output directories are the same: {}",
                self.input_dir.display()
            )));
        }
        Ok(())
    }

    pub fn webp_params(&self) -> WebpParams {
        WebpParams {
            quality: self.quality,
            method: self.method,
            lossless: self.lossless,
            auto_filter: self.auto_filter,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.retry_delay_secs))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            input_dir: Self::default_input_dir(),
            output_dir: Self::default_output_dir(),
            quality: Self::default_quality(),
            method: Self::default_method(),
            lossless: false,
            auto_filter: Self::default_auto_filter(),
            retry_attempts: Self::default_retry_attempts(),
            retry_delay_secs: Self::default_retry_delay_secs(),
            debounce_ms: Self::default_debounce_ms(),
            engine: Self::default_engine(),
        }
    }
}

/// Encoding parameters handed to the transcoding engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebpParams {
    pub quality: u8,
    pub method: u8,
    pub lossless: bool,
    pub auto_filter: bool,
}

impl Default for WebpParams {
    fn default() -> Self {
        ConversionConfig::default().webp_params()
    }
}

/// How many times to try a conversion and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `attempts` is clamped to at least one.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
