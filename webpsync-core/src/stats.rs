use crate::pipeline::{Outcome, SkipReason};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide outcome counters.
#[derive(Debug, Default)]
pub struct RunStatistics {
    converted: AtomicU64,
    skipped: AtomicU64,
    errored: AtomicU64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an outcome. Non-candidate paths are not part of the mirror and
    /// are left out.
    pub fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Converted { .. } => &self.converted,
            Outcome::Skipped {
                reason: SkipReason::NotCandidate,
                ..
            } => return,
            Outcome::Skipped { .. } => &self.skipped,
            Outcome::Failed { .. } => &self.errored,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ScanSummary {
        ScanSummary {
            converted: self.converted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub converted: u64,
    pub skipped: u64,
    pub errored: u64,
}

impl ScanSummary {
    pub fn new(converted: u64, skipped: u64, errored: u64) -> Self {
        Self {
            converted,
            skipped,
            errored,
        }
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "converted={}, skipped={}, errored={}",
            self.converted, self.skipped, self.errored
        )
    }
}
