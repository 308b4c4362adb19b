use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Fetch window
// ---------------------------------------------------------------------------

/// Inclusive day range handed to `fixtures/between/{start}/{end}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchWindow {
    pub fn path(&self) -> String {
        format!(
            "fixtures/between/{}/{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

impl std::fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}]",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Counters a job hands back for the end-of-run log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Persist attempts, successful or not.
    pub batches: usize,
    /// Raw records received from the API.
    pub fetched: usize,
    /// Rows committed (parents included).
    pub written: usize,
    pub failed_batches: usize,
    /// Records dropped before persisting (league filter, unusable shape, failed item fetch).
    pub skipped: usize,
}

impl SyncReport {
    pub fn record_batch(&mut self, outcome: Option<usize>) {
        self.batches += 1;
        match outcome {
            Some(written) => self.written += written,
            None => self.failed_batches += 1,
        }
    }

    pub fn merge(&mut self, other: SyncReport) {
        self.batches += other.batches;
        self.fetched += other.fetched;
        self.written += other.written;
        self.failed_batches += other.failed_batches;
        self.skipped += other.skipped;
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batches={} fetched={} written={} failed_batches={} skipped={}",
            self.batches, self.fetched, self.written, self.failed_batches, self.skipped
        )
    }
}
