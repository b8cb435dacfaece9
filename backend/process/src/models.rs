pub const SPEND_CHECK_PATH: &str = "/ads/spend-check";
pub const SYNC_INSIGHTS_PATH: &str = "/ads/sync-insights";

/// Totals over every batch of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunTotals {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub auto_paused: usize,
    pub unreachable_batches: usize,
}

impl RunTotals {
    pub fn add(&mut self, other: &RunTotals) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.auto_paused += other.auto_paused;
        self.unreachable_batches += other.unreachable_batches;
    }
}
