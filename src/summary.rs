//! Per-run counters

use serde::Serialize;
use std::ops::AddAssign;

/// What happened to the attachments of one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageReport {
    pub saved: usize,
    pub skipped_duplicate: usize,
    pub skipped_unsupported: usize,
}

/// Totals for a whole harvest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Messages returned by the search (after any limit).
    pub messages_found: usize,
    /// Messages fetched and parsed successfully.
    pub messages_scanned: usize,
    pub attachments_saved: usize,
    pub skipped_duplicate: usize,
    pub skipped_unsupported: usize,
    /// Messages that could not be fetched or parsed.
    pub messages_failed: usize,
}

impl Summary {
    /// True when every message found was processed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.messages_failed == 0
    }
}

impl AddAssign<MessageReport> for Summary {
    fn add_assign(&mut self, report: MessageReport) {
        self.messages_scanned += 1;
        self.attachments_saved += report.saved;
        self.skipped_duplicate += report.skipped_duplicate;
        self.skipped_unsupported += report.skipped_unsupported;
    }
}
