use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide ingestion counters, exposed on `/health`.
#[derive(Debug, Default)]
pub struct IngestStats {
    deliveries: AtomicU64,
    messages_recorded: AtomicU64,
    duplicates: AtomicU64,
    statuses_recorded: AtomicU64,
    unknown_statuses: AtomicU64,
    media_stored: AtomicU64,
    message_failures: AtomicU64,
    status_failures: AtomicU64,
    media_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    pub deliveries: u64,
    pub messages_recorded: u64,
    pub duplicates: u64,
    pub statuses_recorded: u64,
    pub unknown_statuses: u64,
    pub media_stored: u64,
    pub message_failures: u64,
    pub status_failures: u64,
    pub media_failures: u64,
}

impl IngestStatsSnapshot {
    pub fn total_failures(&self) -> u64 {
        self.message_failures + self.status_failures + self.media_failures
    }
}

macro_rules! counter {
    ($inc:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(delivery, deliveries);
    counter!(message_recorded, messages_recorded);
    counter!(duplicate, duplicates);
    counter!(status_recorded, statuses_recorded);
    counter!(unknown_status, unknown_statuses);
    counter!(media_stored, media_stored);
    counter!(message_failed, message_failures);
    counter!(status_failed, status_failures);
    counter!(media_failed, media_failures);

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            deliveries: self.deliveries.load(Ordering::Relaxed),
            messages_recorded: self.messages_recorded.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            statuses_recorded: self.statuses_recorded.load(Ordering::Relaxed),
            unknown_statuses: self.unknown_statuses.load(Ordering::Relaxed),
            media_stored: self.media_stored.load(Ordering::Relaxed),
            message_failures: self.message_failures.load(Ordering::Relaxed),
            status_failures: self.status_failures.load(Ordering::Relaxed),
            media_failures: self.media_failures.load(Ordering::Relaxed),
        }
    }
}
