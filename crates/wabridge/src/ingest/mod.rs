//! Webhook delivery processing.

pub mod processor;
pub mod stats;

pub use processor::{parse_delivery, DeliveryReport, ItemOutcome, WebhookProcessor};
pub use stats::{IngestStats, IngestStatsSnapshot};
