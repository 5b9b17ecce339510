use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use crate::config::ConfigProvider;
use crate::db::{message_repo, Database};
use crate::error::{ConfigError, WabridgeError};
use crate::media::{MediaFetcher, MediaStore};
use crate::sanitize::mask_phone;
use crate::whatsapp::normalizer::{self, NormalizedMessage, RecordOutcome};
use crate::whatsapp::payload::{ChangeValue, WebhookPayload, BUSINESS_ACCOUNT_OBJECT};
use crate::whatsapp::status::{self, StatusOutcome};
use crate::whatsapp::WebhookError;

use super::stats::IngestStats;

/// What happened to one item of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Message {
        message_id: i64,
        /// `Some(true)` when an attachment was stored and linked.
        media_linked: Option<bool>,
    },
    DuplicateMessage,
    Status,
    UnknownStatus,
    Failed,
}

/// Summary of one webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub messages: usize,
    pub duplicates: usize,
    pub statuses: usize,
    pub unknown_statuses: usize,
    pub media_failures: usize,
    pub failures: usize,
}

impl DeliveryReport {
    /// True when nothing was swallowed.
    pub fn is_clean(&self) -> bool {
        self.failures == 0 && self.media_failures == 0
    }

    fn add(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Message { media_linked, .. } => {
                self.messages += 1;
                if *media_linked == Some(false) {
                    self.media_failures += 1;
                }
            }
            ItemOutcome::DuplicateMessage => self.duplicates += 1,
            ItemOutcome::Status => self.statuses += 1,
            ItemOutcome::UnknownStatus => self.unknown_statuses += 1,
            ItemOutcome::Failed => self.failures += 1,
        }
    }
}

/// Validates a raw delivery body. Only this step can reject a request.
pub fn parse_delivery(body: &[u8]) -> Result<WebhookPayload, WebhookError> {
    let payload: WebhookPayload = serde_json::from_slice(body)
        .map_err(|e| WebhookError::Validation(format!("body is not a webhook payload: {}", e)))?;
    if payload.object != BUSINESS_ACCOUNT_OBJECT {
        return Err(WebhookError::Validation(format!(
            "unexpected object '{}'",
            payload.object
        )));
    }
    Ok(payload)
}

/// Runs every message and status of a delivery through the pipeline.
pub struct WebhookProcessor {
    db: Database,
    config: Arc<ConfigProvider>,
    fetcher: Arc<dyn MediaFetcher>,
    media: Arc<MediaStore>,
    stats: Arc<IngestStats>,
}

impl WebhookProcessor {
    pub fn new(
        db: Database,
        config: Arc<ConfigProvider>,
        fetcher: Arc<dyn MediaFetcher>,
        media: Arc<MediaStore>,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            db,
            config,
            fetcher,
            media,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    /// Processes all items concurrently. Item failures are logged and
    /// counted, never propagated.
    pub async fn process(&self, payload: &WebhookPayload) -> DeliveryReport {
        self.stats.delivery();

        let mut items = Vec::new();
        for change in payload.entry.iter().flat_map(|e| e.changes.iter()) {
            let value = &change.value;
            for envelope in &value.messages {
                items.push(futures_util::future::Either::Left(
                    self.process_message(value, envelope),
                ));
            }
            for raw in &value.statuses {
                items.push(futures_util::future::Either::Right(self.process_status(raw)));
            }
        }

        let mut report = DeliveryReport::default();
        for outcome in join_all(items).await {
            report.add(&outcome);
        }

        debug!(target: "wabridge::ingest", report = ?report, "Delivery processed");
        report
    }

    async fn process_message(&self, value: &ChangeValue, envelope: &Value) -> ItemOutcome {
        let message = match normalizer::normalize(envelope) {
            Ok(message) => message,
            Err(e) => {
                warn!(target: "wabridge::ingest", error = %e, "Dropping malformed message envelope");
                self.stats.message_failed();
                return ItemOutcome::Failed;
            }
        };

        let span = info_span!(
            "ingest.message",
            whatsapp_message_id = %message.whatsapp_message_id,
            from = %mask_phone(&message.from),
            message_type = %message.extracted.message_type,
        );

        async {
            let names = normalizer::contact_names(value, envelope, &message.from);
            let outcome = match normalizer::record_incoming(&self.db, &message, &names) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(target: "wabridge::ingest", error = %e, "Failed to record message");
                    self.stats.message_failed();
                    return ItemOutcome::Failed;
                }
            };

            let message_id = match outcome {
                RecordOutcome::Inserted { message_id, .. } => message_id,
                RecordOutcome::Duplicate => {
                    debug!(target: "wabridge::ingest", "Duplicate delivery ignored");
                    self.stats.duplicate();
                    return ItemOutcome::DuplicateMessage;
                }
            };
            self.stats.message_recorded();

            let media_linked = match message.extracted.media_id.as_deref() {
                Some(media_id) => Some(self.attach_media(message_id, media_id, &message).await),
                None => None,
            };

            ItemOutcome::Message {
                message_id,
                media_linked,
            }
        }
        .instrument(span)
        .await
    }

    /// Downloads, stores and links an attachment. Returns false on any
    /// failure; the message row stays with `media_file_id = NULL`.
    async fn attach_media(
        &self,
        message_id: i64,
        media_id: &str,
        message: &NormalizedMessage,
    ) -> bool {
        match self.try_attach_media(message_id, media_id, message).await {
            Ok(()) => {
                self.stats.media_stored();
                true
            }
            Err(e) => {
                warn!(target: "wabridge::ingest", media_id, error = %e, "Media pipeline failed");
                self.stats.media_failed();
                false
            }
        }
    }

    async fn try_attach_media(
        &self,
        message_id: i64,
        media_id: &str,
        message: &NormalizedMessage,
    ) -> Result<(), WabridgeError> {
        let config = self.config.current();
        let token = config.access_token()?.ok_or_else(|| {
            WabridgeError::Config(ConfigError::Validation {
                message: "no WhatsApp access token configured".to_string(),
            })
        })?;

        let fetched = self.fetcher.fetch(media_id, &token).await?;

        let mime_type = message
            .extracted
            .mime_type
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fetched.mime_type.clone());
        let filename = message
            .extracted
            .filename
            .clone()
            .unwrap_or_else(|| fetched.filename.clone());

        let stored = self
            .media
            .store(fetched.bytes, &filename, &mime_type, Some(media_id))
            .await?;

        message_repo::set_media_file(&self.db, message_id, stored.file.id)?;
        debug!(
            target: "wabridge::ingest",
            media_file_id = stored.file.id,
            deduplicated = stored.deduplicated,
            "Media linked"
        );
        Ok(())
    }

    async fn process_status(&self, raw: &Value) -> ItemOutcome {
        let update = match status::parse_status(raw) {
            Ok(update) => update,
            Err(e) => {
                warn!(target: "wabridge::ingest", error = %e, "Dropping malformed status");
                self.stats.status_failed();
                return ItemOutcome::Failed;
            }
        };

        match status::record_status(&self.db, &update) {
            Ok(StatusOutcome::Recorded { .. }) => {
                self.stats.status_recorded();
                ItemOutcome::Status
            }
            Ok(StatusOutcome::UnknownMessage) => {
                self.stats.unknown_status();
                ItemOutcome::UnknownStatus
            }
            Err(e) => {
                warn!(
                    target: "wabridge::ingest",
                    whatsapp_message_id = %update.whatsapp_message_id,
                    error = %e,
                    "Failed to record status"
                );
                self.stats.status_failed();
                ItemOutcome::Failed
            }
        }
    }
}
