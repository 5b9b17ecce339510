//! WhatsApp Business Platform protocol: webhook shapes, handshake,
//! message normalization, status tracking and outbound sends.

pub mod client;
pub mod error;
pub mod normalizer;
pub mod outbound;
pub mod payload;
pub mod status;
pub mod verify;

pub use client::{GraphClient, SentMessage};
pub use error::{EnvelopeError, SendError, VerifyRejection, WebhookError};
pub use normalizer::{ContactNames, Extracted, NormalizedMessage, RecordOutcome};
pub use outbound::OutboundMessage;
pub use payload::WebhookPayload;
pub use status::{StatusOutcome, StatusUpdate};
pub use verify::{verify, VerifyQuery};
