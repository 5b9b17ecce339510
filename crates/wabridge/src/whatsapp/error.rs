use thiserror::Error;

/// Why a subscription handshake was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyRejection {
    /// A required query parameter was absent.
    #[error("Missing verification parameter '{0}'")]
    MissingParameter(&'static str),

    /// Wrong mode, wrong token, or no token configured.
    #[error("Verification token mismatch")]
    Forbidden,
}

/// Request-level webhook failures. Item-level failures never surface here.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid webhook payload: {0}")]
    Validation(String),
}

/// A single message or status entry could not be interpreted.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Envelope is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Envelope is not an object")]
    NotAnObject,
}

/// Outbound send failures.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Invalid outbound message: {0}")]
    Validation(String),

    #[error("WhatsApp credentials not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Failed to reach the Graph API: {0}")]
    Transport(String),

    /// The provider rejected the request.
    #[error("Graph API error (HTTP {status}, code {code:?}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Unexpected Graph API response: {0}")]
    InvalidResponse(String),
}
