//! Email queue DTOs

use chrono::{DateTime, Utc};
use ispdesk_core::models::{EmailStatus, NewEmail, QueuedEmail};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to queue an email
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EnqueueEmailRequest {
    #[validate(email)]
    pub to_address: String,

    #[validate(length(min = 1, max = 255))]
    pub subject: String,

    #[validate(length(min = 1))]
    pub body_text: String,

    pub body_html: Option<String>,
}

impl From<EnqueueEmailRequest> for NewEmail {
    fn from(req: EnqueueEmailRequest) -> Self {
        NewEmail {
            to_address: req.to_address,
            subject: req.subject,
            body_text: req.body_text,
            body_html: req.body_html,
        }
    }
}

/// Delivery state of a queued email
#[derive(Debug, Clone, Serialize)]
pub struct EmailStatusResponse {
    pub id: i64,
    pub to_address: String,
    pub subject: String,
    pub status: EmailStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<QueuedEmail> for EmailStatusResponse {
    fn from(email: QueuedEmail) -> Self {
        Self {
            id: email.id,
            to_address: email.to_address,
            subject: email.subject,
            status: email.status,
            attempts: email.attempts,
            max_attempts: email.max_attempts,
            next_attempt_at: email.next_attempt_at,
            last_error: email.last_error,
            sent_at: email.sent_at,
        }
    }
}

/// Queue size per delivery state
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmailQueueStats {
    pub pending: i64,
    pub sending: i64,
    pub sent: i64,
    pub failed: i64,
}
