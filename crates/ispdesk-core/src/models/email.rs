//! Outbound email queue models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Largest exponent used for the retry delay (2^12 minutes is ~2.8 days)
pub const MAX_BACKOFF_EXPONENT: i32 = 12;

/// Delivery state of a queued email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl EmailStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(EmailStatus::Pending),
            "sending" => Some(EmailStatus::Sending),
            "sent" => Some(EmailStatus::Sent),
            "failed" => Some(EmailStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Sending => "sending",
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
        }
    }

    /// Sent and failed emails are never picked up again
    pub fn is_terminal(&self) -> bool {
        matches!(self, EmailStatus::Sent | EmailStatus::Failed)
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Email waiting for (or done with) delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEmail {
    pub id: i64,
    pub to_address: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    pub status: EmailStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl QueuedEmail {
    /// Check if the worker may send this email at `now`
    ///
    /// While `Sending`, `next_attempt_at` holds the claim's expiry, so a row
    /// left behind by a crashed or failed worker becomes due again.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, EmailStatus::Pending | EmailStatus::Sending)
            && self.next_attempt_at <= now
    }
}

/// Data for queueing an email
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewEmail {
    #[validate(email)]
    pub to_address: String,
    #[validate(length(min = 1, max = 255))]
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

/// What to do with an email after a failed delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again at the given time
    RetryAt(DateTime<Utc>),
    /// Give up
    GiveUp,
}

/// Delay before the next attempt: 2^attempts minutes
pub fn backoff_delay(attempts: i32) -> Duration {
    let exponent = attempts.clamp(0, MAX_BACKOFF_EXPONENT) as u32;
    Duration::minutes(2i64.pow(exponent))
}

/// Decide the follow-up for an email that has now failed `attempts` times
pub fn retry_decision(attempts: i32, max_attempts: i32, now: DateTime<Utc>) -> RetryDecision {
    if attempts >= max_attempts {
        RetryDecision::GiveUp
    } else {
        RetryDecision::RetryAt(now + backoff_delay(attempts))
    }
}
