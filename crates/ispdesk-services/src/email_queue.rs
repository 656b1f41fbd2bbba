//! Outbound email queue
//!
//! Emails are stored as rows first and the row id is pushed on a bounded
//! channel so the worker can send right away. The channel is only a wake-up
//! signal: a full or closed channel loses nothing, because the worker also
//! polls for due rows on an interval.
//!
//! Failed deliveries are retried after 2^attempts minutes until
//! `max_attempts` is reached, then the row is marked failed.
//!
//! A claim holds a row for `claim_timeout_secs`. If the worker cannot record
//! the outcome (or dies mid-send) the row becomes due again once the claim
//! expires, so delivery is at least once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ispdesk_core::{
    config::EmailConfig,
    models::{
        email::{retry_decision, RetryDecision},
        EmailStatus, NewEmail, QueuedEmail,
    },
    traits::EmailQueueRepository,
    AppError, AppResult,
};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

/// Delivers one email
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &QueuedEmail) -> AppResult<()>;
}

/// Sender posting emails as JSON to an HTTP relay
pub struct RelayEmailSender {
    http_client: Client,
    relay_url: String,
    from_address: String,
}

impl RelayEmailSender {
    /// Create a relay sender
    pub fn new(relay_url: &str, from_address: &str, timeout: Duration) -> AppResult<Self> {
        if relay_url.trim().is_empty() {
            return Err(AppError::Config("Empty email relay URL".to_string()));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build relay client: {}", e)))?;

        Ok(Self {
            http_client,
            relay_url: relay_url.trim().to_string(),
            from_address: from_address.to_string(),
        })
    }
}

#[async_trait]
impl EmailSender for RelayEmailSender {
    #[instrument(skip(self, email), fields(email_id = email.id))]
    async fn send(&self, email: &QueuedEmail) -> AppResult<()> {
        let payload = json!({
            "from": self.from_address,
            "to": email.to_address,
            "subject": email.subject,
            "text": email.body_text,
            "html": email.body_html,
        });

        let response = self
            .http_client
            .post(&self.relay_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::EmailDelivery(format!("Relay request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::EmailDelivery(format!(
                "Relay returned status {}",
                status.as_u16()
            )));
        }

        Ok(())
    }
}

/// Sender that only logs, used when no relay is configured
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: &QueuedEmail) -> AppResult<()> {
        info!(
            "Email {} to {}: {}",
            email.id, email.to_address, email.subject
        );
        Ok(())
    }
}

/// Queue front end: stores emails and notifies the worker
pub struct EmailQueueService {
    repo: Arc<dyn EmailQueueRepository>,
    notifier: mpsc::Sender<i64>,
    config: EmailConfig,
}

impl EmailQueueService {
    /// Create the queue service and the receiving end for its worker
    pub fn new(
        repo: Arc<dyn EmailQueueRepository>,
        config: EmailConfig,
    ) -> (Self, mpsc::Receiver<i64>) {
        let (notifier, receiver) = mpsc::channel(config.channel_capacity.max(1));
        (
            Self {
                repo,
                notifier,
                config,
            },
            receiver,
        )
    }

    pub fn config(&self) -> &EmailConfig {
        &self.config
    }

    /// Queue an email for delivery now
    pub async fn enqueue(&self, email: NewEmail) -> AppResult<QueuedEmail> {
        self.enqueue_at(email, Utc::now()).await
    }

    #[instrument(skip(self, email), fields(to = %email.to_address))]
    pub async fn enqueue_at(&self, email: NewEmail, now: DateTime<Utc>) -> AppResult<QueuedEmail> {
        email.validate()?;

        let queued = self
            .repo
            .insert(&email, self.config.max_attempts, now)
            .await?;

        match self.notifier.try_send(queued.id) {
            Ok(()) => debug!("Notified worker of email {}", queued.id),
            Err(TrySendError::Full(id)) => {
                warn!("Email channel full, email {} left for the next poll", id)
            }
            Err(TrySendError::Closed(id)) => {
                warn!("Email worker gone, email {} left for the next poll", id)
            }
        }

        Ok(queued)
    }

    /// Record a failed delivery attempt and schedule the retry (or give up)
    #[instrument(skip(self, email, error), fields(email_id = email.id))]
    pub async fn record_failure(
        &self,
        email: &QueuedEmail,
        error: &str,
        now: DateTime<Utc>,
    ) -> AppResult<RetryDecision> {
        let attempts = email.attempts + 1;
        let decision = retry_decision(attempts, email.max_attempts, now);

        match decision {
            RetryDecision::RetryAt(next_attempt_at) => {
                warn!(
                    "Email {} attempt {}/{} failed: {}; retrying at {}",
                    email.id, attempts, email.max_attempts, error, next_attempt_at
                );
                self.repo
                    .mark_retry(email.id, attempts, next_attempt_at, error)
                    .await?;
            }
            RetryDecision::GiveUp => {
                error!(
                    "Email {} failed after {} attempts: {}",
                    email.id, attempts, error
                );
                self.repo.mark_failed(email.id, attempts, error).await?;
            }
        }

        Ok(decision)
    }

    pub async fn find(&self, id: i64) -> AppResult<Option<QueuedEmail>> {
        self.repo.find_by_id(id).await
    }

    pub async fn count_by_status(&self, status: EmailStatus) -> AppResult<i64> {
        self.repo.count_by_status(status).await
    }
}

/// Background email sender
pub struct EmailWorker {
    queue: Arc<EmailQueueService>,
    repo: Arc<dyn EmailQueueRepository>,
    sender: Arc<dyn EmailSender>,
    receiver: mpsc::Receiver<i64>,
}

impl EmailWorker {
    pub fn new(
        queue: Arc<EmailQueueService>,
        sender: Arc<dyn EmailSender>,
        receiver: mpsc::Receiver<i64>,
    ) -> Self {
        Self {
            repo: Arc::clone(&queue.repo),
            queue,
            sender,
            receiver,
        }
    }

    /// Run until `cancel` fires
    ///
    /// Notified ids are sent immediately; the poll tick picks up retries and
    /// anything the channel missed.
    pub async fn run(mut self, cancel: CancellationToken) {
        let config = self.queue.config().clone();
        let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut channel_open = true;

        info!(
            "Email worker started (poll every {}s, batch {})",
            config.poll_interval_secs, config.batch_size
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Email worker stopping");
                    break;
                }

                notified = self.receiver.recv(), if channel_open => match notified {
                    Some(id) => {
                        if let Err(e) = self.process_one(id, Utc::now()).await {
                            error!("Failed to process email {}: {}", id, e);
                        }
                    }
                    None => {
                        debug!("Email channel closed, polling only");
                        channel_open = false;
                    }
                },

                _ = ticker.tick() => {
                    if let Err(e) = self.process_due(Utc::now(), config.batch_size).await {
                        error!("Failed to process due emails: {}", e);
                    }
                }
            }
        }
    }

    /// Claim and send one email; returns whether it was sent
    pub async fn process_one(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        let timeout = self.queue.config().claim_timeout_secs;
        let claimed_until = chrono::Duration::try_seconds(timeout.max(1))
            .and_then(|lease| now.checked_add_signed(lease))
            .ok_or_else(|| {
                AppError::Config(format!("email.claim_timeout_secs {} is out of range", timeout))
            })?;

        let email = match self.repo.claim(id, now, claimed_until).await? {
            Some(email) => email,
            None => {
                debug!("Email {} not due or already claimed", id);
                return Ok(false);
            }
        };

        match self.sender.send(&email).await {
            Ok(()) => {
                if let Err(e) = self.repo.mark_sent(email.id, now).await {
                    error!(
                        "Email {} was sent but not marked; claim expires at {}: {}",
                        email.id, claimed_until, e
                    );
                    return Err(e);
                }
                info!("Email {} sent to {}", email.id, email.to_address);
                Ok(true)
            }
            Err(e) => {
                if let Err(record_err) =
                    self.queue.record_failure(&email, &e.to_string(), now).await
                {
                    error!(
                        "Could not record failure of email {}; claim expires at {}: {}",
                        email.id, claimed_until, record_err
                    );
                    return Err(record_err);
                }
                Ok(false)
            }
        }
    }

    /// Send up to `limit` due emails; returns how many were sent
    pub async fn process_due(&self, now: DateTime<Utc>, limit: i64) -> AppResult<usize> {
        let due = self.repo.find_due(now, limit).await?;
        if due.is_empty() {
            return Ok(0);
        }

        let mut sent = 0;
        for email in &due {
            match self.process_one(email.id, now).await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => error!("Failed to process email {}: {}", email.id, e),
            }
        }

        debug!("Processed {} due emails, {} sent", due.len(), sent);
        Ok(sent)
    }
}
