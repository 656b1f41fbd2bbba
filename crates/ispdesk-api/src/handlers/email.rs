//! Email queue handlers

use crate::dto::{ApiResponse, EmailQueueStats, EmailStatusResponse, EnqueueEmailRequest};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use ispdesk_core::models::EmailStatus;
use ispdesk_core::AppError;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Queue an email for delivery
///
/// POST /api/v1/emails
#[instrument(skip(state, req))]
pub async fn enqueue_email(
    state: web::Data<AppState>,
    req: web::Json<EnqueueEmailRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Email validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let queued = state.emails.enqueue(req.into_inner().into()).await?;

    info!(id = queued.id, "Email queued");
    Ok(HttpResponse::Accepted().json(ApiResponse::success(EmailStatusResponse::from(queued))))
}

/// Delivery state of one email
///
/// GET /api/v1/emails/{id}
#[instrument(skip(state))]
pub async fn get_email(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let email = state
        .emails
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Email {} not found", id)))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(EmailStatusResponse::from(email))))
}

/// Queue size per delivery state
///
/// GET /api/v1/emails/stats
#[instrument(skip(state))]
pub async fn email_stats(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let stats = EmailQueueStats {
        pending: state.emails.count_by_status(EmailStatus::Pending).await?,
        sending: state.emails.count_by_status(EmailStatus::Sending).await?,
        sent: state.emails.count_by_status(EmailStatus::Sent).await?,
        failed: state.emails.count_by_status(EmailStatus::Failed).await?,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

/// Configure email routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/emails")
            .route("", web::post().to(enqueue_email))
            .route("/stats", web::get().to(email_stats))
            .route("/{id}", web::get().to(get_email)),
    );
}
