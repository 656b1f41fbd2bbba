//! Registrar price sync handlers

use crate::dto::{
    ApiResponse, ChangeLogQuery, SessionListQuery, SyncRegistrarQuery, SyncRunResponse,
};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use ispdesk_core::AppError;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Triggered-by label of syncs started over HTTP
pub const API_TRIGGER: &str = "api";

/// Sync every active registrar not yet synced today
///
/// POST /api/v1/price-sync
#[instrument(skip(state))]
pub async fn run_price_sync(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let cancel = state.shutdown.child_token();
    let sessions = state.price_sync.sync_all(API_TRIGGER, &cancel).await?;

    let response = SyncRunResponse::from(sessions);
    info!(
        attempted = response.attempted,
        failed = response.failed,
        "Price sync run completed"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

/// Sync one registrar
///
/// POST /api/v1/price-sync/registrars/{id}?force=
#[instrument(skip(state))]
pub async fn sync_registrar(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    query: web::Query<SyncRegistrarQuery>,
) -> Result<HttpResponse, AppError> {
    let registrar_id = path.into_inner();
    let cancel = state.shutdown.child_token();

    let session = state
        .price_sync
        .sync_registrar(registrar_id, API_TRIGGER, query.force, &cancel)
        .await?;

    match session {
        Some(session) => Ok(HttpResponse::Ok().json(ApiResponse::success(Some(session)))),
        None => Ok(HttpResponse::Ok().json(ApiResponse::<Option<()>>::with_message(
            None,
            format!("Registrar {} already synced today", registrar_id),
        ))),
    }
}

/// List download sessions, newest first
///
/// GET /api/v1/price-sync/sessions
#[instrument(skip(state))]
pub async fn list_sessions(
    state: web::Data<AppState>,
    query: web::Query<SessionListQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Session query validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let pagination = query.pagination();
    let (sessions, total) = state
        .ctx
        .sync_audit
        .list_sessions(query.registrar_id, pagination.limit(), pagination.offset())
        .await?;

    Ok(HttpResponse::Ok().json(pagination.paginate(sessions, total)))
}

/// Price changes recorded for a registrar offering, newest first
///
/// GET /api/v1/price-sync/registrar-tlds/{id}/changes
#[instrument(skip(state))]
pub async fn list_changes(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    query: web::Query<ChangeLogQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Change log query validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let changes = state
        .ctx
        .sync_audit
        .list_change_logs(path.into_inner(), query.limit)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(changes)))
}

/// Configure price sync routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/price-sync")
            .route("", web::post().to(run_price_sync))
            .route("/registrars/{id}", web::post().to(sync_registrar))
            .route("/sessions", web::get().to(list_sessions))
            .route("/registrar-tlds/{id}/changes", web::get().to(list_changes)),
    );
}
