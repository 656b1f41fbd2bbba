//! Pricing handlers
//!
//! Quotes, margin reports, registrar ranking and maintenance of the
//! effective-dated cost/sales price series.

use crate::dto::{
    ApiResponse, CandidateQuery, CostPricingRequest, CostPricingResponse, DiscountRequest,
    MarginQuery, PricingWindowQuery, PricingWindows, QuoteQuery, SalesPricingRequest,
    SalesPricingResponse,
};
use crate::dto::pricing::parse_operation;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use ispdesk_core::AppError;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Quote a TLD operation
///
/// GET /api/v1/pricing/quote
#[instrument(skip(state))]
pub async fn get_quote(
    state: web::Data<AppState>,
    query: web::Query<QuoteQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Quote validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let request = query.into_inner().into_request(Utc::now())?;
    let quote = state.calculator.quote(&request).await?;

    debug!(tld = %quote.extension, total = %quote.total, "Quote computed");
    Ok(HttpResponse::Ok().json(ApiResponse::success(quote)))
}

/// Margin per TLD operation
///
/// GET /api/v1/pricing/margins
#[instrument(skip(state))]
pub async fn get_margins(
    state: web::Data<AppState>,
    query: web::Query<MarginQuery>,
) -> Result<HttpResponse, AppError> {
    let at = query.at.unwrap_or_else(Utc::now);

    let analyses = if query.flagged_only {
        state.margins.flagged(query.company_id, at).await?
    } else {
        state.margins.analyze_all(query.company_id, at).await?
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(analyses)))
}

/// Registrars able to serve a TLD, best first
///
/// GET /api/v1/pricing/tlds/{tld_id}/registrars
#[instrument(skip(state))]
pub async fn get_candidates(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    query: web::Query<CandidateQuery>,
) -> Result<HttpResponse, AppError> {
    let tld_id = path.into_inner();
    let operation = parse_operation(&query.operation)?;
    let at = query.at.unwrap_or_else(Utc::now);

    let candidates = state.selector.candidates(tld_id, operation, at).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(candidates)))
}

/// Current, scheduled and past sales prices of a TLD
///
/// GET /api/v1/pricing/tlds/{tld_id}/sales
#[instrument(skip(state))]
pub async fn get_sales_pricing(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    query: web::Query<PricingWindowQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Sales pricing query validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let tld_id = path.into_inner();
    let at = query.at.unwrap_or_else(Utc::now);

    let windows = PricingWindows {
        current: state
            .pricing
            .current_sales(tld_id, at)
            .await?
            .map(SalesPricingResponse::from),
        future: into_responses(state.pricing.future_sales(tld_id, at).await?),
        history: into_responses(state.pricing.sales_history(tld_id, query.limit).await?),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(windows)))
}

/// Schedule a sales price for a TLD
///
/// POST /api/v1/pricing/tlds/{tld_id}/sales
#[instrument(skip(state, req))]
pub async fn create_sales_pricing(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    req: web::Json<SalesPricingRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Sales pricing validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let tld_id = path.into_inner();
    let pricing = req.into_inner().into_new_pricing(tld_id, Utc::now());
    let created = state.pricing.schedule_sales_pricing(pricing).await?;

    info!(id = created.id, tld_id, "Sales pricing scheduled");
    Ok(HttpResponse::Created().json(ApiResponse::success(SalesPricingResponse::from(created))))
}

/// Current, scheduled and past cost prices of a registrar offering
///
/// GET /api/v1/pricing/registrar-tlds/{id}/cost
#[instrument(skip(state))]
pub async fn get_cost_pricing(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    query: web::Query<PricingWindowQuery>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Cost pricing query validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let registrar_tld_id = path.into_inner();
    let at = query.at.unwrap_or_else(Utc::now);

    let windows = PricingWindows {
        current: state
            .pricing
            .current_cost(registrar_tld_id, at)
            .await?
            .map(CostPricingResponse::from),
        future: into_responses(state.pricing.future_costs(registrar_tld_id, at).await?),
        history: into_responses(
            state
                .pricing
                .cost_history(registrar_tld_id, query.limit)
                .await?,
        ),
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(windows)))
}

/// Schedule a cost price for a registrar offering
///
/// POST /api/v1/pricing/registrar-tlds/{id}/cost
#[instrument(skip(state, req))]
pub async fn create_cost_pricing(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    req: web::Json<CostPricingRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Cost pricing validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let registrar_tld_id = path.into_inner();
    let pricing = req.into_inner().into_new_pricing(registrar_tld_id, Utc::now());
    let created = state.pricing.schedule_cost_pricing(pricing).await?;

    info!(id = created.id, registrar_tld_id, "Cost pricing scheduled");
    Ok(HttpResponse::Created().json(ApiResponse::success(CostPricingResponse::from(created))))
}

/// Grant a reseller discount
///
/// POST /api/v1/pricing/discounts
#[instrument(skip(state, req))]
pub async fn create_discount(
    state: web::Data<AppState>,
    req: web::Json<DiscountRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Discount validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let discount = req.into_inner().into_new_discount(Utc::now())?;
    let created = state.pricing.schedule_discount(discount).await?;

    info!(
        id = created.id,
        company_id = created.reseller_company_id,
        tld_id = created.tld_id,
        "Discount scheduled"
    );
    Ok(HttpResponse::Created().json(ApiResponse::success(created)))
}

/// Move long-closed pricing rows to the archive tables
///
/// POST /api/v1/pricing/archive
#[instrument(skip(state))]
pub async fn archive_pricing(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let stats = state.pricing.archive_closed().await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        stats,
        format!(
            "Archived {} cost and {} sales rows",
            stats.cost_rows, stats.sales_rows
        ),
    )))
}

fn into_responses<T, R: From<T>>(rows: Vec<T>) -> Vec<R> {
    rows.into_iter().map(R::from).collect()
}

/// Configure pricing routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/pricing")
            .route("/quote", web::get().to(get_quote))
            .route("/margins", web::get().to(get_margins))
            .route("/discounts", web::post().to(create_discount))
            .route("/archive", web::post().to(archive_pricing))
            .route("/tlds/{tld_id}/registrars", web::get().to(get_candidates))
            .route("/tlds/{tld_id}/sales", web::get().to(get_sales_pricing))
            .route("/tlds/{tld_id}/sales", web::post().to(create_sales_pricing))
            .route("/registrar-tlds/{id}/cost", web::get().to(get_cost_pricing))
            .route("/registrar-tlds/{id}/cost", web::post().to(create_cost_pricing)),
    );
}
