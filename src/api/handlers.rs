// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::api::server::AppState;
use crate::database_ops::models::Listing;
use actix_web::{web, HttpResponse, Result};
use std::time::SystemTime;

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    // Quick database connectivity check
    let db_status = match sqlx::query_scalar::<_, bool>("SELECT true")
        .fetch_one(&state.db.pool)
        .await
    {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let uptime = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        uptime_seconds: uptime,
    });

    Ok(HttpResponse::Ok().json(response))
}

/// Sync one listing to the marketplace
pub async fn sync_listing(
    path: web::Path<i64>,
    payload: Option<web::Json<SyncTriggerRequest>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let listing_id = path.into_inner();
    let dry_run = payload.map(|p| p.dry_run).unwrap_or(false);

    tracing::info!(listing_id, dry_run, "Listing sync requested");

    let report = state.orchestrator.sync_report(listing_id, dry_run).await;
    let ok = report.status != "error";
    let response = ApiResponse {
        success: ok,
        data: Some(report),
        error: None,
        meta: Some(Meta::now()),
    };
    if ok {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::UnprocessableEntity().json(response))
    }
}

/// Sync a batch of listings; always 200 with per-item reports
pub async fn bulk_sync(
    payload: web::Json<BulkSyncRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    if payload.listing_ids.is_empty() {
        return Ok(HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error("listing_ids must not be empty")));
    }

    tracing::info!(
        count = payload.listing_ids.len(),
        batch_size = ?payload.batch_size,
        "Bulk sync requested"
    );

    let summary = state
        .orchestrator
        .bulk_sync(&payload.listing_ids, payload.batch_size)
        .await;

    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

/// Current sync status of one listing
pub async fn listing_status(
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let listing_id = path.into_inner();

    let row = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1")
        .bind(listing_id)
        .fetch_optional(&state.db.pool)
        .await;

    match row {
        Ok(Some(listing)) => {
            let response = ApiResponse::success(ListingStatusResponse {
                listing_id: listing.id,
                sku: listing.sku,
                sync_status: listing.sync_status,
                remote_listing_id: listing.remote_listing_id,
                last_synced_at: listing.last_synced_at,
                sync_error: listing.sync_error,
            });
            Ok(HttpResponse::Ok().json(response))
        }
        Ok(None) => Ok(HttpResponse::NotFound()
            .json(ApiResponse::<()>::error(format!("listing {listing_id} not found")))),
        Err(e) => {
            tracing::error!(listing_id, error = %e, "Status query failed");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("status query failed")))
        }
    }
}
