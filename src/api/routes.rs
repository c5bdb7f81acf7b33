// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        // API v1 routes (all require authentication)
        .service(
            web::scope("/api/v1")
                .route(
                    "/listings/{id}/sync",
                    web::post().to(handlers::sync_listing),
                )
                .route(
                    "/listings/bulk-sync",
                    web::post().to(handlers::bulk_sync),
                )
                .route(
                    "/listings/{id}/status",
                    web::get().to(handlers::listing_status),
                ),
        );
}
