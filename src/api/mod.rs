//! API module - HTTP routes and handlers

pub mod handlers;
pub mod openapi;

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers::{placements, products, sessions, zones};
use crate::api::openapi::ApiDoc;

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/products")
                    .route("", web::get().to(products::list_products))
                    .route("/{product_id}/sides/{side}/zones", web::get().to(products::list_zones))
            )
            .service(
                web::scope("/sessions")
                    .route("", web::post().to(sessions::create_session))
                    .route("/{session_id}", web::get().to(sessions::get_session))
                    .route("/{session_id}", web::delete().to(sessions::delete_session))
                    .route("/{session_id}/undo", web::post().to(sessions::undo))
                    .route("/{session_id}/redo", web::post().to(sessions::redo))
                    .route("/{session_id}/reset", web::post().to(sessions::reset))
                    // Free-form placements
                    .route("/{session_id}/placements", web::post().to(placements::add_placement))
                    .route("/{session_id}/placements/{placement_id}", web::patch().to(placements::update_placement))
                    .route("/{session_id}/placements/{placement_id}", web::delete().to(placements::remove_placement))
                    .route("/{session_id}/placements/{placement_id}/duplicate", web::post().to(placements::duplicate_placement))
                    .route("/{session_id}/placements/{placement_id}/reorder", web::post().to(placements::reorder_placement))
                    .route("/{session_id}/placements/{placement_id}/resize", web::post().to(placements::resize_placement))
                    .route("/{session_id}/placements/{placement_id}/move", web::post().to(placements::move_placement))
                    .route("/{session_id}/active", web::put().to(placements::set_active))
                    .route("/{session_id}/sides/{side}/placements", web::delete().to(placements::clear_side))
                    // One image per zone
                    .route("/{session_id}/zones", web::delete().to(zones::clear_zones))
                    .route("/{session_id}/sides/{side}/zones/{zone}", web::put().to(zones::set_zone))
                    .route("/{session_id}/sides/{side}/zones/{zone}", web::delete().to(zones::remove_zone))
                    // Rendering
                    .route("/{session_id}/sides/{side}/hit-test", web::get().to(sessions::hit_test))
                    .route("/{session_id}/sides/{side}/preview.png", web::get().to(sessions::preview))
                    .route("/{session_id}/sides/{side}/export.png", web::get().to(sessions::export))
            )
    )
    .route("/health", web::get().to(handlers::health::health_check))
    // Swagger UI and OpenAPI spec
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}")
            .url("/api-docs/openapi.json", ApiDoc::openapi())
    );
}
