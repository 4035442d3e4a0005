//! One-image-per-zone endpoints

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{UploadedFile, ZonePlacement};
use crate::AppState;
use super::sessions::MutationResponse;
use super::{find_session, parse_side, ApiFailure};

/// Request body for binding an image to a zone
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetZoneRequest {
    pub image_url: String,
    #[serde(default)]
    pub file: Option<UploadedFile>,
}

/// PUT /api/v1/sessions/{session_id}/sides/{side}/zones/{zone} - Bind an image to a zone
///
/// Replaces whatever the zone held. Zones the side does not offer are ignored.
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{session_id}/sides/{side}/zones/{zone}",
    tag = "zones",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("side" = String, Path, description = "Product side"),
        ("zone" = String, Path, description = "Print zone (e.g., 'leftChest')")
    ),
    request_body = SetZoneRequest,
    responses(
        (status = 200, description = "Zone image set, or ignored", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse),
        (status = 409, description = "Session is not in zone-per-image mode", body = super::ErrorResponse)
    )
)]
pub async fn set_zone(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String, String)>,
    body: web::Json<SetZoneRequest>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, raw_side, zone) = path.into_inner();
    let side = parse_side(&raw_side)?;
    let session = find_session(&state, session_id)?;
    let body = body.into_inner();

    let mut session = session.lock();
    let changed = session.set_zone_image(
        side,
        &zone,
        ZonePlacement { image_url: body.image_url, file: body.file },
    )?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// DELETE /api/v1/sessions/{session_id}/sides/{side}/zones/{zone} - Unbind a zone
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{session_id}/sides/{side}/zones/{zone}",
    tag = "zones",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("side" = String, Path, description = "Product side"),
        ("zone" = String, Path, description = "Print zone")
    ),
    responses(
        (status = 200, description = "Zone image removed, or nothing bound", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse),
        (status = 409, description = "Session is not in zone-per-image mode", body = super::ErrorResponse)
    )
)]
pub async fn remove_zone(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String, String)>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, raw_side, zone) = path.into_inner();
    let side = parse_side(&raw_side)?;
    let session = find_session(&state, session_id)?;

    let mut session = session.lock();
    let changed = session.remove_zone_image(side, &zone)?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// DELETE /api/v1/sessions/{session_id}/zones - Unbind every zone on every side
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{session_id}/zones",
    tag = "zones",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "All zones cleared", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse),
        (status = 409, description = "Session is not in zone-per-image mode", body = super::ErrorResponse)
    )
)]
pub async fn clear_zones(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiFailure> {
    let session = find_session(&state, path.into_inner())?;
    let mut session = session.lock();
    let changed = session.clear_zones()?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

#[cfg(test)]
mod tests {
    use actix_web::{test, web, App};
    use serde_json::{json, Value};

    use crate::api::configure_routes;
    use crate::config::Settings;
    use crate::engine::PrintAreaRegistry;
    use crate::AppState;

    fn app_state() -> web::Data<AppState> {
        let state = AppState::new(Settings::default(), PrintAreaRegistry::builtin().unwrap()).unwrap();
        web::Data::new(state)
    }

    macro_rules! create_session {
        ($app:expr, $mode:expr) => {{
            let req = test::TestRequest::post()
                .uri("/api/v1/sessions")
                .set_json(json!({ "product_id": "tshirt-regular-short", "mode": $mode }))
                .to_request();
            let body: Value = test::call_and_read_body_json($app, req).await;
            body["data"]["id"].as_str().unwrap().to_string()
        }};
    }

    #[actix_web::test]
    async fn test_zone_image_last_write_wins() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;
        let session_id = create_session!(&app, "zone_per_image");
        let uri = format!("/api/v1/sessions/{}/sides/front/zones/leftChest", session_id);

        for url in ["a.png", "b.png"] {
            let req = test::TestRequest::put()
                .uri(&uri)
                .set_json(json!({ "image_url": url }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), 200);
        }

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/sessions/{}", session_id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let front = body["data"]["zones"]["front"].as_object().unwrap();
        assert_eq!(front.len(), 1);
        assert_eq!(front["leftChest"]["image_url"], "b.png");

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/sessions/{}/zones", session_id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["changed"], true);
        assert!(body["data"]["zones"].as_object().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_zone_call_on_free_form_session_conflicts() {
        let app = test::init_service(App::new().app_data(app_state()).configure(configure_routes)).await;
        let session_id = create_session!(&app, "free_form");

        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/sessions/{}/sides/front/zones/leftChest", session_id))
            .set_json(json!({ "image_url": "a.png" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "MODE_MISMATCH");
    }
}
