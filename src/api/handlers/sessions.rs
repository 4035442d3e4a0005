//! Editing session endpoints: lifecycle, history, hit-testing and rendering

use std::collections::BTreeMap;

use actix_web::{http::header, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{EditorMode, Placement, PlacementId, Side, ZonePlacement};
use crate::engine::{CancelToken, EditorSession, LayerKey, Layout, RenderTarget};
use crate::AppState;
use super::{find_session, parse_side, ApiFailure};

/// Request body for starting a session
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    /// Product identifier (e.g., "tshirt-regular-short")
    pub product_id: String,
    /// Garment colour; mockups fall back to the product's first colour
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub mode: EditorMode,
}

/// Full state of an editing session
#[derive(Serialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    pub product_id: String,
    pub color: Option<String>,
    pub mode: EditorMode,
    pub created_at: DateTime<Utc>,
    /// Free-form placements per side, bottom first
    pub placements: BTreeMap<Side, Vec<Placement>>,
    pub active_placement_id: Option<PlacementId>,
    /// One-image-per-zone bindings per side
    pub zones: BTreeMap<Side, BTreeMap<String, ZonePlacement>>,
    pub can_undo: bool,
    pub can_redo: bool,
}

impl SessionView {
    pub fn from_session(session: &EditorSession) -> Self {
        let mut placements = BTreeMap::new();
        let mut zones = BTreeMap::new();
        let mut active_placement_id = None;

        match session.layout() {
            Layout::FreeForm(store) => {
                for side in Side::ALL {
                    let on_side: Vec<Placement> = store.get_for_side(side).into_iter().cloned().collect();
                    if !on_side.is_empty() {
                        placements.insert(side, on_side);
                    }
                }
                active_placement_id = store.active_id();
            }
            Layout::ZonePerImage(sides) => {
                for (side, store) in sides {
                    if store.is_empty() {
                        continue;
                    }
                    let bound = store
                        .iter()
                        .map(|(zone, placement)| (zone.to_string(), placement.clone()))
                        .collect();
                    zones.insert(*side, bound);
                }
            }
        }

        SessionView {
            id: session.id(),
            product_id: session.product().id.clone(),
            color: session.color().map(str::to_string),
            mode: session.mode(),
            created_at: session.created_at(),
            placements,
            active_placement_id,
            zones,
            can_undo: session.can_undo(),
            can_redo: session.can_redo(),
        }
    }
}

/// Response carrying the session state
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub success: bool,
    pub data: SessionView,
}

/// Response for a mutation; `changed` is false when the request was a no-op
#[derive(Serialize, ToSchema)]
pub struct MutationResponse {
    pub success: bool,
    pub changed: bool,
    pub data: SessionView,
}

impl MutationResponse {
    pub fn new(changed: bool, session: &EditorSession) -> Self {
        MutationResponse {
            success: true,
            changed,
            data: SessionView::from_session(session),
        }
    }
}

/// Canvas point in preview pixels
#[derive(Debug, Deserialize, IntoParams)]
pub struct HitTestQuery {
    pub x: f64,
    pub y: f64,
}

/// Raster size and mockup-to-raster scale
#[derive(Serialize, ToSchema)]
pub struct ViewportInfo {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

/// What lies under a canvas point; both fields null means "deselect"
#[derive(Serialize, ToSchema)]
pub struct HitTestResponse {
    pub success: bool,
    pub placement_id: Option<PlacementId>,
    pub zone: Option<String>,
    pub viewport: ViewportInfo,
}

/// POST /api/v1/sessions - Start an editing session
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 404, description = "Product not found", body = super::ErrorResponse)
    )
)]
pub async fn create_session(
    state: web::Data<AppState>,
    body: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse, ApiFailure> {
    let body = body.into_inner();
    let (_, session) = state.sessions.create(&body.product_id, body.color, body.mode)?;
    let view = SessionView::from_session(&session.lock());

    Ok(HttpResponse::Created().json(SessionResponse { success: true, data: view }))
}

/// GET /api/v1/sessions/{session_id} - Current session state
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session state", body = SessionResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn get_session(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiFailure> {
    let session = find_session(&state, path.into_inner())?;
    let view = SessionView::from_session(&session.lock());

    Ok(HttpResponse::Ok().json(SessionResponse { success: true, data: view }))
}

/// DELETE /api/v1/sessions/{session_id} - End a session
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{session_id}",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 204, description = "Session closed"),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn delete_session(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiFailure> {
    let id = path.into_inner();
    if state.sessions.remove(&id) {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiFailure::SessionNotFound(id))
    }
}

/// POST /api/v1/sessions/{session_id}/undo - Step back one action
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/undo",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Undo applied, or nothing to undo", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn undo(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiFailure> {
    let session = find_session(&state, path.into_inner())?;
    let mut session = session.lock();
    let changed = session.undo()?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// POST /api/v1/sessions/{session_id}/redo - Step forward one action
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/redo",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Redo applied, or nothing to redo", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn redo(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiFailure> {
    let session = find_session(&state, path.into_inner())?;
    let mut session = session.lock();
    let changed = session.redo()?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// POST /api/v1/sessions/{session_id}/reset - Drop every design on every side
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/reset",
    tag = "sessions",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Canvas cleared; undo restores it", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn reset(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiFailure> {
    let session = find_session(&state, path.into_inner())?;
    let mut session = session.lock();
    let changed = session.reset()?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// GET /api/v1/sessions/{session_id}/sides/{side}/hit-test - Topmost design under a preview point
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}/sides/{side}/hit-test",
    tag = "sessions",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("side" = String, Path, description = "Product side"),
        HitTestQuery
    ),
    responses(
        (status = 200, description = "Hit-test result", body = HitTestResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn hit_test(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
    query: web::Query<HitTestQuery>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, raw_side) = path.into_inner();
    let side = parse_side(&raw_side)?;
    let session = find_session(&state, session_id)?;

    let frame = session.lock().frame(side);
    let viewport = state.compositor.preview_viewport(&frame);
    let hit = crate::engine::hit_test(&frame, &viewport, query.x, query.y);

    let (placement_id, zone) = match hit {
        Some(LayerKey::Placement(id)) => (Some(id), None),
        Some(LayerKey::Zone(zone)) => (None, Some(zone)),
        None => (None, None),
    };

    Ok(HttpResponse::Ok().json(HitTestResponse {
        success: true,
        placement_id,
        zone,
        viewport: ViewportInfo {
            width: viewport.width,
            height: viewport.height,
            scale: viewport.scale,
        },
    }))
}

/// GET /api/v1/sessions/{session_id}/sides/{side}/preview.png - Working-resolution preview
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}/sides/{side}/preview.png",
    tag = "sessions",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("side" = String, Path, description = "Product side")
    ),
    responses(
        (status = 200, description = "PNG preview with the active design outlined", content_type = "image/png"),
        (status = 404, description = "Session not found", body = super::ErrorResponse),
        (status = 409, description = "Superseded by a newer preview request", body = super::ErrorResponse)
    )
)]
pub async fn preview(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, raw_side) = path.into_inner();
    let side = parse_side(&raw_side)?;
    let session = find_session(&state, session_id)?;

    // Never hold the session lock across the render
    let (frame, token) = {
        let mut guard = session.lock();
        let token = guard.begin_render();
        (guard.frame(side), token)
    };

    let output = state.compositor.render(&frame, RenderTarget::Preview, &token).await?;

    Ok(HttpResponse::Ok()
        .content_type("image/png")
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .body(output.png))
}

/// GET /api/v1/sessions/{session_id}/sides/{side}/export.png - Full-resolution export
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{session_id}/sides/{side}/export.png",
    tag = "sessions",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("side" = String, Path, description = "Product side")
    ),
    responses(
        (status = 200, description = "PNG at the mockup's native resolution", content_type = "image/png"),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn export(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, raw_side) = path.into_inner();
    let side = parse_side(&raw_side)?;
    let session = find_session(&state, session_id)?;

    let frame = session.lock().frame(side);
    let output = state
        .compositor
        .render(&frame, RenderTarget::Export, &CancelToken::new())
        .await?;

    info!(
        session_id = %session_id,
        side = %side,
        width = output.width,
        height = output.height,
        "Mockup exported"
    );

    let filename = format!("{}-{}.png", frame.product_id, side);
    Ok(HttpResponse::Ok()
        .content_type("image/png")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ))
        .body(output.png))
}
