//! Free-form placement endpoints

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{PlacementId, PlacementPatch, ReorderDirection, Side, Size};
use crate::AppState;
use super::sessions::{MutationResponse, SessionView};
use super::{find_session, ApiFailure};

/// Request body for placing a design
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddPlacementRequest {
    pub side: Side,
    /// URL, data URI or asset path of the design image
    pub design_id: String,
    /// Print zone to fit the design into (e.g., "fullCenter")
    pub zone: String,
    /// Natural pixel size of the design; read from the image when omitted
    #[serde(default)]
    pub natural_width: Option<f64>,
    #[serde(default)]
    pub natural_height: Option<f64>,
}

/// Response for a new placement; `placement_id` is null when the zone is not offered
#[derive(Serialize, ToSchema)]
pub struct AddPlacementResponse {
    pub success: bool,
    pub placement_id: Option<PlacementId>,
    pub data: SessionView,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub direction: ReorderDirection,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResizeRequest {
    /// Multiplier applied to the current width and height
    pub factor: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveRequest {
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    /// Placement to select; null clears the selection
    #[serde(default)]
    pub placement_id: Option<PlacementId>,
}

/// POST /api/v1/sessions/{session_id}/placements - Contain-fit a design into a zone
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/placements",
    tag = "placements",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    request_body = AddPlacementRequest,
    responses(
        (status = 201, description = "Design placed and selected", body = AddPlacementResponse),
        (status = 200, description = "Zone not offered, nothing placed", body = AddPlacementResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse),
        (status = 409, description = "Session is not in free-form mode", body = super::ErrorResponse),
        (status = 422, description = "Design image could not be read", body = super::ErrorResponse)
    )
)]
pub async fn add_placement(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<AddPlacementRequest>,
) -> Result<HttpResponse, ApiFailure> {
    let session = find_session(&state, path.into_inner())?;
    let body = body.into_inner();

    // Image dimensions are read before the session is locked
    let natural = match (body.natural_width, body.natural_height) {
        (Some(width), Some(height)) => Size::new(width, height),
        _ => {
            let (width, height) = state.compositor.loader().dimensions(&body.design_id).await?;
            debug!(design = %body.design_id, width, height, "Read natural design size");
            Size::new(width as f64, height as f64)
        }
    };

    let mut session = session.lock();
    let placement_id = session.add_design(body.side, &body.design_id, &body.zone, natural)?;
    let response = AddPlacementResponse {
        success: true,
        placement_id,
        data: SessionView::from_session(&session),
    };

    if placement_id.is_some() {
        Ok(HttpResponse::Created().json(response))
    } else {
        Ok(HttpResponse::Ok().json(response))
    }
}

/// PATCH /api/v1/sessions/{session_id}/placements/{placement_id} - Edit a placement
///
/// Absent fields are left untouched. Rotation is normalised into `[0, 360)`
/// and scale is clamped to the configured range. Unknown ids are a no-op.
#[utoipa::path(
    patch,
    path = "/api/v1/sessions/{session_id}/placements/{placement_id}",
    tag = "placements",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("placement_id" = Uuid, Path, description = "Placement identifier")
    ),
    request_body = PlacementPatch,
    responses(
        (status = 200, description = "Edit applied, or ignored for a stale id", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn update_placement(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, PlacementId)>,
    body: web::Json<PlacementPatch>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, placement_id) = path.into_inner();
    let session = find_session(&state, session_id)?;
    let mut session = session.lock();
    let changed = session.edit_placement(placement_id, body.into_inner())?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// DELETE /api/v1/sessions/{session_id}/placements/{placement_id} - Remove a placement
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{session_id}/placements/{placement_id}",
    tag = "placements",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("placement_id" = Uuid, Path, description = "Placement identifier")
    ),
    responses(
        (status = 200, description = "Removed, or ignored for a stale id", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn remove_placement(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, PlacementId)>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, placement_id) = path.into_inner();
    let session = find_session(&state, session_id)?;
    let mut session = session.lock();
    let changed = session.remove_placement(placement_id)?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// POST /api/v1/sessions/{session_id}/placements/{placement_id}/duplicate - Copy a placement
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/placements/{placement_id}/duplicate",
    tag = "placements",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("placement_id" = Uuid, Path, description = "Placement identifier")
    ),
    responses(
        (status = 200, description = "Copy placed on top and selected", body = AddPlacementResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn duplicate_placement(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, PlacementId)>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, placement_id) = path.into_inner();
    let session = find_session(&state, session_id)?;
    let mut session = session.lock();
    let copy = session.duplicate_placement(placement_id)?;

    Ok(HttpResponse::Ok().json(AddPlacementResponse {
        success: true,
        placement_id: copy,
        data: SessionView::from_session(&session),
    }))
}

/// POST /api/v1/sessions/{session_id}/placements/{placement_id}/reorder - Move one step in z-order
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/placements/{placement_id}/reorder",
    tag = "placements",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("placement_id" = Uuid, Path, description = "Placement identifier")
    ),
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Reordered, or already at the top/bottom", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn reorder_placement(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, PlacementId)>,
    body: web::Json<ReorderRequest>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, placement_id) = path.into_inner();
    let session = find_session(&state, session_id)?;
    let mut session = session.lock();
    let changed = session.reorder_placement(placement_id, body.direction)?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// POST /api/v1/sessions/{session_id}/placements/{placement_id}/resize - Scale about the centre
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/placements/{placement_id}/resize",
    tag = "placements",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("placement_id" = Uuid, Path, description = "Placement identifier")
    ),
    request_body = ResizeRequest,
    responses(
        (status = 200, description = "Resized within the zone's bounds", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn resize_placement(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, PlacementId)>,
    body: web::Json<ResizeRequest>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, placement_id) = path.into_inner();
    let session = find_session(&state, session_id)?;
    let mut session = session.lock();
    let changed = session.resize_by(placement_id, body.factor)?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// POST /api/v1/sessions/{session_id}/placements/{placement_id}/move - Drag by an offset
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{session_id}/placements/{placement_id}/move",
    tag = "placements",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("placement_id" = Uuid, Path, description = "Placement identifier")
    ),
    request_body = MoveRequest,
    responses(
        (status = 200, description = "Moved, or ignored for a stale id", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn move_placement(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, PlacementId)>,
    body: web::Json<MoveRequest>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, placement_id) = path.into_inner();
    let session = find_session(&state, session_id)?;
    let mut session = session.lock();
    let changed = session.move_by(placement_id, body.dx, body.dy)?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// PUT /api/v1/sessions/{session_id}/active - Select or deselect a placement
#[utoipa::path(
    put,
    path = "/api/v1/sessions/{session_id}/active",
    tag = "placements",
    params(("session_id" = Uuid, Path, description = "Session identifier")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Selection updated", body = MutationResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn set_active(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<SetActiveRequest>,
) -> Result<HttpResponse, ApiFailure> {
    let session = find_session(&state, path.into_inner())?;
    let mut session = session.lock();
    let changed = session.set_active(body.placement_id)?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}

/// DELETE /api/v1/sessions/{session_id}/sides/{side}/placements - Clear one side
#[utoipa::path(
    delete,
    path = "/api/v1/sessions/{session_id}/sides/{side}/placements",
    tag = "placements",
    params(
        ("session_id" = Uuid, Path, description = "Session identifier"),
        ("side" = String, Path, description = "Product side")
    ),
    responses(
        (status = 200, description = "Side cleared", body = MutationResponse),
        (status = 400, description = "Unknown side name", body = super::ErrorResponse),
        (status = 404, description = "Session not found", body = super::ErrorResponse)
    )
)]
pub async fn clear_side(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, ApiFailure> {
    let (session_id, raw_side) = path.into_inner();
    let side = super::parse_side(&raw_side)?;
    let session = find_session(&state, session_id)?;
    let mut session = session.lock();
    let changed = session.clear_side(side)?;

    Ok(HttpResponse::Ok().json(MutationResponse::new(changed, &session)))
}
