//! OpenAPI 3.0 specification definition

use utoipa::OpenApi;

use crate::api::handlers::{
    health::HealthResponse,
    placements::{
        AddPlacementRequest, AddPlacementResponse, MoveRequest, ReorderRequest,
        ResizeRequest, SetActiveRequest,
    },
    products::{ProductSummary, ProductsListResponse, ZoneInfo, ZonesResponse},
    sessions::{
        CreateSessionRequest, HitTestResponse, MutationResponse, SessionResponse,
        SessionView, ViewportInfo,
    },
    zones::SetZoneRequest,
    ApiError, ErrorResponse,
};
use crate::domain::{
    EditorMode, Placement, PlacementId, PlacementPatch, PrintAreaRect, ReorderDirection,
    Side, Size, UploadedFile, ZonePlacement,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "R-Print-Canvas API",
        version = "1.0.0",
        description = "Print-area placement, fitting and mockup compositing for print-on-demand garment customizers",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "products", description = "Product catalog and print zones"),
        (name = "sessions", description = "Editing sessions, history and rendering"),
        (name = "placements", description = "Free-form design placements"),
        (name = "zones", description = "One image per print zone")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::products::list_products,
        crate::api::handlers::products::list_zones,
        crate::api::handlers::sessions::create_session,
        crate::api::handlers::sessions::get_session,
        crate::api::handlers::sessions::delete_session,
        crate::api::handlers::sessions::undo,
        crate::api::handlers::sessions::redo,
        crate::api::handlers::sessions::reset,
        crate::api::handlers::sessions::hit_test,
        crate::api::handlers::sessions::preview,
        crate::api::handlers::sessions::export,
        crate::api::handlers::placements::add_placement,
        crate::api::handlers::placements::update_placement,
        crate::api::handlers::placements::remove_placement,
        crate::api::handlers::placements::duplicate_placement,
        crate::api::handlers::placements::reorder_placement,
        crate::api::handlers::placements::resize_placement,
        crate::api::handlers::placements::move_placement,
        crate::api::handlers::placements::set_active,
        crate::api::handlers::placements::clear_side,
        crate::api::handlers::zones::set_zone,
        crate::api::handlers::zones::remove_zone,
        crate::api::handlers::zones::clear_zones,
    ),
    components(
        schemas(
            // System
            HealthResponse,
            ErrorResponse,
            ApiError,
            // Products
            ProductSummary,
            ProductsListResponse,
            ZoneInfo,
            ZonesResponse,
            // Sessions
            CreateSessionRequest,
            SessionView,
            SessionResponse,
            MutationResponse,
            HitTestResponse,
            ViewportInfo,
            // Placements
            AddPlacementRequest,
            AddPlacementResponse,
            ReorderRequest,
            ResizeRequest,
            MoveRequest,
            SetActiveRequest,
            // Zones
            SetZoneRequest,
            // Domain
            Side,
            Size,
            PrintAreaRect,
            EditorMode,
            Placement,
            PlacementId,
            PlacementPatch,
            ReorderDirection,
            UploadedFile,
            ZonePlacement,
        )
    )
)]
pub struct ApiDoc;
