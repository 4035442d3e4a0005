//! HTTP request handlers

pub mod health;
pub mod products;
pub mod sessions;
pub mod placements;
pub mod zones;

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Side, SideError};
use crate::engine::{AssetError, EditorError, RenderError, SharedSession};
use crate::AppState;

/// Error response
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Failures surfaced to API clients
#[derive(Debug, Error)]
pub enum ApiFailure {
    #[error("Session '{0}' does not exist")]
    SessionNotFound(Uuid),
    #[error("Product '{0}' does not exist")]
    ProductNotFound(String),
    #[error(transparent)]
    InvalidSide(#[from] SideError),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error("Design image could not be read: {0}")]
    DesignUnreadable(#[from] AssetError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ApiFailure {
    fn code(&self) -> &'static str {
        match self {
            ApiFailure::SessionNotFound(_) => "SESSION_NOT_FOUND",
            ApiFailure::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            ApiFailure::InvalidSide(_) => "INVALID_SIDE",
            ApiFailure::Editor(EditorError::UnknownProduct(_)) => "PRODUCT_NOT_FOUND",
            ApiFailure::Editor(EditorError::ModeMismatch { .. }) => "MODE_MISMATCH",
            ApiFailure::Editor(EditorError::Snapshot(_)) => "SNAPSHOT_FAILED",
            ApiFailure::DesignUnreadable(_) => "DESIGN_UNREADABLE",
            ApiFailure::Render(RenderError::Cancelled) => "RENDER_SUPERSEDED",
            ApiFailure::Render(RenderError::Encode(_)) => "RENDER_FAILED",
        }
    }
}

impl ResponseError for ApiFailure {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiFailure::SessionNotFound(_) | ApiFailure::ProductNotFound(_) => StatusCode::NOT_FOUND,
            ApiFailure::InvalidSide(_) => StatusCode::BAD_REQUEST,
            ApiFailure::Editor(EditorError::UnknownProduct(_)) => StatusCode::NOT_FOUND,
            ApiFailure::Editor(EditorError::ModeMismatch { .. }) => StatusCode::CONFLICT,
            ApiFailure::Editor(EditorError::Snapshot(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiFailure::DesignUnreadable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiFailure::Render(RenderError::Cancelled) => StatusCode::CONFLICT,
            ApiFailure::Render(RenderError::Encode(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            warn!(code = self.code(), error = %self, "Request failed");
        }

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            success: false,
            error: ApiError {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        })
    }
}

pub(crate) fn find_session(state: &AppState, id: Uuid) -> Result<SharedSession, ApiFailure> {
    state.sessions.get(&id).ok_or(ApiFailure::SessionNotFound(id))
}

pub(crate) fn parse_side(raw: &str) -> Result<Side, ApiFailure> {
    Ok(raw.parse::<Side>()?)
}
