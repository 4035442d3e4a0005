//! Placement records for designs applied to a product side
//!
//! A `Placement` is one design instance in the free-form editor. A
//! `ZonePlacement` is the single image bound to a zone in the simpler
//! one-image-per-zone editor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::geometry::{Point, Rect, Size};

/// Side parsing errors
#[derive(Debug, Error)]
pub enum SideError {
    #[error("Unknown product side: {0}")]
    Unknown(String),
}

/// Product side a design is printed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Front,
    Back,
    LeftSleeve,
    RightSleeve,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Front, Side::Back, Side::LeftSleeve, Side::RightSleeve];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
            Side::LeftSleeve => "left_sleeve",
            Side::RightSleeve => "right_sleeve",
        }
    }
}

impl FromStr for Side {
    type Err = SideError;

    /// Accepts snake_case, kebab-case and camelCase spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "front" => Ok(Side::Front),
            "back" => Ok(Side::Back),
            "leftsleeve" | "sleeveleft" => Ok(Side::LeftSleeve),
            "rightsleeve" | "sleeveright" => Ok(Side::RightSleeve),
            _ => Err(SideError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque placement identifier, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PlacementId(pub Uuid);

impl PlacementId {
    pub fn new() -> Self {
        PlacementId(Uuid::new_v4())
    }
}

impl Default for PlacementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PlacementId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(PlacementId)
    }
}

/// A design instance positioned on one product side
///
/// `x`, `y`, `width`, `height` hold the fitted (and user adjusted) rectangle
/// in mockup space. `scale` is applied on top of it about its centre, see
/// [`Placement::bounds`]. Z-order is the placement's position in its side's
/// ordered list, not a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Placement {
    pub id: PlacementId,
    /// URL or data URI of the source image
    pub design_id: String,
    /// Print-area key the placement was created against
    pub zone: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    /// Degrees, clockwise
    #[serde(default)]
    pub rotation: f64,
}

impl Placement {
    /// The stored rectangle before `scale` is applied
    pub fn base_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// The rectangle the placement is drawn into and hit-tested against
    pub fn bounds(&self) -> Rect {
        let base = self.base_rect();
        Rect::centered_at(
            base.center(),
            Size::new(base.width * self.scale, base.height * self.scale),
        )
    }

    pub fn center(&self) -> Point {
        self.base_rect().center()
    }

    /// Apply the present fields of a patch in place
    pub fn apply(&mut self, patch: &PlacementPatch) {
        if let Some(ref design_id) = patch.design_id {
            self.design_id = design_id.clone();
        }
        if let Some(ref zone) = patch.zone {
            self.zone = zone.clone();
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(width) = patch.width {
            self.width = width;
        }
        if let Some(height) = patch.height {
            self.height = height;
        }
        if let Some(scale) = patch.scale {
            self.scale = scale;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
    }
}

/// Initial geometry for a new placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlacementProps {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Rect> for PlacementProps {
    fn from(rect: Rect) -> Self {
        PlacementProps { x: rect.x, y: rect.y, width: rect.width, height: rect.height }
    }
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PlacementPatch {
    #[serde(default)]
    pub design_id: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub rotation: Option<f64>,
}

impl PlacementPatch {
    pub fn is_empty(&self) -> bool {
        *self == PlacementPatch::default()
    }
}

/// Direction for a one-step z-order change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReorderDirection {
    /// Towards the top of the stack (drawn later)
    Up,
    /// Towards the bottom of the stack (drawn earlier)
    Down,
}

/// Metadata about an uploaded file backing a zone image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// The single image bound to a zone in one-image-per-zone mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ZonePlacement {
    pub image_url: String,
    #[serde(default)]
    pub file: Option<UploadedFile>,
}

/// How an editing session models designs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    /// Any number of placements per side with z-order
    FreeForm,
    /// At most one image per print zone
    ZonePerImage,
}

impl Default for EditorMode {
    fn default() -> Self {
        EditorMode::FreeForm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Placement {
        Placement {
            id: PlacementId::new(),
            design_id: "data:image/png;base64,AAAA".to_string(),
            zone: "fullCenter".to_string(),
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 100.0,
            scale: 1.0,
            rotation: 0.0,
        }
    }

    #[test]
    fn test_bounds_scale_about_center() {
        let mut placement = sample();
        placement.scale = 2.0;

        let bounds = placement.bounds();
        assert_eq!(bounds, Rect::new(0.0, 50.0, 400.0, 200.0));
        assert_eq!(bounds.center(), placement.center());
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut placement = sample();
        let before = placement.clone();

        placement.apply(&PlacementPatch { x: Some(5.0), rotation: Some(45.0), ..Default::default() });

        assert_eq!(placement.x, 5.0);
        assert_eq!(placement.rotation, 45.0);
        assert_eq!(placement.y, before.y);
        assert_eq!(placement.design_id, before.design_id);
        assert_eq!(placement.id, before.id);
    }

    #[test]
    fn test_side_parsing_accepts_common_spellings() {
        assert_eq!("front".parse::<Side>().unwrap(), Side::Front);
        assert_eq!("leftSleeve".parse::<Side>().unwrap(), Side::LeftSleeve);
        assert_eq!("right-sleeve".parse::<Side>().unwrap(), Side::RightSleeve);
        assert!(matches!("pocket".parse::<Side>(), Err(SideError::Unknown(_))));
    }
}
