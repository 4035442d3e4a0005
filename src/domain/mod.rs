//! Domain types and models

mod geometry;
mod placement;
pub mod catalog;

pub use geometry::{Point, Size, Rect, PrintAreaRect};
pub use placement::{
    Side, SideError, Placement, PlacementId, PlacementProps, PlacementPatch,
    ReorderDirection, UploadedFile, ZonePlacement, EditorMode,
};
pub use catalog::{
    BlendMode, SideTemplate, ProductTemplate, CatalogError,
    parse_catalog, load_catalog, BUILTIN_CATALOG,
};
