//! Product template catalog
//!
//! Static configuration describing each customizable product: which sides it
//! has, the print zones on each side, the mockup image per colour and the
//! compositing parameters. Consumed read-only by the registry.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::geometry::{PrintAreaRect, Size};
use super::placement::Side;

/// Built-in catalog shipped with the service
pub const BUILTIN_CATALOG: &str = include_str!("../../assets/catalog/products.json");

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Duplicate product id: {0}")]
    DuplicateProduct(String),
    #[error("Product {0} has an empty mockup size")]
    EmptyMockup(String),
    #[error("Product {product} declares side {side} twice")]
    DuplicateSide { product: String, side: Side },
    #[error("Zone {zone} on {product}/{side} has a negative dimension")]
    NegativeZone { product: String, side: Side, zone: String },
}

/// Blend mode used when laying the design layer over the mockup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Overlay,
}

impl Default for BlendMode {
    fn default() -> Self {
        BlendMode::Normal
    }
}

fn default_opacity() -> u8 {
    255
}

/// One printable side of a product
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SideTemplate {
    pub side: Side,
    /// Colour name to mockup image reference
    #[serde(default)]
    pub mockups: BTreeMap<String, String>,
    /// Optional silhouette mask; designs are clipped to its opaque pixels
    #[serde(default)]
    pub mask: Option<String>,
    /// Zone name to rectangle in mockup space
    pub print_areas: BTreeMap<String, PrintAreaRect>,
}

/// A customizable product
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductTemplate {
    pub id: String,
    pub name: String,
    /// Coordinate space the print areas are authored in
    pub mockup_size: Size,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default = "default_opacity")]
    pub default_opacity: u8,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    pub sides: Vec<SideTemplate>,
}

impl ProductTemplate {
    pub fn side(&self, side: Side) -> Option<&SideTemplate> {
        self.sides.iter().find(|s| s.side == side)
    }

    /// Mockup reference for a colour, falling back to the first listed colour
    pub fn mockup_for(&self, side: Side, color: Option<&str>) -> Option<&str> {
        let template = self.side(side)?;
        color
            .and_then(|c| template.mockups.get(c))
            .or_else(|| self.colors.first().and_then(|c| template.mockups.get(c)))
            .or_else(|| template.mockups.values().next())
            .map(String::as_str)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.mockup_size.is_empty() {
            return Err(CatalogError::EmptyMockup(self.id.clone()));
        }

        let mut seen = HashSet::new();
        for side in &self.sides {
            if !seen.insert(side.side) {
                return Err(CatalogError::DuplicateSide {
                    product: self.id.clone(),
                    side: side.side,
                });
            }
            for (zone, rect) in &side.print_areas {
                if rect.width < 0.0 || rect.height < 0.0 {
                    return Err(CatalogError::NegativeZone {
                        product: self.id.clone(),
                        side: side.side,
                        zone: zone.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Parse and validate a catalog document
pub fn parse_catalog(json: &str) -> Result<Vec<ProductTemplate>, CatalogError> {
    let products: Vec<ProductTemplate> = serde_json::from_str(json)?;

    let mut ids = HashSet::new();
    for product in &products {
        if !ids.insert(product.id.as_str()) {
            return Err(CatalogError::DuplicateProduct(product.id.clone()));
        }
        product.validate()?;
    }

    Ok(products)
}

/// Load a catalog from disk
pub fn load_catalog(path: &Path) -> Result<Vec<ProductTemplate>, CatalogError> {
    let content = std::fs::read_to_string(path)?;
    parse_catalog(&content)
}
