//! Print-area registry
//!
//! Read-only lookup from (product, side, zone) to the zone's rectangle in
//! mockup space. Lookups never fail loudly: an unknown triple, or a zone
//! authored with zero area, simply means the feature is not offered.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{parse_catalog, CatalogError, PrintAreaRect, ProductTemplate, Side, BUILTIN_CATALOG};

/// Registry of product templates keyed by product id
#[derive(Debug, Clone, Default)]
pub struct PrintAreaRegistry {
    products: HashMap<String, Arc<ProductTemplate>>,
    order: Vec<String>,
}

impl PrintAreaRegistry {
    /// Build a registry from already parsed templates
    pub fn new(products: Vec<ProductTemplate>) -> Self {
        let order = products.iter().map(|p| p.id.clone()).collect();
        let products = products
            .into_iter()
            .map(|p| (p.id.clone(), Arc::new(p)))
            .collect();

        PrintAreaRegistry { products, order }
    }

    /// Registry backed by the catalog compiled into the binary
    pub fn builtin() -> Result<Self, CatalogError> {
        let registry = Self::new(parse_catalog(BUILTIN_CATALOG)?);
        info!(products = registry.product_count(), "Loaded built-in product catalog");
        Ok(registry)
    }

    pub fn product(&self, product_id: &str) -> Option<Arc<ProductTemplate>> {
        self.products.get(product_id).cloned()
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    /// Products in catalog order
    pub fn products(&self) -> impl Iterator<Item = &Arc<ProductTemplate>> {
        self.order.iter().filter_map(|id| self.products.get(id))
    }

    /// Rectangle for a usable zone, `None` when absent or zero-area
    pub fn get_print_area(&self, product_id: &str, side: Side, zone: &str) -> Option<PrintAreaRect> {
        let area = self
            .products
            .get(product_id)
            .and_then(|p| p.side(side))
            .and_then(|s| s.print_areas.get(zone))
            .copied()
            .filter(PrintAreaRect::is_usable);

        if area.is_none() {
            debug!(product_id, side = %side, zone, "Print area not offered");
        }

        area
    }

    /// Names of the usable zones on one side, in stable (sorted) order
    pub fn get_available_zones(&self, product_id: &str, side: Side) -> Vec<String> {
        self.products
            .get(product_id)
            .and_then(|p| p.side(side))
            .map(|s| {
                s.print_areas
                    .iter()
                    .filter(|(_, rect)| rect.is_usable())
                    .map(|(zone, _)| zone.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sides declared by a product, in catalog order
    pub fn get_sides(&self, product_id: &str) -> Vec<Side> {
        self.products
            .get(product_id)
            .map(|p| p.sides.iter().map(|s| s.side).collect())
            .unwrap_or_default()
    }
}
