//! Editing session
//!
//! One `EditorSession` per customer editing a product. The session's
//! `EditorMode` decides whether designs are free-form placements or one
//! image per zone; both share the same history, framing and hit-testing.
//! Every mutation that actually changes state records the prior state for
//! undo.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CanvasSettings;
use crate::domain::{
    EditorMode, Placement, PlacementId, PlacementPatch, PlacementProps, ProductTemplate,
    ReorderDirection, Side, Size, ZonePlacement,
};
use super::assets::CancelToken;
use super::compositor::{hit_test, Frame, Layer, LayerKey, Viewport};
use super::fit::{fit_contain, scale_within_bounds};
use super::history::{CanvasSnapshot, History};
use super::registry::PrintAreaRegistry;
use super::store::PlacementStore;
use super::zones::ZonePlacementStore;

/// Editor errors
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Unknown product: {0}")]
    UnknownProduct(String),
    #[error("Operation requires {expected:?} mode but the session is in {actual:?} mode")]
    ModeMismatch { expected: EditorMode, actual: EditorMode },
    #[error("Snapshot could not be serialized or restored: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// The designs of a session, shaped by its mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    FreeForm(PlacementStore),
    ZonePerImage(BTreeMap<Side, ZonePlacementStore>),
}

impl Layout {
    fn empty(mode: EditorMode) -> Self {
        match mode {
            EditorMode::FreeForm => Layout::FreeForm(PlacementStore::new()),
            EditorMode::ZonePerImage => Layout::ZonePerImage(BTreeMap::new()),
        }
    }

    fn mode(&self) -> EditorMode {
        match self {
            Layout::FreeForm(_) => EditorMode::FreeForm,
            Layout::ZonePerImage(_) => EditorMode::ZonePerImage,
        }
    }
}

pub struct EditorSession {
    id: Uuid,
    product: Arc<ProductTemplate>,
    color: Option<String>,
    registry: Arc<PrintAreaRegistry>,
    settings: CanvasSettings,
    layout: Layout,
    history: History,
    created_at: DateTime<Utc>,
    render_token: Option<CancelToken>,
}

impl EditorSession {
    pub fn new(
        registry: Arc<PrintAreaRegistry>,
        product_id: &str,
        color: Option<String>,
        mode: EditorMode,
        settings: CanvasSettings,
    ) -> Result<Self, EditorError> {
        let product = registry
            .product(product_id)
            .ok_or_else(|| EditorError::UnknownProduct(product_id.to_string()))?;

        let id = Uuid::new_v4();
        info!(session_id = %id, product_id, mode = ?mode, "Editing session started");

        Ok(EditorSession {
            id,
            product,
            color,
            registry,
            history: History::new(settings.history_depth),
            settings,
            layout: Layout::empty(mode),
            created_at: Utc::now(),
            render_token: None,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn product(&self) -> &ProductTemplate {
        &self.product
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn mode(&self) -> EditorMode {
        self.layout.mode()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ------------------------------------------------------------------
    // Free-form placements
    // ------------------------------------------------------------------

    pub fn placements(&self) -> Result<&PlacementStore, EditorError> {
        match &self.layout {
            Layout::FreeForm(store) => Ok(store),
            other => Err(mismatch(EditorMode::FreeForm, other.mode())),
        }
    }

    /// Contain-fit a design of `natural` size into `zone` and place it on top
    ///
    /// Returns `None` when the zone is not offered on this side.
    pub fn add_design(
        &mut self,
        side: Side,
        design_id: &str,
        zone: &str,
        natural: Size,
    ) -> Result<Option<PlacementId>, EditorError> {
        self.placements()?;

        let Some(area) = self.registry.get_print_area(&self.product.id, side, zone) else {
            warn!(product_id = %self.product.id, side = %side, zone, "Zone not offered, design not placed");
            return Ok(None);
        };

        let fitted = fit_contain(natural.width, natural.height, area.fit_target());
        debug!(
            zone,
            natural_width = natural.width,
            natural_height = natural.height,
            x = fitted.x,
            y = fitted.y,
            width = fitted.width,
            height = fitted.height,
            "Design contain-fitted into zone"
        );

        self.add_placement(side, design_id, zone, fitted.into()).map(Some)
    }

    /// Place a design with explicit geometry
    pub fn add_placement(
        &mut self,
        side: Side,
        design_id: &str,
        zone: &str,
        props: PlacementProps,
    ) -> Result<PlacementId, EditorError> {
        self.mutate_placements(|store| {
            let id = store.add(side, design_id, zone, props);
            (id, true)
        })
    }

    pub fn update_placement(&mut self, id: PlacementId, patch: &PlacementPatch) -> Result<bool, EditorError> {
        self.mutate_placements(|store| {
            let changed = store.update(id, patch);
            (changed, changed)
        })
    }

    pub fn remove_placement(&mut self, id: PlacementId) -> Result<bool, EditorError> {
        self.mutate_placements(|store| {
            let changed = store.remove(id);
            (changed, changed)
        })
    }

    pub fn duplicate_placement(&mut self, id: PlacementId) -> Result<Option<PlacementId>, EditorError> {
        let offset = self.settings.duplicate_offset;
        self.mutate_placements(|store| {
            let copy = store.duplicate(id, offset);
            (copy, copy.is_some())
        })
    }

    pub fn reorder_placement(&mut self, id: PlacementId, direction: ReorderDirection) -> Result<bool, EditorError> {
        self.mutate_placements(|store| {
            let changed = store.reorder(id, direction);
            (changed, changed)
        })
    }

    /// Change the selection; selection alone is not an undoable action
    pub fn set_active(&mut self, id: Option<PlacementId>) -> Result<bool, EditorError> {
        match &mut self.layout {
            Layout::FreeForm(store) => Ok(store.set_active(id)),
            other => Err(mismatch(EditorMode::FreeForm, other.mode())),
        }
    }

    pub fn active(&self) -> Result<Option<&Placement>, EditorError> {
        Ok(self.placements()?.get_active())
    }

    pub fn placements_for_side(&self, side: Side) -> Result<Vec<&Placement>, EditorError> {
        Ok(self.placements()?.get_for_side(side))
    }

    pub fn clear_side(&mut self, side: Side) -> Result<bool, EditorError> {
        self.mutate_placements(|store| {
            let changed = store.clear_for_side(side);
            (changed, changed)
        })
    }

    pub fn move_by(&mut self, id: PlacementId, dx: f64, dy: f64) -> Result<bool, EditorError> {
        let Some(placement) = self.placements()?.get(id) else {
            return Ok(false);
        };
        let patch = PlacementPatch {
            x: Some(placement.x + dx),
            y: Some(placement.y + dy),
            ..Default::default()
        };
        self.edit_placement(id, patch)
    }

    /// Apply a user edit within the canvas's limits
    ///
    /// Rotation is normalised into `[0, 360)` and scale clamped to the
    /// configured range. Width and height must be positive and may reach
    /// `max_scale` times the mockup; position may hang off the mockup by the
    /// same margin. Non-finite and non-positive values are dropped from the
    /// patch rather than applied.
    pub fn edit_placement(&mut self, id: PlacementId, patch: PlacementPatch) -> Result<bool, EditorError> {
        let patch = self.bound_patch(patch);
        self.update_placement(id, &patch)
    }

    fn bound_patch(&self, mut patch: PlacementPatch) -> PlacementPatch {
        let (min_scale, max_scale) = (self.settings.min_scale, self.settings.max_scale);
        let mockup = self.product.mockup_size;
        let max_width = mockup.width * max_scale;
        let max_height = mockup.height * max_scale;
        let reach_x = mockup.width * (1.0 + max_scale);
        let reach_y = mockup.height * (1.0 + max_scale);

        let finite = |v: &f64| v.is_finite();
        let positive = |v: &f64| v.is_finite() && *v > 0.0;

        patch.rotation = patch.rotation.filter(finite).map(|degrees| degrees.rem_euclid(360.0));
        patch.scale = patch.scale.filter(finite).map(|scale| scale.clamp(min_scale, max_scale));
        patch.width = patch.width.filter(positive).map(|w| w.min(max_width));
        patch.height = patch.height.filter(positive).map(|h| h.min(max_height));
        patch.x = patch.x.filter(finite).map(|x| x.clamp(-reach_x, reach_x));
        patch.y = patch.y.filter(finite).map(|y| y.clamp(-reach_y, reach_y));
        patch
    }

    pub fn rotate_to(&mut self, id: PlacementId, degrees: f64) -> Result<bool, EditorError> {
        self.edit_placement(id, PlacementPatch { rotation: Some(degrees), ..Default::default() })
    }

    pub fn set_scale(&mut self, id: PlacementId, scale: f64) -> Result<bool, EditorError> {
        self.edit_placement(id, PlacementPatch { scale: Some(scale), ..Default::default() })
    }

    /// Grow or shrink the stored rectangle about its centre, bounded relative
    /// to the placement's zone
    pub fn resize_by(&mut self, id: PlacementId, factor: f64) -> Result<bool, EditorError> {
        let Some(placement) = self.placements()?.get(id) else {
            return Ok(false);
        };
        let Some(side) = self.placements()?.side_of(id) else {
            return Ok(false);
        };
        let Some(area) = self.registry.get_print_area(&self.product.id, side, &placement.zone) else {
            warn!(placement_id = %id, zone = %placement.zone, "Zone no longer offered, resize ignored");
            return Ok(false);
        };

        let size = scale_within_bounds(
            placement.width,
            placement.height,
            factor,
            area.rect(),
            self.settings.min_scale,
            self.settings.max_scale,
        );
        let center = placement.center();
        let patch = PlacementPatch {
            x: Some(center.x - size.width / 2.0),
            y: Some(center.y - size.height / 2.0),
            width: Some(size.width),
            height: Some(size.height),
            ..Default::default()
        };
        self.edit_placement(id, patch)
    }

    // ------------------------------------------------------------------
    // One image per zone
    // ------------------------------------------------------------------

    pub fn zones(&self, side: Side) -> Result<Option<&ZonePlacementStore>, EditorError> {
        match &self.layout {
            Layout::ZonePerImage(sides) => Ok(sides.get(&side)),
            other => Err(mismatch(EditorMode::ZonePerImage, other.mode())),
        }
    }

    /// Bind an image to a zone; zones not offered on this side are ignored
    pub fn set_zone_image(&mut self, side: Side, zone: &str, placement: ZonePlacement) -> Result<bool, EditorError> {
        self.zones(side)?;

        if self.registry.get_print_area(&self.product.id, side, zone).is_none() {
            warn!(product_id = %self.product.id, side = %side, zone, "Zone not offered, image not set");
            return Ok(false);
        }

        self.mutate_zones(|sides| {
            let previous = sides.entry(side).or_default().set(zone, placement.clone());
            let changed = previous.as_ref() != Some(&placement);
            (changed, changed)
        })
    }

    pub fn remove_zone_image(&mut self, side: Side, zone: &str) -> Result<bool, EditorError> {
        self.mutate_zones(|sides| {
            let changed = sides
                .get_mut(&side)
                .and_then(|store| store.remove(zone))
                .is_some();
            (changed, changed)
        })
    }

    pub fn clear_zones(&mut self) -> Result<bool, EditorError> {
        self.mutate_zones(|sides| {
            let changed = sides.values_mut().fold(false, |acc, store| store.clear_all() || acc);
            sides.clear();
            (changed, changed)
        })
    }

    // ------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------

    /// Drop every design on every side
    pub fn reset(&mut self) -> Result<bool, EditorError> {
        let before = self.snapshot()?;
        let changed = match &mut self.layout {
            Layout::FreeForm(store) => store.clear(),
            Layout::ZonePerImage(sides) => {
                let changed = sides.values().any(|store| !store.is_empty());
                sides.clear();
                changed
            }
        };
        if changed {
            self.history.push_undo(before);
        }
        Ok(changed)
    }

    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let current = self.snapshot()?;
        match self.history.undo(current) {
            Some(previous) => {
                self.restore(&previous)?;
                debug!(session_id = %self.id, "Undo applied");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let current = self.snapshot()?;
        match self.history.redo(current) {
            Some(next) => {
                self.restore(&next)?;
                debug!(session_id = %self.id, "Redo applied");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Serialize the current designs
    pub fn snapshot(&self) -> Result<CanvasSnapshot, EditorError> {
        Ok(CanvasSnapshot::new(serde_json::to_vec(&self.layout)?))
    }

    fn restore(&mut self, snapshot: &CanvasSnapshot) -> Result<(), EditorError> {
        self.layout = serde_json::from_slice(&snapshot.payload)?;
        Ok(())
    }

    /// Everything the compositor needs to draw one side
    ///
    /// Layers whose zone is not offered on this side are left out.
    pub fn frame(&self, side: Side) -> Frame {
        let product_id = self.product.id.as_str();
        let side_template = self.product.side(side);

        let (layers, active) = match &self.layout {
            Layout::FreeForm(store) => {
                let layers = store
                    .get_for_side(side)
                    .into_iter()
                    .filter(|p| self.registry.get_print_area(product_id, side, &p.zone).is_some())
                    .map(|p| Layer {
                        key: LayerKey::Placement(p.id),
                        design_ref: p.design_id.clone(),
                        bounds: p.bounds(),
                        rotation: p.rotation,
                    })
                    .collect();
                (layers, store.active_id().map(LayerKey::Placement))
            }
            Layout::ZonePerImage(sides) => {
                let layers = sides
                    .get(&side)
                    .map(|store| {
                        store
                            .iter()
                            .filter_map(|(zone, placement)| {
                                let area = self.registry.get_print_area(product_id, side, zone)?;
                                Some(Layer {
                                    key: LayerKey::Zone(zone.to_string()),
                                    design_ref: placement.image_url.clone(),
                                    bounds: area.fit_target(),
                                    rotation: 0.0,
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                (layers, None)
            }
        };

        Frame {
            product_id: product_id.to_string(),
            side,
            mockup_size: self.product.mockup_size,
            mockup: self.product.mockup_for(side, self.color.as_deref()).map(str::to_string),
            mask: side_template.and_then(|s| s.mask.clone()),
            blend_mode: self.product.blend_mode,
            opacity: self.product.default_opacity,
            layers,
            active,
        }
    }

    /// Topmost layer under a point of the preview canvas
    pub fn hit_test(&self, side: Side, viewport: &Viewport, canvas_x: f64, canvas_y: f64) -> Option<LayerKey> {
        hit_test(&self.frame(side), viewport, canvas_x, canvas_y)
    }

    /// Start a new preview render, cancelling the one it supersedes
    pub fn begin_render(&mut self) -> CancelToken {
        if let Some(previous) = self.render_token.take() {
            previous.cancel();
        }
        let token = CancelToken::new();
        self.render_token = Some(token.clone());
        token
    }

    fn mutate_placements<T>(&mut self, op: impl FnOnce(&mut PlacementStore) -> (T, bool)) -> Result<T, EditorError> {
        let before = self.snapshot()?;
        let store = match &mut self.layout {
            Layout::FreeForm(store) => store,
            other => return Err(mismatch(EditorMode::FreeForm, other.mode())),
        };

        let (result, changed) = op(store);
        if changed {
            self.history.push_undo(before);
        }
        Ok(result)
    }

    fn mutate_zones<T>(
        &mut self,
        op: impl FnOnce(&mut BTreeMap<Side, ZonePlacementStore>) -> (T, bool),
    ) -> Result<T, EditorError> {
        let before = self.snapshot()?;
        let sides = match &mut self.layout {
            Layout::ZonePerImage(sides) => sides,
            other => return Err(mismatch(EditorMode::ZonePerImage, other.mode())),
        };

        let (result, changed) = op(sides);
        if changed {
            self.history.push_undo(before);
        }
        Ok(result)
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        if let Some(token) = self.render_token.take() {
            token.cancel();
        }
    }
}

fn mismatch(expected: EditorMode, actual: EditorMode) -> EditorError {
    EditorError::ModeMismatch { expected, actual }
}
