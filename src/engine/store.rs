//! Placement store for the free-form editor
//!
//! Placements live in a flat arena keyed by id; each side keeps an explicit
//! ordered list of ids where index 0 is the bottom of the stack. Every
//! operation that names an id which no longer exists is a silent no-op and
//! reports that nothing changed.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Placement, PlacementId, PlacementPatch, PlacementProps, ReorderDirection, Side};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementStore {
    placements: HashMap<PlacementId, Placement>,
    order: BTreeMap<Side, Vec<PlacementId>>,
    /// Owning side of each placement
    sides: HashMap<PlacementId, Side>,
    active: Option<PlacementId>,
}

impl PlacementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a placement on top of `side` and make it active
    pub fn add(&mut self, side: Side, design_id: impl Into<String>, zone: impl Into<String>, props: PlacementProps) -> PlacementId {
        let id = PlacementId::new();
        let placement = Placement {
            id,
            design_id: design_id.into(),
            zone: zone.into(),
            x: props.x,
            y: props.y,
            width: props.width,
            height: props.height,
            scale: 1.0,
            rotation: 0.0,
        };

        self.insert_top(side, placement);
        self.active = Some(id);

        debug!(%id, side = %side, "Placement added");
        id
    }

    /// Replace fields of a placement without moving it in the stack
    pub fn update(&mut self, id: PlacementId, patch: &PlacementPatch) -> bool {
        match self.placements.get_mut(&id) {
            Some(placement) => {
                let before = placement.clone();
                placement.apply(patch);
                *placement != before
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: PlacementId) -> bool {
        let Some(side) = self.sides.remove(&id) else {
            return false;
        };

        self.placements.remove(&id);
        if let Some(ids) = self.order.get_mut(&side) {
            ids.retain(|other| *other != id);
        }
        if self.active == Some(id) {
            self.active = None;
        }

        debug!(%id, side = %side, "Placement removed");
        true
    }

    /// Copy a placement, offset by `offset` on both axes, on top of its side
    pub fn duplicate(&mut self, id: PlacementId, offset: f64) -> Option<PlacementId> {
        let side = *self.sides.get(&id)?;
        let source = self.placements.get(&id)?;

        let copy = Placement {
            id: PlacementId::new(),
            x: source.x + offset,
            y: source.y + offset,
            ..source.clone()
        };
        let new_id = copy.id;

        self.insert_top(side, copy);
        self.active = Some(new_id);

        debug!(source = %id, copy = %new_id, "Placement duplicated");
        Some(new_id)
    }

    /// Swap with the neighbour in `direction`; no-op at either end
    pub fn reorder(&mut self, id: PlacementId, direction: ReorderDirection) -> bool {
        let Some(side) = self.sides.get(&id) else {
            return false;
        };
        let Some(ids) = self.order.get_mut(side) else {
            return false;
        };
        let Some(index) = ids.iter().position(|other| *other == id) else {
            return false;
        };

        let neighbour = match direction {
            ReorderDirection::Up if index + 1 < ids.len() => index + 1,
            ReorderDirection::Down if index > 0 => index - 1,
            _ => return false,
        };

        ids.swap(index, neighbour);
        true
    }

    /// Select a placement; selecting an unknown id is ignored
    pub fn set_active(&mut self, id: Option<PlacementId>) -> bool {
        match id {
            Some(id) if !self.placements.contains_key(&id) => false,
            _ if self.active == id => false,
            _ => {
                self.active = id;
                true
            }
        }
    }

    pub fn active_id(&self) -> Option<PlacementId> {
        self.active
    }

    pub fn get_active(&self) -> Option<&Placement> {
        self.active.and_then(|id| self.placements.get(&id))
    }

    pub fn get(&self, id: PlacementId) -> Option<&Placement> {
        self.placements.get(&id)
    }

    pub fn side_of(&self, id: PlacementId) -> Option<Side> {
        self.sides.get(&id).copied()
    }

    /// Placements on `side`, bottom first
    pub fn get_for_side(&self, side: Side) -> Vec<&Placement> {
        self.order
            .get(&side)
            .map(|ids| ids.iter().filter_map(|id| self.placements.get(id)).collect())
            .unwrap_or_default()
    }

    /// Empty one side, dropping the selection if it pointed there
    pub fn clear_for_side(&mut self, side: Side) -> bool {
        let Some(ids) = self.order.remove(&side) else {
            return false;
        };

        for id in &ids {
            self.placements.remove(id);
            self.sides.remove(id);
        }
        if self.active.is_some_and(|active| ids.contains(&active)) {
            self.active = None;
        }

        !ids.is_empty()
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.placements.is_empty() || self.active.is_some();
        *self = Self::default();
        changed
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    fn insert_top(&mut self, side: Side, placement: Placement) {
        let id = placement.id;
        self.placements.insert(id, placement);
        self.sides.insert(id, side);
        self.order.entry(side).or_default().push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(x: f64, y: f64) -> PlacementProps {
        PlacementProps { x, y, width: 100.0, height: 50.0 }
    }

    fn ids(store: &PlacementStore, side: Side) -> Vec<PlacementId> {
        store.get_for_side(side).iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_add_appends_and_activates() {
        let mut store = PlacementStore::new();
        let a = store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        let b = store.add(Side::Front, "b.png", "fullCenter", props(5.0, 5.0));

        assert_eq!(ids(&store, Side::Front), vec![a, b]);
        assert_eq!(store.active_id(), Some(b));

        let placement = store.get(a).unwrap();
        assert_eq!(placement.scale, 1.0);
        assert_eq!(placement.rotation, 0.0);
    }

    #[test]
    fn test_update_keeps_stack_position() {
        let mut store = PlacementStore::new();
        let a = store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        let b = store.add(Side::Front, "b.png", "fullCenter", props(0.0, 0.0));

        assert!(store.update(a, &PlacementPatch { x: Some(42.0), ..Default::default() }));
        assert_eq!(store.get(a).unwrap().x, 42.0);
        assert_eq!(ids(&store, Side::Front), vec![a, b]);
    }

    #[test]
    fn test_stale_ids_are_noops() {
        let mut store = PlacementStore::new();
        let a = store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        assert!(store.remove(a));
        let snapshot = store.clone();

        let patch = PlacementPatch { x: Some(1.0), ..Default::default() };
        assert!(!store.update(a, &patch));
        assert!(!store.remove(a));
        assert!(store.duplicate(a, 10.0).is_none());
        assert!(!store.reorder(a, ReorderDirection::Up));
        assert!(!store.set_active(Some(a)));
        assert_eq!(store, snapshot);
    }

    #[test]
    fn test_remove_active_clears_selection() {
        let mut store = PlacementStore::new();
        let a = store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        assert!(store.remove(a));
        assert!(store.get_for_side(Side::Front).is_empty());
        assert!(store.get_active().is_none());
    }

    #[test]
    fn test_remove_inactive_keeps_selection() {
        let mut store = PlacementStore::new();
        let a = store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        let b = store.add(Side::Back, "b.png", "fullBack", props(0.0, 0.0));
        assert!(store.remove(a));
        assert_eq!(store.active_id(), Some(b));
    }

    #[test]
    fn test_duplicate_offsets_and_stacks_on_top() {
        let mut store = PlacementStore::new();
        let a = store.add(Side::Front, "a.png", "leftChest", props(30.0, 40.0));
        store.update(a, &PlacementPatch { rotation: Some(15.0), scale: Some(1.5), ..Default::default() });
        let b = store.add(Side::Front, "b.png", "fullCenter", props(0.0, 0.0));

        let copy = store.duplicate(a, 10.0).unwrap();
        assert_ne!(copy, a);
        assert_eq!(ids(&store, Side::Front), vec![a, b, copy]);
        assert_eq!(store.active_id(), Some(copy));

        let original = store.get(a).unwrap();
        let duplicated = store.get(copy).unwrap();
        assert_eq!(duplicated.x, 40.0);
        assert_eq!(duplicated.y, 50.0);
        assert_eq!(duplicated.design_id, original.design_id);
        assert_eq!(duplicated.zone, original.zone);
        assert_eq!(duplicated.width, original.width);
        assert_eq!(duplicated.height, original.height);
        assert_eq!(duplicated.scale, original.scale);
        assert_eq!(duplicated.rotation, original.rotation);
    }

    #[test]
    fn test_reorder_swaps_neighbours() {
        let mut store = PlacementStore::new();
        let a = store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        let b = store.add(Side::Front, "b.png", "fullCenter", props(0.0, 0.0));
        let c = store.add(Side::Front, "c.png", "fullCenter", props(0.0, 0.0));

        assert!(store.reorder(a, ReorderDirection::Up));
        assert_eq!(ids(&store, Side::Front), vec![b, a, c]);

        assert!(store.reorder(c, ReorderDirection::Down));
        assert_eq!(ids(&store, Side::Front), vec![b, c, a]);
    }

    #[test]
    fn test_reorder_at_boundaries_is_noop() {
        let mut store = PlacementStore::new();
        let a = store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        let b = store.add(Side::Front, "b.png", "fullCenter", props(0.0, 0.0));
        let c = store.add(Side::Front, "c.png", "fullCenter", props(0.0, 0.0));

        assert!(!store.reorder(a, ReorderDirection::Down));
        assert!(!store.reorder(c, ReorderDirection::Up));
        assert_eq!(ids(&store, Side::Front), vec![a, b, c]);
    }

    #[test]
    fn test_clear_for_side_only_touches_that_side() {
        let mut store = PlacementStore::new();
        let front = store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        let back = store.add(Side::Back, "b.png", "fullBack", props(0.0, 0.0));
        store.set_active(Some(front));

        assert!(store.clear_for_side(Side::Front));
        assert!(store.get_for_side(Side::Front).is_empty());
        assert!(store.get(front).is_none());
        assert!(store.get_active().is_none());
        assert_eq!(ids(&store, Side::Back), vec![back]);

        assert!(!store.clear_for_side(Side::Front));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = PlacementStore::new();
        let a = store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        store.remove(a);
        let b = store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_serde_round_trip_preserves_order() {
        let mut store = PlacementStore::new();
        store.add(Side::Front, "a.png", "fullCenter", props(0.0, 0.0));
        store.add(Side::Front, "b.png", "fullCenter", props(1.0, 1.0));
        store.add(Side::Back, "c.png", "fullBack", props(2.0, 2.0));

        let json = serde_json::to_vec(&store).unwrap();
        let restored: PlacementStore = serde_json::from_slice(&json).unwrap();
        assert_eq!(restored, store);
    }
}
