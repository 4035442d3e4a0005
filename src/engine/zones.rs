//! One-image-per-zone store
//!
//! Each zone holds at most one image; setting a zone overwrites whatever was
//! there.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::ZonePlacement;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZonePlacementStore {
    zones: BTreeMap<String, ZonePlacement>,
}

impl ZonePlacementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an image to a zone, returning the one it replaced
    pub fn set(&mut self, zone_id: impl Into<String>, placement: ZonePlacement) -> Option<ZonePlacement> {
        self.zones.insert(zone_id.into(), placement)
    }

    pub fn remove(&mut self, zone_id: &str) -> Option<ZonePlacement> {
        self.zones.remove(zone_id)
    }

    pub fn clear_all(&mut self) -> bool {
        let changed = !self.zones.is_empty();
        self.zones.clear();
        changed
    }

    pub fn get(&self, zone_id: &str) -> Option<&ZonePlacement> {
        self.zones.get(zone_id)
    }

    /// Occupied zones in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ZonePlacement)> {
        self.zones.iter().map(|(zone, placement)| (zone.as_str(), placement))
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(url: &str) -> ZonePlacement {
        ZonePlacement { image_url: url.to_string(), file: None }
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = ZonePlacementStore::new();
        assert!(store.set("leftChest", image("one.png")).is_none());

        let replaced = store.set("leftChest", image("two.png")).unwrap();
        assert_eq!(replaced.image_url, "one.png");
        assert_eq!(store.get("leftChest").unwrap().image_url, "two.png");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut store = ZonePlacementStore::new();
        store.set("leftChest", image("one.png"));
        store.set("fullBack", image("two.png"));

        assert!(store.remove("leftChest").is_some());
        assert!(store.remove("leftChest").is_none());
        assert!(store.get("leftChest").is_none());

        assert!(store.clear_all());
        assert!(store.is_empty());
        assert!(!store.clear_all());
    }
}
