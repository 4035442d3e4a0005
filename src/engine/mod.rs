//! Placement and compositing engine
//!
//! This module contains the customizer's core logic including:
//! - Print-area lookup and contain-fit geometry
//! - Placement and zone stores with snapshot undo/redo
//! - Asset loading and the mockup compositing pipeline

pub mod registry;
pub mod fit;
pub mod store;
pub mod zones;
pub mod history;
pub mod assets;
pub mod compositor;
pub mod editor;
pub mod sessions;

pub use registry::PrintAreaRegistry;
pub use fit::{fit_contain, scale_within_bounds};
pub use store::PlacementStore;
pub use zones::ZonePlacementStore;
pub use history::{CanvasSnapshot, History};
pub use assets::{AssetError, AssetLoader, CancelToken, LoadHandle};
pub use compositor::{hit_test, Compositor, Frame, Layer, LayerKey, RenderError, RenderOutput, RenderTarget, Viewport};
pub use editor::{EditorError, EditorSession, Layout};
pub use sessions::{spawn_idle_sweeper, SessionManager, SharedSession};
