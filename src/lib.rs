//! R-Print-Canvas
//!
//! Print-area placement, fitting and mockup compositing for print-on-demand
//! garment customizers. The engine is usable on its own; the `api` module
//! exposes it over HTTP with Actix-Web.

pub mod api;
pub mod config;
pub mod domain;
pub mod engine;

use std::sync::Arc;

use crate::config::Settings;
use crate::engine::{AssetError, AssetLoader, Compositor, PrintAreaRegistry, SessionManager};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub sessions: Arc<SessionManager>,
    pub compositor: Compositor,
}

impl AppState {
    pub fn new(settings: Settings, registry: PrintAreaRegistry) -> Result<Self, AssetError> {
        let registry = Arc::new(registry);
        let loader = Arc::new(AssetLoader::new(&settings.assets)?);

        Ok(AppState {
            sessions: Arc::new(SessionManager::new(registry, settings.canvas.clone())),
            compositor: Compositor::new(loader, &settings.canvas),
            settings,
        })
    }

    pub fn registry(&self) -> &Arc<PrintAreaRegistry> {
        self.sessions.registry()
    }
}
