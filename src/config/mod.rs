//! Configuration module for the print canvas service

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::path::PathBuf;

/// Main application settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub assets: AssetSettings,
    #[serde(default)]
    pub canvas: CanvasSettings,
    #[serde(default)]
    pub sessions: SessionSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Product catalog source
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// JSON catalog on disk; the built-in catalog is used when unset
    pub path: Option<PathBuf>,
}

/// Image asset loading
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Base directory for relative mockup, mask and design paths
    pub root: PathBuf,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Decoded images kept in memory; 0 disables caching
    pub cache_capacity: usize,
}

/// Editing canvas behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    /// Longest edge of the on-screen preview raster
    pub max_working_size: u32,
    /// Undo/redo stack capacity
    pub history_depth: usize,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Offset applied to both axes when duplicating a placement
    pub duplicate_offset: f64,
    /// Gap between the active placement and its outline, in preview pixels
    pub highlight_padding: u32,
    pub highlight_color: [u8; 4],
}

/// Session lifetime
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Sessions untouched for this long are dropped
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            idle_timeout_secs: 1800,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

impl Default for AssetSettings {
    fn default() -> Self {
        AssetSettings {
            root: PathBuf::from("assets"),
            fetch_timeout_secs: 30,
            user_agent: format!("r-print-canvas/{}", env!("CARGO_PKG_VERSION")),
            cache_capacity: 256,
        }
    }
}

impl Default for CanvasSettings {
    fn default() -> Self {
        CanvasSettings {
            max_working_size: 800,
            history_depth: 30,
            min_scale: 0.3,
            max_scale: 3.0,
            duplicate_offset: 10.0,
            highlight_padding: 4,
            highlight_color: [59, 130, 246, 255],
        }
    }
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with CANVAS_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local overrides (gitignored)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables (CANVAS_SERVER__PORT, etc.)
            .add_source(
                Environment::with_prefix("CANVAS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let canvas = &self.canvas;
        if canvas.min_scale <= 0.0 || canvas.min_scale > canvas.max_scale {
            return Err(ConfigError::Message(format!(
                "canvas.min_scale ({}) must be positive and not exceed canvas.max_scale ({})",
                canvas.min_scale, canvas.max_scale
            )));
        }
        if canvas.history_depth == 0 {
            return Err(ConfigError::Message("canvas.history_depth must be at least 1".to_string()));
        }
        if canvas.max_working_size == 0 {
            return Err(ConfigError::Message("canvas.max_working_size must be positive".to_string()));
        }
        if self.sessions.sweep_interval_secs == 0 {
            return Err(ConfigError::Message("sessions.sweep_interval_secs must be positive".to_string()));
        }
        Ok(())
    }
}
