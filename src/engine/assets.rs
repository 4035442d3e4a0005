//! Image asset loading
//!
//! Resolves mockup, mask and design references to decoded images. A
//! reference is a `data:` URI, an `http(s)://` URL or a path relative to the
//! configured asset root. Decoded images are kept in a bounded
//! least-recently-used cache; `data:` URIs are decoded on every use and
//! never cached. Loads run as spawned tasks behind a [`LoadHandle`]
//! that aborts the task when dropped, so a superseded render never lets a
//! stale result leak back into current state.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use dashmap::DashMap;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::AssetSettings;

/// Asset loading errors
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to fetch image: {0}")]
    FetchFailed(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid image reference: {0}")]
    InvalidReference(String),
    #[error("Load cancelled")]
    Cancelled,
    #[error("Load task failed: {0}")]
    Task(String),
}

/// Shared cancellation flag for one render pass
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An in-flight image load; dropping it aborts the load
pub struct LoadHandle {
    reference: String,
    task: JoinHandle<Result<Arc<DynamicImage>, AssetError>>,
}

impl LoadHandle {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Wait for the load to finish
    pub async fn join(mut self) -> Result<Arc<DynamicImage>, AssetError> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(AssetError::Cancelled),
            Err(e) => Err(AssetError::Task(e.to_string())),
        }
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct CachedImage {
    image: Arc<DynamicImage>,
    last_used: AtomicU64,
}

/// Loads and caches decoded images by reference
pub struct AssetLoader {
    http_client: reqwest::Client,
    root: PathBuf,
    cache: DashMap<String, CachedImage>,
    capacity: usize,
    clock: AtomicU64,
}

impl AssetLoader {
    pub fn new(settings: &AssetSettings) -> Result<Self, AssetError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.fetch_timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(AssetLoader {
            http_client,
            root: settings.root.clone(),
            cache: DashMap::new(),
            capacity: settings.cache_capacity,
            clock: AtomicU64::new(0),
        })
    }

    /// Register an already decoded image under a reference
    pub fn insert(&self, reference: impl Into<String>, image: DynamicImage) {
        self.remember(reference.into(), Arc::new(image));
    }

    pub fn cached(&self, reference: &str) -> Option<Arc<DynamicImage>> {
        self.cache.get(reference).map(|entry| {
            entry.last_used.store(self.tick(), Ordering::Relaxed);
            Arc::clone(&entry.image)
        })
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Start loading `reference` in the background
    pub fn spawn_load(self: &Arc<Self>, reference: &str) -> LoadHandle {
        let loader = Arc::clone(self);
        let owned = reference.to_string();
        let task = tokio::spawn(async move { loader.load(&owned).await });

        LoadHandle {
            reference: reference.to_string(),
            task,
        }
    }

    /// Load and decode `reference`, serving repeats from the cache
    pub async fn load(&self, reference: &str) -> Result<Arc<DynamicImage>, AssetError> {
        if let Some(image) = self.cached(reference) {
            return Ok(image);
        }

        let bytes = if reference.starts_with("data:") {
            decode_data_uri(reference)?
        } else if reference.starts_with("http://") || reference.starts_with("https://") {
            self.fetch(reference).await?
        } else {
            let path = self.resolve_path(reference)?;
            tokio::fs::read(&path).await?
        };

        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| AssetError::Task(e.to_string()))??;

        debug!(
            reference = %truncate(reference),
            width = image.width(),
            height = image.height(),
            "Image loaded"
        );

        let image = Arc::new(image);
        if !reference.starts_with("data:") {
            self.remember(reference.to_string(), Arc::clone(&image));
        }
        Ok(image)
    }

    /// Natural pixel size of a referenced image
    pub async fn dimensions(&self, reference: &str) -> Result<(u32, u32), AssetError> {
        Ok(self.load(reference).await?.dimensions())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let response = self.http_client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AssetError::FetchFailed(format!(
                "HTTP {}: {}",
                response.status(),
                url
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Cache an image, evicting the least recently used beyond capacity
    fn remember(&self, reference: String, image: Arc<DynamicImage>) {
        if self.capacity == 0 {
            return;
        }

        let entry = CachedImage {
            image,
            last_used: AtomicU64::new(self.tick()),
        };
        self.cache.insert(reference, entry);

        while self.cache.len() > self.capacity {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|entry| entry.last_used.load(Ordering::Relaxed))
                .map(|entry| entry.key().clone());
            let Some(oldest) = oldest else { break };
            self.cache.remove(&oldest);
            debug!(reference = %truncate(&oldest), "Image evicted from cache");
        }
    }

    fn resolve_path(&self, reference: &str) -> Result<PathBuf, AssetError> {
        let relative = Path::new(reference.strip_prefix("file://").unwrap_or(reference));

        let escapes_root = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes_root {
            return Err(AssetError::InvalidReference(reference.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

/// Decode a base64 `data:` URI into raw bytes
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AssetError::InvalidReference(truncate(uri)))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::InvalidReference(truncate(uri)))?;

    if !header.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        return Err(AssetError::InvalidReference(format!(
            "only base64 data URIs are supported: {}",
            truncate(uri)
        )));
    }

    Ok(base64::engine::general_purpose::STANDARD.decode(payload.trim())?)
}

/// Keep data URIs out of logs and error messages
fn truncate(reference: &str) -> String {
    const MAX: usize = 64;
    match reference.char_indices().nth(MAX) {
        Some((index, _)) => format!("{}...", &reference[..index]),
        None => reference.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    /// Encode a solid image as a PNG data URI
    pub(crate) fn png_data_uri(width: u32, height: u32, color: [u8; 4]) -> String {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageOutputFormat::Png).unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buffer.into_inner())
        )
    }

    fn loader() -> Arc<AssetLoader> {
        Arc::new(AssetLoader::new(&AssetSettings::default()).unwrap())
    }

    fn solid(size: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 255])))
    }

    #[tokio::test]
    async fn test_data_uri_decoded_but_not_cached() {
        let loader = loader();
        let uri = png_data_uri(12, 7, [255, 0, 0, 255]);

        let image = loader.load(&uri).await.unwrap();
        assert_eq!(image.dimensions(), (12, 7));
        assert_eq!(loader.cache_len(), 0);
        assert!(loader.cached(&uri).is_none());

        let again = loader.load(&uri).await.unwrap();
        assert_eq!(again.dimensions(), (12, 7));
    }

    #[tokio::test]
    async fn test_cached_reference_is_shared() {
        let loader = loader();
        loader.insert("mockups/a.png", solid(2));

        let first = loader.load("mockups/a.png").await.unwrap();
        let second = loader.load("mockups/a.png").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let settings = AssetSettings {
            cache_capacity: 2,
            ..AssetSettings::default()
        };
        let loader = AssetLoader::new(&settings).unwrap();

        loader.insert("a", solid(1));
        loader.insert("b", solid(2));
        assert!(loader.cached("a").is_some());
        loader.insert("c", solid(3));

        assert_eq!(loader.cache_len(), 2);
        assert!(loader.cached("a").is_some());
        assert!(loader.cached("b").is_none());
        assert!(loader.cached("c").is_some());
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let settings = AssetSettings {
            cache_capacity: 0,
            ..AssetSettings::default()
        };
        let loader = AssetLoader::new(&settings).unwrap();
        loader.insert("a", solid(1));
        assert_eq!(loader.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_spawned_load_joins() {
        let loader = loader();
        let uri = png_data_uri(3, 3, [0, 0, 255, 255]);

        let handle = loader.spawn_load(&uri);
        assert_eq!(handle.reference(), uri);
        let image = handle.join().await.unwrap();
        assert_eq!(image.dimensions(), (3, 3));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let loader = loader();
        let result = loader.load("mockups/does-not-exist.png").await;
        assert!(matches!(result, Err(AssetError::Io(_))));
    }

    #[tokio::test]
    async fn test_parent_dir_reference_rejected() {
        let loader = loader();
        let result = loader.load("../secrets.png").await;
        assert!(matches!(result, Err(AssetError::InvalidReference(_))));
    }

    #[test]
    fn test_dimensions_of_data_uri() {
        let loader = loader();
        let uri = png_data_uri(5, 9, [0, 255, 0, 255]);
        let dimensions = tokio_test::block_on(loader.dimensions(&uri)).unwrap();
        assert_eq!(dimensions, (5, 9));
    }

    #[test]
    fn test_non_base64_data_uri_rejected() {
        let result = decode_data_uri("data:image/svg+xml,%3Csvg%3E");
        assert!(matches!(result, Err(AssetError::InvalidReference(_))));
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let shared = token.clone();
        assert!(!shared.is_cancelled());
        token.cancel();
        assert!(shared.is_cancelled());
    }
}
