//! Image compositing pipeline
//!
//! Draws a side's layers over its mockup: background, designs in z-order
//! (rotated about their centres where needed), the optional silhouette mask,
//! then the template's blend mode. All layer geometry arrives in mockup
//! space; a [`Viewport`] supplies the one scale factor that maps it onto the
//! output raster, so preview and full-resolution export share one code path.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::future::join_all;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, ImageOutputFormat, Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::rect::Rect as PixelRect;
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CanvasSettings;
use crate::domain::{BlendMode, PlacementId, Point, Rect, Side, Size};
use super::assets::{AssetError, AssetLoader, CancelToken, LoadHandle};
use super::fit::fit_contain;

/// Rotated sprites larger than this multiple of the canvas's longest edge
/// are not drawn
const MAX_SPRITE_FACTOR: f64 = 4.0;

/// Compositing errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Render superseded")]
    Cancelled,
}

/// Identifies what a drawn layer represents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LayerKey {
    Placement(PlacementId),
    Zone(String),
}

/// One design to draw, in mockup space
#[derive(Debug, Clone)]
pub struct Layer {
    pub key: LayerKey,
    pub design_ref: String,
    /// Box the design is contain-fitted into
    pub bounds: Rect,
    /// Degrees, clockwise
    pub rotation: f64,
}

/// Everything needed to draw one product side
#[derive(Debug, Clone)]
pub struct Frame {
    pub product_id: String,
    pub side: Side,
    pub mockup_size: Size,
    pub mockup: Option<String>,
    pub mask: Option<String>,
    pub blend_mode: BlendMode,
    pub opacity: u8,
    /// Bottom first
    pub layers: Vec<Layer>,
    pub active: Option<LayerKey>,
}

/// Output raster dimensions and the mockup-to-raster scale factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

impl Viewport {
    /// Mockup size capped so the longest edge is at most `max_size`
    pub fn working(mockup_size: Size, max_size: u32) -> Self {
        let longest = mockup_size.width.max(mockup_size.height);
        let scale = if longest > max_size as f64 {
            max_size as f64 / longest
        } else {
            1.0
        };

        Viewport {
            width: (mockup_size.width * scale).round().max(1.0) as u32,
            height: (mockup_size.height * scale).round().max(1.0) as u32,
            scale,
        }
    }

    /// The mockup image's own resolution, or the mockup size when unknown
    pub fn native(mockup_size: Size, natural: Option<(u32, u32)>) -> Self {
        let (width, height) = natural.unwrap_or((
            mockup_size.width.round() as u32,
            mockup_size.height.round() as u32,
        ));
        let width = width.max(1);

        Viewport {
            width,
            height: height.max(1),
            scale: width as f64 / mockup_size.width,
        }
    }

    /// Map a raster coordinate back into mockup space
    pub fn to_mockup(&self, x: f64, y: f64) -> Point {
        Point::new(x / self.scale, y / self.scale)
    }
}

/// Which resolution to render at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// Capped working resolution, with the active layer outlined
    Preview,
    /// The mockup's native resolution, no editing decorations
    Export,
}

/// Result of a render
pub struct RenderOutput {
    pub width: u32,
    pub height: u32,
    pub png: Bytes,
    pub layers_drawn: usize,
    pub layers_skipped: usize,
}

/// Topmost layer whose bounds contain a raster point
///
/// Layers are scanned from the top of the stack down so the one the user
/// sees is the one selected.
pub fn hit_test(frame: &Frame, viewport: &Viewport, canvas_x: f64, canvas_y: f64) -> Option<LayerKey> {
    let point = viewport.to_mockup(canvas_x, canvas_y);
    frame
        .layers
        .iter()
        .rev()
        .find(|layer| layer.bounds.rotated_bounds(layer.rotation).contains(point))
        .map(|layer| layer.key.clone())
}

struct Composed {
    image: RgbaImage,
    drawn: usize,
    skipped: usize,
}

/// Image compositor for mockup previews and exports
pub struct Compositor {
    loader: Arc<AssetLoader>,
    max_working_size: u32,
    highlight_padding: u32,
    highlight_color: Rgba<u8>,
}

impl Compositor {
    pub fn new(loader: Arc<AssetLoader>, settings: &CanvasSettings) -> Self {
        Compositor {
            loader,
            max_working_size: settings.max_working_size,
            highlight_padding: settings.highlight_padding,
            highlight_color: Rgba(settings.highlight_color),
        }
    }

    pub fn loader(&self) -> &Arc<AssetLoader> {
        &self.loader
    }

    /// Viewport used for on-screen previews and hit-testing
    pub fn preview_viewport(&self, frame: &Frame) -> Viewport {
        Viewport::working(frame.mockup_size, self.max_working_size)
    }

    /// Render a frame to PNG
    pub async fn render(
        &self,
        frame: &Frame,
        target: RenderTarget,
        token: &CancelToken,
    ) -> Result<RenderOutput, RenderError> {
        let start = Instant::now();
        let composed = self.compose(frame, target, token).await?;

        let (width, height) = composed.image.dimensions();
        let png = encode_png(composed.image)?;

        info!(
            product_id = %frame.product_id,
            side = %frame.side,
            render_target = ?target,
            width,
            height,
            layers = composed.drawn,
            skipped = composed.skipped,
            bytes = png.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Composite rendered"
        );

        Ok(RenderOutput {
            width,
            height,
            png: Bytes::from(png),
            layers_drawn: composed.drawn,
            layers_skipped: composed.skipped,
        })
    }

    /// Render a frame to an in-memory raster
    pub async fn render_image(
        &self,
        frame: &Frame,
        target: RenderTarget,
        token: &CancelToken,
    ) -> Result<RgbaImage, RenderError> {
        Ok(self.compose(frame, target, token).await?.image)
    }

    async fn compose(
        &self,
        frame: &Frame,
        target: RenderTarget,
        token: &CancelToken,
    ) -> Result<Composed, RenderError> {
        // 1. Issue every load up front, then wait for all of them
        let mockup_load = frame.mockup.as_deref().map(|r| self.loader.spawn_load(r));
        let mask_load = frame.mask.as_deref().map(|r| self.loader.spawn_load(r));
        let design_loads: Vec<LoadHandle> = frame
            .layers
            .iter()
            .map(|layer| self.loader.spawn_load(&layer.design_ref))
            .collect();

        let (mockup, mask, designs) = futures::join!(
            join_optional(mockup_load),
            join_optional(mask_load),
            join_all(design_loads.into_iter().map(LoadHandle::join)),
        );

        if token.is_cancelled() {
            debug!(product_id = %frame.product_id, side = %frame.side, "Discarding superseded render");
            return Err(RenderError::Cancelled);
        }

        let mockup = match mockup {
            Some(Ok(image)) => Some(image),
            Some(Err(e)) => {
                warn!(error = %e, "Mockup failed to load, drawing placeholder");
                None
            }
            None => None,
        };

        // 2. Resolve output resolution
        let viewport = match target {
            RenderTarget::Preview => self.preview_viewport(frame),
            RenderTarget::Export => Viewport::native(
                frame.mockup_size,
                mockup.as_ref().map(|image| image.dimensions()),
            ),
        };

        let filter = match target {
            RenderTarget::Preview => FilterType::Triangle,
            RenderTarget::Export => FilterType::Lanczos3,
        };

        let mut canvas = match mockup {
            Some(image) => imageops::resize(&image.to_rgba8(), viewport.width, viewport.height, filter),
            None => placeholder_background(viewport.width, viewport.height),
        };

        // 3. Draw designs bottom to top onto a transparent layer
        let canvas_rect = Rect::new(0.0, 0.0, viewport.width as f64, viewport.height as f64);
        let sprite_limit = viewport.width.max(viewport.height) as f64 * MAX_SPRITE_FACTOR;
        let mut design_layer = RgbaImage::new(viewport.width, viewport.height);
        let mut highlight = None;
        let mut drawn = 0;
        let mut skipped = 0;

        for (layer, loaded) in frame.layers.iter().zip(designs) {
            let design = match loaded {
                Ok(image) => image,
                Err(e) => {
                    warn!(layer = ?layer.key, error = %e, "Design failed to load, omitting layer");
                    skipped += 1;
                    continue;
                }
            };

            let (natural_width, natural_height) = design.dimensions();
            let target_rect = fit_contain(natural_width as f64, natural_height as f64, layer.bounds)
                .scaled(viewport.scale);

            let finite = [target_rect.x, target_rect.y, target_rect.width, target_rect.height]
                .iter()
                .all(|v| v.is_finite());
            if !finite || target_rect.width < 0.5 || target_rect.height < 0.5 {
                debug!(layer = ?layer.key, "Layer too small to draw at this resolution");
                skipped += 1;
                continue;
            }

            let rotation = layer.rotation.rem_euclid(360.0);
            if target_rect.rotated_bounds(rotation).intersection(&canvas_rect).is_none() {
                debug!(layer = ?layer.key, "Layer lies outside the canvas");
                skipped += 1;
                continue;
            }

            if rotation != 0.0 {
                // Rotated sprites are rasterised whole, so their size is capped
                if target_rect.width > sprite_limit || target_rect.height > sprite_limit {
                    warn!(
                        layer = ?layer.key,
                        width = target_rect.width,
                        height = target_rect.height,
                        "Rotated layer too large to rasterise, omitting layer"
                    );
                    skipped += 1;
                    continue;
                }

                let resized = imageops::resize(
                    &design.to_rgba8(),
                    target_rect.width.round() as u32,
                    target_rect.height.round() as u32,
                    filter,
                );
                let rotated = rotate_sprite(&resized, rotation);
                let center = target_rect.center();
                let x = (center.x - rotated.width() as f64 / 2.0).round() as i64;
                let y = (center.y - rotated.height() as f64 / 2.0).round() as i64;
                source_over(&mut design_layer, &rotated, x, y);
            } else {
                let Some(visible) = target_rect.intersection(&canvas_rect) else {
                    skipped += 1;
                    continue;
                };
                let sprite = visible_sprite(&design, target_rect, visible, filter);
                source_over(
                    &mut design_layer,
                    &sprite,
                    visible.x.round() as i64,
                    visible.y.round() as i64,
                );
            }

            if frame.active.as_ref() == Some(&layer.key) {
                highlight = Some(target_rect.rotated_bounds(rotation));
            }
            drawn += 1;
        }

        // 4. Clip designs to the garment silhouette
        match mask {
            Some(Ok(mask)) => apply_mask(&mut design_layer, &mask),
            Some(Err(e)) => warn!(error = %e, "Mask failed to load, designs left unclipped"),
            None => {}
        }

        // 5. Lay the designs over the mockup
        blend_layer(&mut canvas, &design_layer, frame.blend_mode, frame.opacity);

        // 6. Outline the active layer while editing
        if target == RenderTarget::Preview {
            if let Some(rect) = highlight {
                self.draw_highlight(&mut canvas, rect);
            }
        }

        Ok(Composed { image: canvas, drawn, skipped })
    }

    fn draw_highlight(&self, canvas: &mut RgbaImage, rect: Rect) {
        // Edges beyond the canvas stay just outside it
        let (width, height) = canvas.dimensions();
        let reach = Rect::new(0.0, 0.0, width as f64, height as f64)
            .inflate(self.highlight_padding as f64 + 2.0);
        let Some(outer) = rect.inflate(self.highlight_padding as f64).intersection(&reach) else {
            return;
        };

        for inset in 0..2 {
            let r = outer.inflate(-(inset as f64));
            if r.width < 1.0 || r.height < 1.0 {
                break;
            }
            let pixel_rect = PixelRect::at(r.x.round() as i32, r.y.round() as i32)
                .of_size(r.width.round() as u32, r.height.round() as u32);
            draw_hollow_rect_mut(canvas, pixel_rect, self.highlight_color);
        }
    }
}

async fn join_optional(handle: Option<LoadHandle>) -> Option<Result<Arc<DynamicImage>, AssetError>> {
    match handle {
        Some(handle) => Some(handle.join().await),
        None => None,
    }
}

/// Resample only the part of a design that lands inside `visible`
///
/// `target` is where the whole design would be drawn; both rects are in
/// raster space. The source crop is widened to whole pixels.
fn visible_sprite(design: &DynamicImage, target: Rect, visible: Rect, filter: FilterType) -> RgbaImage {
    let (natural_width, natural_height) = design.dimensions();
    let scale_x = natural_width as f64 / target.width;
    let scale_y = natural_height as f64 / target.height;

    let x0 = (((visible.x - target.x) * scale_x).floor().max(0.0) as u32).min(natural_width.saturating_sub(1));
    let y0 = (((visible.y - target.y) * scale_y).floor().max(0.0) as u32).min(natural_height.saturating_sub(1));
    let crop_width = ((visible.width * scale_x).ceil().max(1.0) as u32).min(natural_width.saturating_sub(x0));
    let crop_height = ((visible.height * scale_y).ceil().max(1.0) as u32).min(natural_height.saturating_sub(y0));

    let source = imageops::crop_imm(design, x0, y0, crop_width, crop_height).to_image();
    imageops::resize(
        &source,
        visible.width.round().max(1.0) as u32,
        visible.height.round().max(1.0) as u32,
        filter,
    )
}

/// Rotate a sprite clockwise about its centre on a canvas large enough to
/// hold every corner
fn rotate_sprite(sprite: &RgbaImage, degrees: f64) -> RgbaImage {
    let (width, height) = sprite.dimensions();
    let diagonal = ((width as f64).hypot(height as f64)).ceil() as u32;

    let mut padded = RgbaImage::new(diagonal, diagonal);
    imageops::replace(
        &mut padded,
        sprite,
        ((diagonal - width) / 2) as i64,
        ((diagonal - height) / 2) as i64,
    );

    rotate_about_center(
        &padded,
        degrees.to_radians() as f32,
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    )
}

/// Porter-Duff source-over of `top` onto `bottom` at an offset
fn source_over(bottom: &mut RgbaImage, top: &RgbaImage, x_offset: i64, y_offset: i64) {
    let (bottom_width, bottom_height) = bottom.dimensions();
    let (top_width, top_height) = top.dimensions();

    for ty in 0..top_height {
        let y = y_offset + ty as i64;
        if y < 0 || y >= bottom_height as i64 {
            continue;
        }

        for tx in 0..top_width {
            let x = x_offset + tx as i64;
            if x < 0 || x >= bottom_width as i64 {
                continue;
            }

            let src = top.get_pixel(tx, ty);
            // Skip fully transparent pixels
            if src.0[3] == 0 {
                continue;
            }

            let dst = bottom.get_pixel_mut(x as u32, y as u32);
            *dst = over(src, dst);
        }
    }
}

fn over(src: &Rgba<u8>, dst: &Rgba<u8>) -> Rgba<u8> {
    let sa = src.0[3] as f64 / 255.0;
    let da = dst.0[3] as f64 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut result = [0u8; 4];
    for i in 0..3 {
        let c = (src.0[i] as f64 * sa + dst.0[i] as f64 * da * (1.0 - sa)) / out_a;
        result[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    result[3] = (out_a * 255.0).round() as u8;

    Rgba(result)
}

/// Destination-in: keep design pixels only where the mask is opaque
///
/// Masks with an alpha channel clip by alpha; opaque masks clip by luminance.
fn apply_mask(layer: &mut RgbaImage, mask: &DynamicImage) {
    let (width, height) = layer.dimensions();

    let coverage: GrayImage = if mask.color().has_alpha() {
        let rgba = mask.to_rgba8();
        GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| Luma([rgba.get_pixel(x, y).0[3]]))
    } else {
        mask.to_luma8()
    };
    let coverage = imageops::resize(&coverage, width, height, FilterType::Triangle);
    let coverage: &[u8] = &coverage;

    let pixels: &mut [u8] = &mut *layer;
    pixels
        .par_chunks_mut(4)
        .zip(coverage.par_iter())
        .for_each(|(pixel, &keep)| {
            pixel[3] = ((pixel[3] as u32 * keep as u32) / 255) as u8;
        });
}

/// Blend the design layer over the mockup with the template's blend mode
fn blend_layer(canvas: &mut RgbaImage, layer: &RgbaImage, mode: BlendMode, opacity: u8) {
    let opacity_factor = opacity as f64 / 255.0;
    let layer_pixels: &[u8] = layer;
    let canvas_pixels: &mut [u8] = &mut *canvas;

    canvas_pixels
        .par_chunks_mut(4)
        .zip(layer_pixels.par_chunks(4))
        .for_each(|(base, overlay)| {
            if overlay[3] == 0 {
                return;
            }

            let alpha = overlay[3] as f64 / 255.0 * opacity_factor;
            let blended = match mode {
                BlendMode::Normal => blend_normal_pixel(base, overlay, alpha),
                BlendMode::Multiply => blend_multiply_pixel(base, overlay, alpha),
                BlendMode::Screen => blend_screen_pixel(base, overlay, alpha),
                BlendMode::Overlay => blend_overlay_pixel(base, overlay, alpha),
            };

            base[..3].copy_from_slice(&blended);
            let base_alpha = base[3] as f64 / 255.0;
            base[3] = ((base_alpha + alpha * (1.0 - base_alpha)) * 255.0).round() as u8;
        });
}

/// Normal alpha blending
fn blend_normal_pixel(base: &[u8], overlay: &[u8], alpha: f64) -> [u8; 3] {
    let mut result = [0u8; 3];
    for i in 0..3 {
        result[i] = (overlay[i] as f64 * alpha + base[i] as f64 * (1.0 - alpha)).round() as u8;
    }
    result
}

/// Multiply blend mode
fn blend_multiply_pixel(base: &[u8], overlay: &[u8], alpha: f64) -> [u8; 3] {
    let mut result = [0u8; 3];
    for i in 0..3 {
        let multiplied = (base[i] as u32 * overlay[i] as u32) / 255;
        result[i] = (multiplied as f64 * alpha + base[i] as f64 * (1.0 - alpha)).round() as u8;
    }
    result
}

/// Screen blend mode
fn blend_screen_pixel(base: &[u8], overlay: &[u8], alpha: f64) -> [u8; 3] {
    let mut result = [0u8; 3];
    for i in 0..3 {
        let screened = 255 - ((255 - base[i] as u32) * (255 - overlay[i] as u32)) / 255;
        result[i] = (screened as f64 * alpha + base[i] as f64 * (1.0 - alpha)).round() as u8;
    }
    result
}

/// Overlay blend mode
fn blend_overlay_pixel(base: &[u8], overlay: &[u8], alpha: f64) -> [u8; 3] {
    let mut result = [0u8; 3];
    for i in 0..3 {
        let b = base[i] as f64 / 255.0;
        let o = overlay[i] as f64 / 255.0;

        let overlayed = if b < 0.5 {
            2.0 * b * o
        } else {
            1.0 - 2.0 * (1.0 - b) * (1.0 - o)
        };

        let blended = overlayed * alpha + b * (1.0 - alpha);
        result[i] = (blended * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    result
}

/// Neutral stand-in when the mockup cannot be loaded: a soft vertical
/// gradient with a garment-coloured disc in the middle
fn placeholder_background(width: u32, height: u32) -> RgbaImage {
    const TOP: [f64; 3] = [243.0, 244.0, 246.0];
    const BOTTOM: [f64; 3] = [209.0, 213.0, 219.0];

    let mut image = RgbaImage::from_fn(width, height, |_, y| {
        let t = if height > 1 { y as f64 / (height - 1) as f64 } else { 0.0 };
        let mut pixel = [255u8; 4];
        for i in 0..3 {
            pixel[i] = (TOP[i] + (BOTTOM[i] - TOP[i]) * t).round() as u8;
        }
        Rgba(pixel)
    });

    let radius = (width.min(height) / 6) as i32;
    if radius > 0 {
        draw_filled_circle_mut(
            &mut image,
            ((width / 2) as i32, (height / 2) as i32),
            radius,
            Rgba([156, 163, 175, 255]),
        );
    }

    image
}

/// Encode a raster to PNG bytes (preserves RGBA transparency)
fn encode_png(image: RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image).write_to(&mut buffer, ImageOutputFormat::Png)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetSettings;
    use crate::engine::assets::tests::png_data_uri;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];

    fn compositor() -> Compositor {
        let loader = Arc::new(AssetLoader::new(&AssetSettings::default()).unwrap());
        Compositor::new(loader, &CanvasSettings::default())
    }

    fn layer(key: LayerKey, design_ref: String, bounds: Rect) -> Layer {
        Layer { key, design_ref, bounds, rotation: 0.0 }
    }

    fn frame(layers: Vec<Layer>) -> Frame {
        Frame {
            product_id: "test-product".to_string(),
            side: Side::Front,
            mockup_size: Size::new(100.0, 100.0),
            mockup: Some(png_data_uri(100, 100, RED)),
            mask: None,
            blend_mode: BlendMode::Normal,
            opacity: 255,
            layers,
            active: None,
        }
    }

    fn near(pixel: &Rgba<u8>, expected: [u8; 4]) -> bool {
        pixel.0.iter().zip(expected).all(|(a, b)| (*a as i32 - b as i32).abs() <= 3)
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let a = LayerKey::Placement(PlacementId::new());
        let b = LayerKey::Placement(PlacementId::new());
        let c = LayerKey::Placement(PlacementId::new());
        let frame = frame(vec![
            layer(a.clone(), String::new(), Rect::new(0.0, 0.0, 60.0, 60.0)),
            layer(b.clone(), String::new(), Rect::new(20.0, 20.0, 40.0, 40.0)),
            layer(c.clone(), String::new(), Rect::new(30.0, 30.0, 40.0, 40.0)),
        ]);
        let viewport = Viewport::working(frame.mockup_size, 800);

        assert_eq!(hit_test(&frame, &viewport, 35.0, 35.0), Some(c));
        assert_eq!(hit_test(&frame, &viewport, 5.0, 5.0), Some(a));
        assert_eq!(hit_test(&frame, &viewport, 95.0, 5.0), None);
    }

    #[test]
    fn test_hit_test_maps_through_viewport_scale() {
        let key = LayerKey::Zone("fullCenter".to_string());
        let mut frame = frame(vec![layer(key.clone(), String::new(), Rect::new(500.0, 500.0, 100.0, 100.0))]);
        frame.mockup_size = Size::new(1000.0, 2000.0);

        let viewport = Viewport::working(frame.mockup_size, 500);
        assert_eq!(viewport.scale, 0.25);
        assert_eq!(hit_test(&frame, &viewport, 130.0, 130.0), Some(key));
        assert_eq!(hit_test(&frame, &viewport, 520.0, 520.0), None);
    }

    #[test]
    fn test_working_viewport_preserves_aspect() {
        let viewport = Viewport::working(Size::new(760.0, 1000.0), 800);
        assert_eq!(viewport.height, 800);
        assert_eq!(viewport.width, 608);

        let small = Viewport::working(Size::new(300.0, 200.0), 800);
        assert_eq!((small.width, small.height, small.scale), (300, 200, 1.0));
    }

    #[tokio::test]
    async fn test_layers_drawn_in_z_order() {
        let compositor = compositor();
        let frame = frame(vec![
            layer(LayerKey::Zone("a".into()), png_data_uri(10, 10, BLUE), Rect::new(20.0, 20.0, 40.0, 40.0)),
            layer(LayerKey::Zone("b".into()), png_data_uri(10, 10, GREEN), Rect::new(40.0, 40.0, 40.0, 40.0)),
        ]);

        let image = compositor
            .render_image(&frame, RenderTarget::Preview, &CancelToken::new())
            .await
            .unwrap();

        assert!(near(image.get_pixel(5, 5), RED));
        assert!(near(image.get_pixel(30, 30), BLUE));
        assert!(near(image.get_pixel(50, 50), GREEN));
        assert!(near(image.get_pixel(70, 70), GREEN));
    }

    #[tokio::test]
    async fn test_failed_design_is_omitted() {
        let compositor = compositor();
        let frame = frame(vec![
            layer(LayerKey::Zone("a".into()), "missing/design.png".to_string(), Rect::new(0.0, 0.0, 50.0, 50.0)),
            layer(LayerKey::Zone("b".into()), png_data_uri(10, 10, BLUE), Rect::new(50.0, 50.0, 50.0, 50.0)),
        ]);

        let output = compositor
            .render(&frame, RenderTarget::Export, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(output.layers_drawn, 1);
        assert_eq!(output.layers_skipped, 1);
        assert!(!output.png.is_empty());
    }

    #[tokio::test]
    async fn test_missing_mockup_falls_back_to_placeholder() {
        let compositor = compositor();
        let mut frame = frame(vec![]);
        frame.mockup = Some("mockups/missing.png".to_string());

        let image = compositor
            .render_image(&frame, RenderTarget::Export, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(image.dimensions(), (100, 100));
        assert!(near(image.get_pixel(0, 0), [243, 244, 246, 255]));
    }

    #[tokio::test]
    async fn test_unprovisioned_mask_leaves_designs_unclipped() {
        let compositor = compositor();
        let mut frame = frame(vec![layer(
            LayerKey::Zone("all".into()),
            png_data_uri(10, 10, BLUE),
            Rect::new(0.0, 0.0, 100.0, 100.0),
        )]);
        frame.mask = Some("mockups/missing/mask-front.png".to_string());

        let image = compositor
            .render_image(&frame, RenderTarget::Export, &CancelToken::new())
            .await
            .unwrap();

        assert!(near(image.get_pixel(10, 50), BLUE));
        assert!(near(image.get_pixel(90, 50), BLUE));
    }

    #[tokio::test]
    async fn test_mask_clips_designs() {
        let compositor = compositor();
        let mut mask = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        for y in 0..100 {
            for x in 0..50 {
                mask.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
        let mask_ref = "test://mask-left-transparent".to_string();
        compositor.loader().insert(mask_ref.clone(), DynamicImage::ImageRgba8(mask));

        let mut frame = frame(vec![layer(
            LayerKey::Zone("all".into()),
            png_data_uri(10, 10, BLUE),
            Rect::new(0.0, 0.0, 100.0, 100.0),
        )]);
        frame.mask = Some(mask_ref);

        let image = compositor
            .render_image(&frame, RenderTarget::Export, &CancelToken::new())
            .await
            .unwrap();

        assert!(near(image.get_pixel(10, 50), RED));
        assert!(near(image.get_pixel(90, 50), BLUE));
    }

    #[tokio::test]
    async fn test_rotation_turns_the_design() {
        let compositor = compositor();
        // 80x20 bar, rotated a quarter turn it becomes 20x80
        let mut frame = frame(vec![Layer {
            key: LayerKey::Zone("bar".into()),
            design_ref: png_data_uri(80, 20, BLUE),
            bounds: Rect::new(10.0, 40.0, 80.0, 20.0),
            rotation: 90.0,
        }]);
        frame.mockup_size = Size::new(100.0, 100.0);

        let image = compositor
            .render_image(&frame, RenderTarget::Export, &CancelToken::new())
            .await
            .unwrap();

        assert!(near(image.get_pixel(50, 20), BLUE));
        assert!(near(image.get_pixel(15, 50), RED));
    }

    #[tokio::test]
    async fn test_export_uses_native_resolution() {
        let compositor = compositor();
        let mut frame = frame(vec![]);
        frame.mockup_size = Size::new(500.0, 1000.0);
        frame.mockup = Some(png_data_uri(1000, 2000, RED));

        let token = CancelToken::new();
        let preview = compositor.render(&frame, RenderTarget::Preview, &token).await.unwrap();
        let export = compositor.render(&frame, RenderTarget::Export, &token).await.unwrap();

        assert_eq!((preview.width, preview.height), (400, 800));
        assert_eq!((export.width, export.height), (1000, 2000));
    }

    #[tokio::test]
    async fn test_cancelled_render_is_discarded() {
        let compositor = compositor();
        let token = CancelToken::new();
        token.cancel();

        let result = compositor.render(&frame(vec![]), RenderTarget::Preview, &token).await;
        assert!(matches!(result, Err(RenderError::Cancelled)));
    }

    #[tokio::test]
    async fn test_active_layer_outlined_in_preview_only() {
        let compositor = compositor();
        let key = LayerKey::Zone("a".into());
        let mut frame = frame(vec![layer(key.clone(), png_data_uri(10, 10, BLUE), Rect::new(30.0, 30.0, 40.0, 40.0))]);
        frame.active = Some(key);

        let token = CancelToken::new();
        let preview = compositor.render_image(&frame, RenderTarget::Preview, &token).await.unwrap();
        let export = compositor.render_image(&frame, RenderTarget::Export, &token).await.unwrap();

        // Outline sits `highlight_padding` (4px) outside the 30..70 box
        let outline = Rgba(CanvasSettings::default().highlight_color);
        assert_eq!(*preview.get_pixel(26, 50), outline);
        assert!(near(export.get_pixel(26, 50), RED));
    }

    #[test]
    fn test_hit_test_covers_rotated_corners() {
        let key = LayerKey::Zone("bar".into());
        let mut frame = frame(vec![layer(key.clone(), String::new(), Rect::new(10.0, 45.0, 80.0, 10.0))]);
        let viewport = Viewport::working(frame.mockup_size, 800);

        // Unrotated, a point above the bar misses
        assert_eq!(hit_test(&frame, &viewport, 50.0, 20.0), None);

        frame.layers[0].rotation = 90.0;
        assert_eq!(hit_test(&frame, &viewport, 50.0, 20.0), Some(key));
        assert_eq!(hit_test(&frame, &viewport, 15.0, 50.0), None);
    }

    #[tokio::test]
    async fn test_huge_layer_draws_only_visible_part() {
        let compositor = compositor();
        let frame = frame(vec![layer(
            LayerKey::Zone("huge".into()),
            png_data_uri(10, 10, BLUE),
            Rect::new(0.0, 0.0, 1e12, 1e12),
        )]);

        let output = compositor
            .render(&frame, RenderTarget::Preview, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!((output.width, output.height), (100, 100));
        assert_eq!(output.layers_drawn, 1);

        let image = compositor
            .render_image(&frame, RenderTarget::Preview, &CancelToken::new())
            .await
            .unwrap();
        assert!(near(image.get_pixel(50, 50), BLUE));
    }

    #[tokio::test]
    async fn test_huge_rotated_layer_is_omitted() {
        let compositor = compositor();
        let mut frame = frame(vec![Layer {
            key: LayerKey::Zone("huge".into()),
            design_ref: png_data_uri(10, 10, BLUE),
            bounds: Rect::new(-5e11, -5e11, 1e12, 1e12),
            rotation: 30.0,
        }]);
        frame.active = Some(LayerKey::Zone("huge".into()));

        let output = compositor
            .render(&frame, RenderTarget::Preview, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(output.layers_drawn, 0);
        assert_eq!(output.layers_skipped, 1);
    }

    #[tokio::test]
    async fn test_offscreen_layer_is_skipped() {
        let compositor = compositor();
        let frame = frame(vec![layer(
            LayerKey::Zone("away".into()),
            png_data_uri(10, 10, BLUE),
            Rect::new(5000.0, 5000.0, 40.0, 40.0),
        )]);

        let output = compositor
            .render(&frame, RenderTarget::Export, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(output.layers_skipped, 1);
    }

    #[tokio::test]
    async fn test_outline_of_oversized_active_layer_stays_off_canvas() {
        let compositor = compositor();
        let key = LayerKey::Zone("big".into());
        let mut frame = frame(vec![layer(key.clone(), png_data_uri(10, 10, BLUE), Rect::new(-1e9, -1e9, 3e9, 3e9))]);
        frame.active = Some(key);

        let image = compositor
            .render_image(&frame, RenderTarget::Preview, &CancelToken::new())
            .await
            .unwrap();
        assert!(near(image.get_pixel(0, 0), BLUE));
        assert!(near(image.get_pixel(99, 99), BLUE));
    }

    #[test]
    fn test_multiply_darkens() {
        let result = blend_multiply_pixel(&[200, 200, 200, 255], &[128, 128, 128, 255], 1.0);
        assert!(result[0] < 200);
    }
}
