//! Geometry primitives in mockup space
//!
//! All coordinates are expressed in mockup pixels (the coordinate system the
//! product template's print areas are authored in). Mapping to an on-screen
//! canvas or an export raster happens through a single scale factor owned by
//! the compositor.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A point in mockup space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

/// Width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    /// Rectangle of the given size centred on `center`
    pub fn centered_at(center: Point, size: Size) -> Self {
        Rect {
            x: center.x - size.width / 2.0,
            y: center.y - size.height / 2.0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }

    /// Inclusive on the top/left edge, exclusive on the bottom/right edge
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Rect { x: self.x + dx, y: self.y + dy, ..*self }
    }

    /// Scale every coordinate by `factor` (mockup space to raster space)
    pub fn scaled(&self, factor: f64) -> Self {
        Rect {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Overlapping region, or `None` when the rectangles do not overlap
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return None;
        }
        Some(Rect::new(x, y, right - x, bottom - y))
    }

    /// Axis-aligned box around this rectangle rotated clockwise by `degrees`
    /// about its centre
    pub fn rotated_bounds(&self, degrees: f64) -> Rect {
        if degrees.rem_euclid(360.0) == 0.0 {
            return *self;
        }
        let (sin, cos) = degrees.to_radians().sin_cos();
        let width = self.width * cos.abs() + self.height * sin.abs();
        let height = self.width * sin.abs() + self.height * cos.abs();
        Rect::centered_at(self.center(), Size::new(width, height))
    }

    /// Grow outward by `amount` on every edge
    pub fn inflate(&self, amount: f64) -> Self {
        Rect {
            x: self.x - amount,
            y: self.y - amount,
            width: self.width + amount * 2.0,
            height: self.height + amount * 2.0,
        }
    }
}

/// A print zone rectangle as authored in the product catalog
///
/// `max_width`/`max_height` optionally cap how large an auto-fitted design
/// may become inside the zone. A zero-area rectangle marks a zone that is
/// not offered on that product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PrintAreaRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<f64>,
}

impl PrintAreaRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        PrintAreaRect { x, y, width, height, max_width: None, max_height: None }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn is_usable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// The region auto-fit may fill: the zone shrunk to its caps, still centred
    pub fn fit_target(&self) -> Rect {
        let width = self.max_width.map_or(self.width, |cap| cap.min(self.width));
        let height = self.max_height.map_or(self.height, |cap| cap.min(self.height));
        Rect::centered_at(self.rect().center(), Size::new(width, height))
    }
}
