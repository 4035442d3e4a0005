//! Fit calculator
//!
//! Pure geometry that sizes a design into a print area.

use crate::domain::{Rect, Size};

/// Largest rectangle with the image's aspect ratio that fits inside `target`,
/// centred in it.
///
/// A wider-than-target image is constrained by width, anything else by
/// height. Degenerate image sizes fall back to filling the target.
pub fn fit_contain(image_width: f64, image_height: f64, target: Rect) -> Rect {
    if image_width <= 0.0 || image_height <= 0.0 || target.is_empty() {
        return target;
    }

    let image_ratio = image_width / image_height;
    let target_ratio = target.width / target.height;

    let (width, height) = if image_ratio > target_ratio {
        (target.width, target.width / image_ratio)
    } else {
        (target.height * image_ratio, target.height)
    };

    Rect {
        x: target.x + (target.width - width) / 2.0,
        y: target.y + (target.height - height) / 2.0,
        width,
        height,
    }
}

/// Multiply a size by `factor`, keeping it between `min_scale` and
/// `max_scale` times the target's dimensions.
///
/// Each dimension is checked against its own bound; when one is clamped the
/// other is re-derived from the original aspect ratio, so the ratio always
/// survives even if the result no longer matches the requested factor. For
/// extreme aspect ratios the bounds can conflict; the maximum then wins.
pub fn scale_within_bounds(
    current_width: f64,
    current_height: f64,
    factor: f64,
    target: Rect,
    min_scale: f64,
    max_scale: f64,
) -> Size {
    if current_width <= 0.0 || current_height <= 0.0 {
        return Size::new(current_width, current_height);
    }

    let aspect = current_width / current_height;
    let mut width = current_width * factor;
    let mut height = current_height * factor;

    let min_width = target.width * min_scale;
    let min_height = target.height * min_scale;
    if width < min_width {
        width = min_width;
        height = width / aspect;
    }
    if height < min_height {
        height = min_height;
        width = height * aspect;
    }

    // Upper bound last so it holds even when the two bounds conflict
    let max_width = target.width * max_scale;
    let max_height = target.height * max_scale;
    if width > max_width {
        width = max_width;
        height = width / aspect;
    }
    if height > max_height {
        height = max_height;
        width = height * aspect;
    }

    Size::new(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_contained_centered(fit: Rect, target: Rect, image_w: f64, image_h: f64) {
        assert!(fit.x >= target.x - EPS);
        assert!(fit.y >= target.y - EPS);
        assert!(fit.right() <= target.right() + EPS);
        assert!(fit.bottom() <= target.bottom() + EPS);

        let left = fit.x - target.x;
        let right = target.right() - fit.right();
        let top = fit.y - target.y;
        let bottom = target.bottom() - fit.bottom();
        assert!((left - right).abs() <= 1.0);
        assert!((top - bottom).abs() <= 1.0);

        assert!((fit.width / fit.height - image_w / image_h).abs() < 1e-9);
    }

    #[test]
    fn test_fit_contain_wide_image_constrained_by_width() {
        let target = Rect::new(217.0, 340.0, 325.0, 470.0);
        let fit = fit_contain(1000.0, 500.0, target);

        assert_eq!(fit.width, 325.0);
        assert_eq!(fit.height, 162.5);
        assert_eq!(fit.x, 217.0);
        assert_eq!(fit.y, 493.75);
    }

    #[test]
    fn test_fit_contain_tall_image_constrained_by_height() {
        let target = Rect::new(0.0, 0.0, 400.0, 200.0);
        let fit = fit_contain(100.0, 400.0, target);

        assert_eq!(fit.height, 200.0);
        assert_eq!(fit.width, 50.0);
        assert_eq!(fit.x, 175.0);
        assert_eq!(fit.y, 0.0);
    }

    #[test]
    fn test_fit_contain_property_sweep() {
        let targets = [
            Rect::new(217.0, 340.0, 325.0, 470.0),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Rect::new(-50.0, 12.5, 333.3, 77.7),
        ];
        let images = [(1.0, 1.0), (1000.0, 500.0), (3.0, 4096.0), (1920.0, 1080.0), (17.0, 13.0)];

        for target in targets {
            for (w, h) in images {
                let fit = fit_contain(w, h, target);
                assert_contained_centered(fit, target, w, h);
            }
        }
    }

    #[test]
    fn test_fit_contain_is_deterministic() {
        let target = Rect::new(10.0, 20.0, 300.0, 300.0);
        assert_eq!(fit_contain(640.0, 480.0, target), fit_contain(640.0, 480.0, target));
    }

    #[test]
    fn test_scale_clamps_to_max_and_is_fixed_point() {
        let target = Rect::new(0.0, 0.0, 200.0, 100.0);
        let size = scale_within_bounds(100.0, 50.0, 10.0, target, 0.3, 3.0);

        assert!((size.width - 600.0).abs() < EPS);
        assert!((size.height - 300.0).abs() < EPS);

        let again = scale_within_bounds(size.width, size.height, 1.0, target, 0.3, 3.0);
        assert_eq!(again, size);
    }

    #[test]
    fn test_scale_clamps_to_min_and_is_fixed_point() {
        let target = Rect::new(0.0, 0.0, 200.0, 100.0);
        let size = scale_within_bounds(100.0, 50.0, 0.01, target, 0.3, 3.0);

        assert!((size.width - 60.0).abs() < EPS);
        assert!((size.height - 30.0).abs() < EPS);

        let again = scale_within_bounds(size.width, size.height, 1.0, target, 0.3, 3.0);
        assert_eq!(again, size);
    }

    #[test]
    fn test_scale_preserves_aspect_when_one_dimension_clamps() {
        // Tall design in a wide target: height hits the cap first
        let target = Rect::new(0.0, 0.0, 400.0, 100.0);
        let size = scale_within_bounds(50.0, 100.0, 4.0, target, 0.3, 3.0);

        assert!((size.height - 300.0).abs() < EPS);
        assert!((size.width / size.height - 0.5).abs() < EPS);
    }

    #[test]
    fn test_scale_within_range_is_plain_multiply() {
        let target = Rect::new(0.0, 0.0, 200.0, 200.0);
        let size = scale_within_bounds(100.0, 80.0, 1.5, target, 0.3, 3.0);
        assert_eq!(size, Size::new(150.0, 120.0));
    }

    #[test]
    fn test_scale_never_exceeds_max_when_bounds_conflict() {
        // 1:10 design in a 4:1 target: reaching min width would overshoot max height
        let target = Rect::new(0.0, 0.0, 400.0, 100.0);
        let size = scale_within_bounds(10.0, 100.0, 1.0, target, 0.3, 3.0);

        assert!(size.width <= target.width * 3.0 + EPS);
        assert!(size.height <= target.height * 3.0 + EPS);
        assert!((size.height - 300.0).abs() < EPS);
        assert!((size.width / size.height - 0.1).abs() < EPS);
    }
}
