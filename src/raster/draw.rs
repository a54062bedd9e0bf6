//! Shape and text rasterization onto 8-bit layer rasters.
//!
//! Every drawing function clips to the raster, so shapes centred near an
//! edge are drawn partially instead of failing.

use super::geometry::{Point, Rect};
use ab_glyph::{Font, FontArc, ScaleFont, point};
use image::{GrayImage, Luma};

/// Minimum glyph coverage for a pixel to be stamped.
const TEXT_COVERAGE: f32 = 0.5;

/// Pixels of the straight line from `a` to `b`, both ends included.
pub fn line_points(a: Point, b: Point) -> Vec<Point> {
    let (mut x, mut y) = (i64::from(a.x), i64::from(a.y));
    let (x1, y1) = (i64::from(b.x), i64::from(b.y));
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut points = Vec::with_capacity((dx.max(-dy) + 1) as usize);
    loop {
        points.push(Point::new(x as u32, y as u32));
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    points
}

fn put(image: &mut GrayImage, x: i64, y: i64, value: u8) {
    if x >= 0 && y >= 0 && x < i64::from(image.width()) && y < i64::from(image.height()) {
        image.put_pixel(x as u32, y as u32, Luma([value]));
    }
}

/// Pixels of the disc `dx² + dy² <= radius²` around `center`, clipped to
/// a `width` x `height` raster.
pub fn disc_points(center: Point, radius: u32, width: u32, height: u32) -> Vec<Point> {
    let r = i64::from(radius);
    let (cx, cy) = (i64::from(center.x), i64::from(center.y));
    let mut points = Vec::new();
    for y in (cy - r).max(0)..=(cy + r).min(i64::from(height) - 1) {
        for x in (cx - r).max(0)..=(cx + r).min(i64::from(width) - 1) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= r * r {
                points.push(Point::new(x as u32, y as u32));
            }
        }
    }
    points
}

/// Area of an unclipped disc of `radius`, in pixels.
pub fn disc_area(radius: u32) -> usize {
    let r = i64::from(radius);
    let mut area = 0;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                area += 1;
            }
        }
    }
    area
}

/// Filled disc.
pub fn fill_circle(image: &mut GrayImage, center: Point, radius: u32, value: u8) {
    for p in disc_points(center, radius, image.width(), image.height()) {
        image.put_pixel(p.x, p.y, Luma([value]));
    }
}

/// Circle outline drawn with a pen `thickness` pixels wide, centred on
/// the circle of `radius`.
pub fn circle_outline(image: &mut GrayImage, center: Point, radius: u32, thickness: u32, value: u8) {
    let half = f64::from(thickness.max(1)) / 2.0;
    let inner = (f64::from(radius) - half).max(0.0);
    let outer = f64::from(radius) + half;
    let reach = outer.ceil() as i64;
    let (cx, cy) = (i64::from(center.x), i64::from(center.y));
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let d = ((dx * dx + dy * dy) as f64).sqrt();
            if d >= inner && d < outer {
                put(image, cx + dx, cy + dy, value);
            }
        }
    }
}

/// Rectangle, filled when `thickness` is `None`, otherwise an outline
/// band of `thickness` pixels on the inside of `rect`.
pub fn draw_rectangle(image: &mut GrayImage, rect: Rect, thickness: Option<u32>, value: u8) {
    let clipped = rect.clip(image.width(), image.height());
    for y in clipped.y..clipped.bottom() {
        for x in clipped.x..clipped.right() {
            let on_band = match thickness {
                None => true,
                Some(t) => {
                    let t = t.max(1);
                    x < rect.x + t
                        || y < rect.y + t
                        || x + t >= rect.right()
                        || y + t >= rect.bottom()
                }
            };
            if on_band {
                image.put_pixel(x, y, Luma([value]));
            }
        }
    }
}

/// Stamp `text` with its baseline starting at `origin`.
///
/// Glyph pixels with at least half coverage are set to `value`. With
/// `mirror` the stamped pixels are flipped horizontally within the text's
/// own extent. Returns the rectangle that was touched.
pub fn draw_text(
    image: &mut GrayImage,
    font: &FontArc,
    text: &str,
    origin: Point,
    scale: f32,
    value: u8,
    mirror: bool,
) -> Rect {
    let scaled = font.as_scaled(scale);
    let mut caret = origin.x as f32;
    let mut previous = None;
    let mut stamped: Vec<(i64, i64)> = Vec::new();

    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, point(caret, origin.y as f32));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                if coverage >= TEXT_COVERAGE {
                    stamped.push((
                        bounds.min.x as i64 + i64::from(gx),
                        bounds.min.y as i64 + i64::from(gy),
                    ));
                }
            });
        }
        caret += scaled.h_advance(id);
        previous = Some(id);
    }

    if mirror && let Some(min_x) = stamped.iter().map(|p| p.0).min() {
        let max_x = stamped.iter().map(|p| p.0).max().unwrap_or(min_x);
        for p in &mut stamped {
            p.0 = min_x + max_x - p.0;
        }
    }

    let mut touched = Vec::with_capacity(stamped.len());
    for (x, y) in stamped {
        put(image, x, y, value);
        if x >= 0 && y >= 0 && x < i64::from(image.width()) && y < i64::from(image.height()) {
            touched.push(Point::new(x as u32, y as u32));
        }
    }
    Rect::enclosing(&touched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::ops::{bounding_rectangle, count_non_zero};
    use crate::test_helpers::blank;

    // =========================================================================
    // Lines
    // =========================================================================

    #[test]
    fn line_points_includes_both_ends() {
        let pts = line_points(Point::new(0, 0), Point::new(3, 0));
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[0], Point::new(0, 0));
        assert_eq!(pts[3], Point::new(3, 0));
    }

    #[test]
    fn diagonal_line_steps_both_axes() {
        let pts = line_points(Point::new(3, 3), Point::new(0, 0));
        assert_eq!(
            pts,
            vec![
                Point::new(3, 3),
                Point::new(2, 2),
                Point::new(1, 1),
                Point::new(0, 0)
            ]
        );
    }

    #[test]
    fn degenerate_line_is_single_point() {
        assert_eq!(
            line_points(Point::new(5, 5), Point::new(5, 5)),
            vec![Point::new(5, 5)]
        );
    }

    // =========================================================================
    // Discs and circles
    // =========================================================================

    #[test]
    fn disc_area_small_radii() {
        assert_eq!(disc_area(0), 1);
        assert_eq!(disc_area(1), 5);
        assert_eq!(disc_area(2), 13);
    }

    #[test]
    fn fill_circle_matches_disc_area() {
        let mut img = blank(20, 20);
        fill_circle(&mut img, Point::new(10, 10), 3, 255);
        assert_eq!(count_non_zero(&img), disc_area(3));
        assert_eq!(bounding_rectangle(&img), Rect::new(7, 7, 7, 7));
    }

    #[test]
    fn fill_circle_clips_at_edge() {
        let mut img = blank(10, 10);
        fill_circle(&mut img, Point::new(0, 0), 2, 255);
        // Quarter disc: (0,0),(1,0),(2,0),(0,1),(1,1),(0,2)
        assert_eq!(count_non_zero(&img), 6);
    }

    #[test]
    fn circle_outline_leaves_centre_empty() {
        let mut img = blank(21, 21);
        circle_outline(&mut img, Point::new(10, 10), 6, 2, 255);
        assert_eq!(img.get_pixel(10, 10).0[0], 0);
        assert_eq!(img.get_pixel(16, 10).0[0], 255);
    }

    // =========================================================================
    // Rectangles
    // =========================================================================

    #[test]
    fn filled_rectangle_covers_area() {
        let mut img = blank(10, 10);
        draw_rectangle(&mut img, Rect::new(2, 2, 4, 3), None, 200);
        assert_eq!(count_non_zero(&img), 12);
    }

    #[test]
    fn outline_rectangle_is_hollow() {
        let mut img = blank(10, 10);
        draw_rectangle(&mut img, Rect::new(1, 1, 5, 5), Some(1), 200);
        assert_eq!(count_non_zero(&img), 16);
        assert_eq!(img.get_pixel(3, 3).0[0], 0);
    }
}
