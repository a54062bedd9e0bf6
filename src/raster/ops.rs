//! Whole-raster pixel operations.
//!
//! All functions are pure: they take `&GrayImage` and return a new buffer or
//! a measurement. Binary rasters use `0` for background and `255` for
//! foreground.

use super::geometry::{Point, Rect};
use image::GrayImage;

/// Maximum value written by the binarizing operations.
pub const WHITE: u8 = u8::MAX;

/// Bounding rectangle of every pixel brighter than zero.
pub fn bounding_rectangle(image: &GrayImage) -> Rect {
    let width = image.width() as usize;
    if width == 0 {
        return Rect::EMPTY;
    }
    let mut min_x = usize::MAX;
    let mut min_y = usize::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    for (y, row) in image.as_raw().chunks_exact(width).enumerate() {
        let Some(first) = row.iter().position(|&v| v > 0) else {
            continue;
        };
        // A row with a first lit pixel always has a last one
        let last = row.iter().rposition(|&v| v > 0).unwrap_or(first);
        min_x = min_x.min(first);
        max_x = max_x.max(last);
        min_y = min_y.min(y);
        max_y = y;
    }
    if min_x == usize::MAX {
        return Rect::EMPTY;
    }
    Rect::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    )
}

/// Binary threshold: pixels strictly above `threshold` become [`WHITE`],
/// everything else becomes zero.
pub fn threshold(image: &GrayImage, threshold: u8) -> GrayImage {
    let data = image
        .as_raw()
        .iter()
        .map(|&v| if v > threshold { WHITE } else { 0 })
        .collect();
    from_raw(image.width(), image.height(), data)
}

/// Saturating per-pixel `a - b`.
pub fn subtract(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let data = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| x.saturating_sub(y))
        .collect();
    from_raw(a.width(), a.height(), data)
}

/// Copy a rectangular region out of a raster. The rectangle must lie
/// inside the raster.
pub fn crop(image: &GrayImage, rect: Rect) -> GrayImage {
    let width = image.width() as usize;
    let mut data = Vec::with_capacity(rect.area() as usize);
    for y in rect.y..rect.bottom() {
        let start = y as usize * width + rect.x as usize;
        data.extend_from_slice(&image.as_raw()[start..start + rect.width as usize]);
    }
    from_raw(rect.width, rect.height, data)
}

/// Erode a binary raster with a 3x3 square structuring element,
/// `iterations` times.
///
/// Pixels outside the raster count as foreground, so shapes touching the
/// border are not eaten from that side. `iterations` passes of a 3x3 square
/// equal one pass of a `(2n+1)` square, which is separable into a row pass
/// and a column pass over run lengths, so the cost does not grow with
/// `iterations`.
pub fn erode(image: &GrayImage, iterations: u32) -> GrayImage {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if iterations == 0 || width == 0 || height == 0 {
        return image.clone();
    }
    let need = iterations as usize + 1;
    let src = image.as_raw();

    let mut rows = vec![0u8; width * height];
    let mut line = Vec::with_capacity(width.max(height));
    for y in 0..height {
        line.clear();
        line.extend(src[y * width..(y + 1) * width].iter().map(|&v| v > 0));
        let kept = erode_line(&line, need);
        for (x, keep) in kept.into_iter().enumerate() {
            if keep {
                rows[y * width + x] = WHITE;
            }
        }
    }

    let mut out = vec![0u8; width * height];
    for x in 0..width {
        line.clear();
        line.extend((0..height).map(|y| rows[y * width + x] > 0));
        let kept = erode_line(&line, need);
        for (y, keep) in kept.into_iter().enumerate() {
            if keep {
                out[y * width + x] = WHITE;
            }
        }
    }
    from_raw(image.width(), image.height(), out)
}

/// One-dimensional erosion: a set sample survives when the run of set
/// samples through it extends at least `need` samples to each side
/// (itself included), with the line ends extending runs infinitely.
fn erode_line(line: &[bool], need: usize) -> Vec<bool> {
    let n = line.len();
    let mut left = vec![0usize; n];
    let mut run = usize::MAX;
    for i in 0..n {
        run = if line[i] { run.saturating_add(1) } else { 0 };
        left[i] = run;
    }
    let mut kept = vec![false; n];
    run = usize::MAX;
    for i in (0..n).rev() {
        run = if line[i] { run.saturating_add(1) } else { 0 };
        kept[i] = left[i] >= need && run >= need;
    }
    kept
}

/// Number of pixels brighter than zero.
pub fn count_non_zero(image: &GrayImage) -> usize {
    image.as_raw().iter().filter(|&&v| v > 0).count()
}

/// Coordinates of every pixel brighter than zero, in raster order.
pub fn non_zero_points(image: &GrayImage) -> Vec<Point> {
    image
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > 0)
        .map(|(x, y, _)| Point::new(x, y))
        .collect()
}

/// Build a raster from a buffer whose length is known to be `width * height`.
pub(crate) fn from_raw(width: u32, height: u32, data: Vec<u8>) -> GrayImage {
    GrayImage::from_vec(width, height, data)
        .unwrap_or_else(|| GrayImage::new(width, height))
}
