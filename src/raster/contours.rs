//! Hole discovery and contour filling.
//!
//! A hole is a 4-connected region of background pixels that does not reach
//! the raster border; foreground (any pixel above zero) is 8-connected.
//! Each hole is described by the border of the foreground pixels that
//! enclose it, traced with the Suzuki-Abe border following rules and then
//! compressed to the points where the trace changes direction.

use super::components::Connectivity;
use super::draw::line_points;
use super::geometry::{Point, Rect};
use image::GrayImage;
use std::collections::VecDeque;

/// Neighbour directions in trace order. Increasing index turns
/// counterclockwise on screen (y grows downward).
const DIRS: [(i64, i64); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Compressed border contours of every hole in `image`, in raster order of
/// each hole's top-left pixel.
pub fn find_hole_contours(image: &GrayImage) -> Vec<Vec<Point>> {
    let (width, height) = image.dimensions();
    let data = image.as_raw();
    let mut seen = vec![false; data.len()];
    let mut queue = VecDeque::new();
    let mut contours = Vec::new();

    for start in 0..data.len() {
        if data[start] != 0 || seen[start] {
            continue;
        }
        seen[start] = true;
        queue.push_back(start);
        let mut touches_border = false;

        while let Some(idx) = queue.pop_front() {
            let p = Point::new(idx as u32 % width, idx as u32 / width);
            if p.x == 0 || p.y == 0 || p.x + 1 == width || p.y + 1 == height {
                touches_border = true;
            }
            for &(dx, dy) in Connectivity::Four.offsets() {
                let Some(n) = p.offset(dx, dy, width, height) else {
                    continue;
                };
                let nidx = (n.y * width + n.x) as usize;
                if data[nidx] == 0 && !seen[nidx] {
                    seen[nidx] = true;
                    queue.push_back(nidx);
                }
            }
        }

        if !touches_border {
            // The scan reaches a hole at its top-left pixel, whose left
            // neighbour is the foreground pixel the border trace starts from.
            let hole = Point::new(start as u32 % width, start as u32 / width);
            contours.push(trace_hole_border(image, Point::new(hole.x - 1, hole.y)));
        }
    }
    contours
}

fn is_foreground(image: &GrayImage, x: i64, y: i64) -> bool {
    x >= 0
        && y >= 0
        && x < i64::from(image.width())
        && y < i64::from(image.height())
        && image.get_pixel(x as u32, y as u32).0[0] > 0
}

fn step(p: (i64, i64), dir: usize) -> (i64, i64) {
    (p.0 + DIRS[dir].0, p.1 + DIRS[dir].1)
}

/// Follow the hole border starting at `start`, whose right neighbour is
/// the hole. Only direction changes are recorded.
fn trace_hole_border(image: &GrayImage, start: Point) -> Vec<Point> {
    let p0 = (i64::from(start.x), i64::from(start.y));

    // Clockwise from the hole side for the first foreground neighbour
    let mut s = 0usize;
    let mut first = None;
    for _ in 0..8 {
        s = (s + 7) & 7;
        let n = step(p0, s);
        if is_foreground(image, n.0, n.1) {
            first = Some(n);
            break;
        }
    }
    let Some(p1) = first else {
        return vec![start];
    };

    let mut points = Vec::new();
    let mut p3 = p0;
    let mut prev_s = s ^ 4;
    loop {
        // Counterclockwise from the neighbour after the one we came from
        for _ in 0..8 {
            s = (s + 1) & 7;
            let n = step(p3, s);
            if is_foreground(image, n.0, n.1) {
                break;
            }
        }
        if s != prev_s {
            points.push(Point::new(p3.0 as u32, p3.1 as u32));
            prev_s = s;
        }
        let p4 = step(p3, s);
        if p4 == p0 && p3 == p1 {
            break;
        }
        p3 = p4;
        s = (s + 4) & 7;
    }
    if points.is_empty() {
        points.push(start);
    }
    points
}

/// Every pixel on or inside a closed contour, in raster order.
///
/// Consecutive vertices (and the last back to the first) are joined with
/// straight lines; the enclosed interior is added to the outline.
pub fn fill_contour(contour: &[Point]) -> Vec<Point> {
    let mut outline = Vec::new();
    for (i, &a) in contour.iter().enumerate() {
        let b = contour[(i + 1) % contour.len()];
        outline.extend(line_points(a, b));
    }
    fill_enclosed(&outline)
}

/// `pixels` plus every pixel they enclose, in raster order.
///
/// The exterior is flooded with 4-connectivity from the border of the
/// bounding rectangle grown by one pixel; anything the flood cannot reach
/// is either one of `pixels` or enclosed by them.
pub fn fill_enclosed(pixels: &[Point]) -> Vec<Point> {
    let bounds = Rect::enclosing(pixels);
    if bounds.is_empty() {
        return Vec::new();
    }
    // Padded frame: one free pixel on every side
    let w = bounds.width + 2;
    let h = bounds.height + 2;
    let mut wall = vec![false; (w * h) as usize];
    for p in pixels {
        wall[((p.y - bounds.y + 1) * w + (p.x - bounds.x + 1)) as usize] = true;
    }

    let mut outside = vec![false; wall.len()];
    let mut queue = VecDeque::from([0usize]);
    outside[0] = true;
    while let Some(idx) = queue.pop_front() {
        let p = Point::new(idx as u32 % w, idx as u32 / w);
        for &(dx, dy) in Connectivity::Four.offsets() {
            let Some(n) = p.offset(dx, dy, w, h) else {
                continue;
            };
            let nidx = (n.y * w + n.x) as usize;
            if !wall[nidx] && !outside[nidx] {
                outside[nidx] = true;
                queue.push_back(nidx);
            }
        }
    }

    let mut filled = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            if !outside[(y * w + x) as usize] {
                filled.push(Point::new(bounds.x + x - 1, bounds.y + y - 1));
            }
        }
    }
    filled
}
