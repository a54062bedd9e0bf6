//! Integer pixel geometry shared by every raster operation.
//!
//! - [`Point`]: a pixel coordinate. Ordered row-major (`y`, then `x`) so
//!   sorted point lists read like a raster scan.
//! - [`Rect`]: an axis-aligned pixel rectangle. `right()` and `bottom()`
//!   are exclusive; a rectangle with zero width or height is empty.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Offset by a signed delta, returning `None` when the result leaves
    /// the `width` x `height` raster.
    pub fn offset(self, dx: i32, dy: i32, width: u32, height: u32) -> Option<Self> {
        let x = i64::from(self.x) + i64::from(dx);
        let y = i64::from(self.y) + i64::from(dy);
        if x < 0 || y < 0 || x >= i64::from(width) || y >= i64::from(height) {
            return None;
        }
        Some(Self::new(x as u32, y as u32))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const EMPTY: Self = Self {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest rectangle containing every point, or [`Rect::EMPTY`].
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Point>) -> Self {
        let mut iter = points.into_iter();
        let Some(first) = iter.next() else {
            return Self::EMPTY;
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in iter {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// True when the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Union of two rectangles. An empty operand is ignored.
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(x, y, right - x, bottom - y)
    }

    /// Grow by `by` pixels on each side, clamped to a `width` x `height` raster.
    pub fn inflate_within(&self, by: u32, width: u32, height: u32) -> Self {
        let x = self.x.saturating_sub(by);
        let y = self.y.saturating_sub(by);
        let right = self.right().saturating_add(by).min(width);
        let bottom = self.bottom().saturating_add(by).min(height);
        Self::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }

    /// Clip to a `width` x `height` raster.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        self.inflate_within(0, width, height)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_sort_row_major() {
        let mut points = vec![Point::new(5, 1), Point::new(0, 2), Point::new(1, 1)];
        points.sort();
        assert_eq!(
            points,
            vec![Point::new(1, 1), Point::new(5, 1), Point::new(0, 2)]
        );
    }

    #[test]
    fn offset_rejects_out_of_bounds() {
        let p = Point::new(0, 3);
        assert_eq!(p.offset(-1, 0, 10, 10), None);
        assert_eq!(p.offset(1, 1, 10, 10), Some(Point::new(1, 4)));
        assert_eq!(p.offset(0, 7, 10, 10), None);
    }

    #[test]
    fn enclosing_rect_is_inclusive() {
        let points = [Point::new(2, 3), Point::new(4, 3), Point::new(3, 6)];
        assert_eq!(Rect::enclosing(&points), Rect::new(2, 3, 3, 4));
        assert!(Rect::enclosing(&[]).is_empty());
    }

    #[test]
    fn intersects_requires_shared_pixel() {
        let a = Rect::new(0, 0, 4, 4);
        assert!(a.intersects(&Rect::new(3, 3, 2, 2)));
        assert!(!a.intersects(&Rect::new(4, 0, 2, 2)));
        assert!(!a.intersects(&Rect::EMPTY));
    }

    #[test]
    fn union_ignores_empty() {
        let a = Rect::new(2, 2, 2, 2);
        assert_eq!(a.union(&Rect::EMPTY), a);
        assert_eq!(Rect::EMPTY.union(&a), a);
        assert_eq!(a.union(&Rect::new(10, 0, 1, 1)), Rect::new(2, 0, 9, 4));
    }

    #[test]
    fn inflate_clamps_to_raster() {
        let r = Rect::new(1, 1, 2, 2).inflate_within(3, 5, 4);
        assert_eq!(r, Rect::new(0, 0, 5, 4));
    }

    #[test]
    fn inflate_grows_every_side_inside_raster() {
        let r = Rect::new(10, 10, 4, 2).inflate_within(3, 100, 100);
        assert_eq!(r, Rect::new(7, 7, 10, 8));
        assert_eq!(Rect::new(2, 2, 1, 1).inflate_within(u32::MAX, 8, 6), Rect::new(0, 0, 8, 6));
    }
}
