//! Connected-component labeling.
//!
//! Foreground is every pixel brighter than zero. Labels start at 1; label 0
//! is background. Components are numbered in raster order of their first
//! pixel, which keeps labeling deterministic across runs.

use super::geometry::{Point, Rect};
use image::GrayImage;
use std::collections::VecDeque;

const FOUR: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const EIGHT: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
];

/// Pixel adjacency used to join foreground pixels into components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Edge neighbours only.
    Four,
    /// Edge and corner neighbours.
    Eight,
}

impl Connectivity {
    pub(crate) fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Self::Four => &FOUR,
            Self::Eight => &EIGHT,
        }
    }
}

/// Per-component statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub label: u32,
    pub bounds: Rect,
    /// Pixel count.
    pub area: u32,
}

/// Label map plus per-component statistics.
#[derive(Debug, Clone)]
pub struct Labeling {
    width: u32,
    labels: Vec<u32>,
    pub components: Vec<Component>,
}

impl Labeling {
    /// Label of the pixel at `(x, y)`; 0 for background.
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.labels[(y * self.width + x) as usize]
    }

    /// Coordinates of every pixel carrying `label`, in raster order.
    pub fn pixels_of(&self, component: &Component) -> Vec<Point> {
        let mut points = Vec::with_capacity(component.area as usize);
        for y in component.bounds.y..component.bounds.bottom() {
            for x in component.bounds.x..component.bounds.right() {
                if self.label_at(x, y) == component.label {
                    points.push(Point::new(x, y));
                }
            }
        }
        points
    }
}

/// Label connected foreground components of `image`.
pub fn label_components(image: &GrayImage, connectivity: Connectivity) -> Labeling {
    let (width, height) = image.dimensions();
    let data = image.as_raw();
    let mut labels = vec![0u32; data.len()];
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..data.len() {
        if data[start] == 0 || labels[start] != 0 {
            continue;
        }
        let label = components.len() as u32 + 1;
        labels[start] = label;
        queue.push_back(start);

        let mut area = 0u32;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        while let Some(idx) = queue.pop_front() {
            let p = Point::new(idx as u32 % width, idx as u32 / width);
            area += 1;
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);

            for &(dx, dy) in connectivity.offsets() {
                let Some(n) = p.offset(dx, dy, width, height) else {
                    continue;
                };
                let nidx = (n.y * width + n.x) as usize;
                if data[nidx] > 0 && labels[nidx] == 0 {
                    labels[nidx] = label;
                    queue.push_back(nidx);
                }
            }
        }

        components.push(Component {
            label,
            bounds: Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1),
            area,
        });
    }

    Labeling {
        width,
        labels,
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{blank, fill_rect};
    use image::Luma;

    #[test]
    fn blank_image_has_no_components() {
        let labeling = label_components(&blank(5, 5), Connectivity::Eight);
        assert!(labeling.components.is_empty());
    }

    #[test]
    fn separate_squares_get_separate_labels() {
        let mut img = blank(10, 10);
        fill_rect(&mut img, Rect::new(0, 0, 2, 2), 255);
        fill_rect(&mut img, Rect::new(5, 5, 3, 3), 255);

        let labeling = label_components(&img, Connectivity::Four);
        assert_eq!(labeling.components.len(), 2);
        assert_eq!(labeling.components[0].area, 4);
        assert_eq!(labeling.components[0].bounds, Rect::new(0, 0, 2, 2));
        assert_eq!(labeling.components[1].area, 9);
        assert_eq!(labeling.label_at(6, 6), 2);
        assert_eq!(labeling.label_at(3, 3), 0);
    }

    #[test]
    fn diagonal_touch_depends_on_connectivity() {
        let mut img = blank(4, 4);
        img.put_pixel(1, 1, Luma([255]));
        img.put_pixel(2, 2, Luma([255]));

        assert_eq!(label_components(&img, Connectivity::Four).components.len(), 2);
        assert_eq!(label_components(&img, Connectivity::Eight).components.len(), 1);
    }

    #[test]
    fn pixels_of_lists_only_that_component() {
        let mut img = blank(6, 3);
        fill_rect(&mut img, Rect::new(0, 0, 2, 1), 10);
        img.put_pixel(1, 2, Luma([10]));

        let labeling = label_components(&img, Connectivity::Four);
        let first = &labeling.components[0];
        assert_eq!(
            labeling.pixels_of(first),
            vec![Point::new(0, 0), Point::new(1, 0)]
        );
    }
}
