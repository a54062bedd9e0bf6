//! Resin-trap resolution.
//!
//! Every hollow area that is not already known to drain is classified by
//! walking the stack from it, one layer at a time, first towards layer 0
//! and then towards the last layer. A step from an area onto the next layer
//! looks at the void pixels under the area's mask:
//!
//! - void pixels inside one of the next layer's own hollow areas link that
//!   area into the walk. Reaching a drain makes the whole walk drain.
//! - enough void pixels outside any hollow area mean the cavity opens onto
//!   the outside, so it drains.
//!
//! Once both directions are exhausted, every linked area takes the
//! origin's classification. A drain never goes back to being a trap.

use super::DetectError;
use super::hollow::{AreaKind, HollowArea};
use crate::cache::RasterCache;
use crate::config::ResinTrapConfig;
use crate::issues::{Issue, IssueType};
use crate::progress::{self, Progress};
use crate::raster::geometry::{Point, Rect};
use crate::storage::LayerStorage;
use image::GrayImage;
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AreaId {
    layer: u32,
    index: usize,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Down,
    Up,
}

impl Direction {
    fn next(self, layer: u32, layer_count: u32) -> Option<u32> {
        match self {
            Self::Down => layer.checked_sub(1),
            Self::Up => layer.checked_add(1).filter(|&next| next < layer_count),
        }
    }
}

/// Outcome of stepping from one area onto the next layer.
#[derive(Debug, Default)]
struct Step {
    /// Next-layer areas reached through void pixels, in discovery order.
    links: Vec<usize>,
    black_pixels: u32,
    /// A drain was reached, directly or through open void.
    drains: bool,
}

/// Owns every layer's hollow areas while they are classified.
pub struct ResinTrapResolver {
    areas: Vec<Vec<HollowArea>>,
    required_black_pixels: u32,
    maximum_brightness: u8,
}

impl ResinTrapResolver {
    /// `areas[i]` holds the hollow areas of layer `i`.
    pub fn new(areas: Vec<Vec<HollowArea>>, config: &ResinTrapConfig) -> Self {
        Self {
            areas,
            required_black_pixels: config.required_black_pixels_to_drain,
            maximum_brightness: config.maximum_pixel_brightness_to_drain,
        }
    }

    pub fn areas(&self) -> &[Vec<HollowArea>] {
        &self.areas
    }

    /// Classify every [`AreaKind::Unknown`] area as trap or drain.
    ///
    /// Areas are resolved in layer order. One progress unit per layer.
    pub fn resolve<S: LayerStorage>(
        &mut self,
        cache: &RasterCache<'_, S>,
        progress: &Progress,
    ) -> Result<(), DetectError> {
        let layer_count = self.areas.len() as u32;
        progress.reset(progress::RESOLVING_RESIN_TRAPS, layer_count);

        for layer in 0..layer_count {
            for index in 0..self.areas[layer as usize].len() {
                let id = AreaId { layer, index };
                if self.area(id).kind != AreaKind::Unknown {
                    continue;
                }
                if progress.is_cancelled() {
                    return Err(DetectError::Cancelled);
                }
                self.resolve_area(id, cache, progress)?;
            }
            progress.lock_and_increment();
        }

        let traps = self
            .areas
            .iter()
            .flatten()
            .filter(|a| a.kind == AreaKind::Trap)
            .count();
        log::debug!("{traps} resin traps after resolution");
        Ok(())
    }

    /// Trap areas as issues. The pixel list is the area's contour.
    pub fn into_issues(self) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (layer, areas) in self.areas.into_iter().enumerate() {
            for area in areas.into_iter().filter(|a| a.kind == AreaKind::Trap) {
                issues.push(Issue::new(
                    IssueType::ResinTrap,
                    layer as u32,
                    area.contour,
                    area.bounding_rectangle,
                ));
            }
        }
        issues
    }

    fn area(&self, id: AreaId) -> &HollowArea {
        &self.areas[id.layer as usize][id.index]
    }

    fn area_mut(&mut self, id: AreaId) -> &mut HollowArea {
        &mut self.areas[id.layer as usize][id.index]
    }

    fn resolve_area<S: LayerStorage>(
        &mut self,
        origin: AreaId,
        cache: &RasterCache<'_, S>,
        progress: &Progress,
    ) -> Result<(), DetectError> {
        self.area_mut(origin).kind = AreaKind::Trap;
        let mut linked = Vec::new();

        for direction in [Direction::Down, Direction::Up] {
            if self.area(origin).kind == AreaKind::Drain {
                break;
            }
            let mut visited = Vec::new();
            let walked = self.walk(origin, direction, cache, progress, &mut visited, &mut linked);
            for id in visited {
                self.area_mut(id).processed = false;
            }
            walked?;
        }

        let kind = self.area(origin).kind;
        for id in linked {
            let area = self.area_mut(id);
            if area.kind != AreaKind::Drain {
                area.kind = kind;
            }
        }
        Ok(())
    }

    /// Breadth-first walk from `origin` in one direction. Every area queued
    /// is flagged `processed` and recorded in `visited`.
    fn walk<S: LayerStorage>(
        &mut self,
        origin: AreaId,
        direction: Direction,
        cache: &RasterCache<'_, S>,
        progress: &Progress,
        visited: &mut Vec<AreaId>,
        linked: &mut Vec<AreaId>,
    ) -> Result<(), DetectError> {
        let layer_count = self.areas.len() as u32;
        self.area_mut(origin).processed = true;
        visited.push(origin);
        let mut queue = VecDeque::from([origin]);

        while let Some(current) = queue.pop_front() {
            if progress.is_cancelled() {
                return Err(DetectError::Cancelled);
            }
            let Some(next_layer) = direction.next(current.layer, layer_count) else {
                continue;
            };
            let raster = cache.acquire(next_layer)?;
            let step = self.step(current, next_layer, &raster);

            for index in step.links {
                let id = AreaId {
                    layer: next_layer,
                    index,
                };
                linked.push(id);
                let area = self.area_mut(id);
                if !area.processed && area.kind != AreaKind::Drain {
                    area.processed = true;
                    visited.push(id);
                    queue.push_back(id);
                }
            }

            let open = queue.is_empty() && step.black_pixels > self.drain_threshold(current);
            if step.drains || open {
                self.area_mut(origin).kind = AreaKind::Drain;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Void pixels needed to call an area open.
    fn drain_threshold(&self, id: AreaId) -> u32 {
        let half_contour = (self.area(id).contour.len() / 2) as u32;
        half_contour.min(self.required_black_pixels)
    }

    /// Compare `from`'s mask against layer `next_layer`'s raster and hollow
    /// areas.
    fn step(&self, from: AreaId, next_layer: u32, raster: &GrayImage) -> Step {
        let area = self.area(from);
        let bounds = area.bounding_rectangle;
        let threshold = self.drain_threshold(from);

        // Next-layer areas rasterized over the stepped-from rectangle.
        // Labels are index + 1; later areas overwrite earlier ones.
        let mut labels = vec![0usize; bounds.area() as usize];
        let mut active = BTreeSet::new();
        for (index, other) in self.areas[next_layer as usize].iter().enumerate() {
            if !other.bounding_rectangle.intersects(&bounds) {
                continue;
            }
            active.insert(index);
            for p in other.filled_pixels() {
                if bounds.contains(p) {
                    labels[offset(bounds, p)] = index + 1;
                }
            }
        }

        let mut step = Step::default();
        for p in area.filled_pixels() {
            if raster.get_pixel(p.x, p.y).0[0] > self.maximum_brightness {
                continue;
            }
            step.black_pixels += 1;

            match labels[offset(bounds, p)] {
                0 => {
                    if step.black_pixels > threshold {
                        step.drains = true;
                        break;
                    }
                }
                label => {
                    let index = label - 1;
                    if !active.remove(&index) {
                        continue;
                    }
                    step.links.push(index);
                    if self.areas[next_layer as usize][index].kind == AreaKind::Drain {
                        step.drains = true;
                        break;
                    }
                    if active.is_empty() {
                        break;
                    }
                }
            }
        }
        step
    }
}

fn offset(bounds: Rect, p: Point) -> usize {
    ((p.y - bounds.y) * bounds.width + (p.x - bounds.x)) as usize
}
