//! The per-layer checks.
//!
//! [`scan_layer`] runs every enabled check on one layer and returns what it
//! found. It reads the layer's raster and, for the island and overhang
//! checks, the raster of the layer below; it never looks at the results of
//! any other layer's scan.

use super::DetectError;
use super::hollow::{self, HollowArea};
use crate::cache::RasterCache;
use crate::config::{DetectionConfig, IslandConfig, OverhangConfig, TouchingBoundConfig};
use crate::issues::{Issue, IssueType};
use crate::layer::LayerStack;
use crate::raster::components::{Component, Connectivity, Labeling, label_components};
use crate::raster::geometry::{Point, Rect};
use crate::raster::ops;
use crate::storage::LayerStorage;
use image::GrayImage;
use std::borrow::Cow;

/// Brightness above which a difference pixel counts as new area.
const OVERHANG_THRESHOLD: u8 = 127;

/// Islands with at least this many supported pixels are re-checked by the
/// overhang test when enhanced detection is on.
const ENHANCED_RECHECK_SUPPORT: u32 = 10;

/// Everything one layer's scan produced.
#[derive(Debug, Default)]
pub struct LayerFindings {
    pub index: u32,
    pub issues: Vec<Issue>,
    pub hollow_areas: Vec<HollowArea>,
}

/// Run every enabled check on layer `index`.
pub fn scan_layer<S: LayerStorage>(
    stack: &LayerStack<S>,
    cache: &RasterCache<'_, S>,
    config: &DetectionConfig,
    index: u32,
) -> Result<LayerFindings, DetectError> {
    let mut found = LayerFindings {
        index,
        ..Default::default()
    };
    let raster = cache.acquire(index)?;
    let bounds = stack.layer_bounds(index, &raster);

    if bounds.is_empty() {
        if config.empty_layers {
            found.issues.push(Issue::empty_layer(index));
        }
        return Ok(found);
    }

    if config.touching_bound.enabled
        && config.touching_bound.allows(index)
        && let Some(issue) = touching_bound(&raster, bounds, &config.touching_bound, index)
    {
        found.issues.push(issue);
    }

    if index > 0 {
        let islands = config.island.enabled && config.island.allows(index);
        let independent_overhangs = config.overhang.enabled
            && (!config.island.enabled || config.overhang.independent_from_islands)
            && config.overhang.allows(index);

        if islands || independent_overhangs {
            let previous = cache.acquire(index - 1)?;
            if islands {
                found.issues.extend(islands_and_overhangs(
                    &raster,
                    &previous,
                    &config.island,
                    &config.overhang,
                    index,
                ));
            }
            if independent_overhangs
                && let Some(issue) =
                    layer_overhang(&raster, &previous, bounds, &config.overhang, index)
            {
                found.issues.push(issue);
            }
        }
    }

    if config.resin_trap.enabled && config.resin_trap.allows(index) {
        found.hollow_areas =
            hollow::find_hollow_areas(&raster, &config.resin_trap, index, stack.layer_count());
    }

    Ok(found)
}

// ============================================================================
// Touching bound
// ============================================================================

/// Lit pixels inside the margin bands, when the layer's extent reaches them.
///
/// The top and bottom bands span the full width. The left and right bands
/// only cover the rows between the top and bottom bands.
pub fn touching_bound(
    raster: &GrayImage,
    bounds: Rect,
    config: &TouchingBoundConfig,
    index: u32,
) -> Option<Issue> {
    let (width, height) = raster.dimensions();
    let touch_top = bounds.y <= config.margin_top;
    let touch_bottom = bounds.bottom() >= height.saturating_sub(config.margin_bottom);
    let touch_left = bounds.x <= config.margin_left;
    let touch_right = bounds.right() >= width.saturating_sub(config.margin_right);

    let bright = |x: u32, y: u32| raster.get_pixel(x, y).0[0] >= config.minimum_pixel_brightness;
    let mut pixels = Vec::new();

    if touch_top || touch_bottom {
        for x in 0..width {
            if touch_top {
                for y in 0..config.margin_top.min(height) {
                    if bright(x, y) {
                        pixels.push(Point::new(x, y));
                    }
                }
            }
            if touch_bottom {
                for y in height.saturating_sub(config.margin_bottom)..height {
                    if bright(x, y) {
                        pixels.push(Point::new(x, y));
                    }
                }
            }
        }
    }

    if touch_left || touch_right {
        for y in config.margin_top..height.saturating_sub(config.margin_bottom) {
            if touch_left {
                for x in 0..config.margin_left.min(width) {
                    if bright(x, y) {
                        pixels.push(Point::new(x, y));
                    }
                }
            }
            if touch_right {
                for x in width.saturating_sub(config.margin_right)..width {
                    if bright(x, y) {
                        pixels.push(Point::new(x, y));
                    }
                }
            }
        }
    }

    if pixels.is_empty() {
        return None;
    }
    Some(Issue::from_pixels(IssueType::TouchingBound, index, pixels))
}

// ============================================================================
// Islands and coupled overhangs
// ============================================================================

/// Island check per connected component, with the per-component overhang
/// test where the configuration couples the two.
pub fn islands_and_overhangs(
    raster: &GrayImage,
    previous: &GrayImage,
    island: &IslandConfig,
    overhang: &OverhangConfig,
    index: u32,
) -> Vec<Issue> {
    let binary = if island.binary_threshold > 0 {
        Cow::Owned(ops::threshold(raster, island.binary_threshold))
    } else {
        Cow::Borrowed(raster)
    };
    let connectivity = if island.allow_diagonal_bonds {
        Connectivity::Eight
    } else {
        Connectivity::Four
    };
    let labeling = label_components(&binary, connectivity);

    let mut issues = Vec::new();
    for component in &labeling.components {
        if component.area < island.required_area_to_process_check {
            continue;
        }

        let mut points = Vec::new();
        let mut supported = 0u32;
        for p in labeling.pixels_of(component) {
            if raster.get_pixel(p.x, p.y).0[0] < island.required_pixel_brightness_to_process_check {
                continue;
            }
            if previous.get_pixel(p.x, p.y).0[0] >= island.required_pixel_brightness_to_support {
                supported += 1;
            }
            points.push(p);
        }
        if points.is_empty() {
            continue;
        }

        let required = (points.len() as f32 * island.required_pixels_to_support_multiplier).max(1.0);
        let mut found_island = ((supported as f32) < required)
            .then(|| Issue::new(IssueType::Island, index, points, component.bounds));

        let coupled =
            overhang.enabled && !overhang.independent_from_islands && found_island.is_none();
        let recheck = found_island.is_some()
            && island.enhanced_detection
            && supported >= ENHANCED_RECHECK_SUPPORT;

        if coupled || recheck {
            let new_area = component_overhang(raster, previous, &labeling, component, overhang);
            if new_area.len() >= overhang.required_pixels_to_consider as usize {
                issues.push(Issue::new(
                    IssueType::Overhang,
                    index,
                    new_area,
                    component.bounds,
                ));
            } else if island.enhanced_detection {
                found_island = None;
            }
        }

        issues.extend(found_island);
    }
    issues
}

/// Eroded new area of one component relative to the layer below.
///
/// The window reaches one pixel past the erosion radius around the
/// component, so the background around it erodes the shape exactly as a
/// whole-layer pass would.
fn component_overhang(
    raster: &GrayImage,
    previous: &GrayImage,
    labeling: &Labeling,
    component: &Component,
    config: &OverhangConfig,
) -> Vec<Point> {
    let roi = component.bounds.inflate_within(
        config.erode_iterations.saturating_add(1),
        raster.width(),
        raster.height(),
    );
    let eroded = new_area_mask(
        &ops::crop(raster, roi),
        &ops::crop(previous, roi),
        config.erode_iterations,
    );
    ops::non_zero_points(&eroded)
        .into_iter()
        .map(|p| Point::new(roi.x + p.x, roi.y + p.y))
        .filter(|p| labeling.label_at(p.x, p.y) == component.label)
        .collect()
}

// ============================================================================
// Independent overhangs
// ============================================================================

/// Whole-layer overhang test. The issue carries the layer's bounding
/// rectangle.
pub fn layer_overhang(
    raster: &GrayImage,
    previous: &GrayImage,
    bounds: Rect,
    config: &OverhangConfig,
    index: u32,
) -> Option<Issue> {
    let eroded = new_area_mask(raster, previous, config.erode_iterations);
    let pixels = ops::non_zero_points(&eroded);
    if pixels.is_empty() || pixels.len() < config.required_pixels_to_consider as usize {
        return None;
    }
    Some(Issue::new(IssueType::Overhang, index, pixels, bounds))
}

/// `erode(threshold(current - previous))`.
fn new_area_mask(current: &GrayImage, previous: &GrayImage, erode_iterations: u32) -> GrayImage {
    let difference = ops::subtract(current, previous);
    ops::erode(
        &ops::threshold(&difference, OVERHANG_THRESHOLD),
        erode_iterations,
    )
}
