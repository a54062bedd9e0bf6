//! Hollow-area discovery.
//!
//! A hollow area is an enclosed cavity on one layer: background fully
//! surrounded by foreground. Each one is a resin-trap candidate until the
//! resolver proves it drains.

use crate::config::ResinTrapConfig;
use crate::raster::contours;
use crate::raster::geometry::{Point, Rect};
use crate::raster::ops;
use image::GrayImage;
use serde::Serialize;
use std::borrow::Cow;

/// Classification of a hollow area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    Unknown,
    Trap,
    Drain,
}

/// One enclosed cavity.
///
/// `contour` is the compressed border of the foreground around the cavity.
/// `processed` marks areas already queued by the traversal in progress.
#[derive(Debug, Clone, Serialize)]
pub struct HollowArea {
    pub contour: Vec<Point>,
    pub bounding_rectangle: Rect,
    pub kind: AreaKind,
    #[serde(skip)]
    pub processed: bool,
}

impl HollowArea {
    pub fn new(contour: Vec<Point>, kind: AreaKind) -> Self {
        let bounding_rectangle = Rect::enclosing(&contour);
        Self {
            contour,
            bounding_rectangle,
            kind,
            processed: false,
        }
    }

    /// Every pixel on or inside the contour.
    pub fn filled_pixels(&self) -> Vec<Point> {
        contours::fill_contour(&self.contour)
    }
}

/// Hollow areas of one layer. Candidates on the first and last layer open
/// onto the outside and start as [`AreaKind::Drain`].
pub fn find_hollow_areas(
    raster: &GrayImage,
    config: &ResinTrapConfig,
    index: u32,
    layer_count: u32,
) -> Vec<HollowArea> {
    let binary = if config.binary_threshold > 0 {
        Cow::Owned(ops::threshold(raster, config.binary_threshold))
    } else {
        Cow::Borrowed(raster)
    };
    let kind = if index == 0 || index + 1 == layer_count {
        AreaKind::Drain
    } else {
        AreaKind::Unknown
    };

    contours::find_hole_contours(&binary)
        .into_iter()
        .map(|contour| HollowArea::new(contour, kind))
        .filter(|area| area.bounding_rectangle.area() >= u64::from(config.required_area_to_process_check))
        .collect()
}
