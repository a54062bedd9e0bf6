//! Batched pixel edits.
//!
//! A [`DrawingEngine`] applies an ordered list of [`PixelOperation`]s to a
//! [`LayerStack`]. Each layer an operation reads is decoded once into a
//! working set and every later operation on that layer reuses the same
//! buffer. When the batch is done, the rasters that were actually changed
//! are written back in one parallel pass, each exactly once.
//!
//! Operations are validated up front: a batch naming a layer outside the
//! stack, or stamping text without a font, fails before anything is
//! written.
//!
//! ## Operations
//!
//! | Kind | Effect |
//! |------|--------|
//! | `drawing` | Rectangle or circle brush, filled or outlined. Size 1 writes one pixel. |
//! | `text` | Text stamp through the engine's font, optionally mirrored |
//! | `eraser` | Fills the component under the cursor, and everything it encloses |
//! | `supports` | Tapered support pillar grown down from the layer below |
//! | `drain_hole` | Dark circle drilled down through the solid under the cursor |

use crate::layer::LayerStack;
use crate::progress::{self, Progress};
use crate::raster::components::Connectivity;
use crate::raster::contours::fill_enclosed;
use crate::raster::draw;
use crate::raster::geometry::{Point, Rect};
use crate::storage::{LayerStorage, StorageError};
use ab_glyph::FontArc;
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

/// The eraser leaves pixels dimmer than this alone.
const ERASER_MIN_BRIGHTNESS: u8 = 10;

/// Pillars above this layer taper from the tip; at or below it they use
/// the base diameter.
const TAPER_START_LAYER: u32 = 10;

/// A drain-hole test pixel at or below this is void.
const DRAIN_DARK_MAX: u8 = 100;

#[derive(Error, Debug)]
pub enum DrawError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Text operation needs a font")]
    MissingFont,
    #[error("Operation targets layer {index}, stack has {count} layers")]
    LayerOutOfRange { index: u32, count: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushShape {
    #[default]
    Rectangle,
    Circle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushStroke {
    pub layer_index: u32,
    pub location: Point,
    #[serde(default)]
    pub shape: BrushShape,
    pub brush_size: u32,
    /// Outline width. Absent fills the shape.
    #[serde(default)]
    pub thickness: Option<u32>,
    pub brightness: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStamp {
    pub layer_index: u32,
    /// Left end of the baseline.
    pub location: Point,
    pub text: String,
    /// Glyph height in pixels.
    pub font_scale: f32,
    pub brightness: u8,
    #[serde(default)]
    pub mirror: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EraserFill {
    pub layer_index: u32,
    pub location: Point,
    #[serde(default)]
    pub brightness: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportPillar {
    /// The layer that needs support. Drawing starts on the layer below.
    pub layer_index: u32,
    pub location: Point,
    pub tip_diameter: u32,
    pub pillar_diameter: u32,
    pub base_diameter: u32,
    pub brightness: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrainHoleDrill {
    /// Drilling starts on this layer.
    pub layer_index: u32,
    pub location: Point,
    pub diameter: u32,
}

/// One edit. Serialized with a `kind` tag, e.g.
/// `{"kind": "drain_hole", "layer_index": 40, "location": {"x": 10, "y": 12}, "diameter": 8}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PixelOperation {
    Drawing(BrushStroke),
    Text(TextStamp),
    Eraser(EraserFill),
    Supports(SupportPillar),
    DrainHole(DrainHoleDrill),
}

impl PixelOperation {
    pub fn layer_index(&self) -> u32 {
        match self {
            Self::Drawing(op) => op.layer_index,
            Self::Text(op) => op.layer_index,
            Self::Eraser(op) => op.layer_index,
            Self::Supports(op) => op.layer_index,
            Self::DrainHole(op) => op.layer_index,
        }
    }
}

/// Applies pixel operations to a stack.
#[derive(Clone, Default)]
pub struct DrawingEngine {
    font: Option<FontArc>,
}

impl DrawingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Font used by text operations.
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// Apply `operations` in order, then write every changed raster back.
    ///
    /// Progress runs through the drawing phase (one unit per operation) and
    /// then the saving phase (one unit per written layer).
    pub fn apply<S: LayerStorage>(
        &self,
        stack: &mut LayerStack<S>,
        operations: &[PixelOperation],
        progress: &Progress,
    ) -> Result<(), DrawError> {
        self.validate(stack, operations)?;
        progress.reset(progress::DRAWINGS, operations.len() as u32);

        let changed = {
            let mut working = WorkingSet::new(stack);
            for operation in operations {
                self.apply_one(&mut working, operation)?;
                progress.lock_and_increment();
            }
            log::debug!("{} layers decoded for drawing", working.rasters.len());
            working.into_changed()
        };

        log::info!(
            "{} operations applied, {} layers changed",
            operations.len(),
            changed.len()
        );
        stack.store_rasters(changed, progress)?;
        Ok(())
    }

    fn validate<S: LayerStorage>(
        &self,
        stack: &LayerStack<S>,
        operations: &[PixelOperation],
    ) -> Result<(), DrawError> {
        let count = stack.layer_count();
        for operation in operations {
            let index = operation.layer_index();
            if index >= count {
                return Err(DrawError::LayerOutOfRange { index, count });
            }
            if matches!(operation, PixelOperation::Text(_)) && self.font.is_none() {
                return Err(DrawError::MissingFont);
            }
        }
        Ok(())
    }

    fn apply_one<S: LayerStorage>(
        &self,
        working: &mut WorkingSet<'_, S>,
        operation: &PixelOperation,
    ) -> Result<(), DrawError> {
        match operation {
            PixelOperation::Drawing(op) => {
                brush(working.raster_mut(op.layer_index)?, op);
            }
            PixelOperation::Text(op) => {
                let font = self.font.as_ref().ok_or(DrawError::MissingFont)?;
                draw::draw_text(
                    working.raster_mut(op.layer_index)?,
                    font,
                    &op.text,
                    op.location,
                    op.font_scale,
                    op.brightness,
                    op.mirror,
                );
            }
            PixelOperation::Eraser(op) => {
                let layer = working.layer(op.layer_index)?;
                layer.changed |= erase(&mut layer.raster, op);
            }
            PixelOperation::Supports(op) => {
                let drawn = support_pillar(working, op)?;
                log::debug!("support at {} drawn on {drawn} layers", op.location);
            }
            PixelOperation::DrainHole(op) => {
                let drilled = drain_hole(working, op)?;
                log::debug!("drain hole at {} drilled through {drilled} layers", op.location);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Working set
// ============================================================================

struct WorkingLayer {
    raster: GrayImage,
    changed: bool,
}

/// Decoded rasters for the current batch, keyed by layer.
struct WorkingSet<'a, S: LayerStorage> {
    stack: &'a LayerStack<S>,
    rasters: BTreeMap<u32, WorkingLayer>,
}

impl<'a, S: LayerStorage> WorkingSet<'a, S> {
    fn new(stack: &'a LayerStack<S>) -> Self {
        Self {
            stack,
            rasters: BTreeMap::new(),
        }
    }

    /// The working copy of `index`, decoded on first use.
    fn layer(&mut self, index: u32) -> Result<&mut WorkingLayer, StorageError> {
        match self.rasters.entry(index) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let raster = self.stack.load_raster(index)?;
                Ok(entry.insert(WorkingLayer {
                    raster,
                    changed: false,
                }))
            }
        }
    }

    /// The working copy of `index`, flagged as changed.
    fn raster_mut(&mut self, index: u32) -> Result<&mut GrayImage, StorageError> {
        let layer = self.layer(index)?;
        layer.changed = true;
        Ok(&mut layer.raster)
    }

    fn into_changed(self) -> Vec<(u32, GrayImage)> {
        self.rasters
            .into_iter()
            .filter(|(_, layer)| layer.changed)
            .map(|(index, layer)| (index, layer.raster))
            .collect()
    }
}

// ============================================================================
// Operations
// ============================================================================

fn brush(raster: &mut GrayImage, op: &BrushStroke) {
    if op.brush_size <= 1 {
        let Point { x, y } = op.location;
        if x < raster.width() && y < raster.height() {
            raster.put_pixel(x, y, Luma([op.brightness]));
        }
        return;
    }
    match op.shape {
        BrushShape::Rectangle => {
            let half = op.brush_size / 2;
            let rect = Rect::new(
                op.location.x.saturating_sub(half),
                op.location.y.saturating_sub(half),
                op.brush_size,
                op.brush_size,
            );
            draw::draw_rectangle(raster, rect, op.thickness, op.brightness);
        }
        BrushShape::Circle => {
            let radius = op.brush_size / 2;
            match op.thickness {
                None => draw::fill_circle(raster, op.location, radius, op.brightness),
                Some(thickness) => {
                    draw::circle_outline(raster, op.location, radius, thickness, op.brightness)
                }
            }
        }
    }
}

/// Fill the component under the cursor. Returns whether anything was
/// written.
fn erase(raster: &mut GrayImage, op: &EraserFill) -> bool {
    let Point { x, y } = op.location;
    if x >= raster.width() || y >= raster.height() {
        log::warn!("eraser at {} is outside the layer", op.location);
        return false;
    }
    if raster.get_pixel(x, y).0[0] < ERASER_MIN_BRIGHTNESS {
        return false;
    }
    for p in fill_enclosed(&component_at(raster, op.location)) {
        raster.put_pixel(p.x, p.y, Luma([op.brightness]));
    }
    true
}

/// 8-connected lit pixels reachable from `start`.
fn component_at(raster: &GrayImage, start: Point) -> Vec<Point> {
    let (width, height) = raster.dimensions();
    let mut seen = vec![false; (width * height) as usize];
    let mut pixels = Vec::new();
    let mut queue = VecDeque::from([start]);
    seen[(start.y * width + start.x) as usize] = true;

    while let Some(p) = queue.pop_front() {
        pixels.push(p);
        for &(dx, dy) in Connectivity::Eight.offsets() {
            let Some(n) = p.offset(dx, dy, width, height) else {
                continue;
            };
            let idx = (n.y * width + n.x) as usize;
            if !seen[idx] && raster.get_pixel(n.x, n.y).0[0] > 0 {
                seen[idx] = true;
                queue.push_back(n);
            }
        }
    }
    pixels
}

/// Pixels of the disc around `center` that satisfy `pred`.
fn count_in_disc(raster: &GrayImage, center: Point, radius: u32, pred: impl Fn(u8) -> bool) -> usize {
    draw::disc_points(center, radius, raster.width(), raster.height())
        .into_iter()
        .filter(|p| pred(raster.get_pixel(p.x, p.y).0[0]))
        .count()
}

/// Grow a pillar down from the layer below `op.layer_index`.
///
/// Layers that are already solid under the tip are skipped until the first
/// pillar disc is drawn; after that the first solid layer ends the pillar.
/// Returns the number of layers drawn on.
fn support_pillar<S: LayerStorage>(
    working: &mut WorkingSet<'_, S>,
    op: &SupportPillar,
) -> Result<u32, StorageError> {
    let test_radius = op.tip_diameter / 2;
    let test_area = draw::disc_area(test_radius);
    let mut drawn = 0u32;

    for index in (0..op.layer_index).rev() {
        let layer = working.layer(index)?;
        let bright = count_in_disc(&layer.raster, op.location, test_radius, |v| v > 0);
        if bright * 3 > test_area {
            if drawn == 0 {
                continue;
            }
            break;
        }

        let diameter = if index > TAPER_START_LAYER {
            (op.tip_diameter + drawn).min(op.pillar_diameter)
        } else {
            op.base_diameter
        };
        draw::fill_circle(&mut layer.raster, op.location, diameter / 2, op.brightness);
        layer.changed = true;
        drawn += 1;
    }
    Ok(drawn)
}

/// Drill a dark circle down from `op.layer_index`.
///
/// Open layers above the solid are skipped; the first open layer after
/// drilling has started ends the hole. Returns the number of layers drilled.
fn drain_hole<S: LayerStorage>(
    working: &mut WorkingSet<'_, S>,
    op: &DrainHoleDrill,
) -> Result<u32, StorageError> {
    let radius = op.diameter / 2;
    let test_area = draw::disc_area(radius);
    let mut drilled = 0u32;

    for index in (0..=op.layer_index).rev() {
        let layer = working.layer(index)?;
        let dark = count_in_disc(&layer.raster, op.location, radius, |v| v <= DRAIN_DARK_MAX);
        if dark * 3 > test_area {
            if drilled == 0 {
                continue;
            }
            break;
        }

        draw::fill_circle(&mut layer.raster, op.location, radius, 0);
        layer.changed = true;
        drilled += 1;
    }
    Ok(drilled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::ops::count_non_zero;
    use crate::storage::MemoryStorage;
    use crate::test_helpers::{blank, fill_rect, fixture_font, stack_from};

    fn solid(size: u32) -> GrayImage {
        let mut img = blank(size, size);
        fill_rect(&mut img, Rect::new(0, 0, size, size), 255);
        img
    }

    fn stroke(layer_index: u32, x: u32, y: u32, size: u32) -> PixelOperation {
        PixelOperation::Drawing(BrushStroke {
            layer_index,
            location: Point::new(x, y),
            shape: BrushShape::Rectangle,
            brush_size: size,
            thickness: None,
            brightness: 255,
        })
    }

    fn apply(stack: &mut LayerStack<MemoryStorage>, ops: &[PixelOperation]) -> Progress {
        let progress = Progress::new();
        DrawingEngine::new().apply(stack, ops, &progress).unwrap();
        progress
    }

    fn zeros(raster: &GrayImage) -> usize {
        raster.as_raw().len() - count_non_zero(raster)
    }

    // =========================================================================
    // Brushes
    // =========================================================================

    #[test]
    fn single_pixel_brush_writes_one_pixel() {
        let mut stack = stack_from(vec![blank(10, 10); 3]);
        apply(&mut stack, &[stroke(1, 4, 5, 1)]);

        let raster = stack.load_raster(1).unwrap();
        assert_eq!(raster.get_pixel(4, 5).0[0], 255);
        assert_eq!(count_non_zero(&raster), 1);
        assert!(stack.layer(1).unwrap().is_modified());
        assert!(!stack.layer(0).unwrap().is_modified());
    }

    #[test]
    fn rectangle_brush_is_centred() {
        let mut stack = stack_from(vec![blank(20, 20)]);
        apply(&mut stack, &[stroke(0, 10, 10, 4)]);
        let raster = stack.load_raster(0).unwrap();
        assert_eq!(crate::raster::ops::bounding_rectangle(&raster), Rect::new(8, 8, 4, 4));
        assert_eq!(count_non_zero(&raster), 16);
    }

    #[test]
    fn outlined_rectangle_leaves_centre() {
        let mut stack = stack_from(vec![blank(20, 20)]);
        let op = PixelOperation::Drawing(BrushStroke {
            layer_index: 0,
            location: Point::new(10, 10),
            shape: BrushShape::Rectangle,
            brush_size: 6,
            thickness: Some(1),
            brightness: 200,
        });
        apply(&mut stack, &[op]);
        let raster = stack.load_raster(0).unwrap();
        assert_eq!(count_non_zero(&raster), 20);
        assert_eq!(raster.get_pixel(10, 10).0[0], 0);
    }

    #[test]
    fn circle_brush_fills_disc() {
        let mut stack = stack_from(vec![blank(20, 20)]);
        let op = PixelOperation::Drawing(BrushStroke {
            layer_index: 0,
            location: Point::new(10, 10),
            shape: BrushShape::Circle,
            brush_size: 4,
            thickness: None,
            brightness: 255,
        });
        apply(&mut stack, &[op]);
        assert_eq!(
            count_non_zero(&stack.load_raster(0).unwrap()),
            draw::disc_area(2)
        );
    }

    #[test]
    fn each_layer_written_once() {
        let mut stack = stack_from(vec![blank(10, 10); 4]);
        let progress = apply(
            &mut stack,
            &[stroke(2, 1, 1, 1), stroke(2, 2, 2, 1), stroke(3, 1, 1, 1), stroke(2, 3, 3, 1)],
        );
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.phase, progress::SAVING);
        assert_eq!(snapshot.processed, 2);
        assert_eq!(count_non_zero(&stack.load_raster(2).unwrap()), 3);
    }

    // =========================================================================
    // Text
    // =========================================================================

    fn text(layer_index: u32, text: &str, mirror: bool) -> PixelOperation {
        PixelOperation::Text(TextStamp {
            layer_index,
            location: Point::new(5, 30),
            text: text.into(),
            font_scale: 20.0,
            brightness: 200,
            mirror,
        })
    }

    fn apply_with_font(stack: &mut LayerStack<MemoryStorage>, ops: &[PixelOperation]) -> Progress {
        let progress = Progress::new();
        DrawingEngine::new()
            .with_font(fixture_font())
            .apply(stack, ops, &progress)
            .unwrap();
        progress
    }

    #[test]
    fn text_stamps_glyph_above_baseline() {
        let mut stack = stack_from(vec![blank(60, 40); 2]);
        apply_with_font(&mut stack, &[text(1, "H", false)]);

        let raster = stack.load_raster(1).unwrap();
        let lit: Vec<u8> = raster.as_raw().iter().copied().filter(|&v| v > 0).collect();
        assert!(lit.len() > 10, "only {} pixels stamped", lit.len());
        assert!(lit.iter().all(|&v| v == 200));

        // One glyph at 20 px sits on the baseline, right of the origin
        let extent = crate::raster::ops::bounding_rectangle(&raster);
        assert!(extent.x >= 4 && extent.right() <= 25, "extent {extent}");
        assert!(extent.y >= 10 && extent.bottom() <= 31, "extent {extent}");
        assert!(stack.layer(1).unwrap().is_modified());
        assert!(!stack.layer(0).unwrap().is_modified());
    }

    #[test]
    fn mirrored_text_is_horizontal_flip() {
        let mut stack = stack_from(vec![blank(60, 40); 2]);
        apply_with_font(&mut stack, &[text(0, "L", false), text(1, "L", true)]);

        let plain = stack.load_raster(0).unwrap();
        let mirrored = stack.load_raster(1).unwrap();
        assert_ne!(plain, mirrored);

        let extent = crate::raster::ops::bounding_rectangle(&plain);
        assert_eq!(crate::raster::ops::bounding_rectangle(&mirrored), extent);
        for y in extent.y..extent.bottom() {
            for x in extent.x..extent.right() {
                let flipped = extent.x + extent.right() - 1 - x;
                assert_eq!(
                    mirrored.get_pixel(x, y),
                    plain.get_pixel(flipped, y),
                    "pixel {x},{y}"
                );
            }
        }
    }

    #[test]
    fn text_and_brush_share_one_write_back() {
        let mut stack = stack_from(vec![blank(60, 40); 2]);
        let progress = apply_with_font(&mut stack, &[text(1, "Hi", false), stroke(1, 50, 5, 3)]);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.phase, progress::SAVING);
        assert_eq!(snapshot.processed, 1);
        let raster = stack.load_raster(1).unwrap();
        assert_eq!(raster.get_pixel(50, 5).0[0], 255);
        assert!(raster.pixels().any(|p| p.0[0] == 200));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn out_of_range_layer_writes_nothing() {
        let mut stack = stack_from(vec![blank(10, 10); 2]);
        let result = DrawingEngine::new().apply(
            &mut stack,
            &[stroke(0, 1, 1, 1), stroke(5, 1, 1, 1)],
            &Progress::new(),
        );
        assert!(matches!(
            result,
            Err(DrawError::LayerOutOfRange { index: 5, count: 2 })
        ));
        assert!(!stack.is_modified());
    }

    #[test]
    fn text_without_font_is_rejected() {
        let mut stack = stack_from(vec![blank(10, 10)]);
        let op = PixelOperation::Text(TextStamp {
            layer_index: 0,
            location: Point::new(1, 8),
            text: "A".into(),
            font_scale: 8.0,
            brightness: 255,
            mirror: false,
        });
        let result = DrawingEngine::new().apply(&mut stack, &[op], &Progress::new());
        assert!(matches!(result, Err(DrawError::MissingFont)));
        assert!(!stack.is_modified());
    }

    #[test]
    fn operations_read_from_json() {
        let json = r#"[
            {"kind": "drawing", "layer_index": 0, "location": {"x": 1, "y": 2}, "brush_size": 1, "brightness": 255},
            {"kind": "drain_hole", "layer_index": 3, "location": {"x": 5, "y": 5}, "diameter": 6}
        ]"#;
        let ops: Vec<PixelOperation> = serde_json::from_str(json).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].layer_index(), 3);
        let PixelOperation::Drawing(stroke) = &ops[0] else {
            panic!("expected a drawing operation, got {:?}", ops[0]);
        };
        assert_eq!(stroke.shape, BrushShape::Rectangle);
        assert_eq!(stroke.thickness, None);
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let json = r#"{"kind": "teleport", "layer_index": 0}"#;
        assert!(serde_json::from_str::<PixelOperation>(json).is_err());
    }

    // =========================================================================
    // Eraser
    // =========================================================================

    #[test]
    fn eraser_clears_component_and_its_hole() {
        let mut raster = blank(20, 20);
        fill_rect(&mut raster, Rect::new(2, 2, 8, 8), 255);
        fill_rect(&mut raster, Rect::new(4, 4, 4, 4), 0);
        fill_rect(&mut raster, Rect::new(5, 5, 2, 2), 255);
        fill_rect(&mut raster, Rect::new(14, 14, 3, 3), 255);
        let mut stack = stack_from(vec![raster]);

        let op = PixelOperation::Eraser(EraserFill {
            layer_index: 0,
            location: Point::new(2, 2),
            brightness: 0,
        });
        apply(&mut stack, &[op]);

        // Ring, hole and the speck inside the hole are gone
        let raster = stack.load_raster(0).unwrap();
        assert_eq!(count_non_zero(&raster), 9);
        assert_eq!(
            crate::raster::ops::bounding_rectangle(&raster),
            Rect::new(14, 14, 3, 3)
        );
    }

    #[test]
    fn eraser_ignores_dim_pixels() {
        let mut raster = blank(10, 10);
        fill_rect(&mut raster, Rect::new(2, 2, 3, 3), 5);
        let mut stack = stack_from(vec![raster.clone()]);

        let op = PixelOperation::Eraser(EraserFill {
            layer_index: 0,
            location: Point::new(3, 3),
            brightness: 0,
        });
        apply(&mut stack, &[op]);
        assert!(!stack.is_modified());
        assert_eq!(stack.load_raster(0).unwrap(), raster);
    }

    // =========================================================================
    // Supports
    // =========================================================================

    fn pillar(layer_index: u32) -> PixelOperation {
        PixelOperation::Supports(SupportPillar {
            layer_index,
            location: Point::new(20, 20),
            tip_diameter: 4,
            pillar_diameter: 8,
            base_diameter: 10,
            brightness: 255,
        })
    }

    #[test]
    fn pillar_tapers_down_to_solid_ground() {
        let mut layers = vec![blank(40, 40); 15];
        layers[0] = solid(40);
        let mut stack = stack_from(layers);
        apply(&mut stack, &[pillar(14)]);

        let lit = |i: u32| count_non_zero(&stack.load_raster(i).unwrap());
        assert_eq!(lit(14), 0);
        // Tip diameters 4, 5, 6 above the taper start
        assert_eq!(lit(13), draw::disc_area(2));
        assert_eq!(lit(12), draw::disc_area(2));
        assert_eq!(lit(11), draw::disc_area(3));
        // Base diameter from layer 10 down
        for i in 1..=10 {
            assert_eq!(lit(i), draw::disc_area(5), "layer {i}");
        }
        assert_eq!(lit(0), 40 * 40);
        assert!(!stack.layer(0).unwrap().is_modified());
    }

    #[test]
    fn pillar_skips_solid_layers_before_drawing() {
        let mut layers = vec![blank(40, 40); 5];
        layers[3] = solid(40);
        let mut stack = stack_from(layers);
        apply(&mut stack, &[pillar(4)]);

        let lit = |i: u32| count_non_zero(&stack.load_raster(i).unwrap());
        assert_eq!(lit(3), 40 * 40);
        for i in 0..=2 {
            assert_eq!(lit(i), draw::disc_area(5), "layer {i}");
        }
    }

    #[test]
    fn pillar_is_deterministic() {
        let build = || {
            let mut layers = vec![blank(40, 40); 15];
            layers[0] = solid(40);
            let mut stack = stack_from(layers);
            apply(&mut stack, &[pillar(14)]);
            stack.into_storage().into_rasters()
        };
        assert_eq!(build(), build());
    }

    // =========================================================================
    // Drain holes
    // =========================================================================

    #[test]
    fn drain_hole_drills_through_solid_only() {
        let mut layers = vec![solid(40); 6];
        layers[0] = blank(40, 40);
        layers[5] = blank(40, 40);
        let mut stack = stack_from(layers);

        let op = PixelOperation::DrainHole(DrainHoleDrill {
            layer_index: 5,
            location: Point::new(20, 20),
            diameter: 6,
        });
        apply(&mut stack, &[op]);

        for i in 1..=4 {
            let raster = stack.load_raster(i).unwrap();
            assert_eq!(zeros(&raster), draw::disc_area(3), "layer {i}");
            assert_eq!(raster.get_pixel(20, 20).0[0], 0);
        }
        assert!(!stack.layer(0).unwrap().is_modified());
        assert!(!stack.layer(5).unwrap().is_modified());
    }
}
