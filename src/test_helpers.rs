//! Shared test utilities for the layerscan test suite.
//!
//! Raster and stack builders, a storage that fails on demand, and issue
//! lookups that panic with a clear message on miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut layer = blank(20, 20);
//! fill_rect(&mut layer, Rect::new(5, 5, 4, 4), 255);
//! let stack = stack_from(vec![blank(20, 20), layer]);
//!
//! let issues = detect_issues(&stack, &config, &IgnoreList::new(), &Progress::new()).unwrap();
//! let island = find_issue(&issues, IssueType::Island, 1);
//! assert_eq!(island.pixel_count(), 16);
//! ```

use ab_glyph::FontArc;
use image::{GrayImage, Luma};

use crate::issues::{Issue, IssueType};
use crate::layer::LayerStack;
use crate::raster::geometry::Rect;
use crate::storage::{LayerStorage, MemoryStorage, StackMetadata, StorageError};

// =========================================================================
// Rasters
// =========================================================================

/// All-zero raster.
pub fn blank(width: u32, height: u32) -> GrayImage {
    GrayImage::new(width, height)
}

/// Set every pixel of `rect` (clipped to the raster) to `value`.
pub fn fill_rect(image: &mut GrayImage, rect: Rect, value: u8) {
    let clipped = rect.clip(image.width(), image.height());
    for y in clipped.y..clipped.bottom() {
        for x in clipped.x..clipped.right() {
            image.put_pixel(x, y, Luma([value]));
        }
    }
}

/// `count` 2x2 layers whose pixel (0, 0) holds the layer index.
pub fn numbered_layers(count: u8) -> Vec<GrayImage> {
    (0..count)
        .map(|i| {
            let mut img = blank(2, 2);
            img.put_pixel(0, 0, Luma([i]));
            img
        })
        .collect()
}

/// DejaVu Sans Mono from `fixtures/fonts`.
pub fn fixture_font() -> FontArc {
    FontArc::try_from_slice(include_bytes!("../fixtures/fonts/DejaVuSansMono.ttf"))
        .unwrap_or_else(|e| panic!("fixture font does not parse: {e}"))
}

// =========================================================================
// Stacks
// =========================================================================

/// In-memory stack over `layers`. Panics on mismatched dimensions.
pub fn stack_from(layers: Vec<GrayImage>) -> LayerStack<MemoryStorage> {
    let storage = MemoryStorage::new(layers)
        .unwrap_or_else(|e| panic!("test layers do not form a stack: {e}"));
    LayerStack::new(storage)
}

/// Blank layers, except that decoding `failing_index` fails.
pub struct FailingStorage {
    inner: MemoryStorage,
    failing_index: u32,
}

impl FailingStorage {
    pub fn new(width: u32, height: u32, count: u32, failing_index: u32) -> Self {
        Self {
            inner: MemoryStorage::blank(width, height, count),
            failing_index,
        }
    }
}

impl LayerStorage for FailingStorage {
    fn metadata(&self) -> StackMetadata {
        self.inner.metadata()
    }

    fn load_raster(&self, index: u32) -> Result<GrayImage, StorageError> {
        if index == self.failing_index {
            return Err(StorageError::Decode {
                index,
                message: "corrupt layer".into(),
            });
        }
        self.inner.load_raster(index)
    }

    fn store_raster(&self, index: u32, raster: GrayImage) -> Result<(), StorageError> {
        self.inner.store_raster(index, raster)
    }
}

// =========================================================================
// Issue lookups
// =========================================================================

/// Every issue of one type, in list order.
pub fn issues_of_type(issues: &[Issue], issue_type: IssueType) -> Vec<&Issue> {
    issues.iter().filter(|i| i.issue_type == issue_type).collect()
}

/// The first issue of `issue_type` on `layer_index`. Panics if not found.
pub fn find_issue(issues: &[Issue], issue_type: IssueType, layer_index: u32) -> &Issue {
    issues
        .iter()
        .find(|i| i.issue_type == issue_type && i.layer_index == layer_index)
        .unwrap_or_else(|| {
            let found: Vec<(IssueType, u32)> =
                issues.iter().map(|i| (i.issue_type, i.layer_index)).collect();
            panic!("{issue_type} issue on layer {layer_index} not found. Available: {found:?}")
        })
}
