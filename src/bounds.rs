//! Stack-wide bounding rectangle.
//!
//! The union of every layer's lit-pixel rectangle, memoized on the stack.
//! Layer 0 is measured first. A blank first layer is unusual enough that
//! every layer is then measured in parallel before the union runs, so the
//! union pass only reads memoized values.
//!
//! The memo is dropped by [`LayerStack::replace_rasters`] only. Editing a
//! single layer leaves it stale.

use crate::detect::DetectError;
use crate::layer::LayerStack;
use crate::progress::{self, Progress};
use crate::raster::geometry::Rect;
use crate::storage::LayerStorage;
use rayon::prelude::*;
use std::sync::PoisonError;

impl<S: LayerStorage> LayerStack<S> {
    /// Union of every layer's bounding rectangle.
    ///
    /// Cancellation discards the partial result and leaves the memo empty.
    pub fn bounding_rectangle(&self, progress: &Progress) -> Result<Rect, DetectError> {
        if let Some(rect) = self.memoized_bounds() {
            return Ok(rect);
        }
        let count = self.layer_count();
        if count == 0 {
            return Ok(Rect::EMPTY);
        }

        let mut rect = self.compute_layer_bounds(0)?;
        if rect.is_empty() {
            log::debug!("layer 0 is blank, measuring every layer");
            progress.reset(progress::OPTIMIZING_BOUNDS, count);
            self.measure_layers(0..count, progress)?;
        }

        progress.reset(progress::CALCULATING_BOUNDS, count - 1);
        for layer_rect in self.measure_layers(1..count, progress)? {
            rect = rect.union(&layer_rect);
        }

        *self
            .bounding_rectangle
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(rect);
        log::info!("stack bounds {rect}");
        Ok(rect)
    }

    fn memoized_bounds(&self) -> Option<Rect> {
        *self
            .bounding_rectangle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Bounding rectangles of `range`, one progress unit per layer.
    fn measure_layers(
        &self,
        range: std::ops::Range<u32>,
        progress: &Progress,
    ) -> Result<Vec<Rect>, DetectError> {
        range
            .into_par_iter()
            .map(|index| {
                if progress.is_cancelled() {
                    return Err(DetectError::Cancelled);
                }
                let rect = self.compute_layer_bounds(index)?;
                progress.lock_and_increment();
                Ok(rect)
            })
            .collect()
    }
}
