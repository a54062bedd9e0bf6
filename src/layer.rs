//! The layer stack: per-layer records over a [`LayerStorage`].
//!
//! A [`LayerStack`] owns its storage and one [`Layer`] record per layer.
//! Rasters are never held here; they are fetched from storage on demand
//! (usually through a [`RasterCache`](crate::cache::RasterCache)). What the
//! stack does keep is cheap derived state:
//!
//! - each layer's bounding rectangle, computed once and dropped when that
//!   layer's raster is replaced
//! - each layer's modified flag
//! - the stack-wide bounding rectangle, dropped only when every raster is
//!   replaced at once
//!
//! Algorithms receive the stack plus a layer index; layers never point back
//! at their stack.

use crate::progress::{self, Progress};
use crate::raster::geometry::Rect;
use crate::raster::ops;
use crate::storage::{LayerParameters, LayerStorage, StackMetadata, StorageError};
use image::GrayImage;
use rayon::prelude::*;
use std::sync::{Mutex, OnceLock, PoisonError};

/// One cross-section of the print.
#[derive(Debug)]
pub struct Layer {
    index: u32,
    bounds: OnceLock<Rect>,
    modified: bool,
    parameters: LayerParameters,
}

impl Layer {
    fn new(index: u32, parameters: LayerParameters) -> Self {
        Self {
            index,
            bounds: OnceLock::new(),
            modified: false,
            parameters,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Bounding rectangle of the lit pixels, if it has been computed.
    pub fn bounding_rectangle(&self) -> Option<Rect> {
        self.bounds.get().copied()
    }

    /// Whether the layer has no lit pixel, if known yet.
    pub fn is_empty(&self) -> Option<bool> {
        self.bounding_rectangle().map(|r| r.is_empty())
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn parameters(&self) -> LayerParameters {
        self.parameters
    }

    fn invalidate(&mut self) {
        self.bounds = OnceLock::new();
        self.modified = true;
    }
}

/// Ordered layers over a storage backend.
#[derive(Debug)]
pub struct LayerStack<S: LayerStorage> {
    storage: S,
    metadata: StackMetadata,
    layers: Vec<Layer>,
    pub(crate) bounding_rectangle: Mutex<Option<Rect>>,
}

impl<S: LayerStorage> LayerStack<S> {
    pub fn new(storage: S) -> Self {
        let metadata = storage.metadata();
        let layers = (0..metadata.layer_count)
            .map(|i| Layer::new(i, storage.layer_parameters(i)))
            .collect();
        Self {
            storage,
            metadata,
            layers,
            bounding_rectangle: Mutex::new(None),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn metadata(&self) -> StackMetadata {
        self.metadata
    }

    pub fn width(&self) -> u32 {
        self.metadata.width
    }

    pub fn height(&self) -> u32 {
        self.metadata.height
    }

    pub fn layer_count(&self) -> u32 {
        self.metadata.layer_count
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: u32) -> Option<&Layer> {
        self.layers.get(index as usize)
    }

    fn check_index(&self, index: u32) -> Result<(), StorageError> {
        if index >= self.layer_count() {
            return Err(StorageError::LayerOutOfRange {
                index,
                count: self.layer_count(),
            });
        }
        Ok(())
    }

    /// Decode a layer through the storage backend. May block.
    pub fn load_raster(&self, index: u32) -> Result<GrayImage, StorageError> {
        self.check_index(index)?;
        self.storage.load_raster(index)
    }

    /// Bounding rectangle of `index`, computed from `raster` on first use.
    ///
    /// `raster` must be the current raster of that layer.
    pub fn layer_bounds(&self, index: u32, raster: &GrayImage) -> Rect {
        match self.layers.get(index as usize) {
            Some(layer) => *layer.bounds.get_or_init(|| ops::bounding_rectangle(raster)),
            None => ops::bounding_rectangle(raster),
        }
    }

    /// Bounding rectangle of `index`, decoding the layer if it is not known.
    pub fn compute_layer_bounds(&self, index: u32) -> Result<Rect, StorageError> {
        self.check_index(index)?;
        if let Some(rect) = self.layers[index as usize].bounding_rectangle() {
            return Ok(rect);
        }
        let raster = self.storage.load_raster(index)?;
        Ok(self.layer_bounds(index, &raster))
    }

    /// Replace one layer's raster. Marks the layer modified and drops its
    /// bounding rectangle; the stack-wide rectangle is left as is.
    pub fn set_raster(&mut self, index: u32, raster: GrayImage) -> Result<(), StorageError> {
        self.check_index(index)?;
        self.storage.store_raster(index, raster)?;
        self.layers[index as usize].invalidate();
        Ok(())
    }

    /// Write several rasters back in parallel, one progress unit each.
    pub fn store_rasters(
        &mut self,
        rasters: Vec<(u32, GrayImage)>,
        progress: &Progress,
    ) -> Result<(), StorageError> {
        for (index, _) in &rasters {
            self.check_index(*index)?;
        }
        progress.reset(progress::SAVING, rasters.len() as u32);
        let storage = &self.storage;
        let stored: Vec<u32> = rasters
            .into_par_iter()
            .map(|(index, raster)| {
                storage.store_raster(index, raster)?;
                progress.lock_and_increment();
                Ok(index)
            })
            .collect::<Result<_, StorageError>>()?;
        for index in stored {
            self.layers[index as usize].invalidate();
        }
        Ok(())
    }

    /// Swap every raster at once. Drops every memoized bounding rectangle,
    /// the stack-wide one included.
    pub fn replace_rasters(&mut self, rasters: Vec<GrayImage>) -> Result<(), StorageError> {
        if rasters.len() != self.layers.len() {
            return Err(StorageError::LayerOutOfRange {
                index: rasters.len() as u32,
                count: self.layer_count(),
            });
        }
        for (index, raster) in rasters.into_iter().enumerate() {
            self.storage.store_raster(index as u32, raster)?;
            self.layers[index].invalidate();
        }
        *self
            .bounding_rectangle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    /// True when any layer has been written since the last [`desmodify`](Self::desmodify).
    pub fn is_modified(&self) -> bool {
        self.layers.iter().any(|l| l.modified)
    }

    /// Clear every layer's modified flag.
    pub fn desmodify(&mut self) {
        for layer in &mut self.layers {
            layer.modified = false;
        }
    }
}
