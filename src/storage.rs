//! Layer storage: where decoded rasters come from and go back to.
//!
//! The [`LayerStorage`] trait is the seam between the engines and whatever
//! holds the encoded layer data (a slicer file, a directory of PNGs, plain
//! memory). Every fetch may block and may fail; the engines treat both as
//! normal.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryStorage`]: rasters held in memory. Used by tests and by callers
//!   that already have decoded buffers.
//! - [`PngDirStorage`]: one PNG per layer in a directory, ordered by file
//!   name. This is what the CLI uses.

use image::{GrayImage, ImageFormat};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode layer {index}: {message}")]
    Decode { index: u32, message: String },
    #[error(
        "Layer {index} is {actual_width}x{actual_height}, expected {width}x{height}"
    )]
    DimensionMismatch {
        index: u32,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("Layer {index} out of range (stack has {count} layers)")]
    LayerOutOfRange { index: u32, count: u32 },
    #[error("Failed to encode layer {index}: {message}")]
    Encode { index: u32, message: String },
}

/// Stack-wide facts every algorithm needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackMetadata {
    pub width: u32,
    pub height: u32,
    pub layer_count: u32,
}

/// Per-layer print parameters. Read-only to this crate; carried so callers
/// can display them next to issues.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct LayerParameters {
    /// Seconds.
    pub exposure_time: f32,
    /// Millimetres.
    pub lift_height: f32,
    /// Millimetres from the build plate.
    pub position_z: f32,
}

/// Source and sink of per-layer rasters.
///
/// `store_raster` takes `&self` so touched layers can be written back from
/// parallel workers; implementations synchronize internally.
pub trait LayerStorage: Sync {
    fn metadata(&self) -> StackMetadata;

    /// Decode one layer.
    fn load_raster(&self, index: u32) -> Result<GrayImage, StorageError>;

    /// Encode and replace one layer.
    fn store_raster(&self, index: u32, raster: GrayImage) -> Result<(), StorageError>;

    fn layer_parameters(&self, _index: u32) -> LayerParameters {
        LayerParameters::default()
    }
}

fn check_index(index: u32, count: u32) -> Result<(), StorageError> {
    if index >= count {
        return Err(StorageError::LayerOutOfRange { index, count });
    }
    Ok(())
}

fn check_dimensions(
    index: u32,
    raster: &GrayImage,
    width: u32,
    height: u32,
) -> Result<(), StorageError> {
    let (actual_width, actual_height) = raster.dimensions();
    if (actual_width, actual_height) != (width, height) {
        return Err(StorageError::DimensionMismatch {
            index,
            width,
            height,
            actual_width,
            actual_height,
        });
    }
    Ok(())
}

// ============================================================================
// In-memory storage
// ============================================================================

/// Rasters held decoded in memory.
#[derive(Debug)]
pub struct MemoryStorage {
    width: u32,
    height: u32,
    layers: RwLock<Vec<GrayImage>>,
    parameters: Vec<LayerParameters>,
}

impl MemoryStorage {
    /// Wrap already-decoded rasters. All rasters must share the first
    /// raster's dimensions.
    pub fn new(layers: Vec<GrayImage>) -> Result<Self, StorageError> {
        let (width, height) = layers.first().map(|l| l.dimensions()).unwrap_or((0, 0));
        for (index, raster) in layers.iter().enumerate() {
            check_dimensions(index as u32, raster, width, height)?;
        }
        let parameters = vec![LayerParameters::default(); layers.len()];
        Ok(Self {
            width,
            height,
            layers: RwLock::new(layers),
            parameters,
        })
    }

    /// `count` black layers of `width` x `height`.
    pub fn blank(width: u32, height: u32, count: u32) -> Self {
        Self {
            width,
            height,
            layers: RwLock::new(vec![GrayImage::new(width, height); count as usize]),
            parameters: vec![LayerParameters::default(); count as usize],
        }
    }

    /// Attach per-layer print parameters.
    pub fn with_parameters(mut self, parameters: Vec<LayerParameters>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Take the rasters back out.
    pub fn into_rasters(self) -> Vec<GrayImage> {
        self.layers
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl LayerStorage for MemoryStorage {
    fn metadata(&self) -> StackMetadata {
        let layers = self.layers.read().unwrap_or_else(PoisonError::into_inner);
        StackMetadata {
            width: self.width,
            height: self.height,
            layer_count: layers.len() as u32,
        }
    }

    fn load_raster(&self, index: u32) -> Result<GrayImage, StorageError> {
        let layers = self.layers.read().unwrap_or_else(PoisonError::into_inner);
        layers
            .get(index as usize)
            .cloned()
            .ok_or(StorageError::LayerOutOfRange {
                index,
                count: layers.len() as u32,
            })
    }

    fn store_raster(&self, index: u32, raster: GrayImage) -> Result<(), StorageError> {
        check_dimensions(index, &raster, self.width, self.height)?;
        let mut layers = self.layers.write().unwrap_or_else(PoisonError::into_inner);
        let count = layers.len() as u32;
        let slot = layers
            .get_mut(index as usize)
            .ok_or(StorageError::LayerOutOfRange { index, count })?;
        *slot = raster;
        Ok(())
    }

    fn layer_parameters(&self, index: u32) -> LayerParameters {
        self.parameters
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }
}

// ============================================================================
// PNG directory storage
// ============================================================================

/// One grayscale PNG per layer in a directory, ordered by file name.
///
/// Colour PNGs are converted to luma on load. Stored layers overwrite their
/// source file.
#[derive(Debug)]
pub struct PngDirStorage {
    paths: Vec<PathBuf>,
    width: u32,
    height: u32,
}

impl PngDirStorage {
    /// List the PNG files directly inside `dir`. Dimensions are taken from
    /// the first file; mismatching layers fail when they are loaded.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                StorageError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::other(format!("cannot walk {}", dir.display()))
                }))
            })?;
            if entry.file_type().is_file() && is_png(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let (width, height) = match paths.first() {
            Some(first) => image::image_dimensions(first).map_err(|e| StorageError::Decode {
                index: 0,
                message: e.to_string(),
            })?,
            None => (0, 0),
        };
        log::debug!(
            "{}: {} layers of {}x{}",
            dir.display(),
            paths.len(),
            width,
            height
        );
        Ok(Self {
            paths,
            width,
            height,
        })
    }

    /// Path of the file backing layer `index`.
    pub fn path(&self, index: u32) -> Option<&Path> {
        self.paths.get(index as usize).map(PathBuf::as_path)
    }
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

impl LayerStorage for PngDirStorage {
    fn metadata(&self) -> StackMetadata {
        StackMetadata {
            width: self.width,
            height: self.height,
            layer_count: self.paths.len() as u32,
        }
    }

    fn load_raster(&self, index: u32) -> Result<GrayImage, StorageError> {
        check_index(index, self.paths.len() as u32)?;
        let raster = image::open(&self.paths[index as usize])
            .map_err(|e| StorageError::Decode {
                index,
                message: e.to_string(),
            })?
            .to_luma8();
        check_dimensions(index, &raster, self.width, self.height)?;
        Ok(raster)
    }

    fn store_raster(&self, index: u32, raster: GrayImage) -> Result<(), StorageError> {
        check_index(index, self.paths.len() as u32)?;
        check_dimensions(index, &raster, self.width, self.height)?;
        raster
            .save_with_format(&self.paths[index as usize], ImageFormat::Png)
            .map_err(|e| StorageError::Encode {
                index,
                message: e.to_string(),
            })
    }
}
