//! Detection configuration.
//!
//! Handles loading, validating, and merging `config.toml` files. Stock
//! defaults are the base layer; a user file overrides only the keys it
//! names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! empty_layers = true              # Report layers with no lit pixel
//!
//! [island]
//! enabled = true
//! # white_list_layers = [10, 11]   # Only check these layers (omit = all)
//! allow_diagonal_bonds = false     # 8-connectivity when true
//! binary_threshold = 1             # Binarize above this first (0 = raw)
//! required_area_to_process_check = 1
//! required_pixel_brightness_to_process_check = 1
//! required_pixels_to_support_multiplier = 0.25
//! required_pixel_brightness_to_support = 150
//! enhanced_detection = true
//!
//! [overhang]
//! enabled = true
//! # white_list_layers = []
//! independent_from_islands = true
//! erode_iterations = 40
//! required_pixels_to_consider = 1
//!
//! [resin_trap]
//! enabled = true
//! # white_list_layers = []
//! binary_threshold = 127
//! required_area_to_process_check = 17
//! required_black_pixels_to_drain = 10
//! maximum_pixel_brightness_to_drain = 30
//!
//! [touching_bound]
//! enabled = true
//! # white_list_layers = []
//! minimum_pixel_brightness = 127
//! margin_left = 5
//! margin_top = 5
//! margin_right = 5
//! margin_bottom = 5
//!
//! [processing]
//! # max_processes = 4              # Max parallel workers (omit = CPU cores)
//! # cache_window = 16              # Decoded rasters held during a scan
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Everything the issue detector needs to know.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    /// Report layers with no lit pixel.
    pub empty_layers: bool,
    pub island: IslandConfig,
    pub overhang: OverhangConfig,
    pub resin_trap: ResinTrapConfig,
    pub touching_bound: TouchingBoundConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            empty_layers: true,
            island: IslandConfig::default(),
            overhang: OverhangConfig::default(),
            resin_trap: ResinTrapConfig::default(),
            touching_bound: TouchingBoundConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl DetectionConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let multiplier = self.island.required_pixels_to_support_multiplier;
        if !(0.0..=1.0).contains(&multiplier) {
            return Err(ConfigError::Validation(
                "island.required_pixels_to_support_multiplier must be 0.0-1.0".into(),
            ));
        }
        if self.overhang.erode_iterations == 0 {
            return Err(ConfigError::Validation(
                "overhang.erode_iterations must be at least 1".into(),
            ));
        }
        if self.processing.cache_window.is_some_and(|w| w < 2) {
            return Err(ConfigError::Validation(
                "processing.cache_window must be at least 2".into(),
            ));
        }
        Ok(())
    }

    /// True when any per-layer check would run.
    pub fn any_enabled(&self) -> bool {
        self.empty_layers
            || self.island.enabled
            || self.overhang.enabled
            || self.resin_trap.enabled
            || self.touching_bound.enabled
    }
}

/// `None` allows every layer.
fn white_listed(list: &Option<Vec<u32>>, layer_index: u32) -> bool {
    list.as_ref().is_none_or(|l| l.contains(&layer_index))
}

/// Unsupported-region detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IslandConfig {
    pub enabled: bool,
    /// Only these layers are checked. Absent means every layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_list_layers: Option<Vec<u32>>,
    /// Join pixels that only touch at a corner.
    pub allow_diagonal_bonds: bool,
    /// Pixels at or below this are background. 0 uses the raster as is.
    pub binary_threshold: u8,
    /// Components with fewer pixels are ignored.
    pub required_area_to_process_check: u32,
    /// Component pixels dimmer than this are not counted.
    pub required_pixel_brightness_to_process_check: u8,
    /// Fraction of the island's pixels that must be supported.
    pub required_pixels_to_support_multiplier: f32,
    /// A pixel below is supporting when at least this bright.
    pub required_pixel_brightness_to_support: u8,
    /// Re-check well-supported islands with the overhang test and drop
    /// those that fail it.
    pub enhanced_detection: bool,
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            white_list_layers: None,
            allow_diagonal_bonds: false,
            binary_threshold: 1,
            required_area_to_process_check: 1,
            required_pixel_brightness_to_process_check: 1,
            required_pixels_to_support_multiplier: 0.25,
            required_pixel_brightness_to_support: 150,
            enhanced_detection: true,
        }
    }
}

impl IslandConfig {
    pub fn allows(&self, layer_index: u32) -> bool {
        white_listed(&self.white_list_layers, layer_index)
    }
}

/// New-area detection relative to the layer below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverhangConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_list_layers: Option<Vec<u32>>,
    /// Run over the whole layer instead of per island candidate.
    pub independent_from_islands: bool,
    /// 3x3 erosion passes applied to the new-area mask.
    pub erode_iterations: u32,
    /// Surviving pixels needed to report an overhang.
    pub required_pixels_to_consider: u32,
}

impl Default for OverhangConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            white_list_layers: None,
            independent_from_islands: true,
            erode_iterations: 40,
            required_pixels_to_consider: 1,
        }
    }
}

impl OverhangConfig {
    pub fn allows(&self, layer_index: u32) -> bool {
        white_listed(&self.white_list_layers, layer_index)
    }
}

/// Enclosed-cavity detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResinTrapConfig {
    pub enabled: bool,
    /// Layers whose cavities are collected. Cavities elsewhere are not
    /// tracked at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_list_layers: Option<Vec<u32>>,
    /// Pixels at or below this are void when finding cavities. 0 uses the
    /// raster as is.
    pub binary_threshold: u8,
    /// Cavities whose bounding rectangle is smaller are ignored.
    pub required_area_to_process_check: u32,
    /// Void pixels on the next layer needed to call a cavity open.
    pub required_black_pixels_to_drain: u32,
    /// A pixel at or below this brightness is void.
    pub maximum_pixel_brightness_to_drain: u8,
}

impl Default for ResinTrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            white_list_layers: None,
            binary_threshold: 127,
            required_area_to_process_check: 17,
            required_black_pixels_to_drain: 10,
            maximum_pixel_brightness_to_drain: 30,
        }
    }
}

impl ResinTrapConfig {
    pub fn allows(&self, layer_index: u32) -> bool {
        white_listed(&self.white_list_layers, layer_index)
    }
}

/// Lit pixels too close to the raster edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TouchingBoundConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_list_layers: Option<Vec<u32>>,
    pub minimum_pixel_brightness: u8,
    pub margin_left: u32,
    pub margin_top: u32,
    pub margin_right: u32,
    pub margin_bottom: u32,
}

impl Default for TouchingBoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            white_list_layers: None,
            minimum_pixel_brightness: 127,
            margin_left: 5,
            margin_top: 5,
            margin_right: 5,
            margin_bottom: 5,
        }
    }
}

impl TouchingBoundConfig {
    pub fn allows(&self, layer_index: u32) -> bool {
        white_listed(&self.white_list_layers, layer_index)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
    /// Layers decoded ahead during a scan. When absent, twice the worker
    /// count plus one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_window: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Number of rasters the scan keeps decoded at once.
pub fn effective_cache_window(config: &ProcessingConfig) -> usize {
    config
        .cache_window
        .unwrap_or_else(|| 2 * effective_threads(config) + 1)
        .max(2)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(DetectionConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a TOML file as a raw value.
fn read_toml(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<DetectionConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: DetectionConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Returns the stock defaults when the directory has no `config.toml`.
pub fn load_config(dir: &Path) -> Result<DetectionConfig, ConfigError> {
    let path = dir.join("config.toml");
    if !path.exists() {
        return resolve_config(None);
    }
    load_config_file(&path)
}

/// Load config from an explicit file. The file must exist.
pub fn load_config_file(path: &Path) -> Result<DetectionConfig, ConfigError> {
    let overlay = read_toml(path)?;
    log::debug!("loaded config overrides from {}", path.display());
    resolve_config(Some(overlay))
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# layerscan configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as config.toml inside the layer directory, or pass it
# with --config. Unknown keys will cause an error.

# Report layers that have no lit pixel at all.
empty_layers = true

# ---------------------------------------------------------------------------
# Islands: regions with too little support on the layer below
# ---------------------------------------------------------------------------
[island]
enabled = true

# Only check these layer indices. Omit to check every layer.
# white_list_layers = [10, 11, 12]

# Treat pixels touching only at a corner as connected.
allow_diagonal_bonds = false

# Binarize above this brightness before labeling (0 = use raw pixels).
binary_threshold = 1

# Components with fewer pixels are not checked.
required_area_to_process_check = 1

# Component pixels dimmer than this are not counted.
required_pixel_brightness_to_process_check = 1

# Fraction of an island's pixels that must rest on lit pixels below.
required_pixels_to_support_multiplier = 0.25

# A pixel on the layer below supports when at least this bright.
required_pixel_brightness_to_support = 150

# Re-check well-supported islands with the overhang test and drop those
# that fail it.
enhanced_detection = true

# ---------------------------------------------------------------------------
# Overhangs: new area relative to the layer below
# ---------------------------------------------------------------------------
[overhang]
enabled = true

# white_list_layers = [10, 11, 12]

# Run over the whole layer instead of per island candidate.
independent_from_islands = true

# 3x3 erosion passes applied to the new-area mask.
erode_iterations = 40

# Surviving pixels needed to report an overhang.
required_pixels_to_consider = 1

# ---------------------------------------------------------------------------
# Resin traps: enclosed cavities that cannot drain
# ---------------------------------------------------------------------------
[resin_trap]
enabled = true

# Only collect cavities on these layers. Omit to use every layer.
# white_list_layers = [10, 11, 12]

# Binarize above this brightness before finding cavities (0 = raw pixels).
binary_threshold = 127

# Cavities whose bounding rectangle area is smaller are ignored.
required_area_to_process_check = 17

# Void pixels on the next layer needed to call a cavity open.
required_black_pixels_to_drain = 10

# A pixel at or below this brightness counts as void.
maximum_pixel_brightness_to_drain = 30

# ---------------------------------------------------------------------------
# Touching bounds: lit pixels within a margin of the raster edge
# ---------------------------------------------------------------------------
[touching_bound]
enabled = true

# white_list_layers = [10, 11, 12]

minimum_pixel_brightness = 127
margin_left = 5
margin_top = 5
margin_right = 5
margin_bottom = 5

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Decoded layers kept in memory during a scan.
# Omit to use twice the worker count plus one.
# cache_window = 16
"##
}
