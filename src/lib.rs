//! # Layerscan
//!
//! Pre-print checks and pixel edits for masked-SLA resin prints. A print is a
//! stack of 8-bit grayscale layer rasters, layer 0 on the build plate; a lit
//! pixel cures resin.
//!
//! # Architecture: Detect, Resolve, Draw
//!
//! ```text
//! 1. Detect   stack    →  issues + hollow areas   (parallel, one task per layer)
//! 2. Resolve  hollow areas  →  resin traps        (sequential graph walk)
//! 3. Draw     operations  →  changed layers       (one write-back per layer)
//! ```
//!
//! Detection never mutates the stack. Each layer task reads its own raster
//! and, for support checks, the raster of the layer below, through a shared
//! [`cache::RasterCache`]. Tasks return their findings instead of pushing
//! into shared collections, so the only shared mutable state while scanning
//! is the progress counter.
//!
//! Resin-trap resolution runs after every layer has been scanned. The
//! resolver owns all hollow areas at that point, so classification needs no
//! locks.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`raster`] | Pixel primitives: geometry, threshold/erode, labeling, contours, shapes and text |
//! | [`storage`] | The [`storage::LayerStorage`] seam plus in-memory and PNG-directory backends |
//! | [`layer`] | [`layer::LayerStack`]: layer records, memoized bounds, modified flags |
//! | [`cache`] | Bounded cache of decoded rasters for a scan |
//! | [`bounds`] | Stack-wide bounding rectangle |
//! | [`detect`] | Per-layer checks, hollow-area discovery, resin-trap resolution |
//! | [`drawing`] | Batched pixel operations: brushes, text, eraser, supports, drain holes |
//! | [`issues`] | Issue types, ignore list, report ordering |
//! | [`progress`] | Phase/counter reporting and cooperative cancellation |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Storage Behind a Trait
//!
//! Slicer formats differ in how they pack layers, but every engine here only
//! needs "decode layer N" and "store layer N". [`storage::LayerStorage`] is
//! that seam. Format support stays outside the crate; the CLI ships with a
//! directory-of-PNGs backend, and tests use memory.
//!
//! ## Cancellation Is an Error Value
//!
//! Long scans poll a [`progress::CancellationToken`] between layers and
//! between resolution steps. A cancelled scan returns
//! [`detect::DetectError::Cancelled`]; nothing partial is returned and a
//! stack-wide bounding rectangle in progress is discarded.
//!
//! ## Closed Operation Set
//!
//! [`drawing::PixelOperation`] is an enum. An operation the engine does not
//! know cannot be constructed, and an unknown `kind` in JSON fails to parse.

pub mod bounds;
pub mod cache;
pub mod config;
pub mod detect;
pub mod drawing;
pub mod issues;
pub mod layer;
pub mod output;
pub mod progress;
pub mod raster;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;
