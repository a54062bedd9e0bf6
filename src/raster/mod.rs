//! Pixel primitives over 8-bit single-channel layer rasters.
//!
//! Everything here works on [`image::GrayImage`] and knows nothing about
//! layers, stacks, or issues. The detection and drawing stages compose
//! these primitives.
//!
//! | Module | Contents |
//! |---|---|
//! | [`geometry`] | `Point`, `Rect` |
//! | [`ops`] | threshold, subtract, crop, erode, bounding rectangle |
//! | [`components`] | connected-component labeling with per-component stats |
//! | [`contours`] | hole discovery, border tracing, contour fill |
//! | [`draw`] | lines, discs, circles, rectangles, text |

pub mod components;
pub mod contours;
pub mod draw;
pub mod geometry;
pub mod ops;

pub use components::{Component, Connectivity, Labeling, label_components};
pub use geometry::{Point, Rect};
