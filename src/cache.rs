//! Sliding-window raster cache.
//!
//! Decoding a layer is the expensive part of every scan: a stack can hold
//! thousands of layers and only a handful are needed at any moment. The
//! detection pass walks the stack in windows and every layer's checks also
//! read the layer below, so each raster is wanted by at most two tasks that
//! run close together.
//!
//! # Design
//!
//! [`RasterCache`] maps layer index to a decoded raster behind an `Arc`.
//!
//! - [`prefetch`](RasterCache::prefetch) decodes a whole window in parallel
//!   before the window's tasks start.
//! - [`acquire`](RasterCache::acquire) hands out a [`RasterHandle`]. A miss
//!   decodes on the calling thread outside the lock.
//! - [`evict_below`](RasterCache::evict_below) releases every layer the
//!   processing cursor has moved past. This is the normal release path.
//! - The cache never holds more than `capacity` rasters. When an insert
//!   would exceed it, the entry farthest from the requested index goes.
//!
//! Eviction only drops the cache's reference. A task still holding a
//! handle keeps its raster alive until the handle is dropped, so eviction
//! never pulls a raster out from under a running task.

use crate::layer::LayerStack;
use crate::storage::{LayerStorage, StorageError};
use image::GrayImage;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, Range};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared, read-only access to a cached raster.
#[derive(Debug, Clone)]
pub struct RasterHandle(Arc<GrayImage>);

impl Deref for RasterHandle {
    type Target = GrayImage;

    fn deref(&self) -> &GrayImage {
        &self.0
    }
}

/// Summary of cache behaviour over one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub decodes: u32,
    pub evictions: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn decode(&mut self) {
        self.decodes += 1;
    }

    pub fn evict(&mut self) {
        self.evictions += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.decodes
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} decoded ({} total), {} evicted",
                self.hits,
                self.decodes,
                self.total(),
                self.evictions
            )
        } else {
            write!(f, "{} decoded, {} evicted", self.decodes, self.evictions)
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<u32, Arc<GrayImage>>,
    stats: CacheStats,
}

/// Bounded cache of decoded rasters for one stack.
#[derive(Debug)]
pub struct RasterCache<'a, S: LayerStorage> {
    stack: &'a LayerStack<S>,
    capacity: usize,
    inner: Mutex<Inner>,
}

impl<'a, S: LayerStorage> RasterCache<'a, S> {
    /// A cache holding at most `capacity` rasters (at least one).
    pub fn new(stack: &'a LayerStack<S>, capacity: usize) -> Self {
        Self {
            stack,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: u32) -> bool {
        self.lock().entries.contains_key(&index)
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }

    /// Get a layer's raster, decoding it on a miss.
    pub fn acquire(&self, index: u32) -> Result<RasterHandle, StorageError> {
        {
            let mut inner = self.lock();
            if let Some(raster) = inner.entries.get(&index).cloned() {
                inner.stats.hit();
                return Ok(RasterHandle(raster));
            }
        }

        let decoded = Arc::new(self.stack.load_raster(index)?);

        let mut inner = self.lock();
        inner.stats.decode();
        // Another worker may have decoded the same layer meanwhile
        let raster = inner.entries.entry(index).or_insert(decoded).clone();
        self.trim(&mut inner, index);
        Ok(RasterHandle(raster))
    }

    /// Decode the layers of `range` not already cached, in parallel.
    /// At most `capacity` layers from the start of the range are loaded.
    pub fn prefetch(&self, range: Range<u32>) -> Result<(), StorageError> {
        let end = range
            .end
            .min(self.stack.layer_count())
            .min(range.start.saturating_add(self.capacity as u32));
        let missing: Vec<u32> = {
            let inner = self.lock();
            (range.start..end)
                .filter(|i| !inner.entries.contains_key(i))
                .collect()
        };
        if missing.is_empty() {
            return Ok(());
        }

        let decoded = missing
            .into_par_iter()
            .map(|i| self.stack.load_raster(i).map(|r| (i, Arc::new(r))))
            .collect::<Result<Vec<_>, StorageError>>()?;

        let mut inner = self.lock();
        for (index, raster) in decoded {
            inner.stats.decode();
            inner.entries.entry(index).or_insert(raster);
        }
        self.trim(&mut inner, range.start);
        Ok(())
    }

    /// Release every layer below `index`.
    pub fn evict_below(&self, index: u32) {
        let mut inner = self.lock();
        let kept = inner.entries.split_off(&index);
        let released = inner.entries.len();
        inner.entries = kept;
        for _ in 0..released {
            inner.stats.evict();
        }
    }

    /// Drop the entries farthest from `anchor` until within capacity.
    fn trim(&self, inner: &mut Inner, anchor: u32) {
        while inner.entries.len() > self.capacity {
            let farthest = inner
                .entries
                .keys()
                .copied()
                .filter(|&k| k != anchor)
                .max_by_key(|&k| (k.abs_diff(anchor), k));
            let Some(key) = farthest else { break };
            inner.entries.remove(&key);
            inner.stats.evict();
        }
    }
}
