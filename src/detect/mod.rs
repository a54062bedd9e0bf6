//! Issue detection over a whole layer stack.
//!
//! Detection is a two-phase pipeline:
//!
//! 1. **Per-layer scan** (parallel). Every layer is checked independently
//!    for emptiness, margin contact, islands and overhangs, and its hollow
//!    areas are collected. Each task returns its own findings; nothing is
//!    shared between tasks except the read-only raster cache and the
//!    progress counter. See [`checks`] and [`hollow`].
//! 2. **Resin-trap resolution** (sequential). The hollow areas of every
//!    layer are handed to a [`ResinTrapResolver`], which owns them
//!    exclusively while it classifies each one as trap or drain.
//!
//! Layers are scanned in windows sized by the cache. Before a window runs,
//! its rasters (and the raster just below it) are decoded in parallel;
//! after it finishes, everything below the window's last layer is evicted.
//!
//! Cancellation is polled at the top of every layer task and every
//! resolution step. A cancelled run returns [`DetectError::Cancelled`].

pub mod checks;
pub mod hollow;
pub mod resin_trap;

pub use hollow::{AreaKind, HollowArea};
pub use resin_trap::ResinTrapResolver;

use crate::cache::RasterCache;
use crate::config::{self, DetectionConfig};
use crate::issues::{IgnoreList, Issue, sort_issues};
use crate::layer::LayerStack;
use crate::progress::{self, Progress};
use crate::storage::{LayerStorage, StorageError};
use checks::LayerFindings;
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Operation cancelled")]
    Cancelled,
}

/// Scan every layer and return the issues found, sorted for reporting.
///
/// Issues matching an entry of `ignored` are dropped. Any storage failure
/// aborts the whole scan.
pub fn detect_issues<S: LayerStorage>(
    stack: &LayerStack<S>,
    config: &DetectionConfig,
    ignored: &IgnoreList,
    progress: &Progress,
) -> Result<Vec<Issue>, DetectError> {
    let count = stack.layer_count();
    let window = config::effective_cache_window(&config.processing) as u32;
    // One extra slot for the layer below the window
    let cache = RasterCache::new(stack, window as usize + 1);

    let mut issues = Vec::new();
    let mut hollow_areas: Vec<Vec<HollowArea>> = vec![Vec::new(); count as usize];

    if config.any_enabled() && count > 0 {
        progress.reset(progress::DETECTING_ISSUES, count);
        let mut start = 0;
        while start < count {
            let end = start.saturating_add(window).min(count);
            cache.prefetch(start.saturating_sub(1)..end)?;

            let findings = (start..end)
                .into_par_iter()
                .map(|index| {
                    if progress.is_cancelled() {
                        return Err(DetectError::Cancelled);
                    }
                    let found = checks::scan_layer(stack, &cache, config, index)?;
                    progress.lock_and_increment();
                    Ok(found)
                })
                .collect::<Result<Vec<LayerFindings>, DetectError>>()?;

            for found in findings {
                issues.extend(found.issues);
                hollow_areas[found.index as usize] = found.hollow_areas;
            }
            cache.evict_below(end - 1);
            start = end;
        }
    }

    if config.resin_trap.enabled {
        let mut resolver = ResinTrapResolver::new(hollow_areas, &config.resin_trap);
        resolver.resolve(&cache, progress)?;
        issues.extend(resolver.into_issues());
    }

    let before = issues.len();
    issues.retain(|issue| !ignored.contains(issue));
    if issues.len() < before {
        log::debug!("{} issues suppressed by ignore list", before - issues.len());
    }
    sort_issues(&mut issues);

    log::info!("{} issues in {} layers", issues.len(), count);
    log::debug!("raster cache: {}", cache.stats());
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::IssueType;
    use crate::progress::CancellationToken;
    use crate::raster::geometry::Rect;
    use crate::test_helpers::{
        FailingStorage, blank, fill_rect, find_issue, issues_of_type, stack_from,
    };

    fn only(issue_type: IssueType) -> DetectionConfig {
        let mut config = DetectionConfig::default();
        config.empty_layers = issue_type == IssueType::Empty;
        config.island.enabled = issue_type == IssueType::Island;
        config.overhang.enabled = issue_type == IssueType::Overhang;
        config.resin_trap.enabled = issue_type == IssueType::ResinTrap;
        config.touching_bound.enabled = issue_type == IssueType::TouchingBound;
        config.processing.cache_window = Some(2);
        config
    }

    fn square(size: u32, rect: Rect) -> image::GrayImage {
        let mut img = blank(size, size);
        fill_rect(&mut img, rect, 255);
        img
    }

    #[test]
    fn empty_layers_reported_once_each() {
        let stack = stack_from(vec![
            square(20, Rect::new(5, 5, 5, 5)),
            blank(20, 20),
            square(20, Rect::new(5, 5, 5, 5)),
            blank(20, 20),
        ]);
        let issues =
            detect_issues(&stack, &only(IssueType::Empty), &IgnoreList::new(), &Progress::new())
                .unwrap();
        let layers: Vec<u32> = issues.iter().map(|i| i.layer_index).collect();
        assert_eq!(layers, vec![1, 3]);
        assert!(issues.iter().all(|i| i.pixels.is_empty()));
    }

    #[test]
    fn windows_cover_every_layer() {
        let layers: Vec<_> = (0..7).map(|_| blank(8, 8)).collect();
        let stack = stack_from(layers);
        let progress = Progress::new();
        let issues =
            detect_issues(&stack, &only(IssueType::Empty), &IgnoreList::new(), &progress).unwrap();
        assert_eq!(issues.len(), 7);
        assert_eq!(progress.snapshot().processed, 7);
    }

    #[test]
    fn disabled_checks_find_nothing() {
        let mut config = only(IssueType::Empty);
        config.empty_layers = false;
        let stack = stack_from(vec![blank(8, 8); 3]);
        let issues =
            detect_issues(&stack, &config, &IgnoreList::new(), &Progress::new()).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn ignored_issues_are_dropped() {
        let stack = stack_from(vec![blank(8, 8); 3]);
        let ignored: IgnoreList = [Issue::empty_layer(1)].into_iter().collect();
        let issues =
            detect_issues(&stack, &only(IssueType::Empty), &ignored, &Progress::new()).unwrap();
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.layer_index != 1));
    }

    #[test]
    fn touching_bound_only_on_white_listed_layers() {
        let layer = square(20, Rect::new(0, 0, 2, 2));
        let stack = stack_from(vec![layer.clone(), layer.clone(), layer]);
        let mut config = only(IssueType::TouchingBound);
        config.touching_bound.white_list_layers = Some(vec![1]);

        let issues =
            detect_issues(&stack, &config, &IgnoreList::new(), &Progress::new()).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].layer_index, 1);
    }

    #[test]
    fn resin_traps_only_on_white_listed_layers() {
        let solid = square(30, Rect::new(5, 5, 20, 20));
        let mut hollow = solid.clone();
        fill_rect(&mut hollow, Rect::new(10, 10, 8, 8), 0);
        let stack = stack_from(vec![
            solid.clone(),
            hollow.clone(),
            hollow.clone(),
            hollow,
            solid,
        ]);
        let mut config = only(IssueType::ResinTrap);

        let issues =
            detect_issues(&stack, &config, &IgnoreList::new(), &Progress::new()).unwrap();
        assert_eq!(issues_of_type(&issues, IssueType::ResinTrap).len(), 3);

        config.resin_trap.white_list_layers = Some(vec![0, 4]);
        let issues =
            detect_issues(&stack, &config, &IgnoreList::new(), &Progress::new()).unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn cancelled_scan_returns_cancelled() {
        let stack = stack_from(vec![blank(8, 8); 3]);
        let token = CancellationToken::new();
        token.cancel();
        let progress = Progress::new().with_token(token);
        let result = detect_issues(
            &stack,
            &DetectionConfig::default(),
            &IgnoreList::new(),
            &progress,
        );
        assert!(matches!(result, Err(DetectError::Cancelled)));
    }

    #[test]
    fn decode_failure_aborts_scan() {
        let stack = LayerStack::new(FailingStorage::new(10, 10, 4, 2));
        let result = detect_issues(
            &stack,
            &DetectionConfig::default(),
            &IgnoreList::new(),
            &Progress::new(),
        );
        assert!(matches!(
            result,
            Err(DetectError::Storage(StorageError::Decode { index: 2, .. }))
        ));
    }

    #[test]
    fn detection_is_repeatable() {
        let mut top = square(30, Rect::new(10, 10, 10, 10));
        fill_rect(&mut top, Rect::new(0, 0, 3, 3), 255);
        let stack = stack_from(vec![square(30, Rect::new(10, 10, 10, 10)), top, blank(30, 30)]);
        let config = DetectionConfig::default();

        let first = detect_issues(&stack, &config, &IgnoreList::new(), &Progress::new()).unwrap();
        let second = detect_issues(&stack, &config, &IgnoreList::new(), &Progress::new()).unwrap();
        assert_eq!(first, second);
        assert_eq!(issues_of_type(&first, IssueType::Island).len(), 1);
        assert_eq!(issues_of_type(&first, IssueType::Empty).len(), 1);
        assert_eq!(find_issue(&first, IssueType::Island, 1).pixel_count(), 9);
    }
}
