//! Detection results.
//!
//! An [`Issue`] is immutable once emitted. Two issues are the same issue
//! when their type, layer and pixel list match; the bounding rectangle is
//! derived data and takes no part in equality. That identity is what an
//! [`IgnoreList`] matches against, so a user can suppress a reviewed
//! island and have it stay suppressed on the next scan.

use crate::raster::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of defect. The declaration order is the report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Empty,
    TouchingBound,
    Island,
    Overhang,
    ResinTrap,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::TouchingBound => "Touching bound",
            Self::Island => "Island",
            Self::Overhang => "Overhang",
            Self::ResinTrap => "Resin trap",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected defect on one layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub issue_type: IssueType,
    pub layer_index: u32,
    #[serde(default)]
    pub pixels: Vec<Point>,
    #[serde(default)]
    pub bounding_rectangle: Rect,
}

impl Issue {
    pub fn new(issue_type: IssueType, layer_index: u32, pixels: Vec<Point>, bounding_rectangle: Rect) -> Self {
        Self {
            issue_type,
            layer_index,
            pixels,
            bounding_rectangle,
        }
    }

    /// An issue whose rectangle is the extent of its pixels.
    pub fn from_pixels(issue_type: IssueType, layer_index: u32, pixels: Vec<Point>) -> Self {
        let bounding_rectangle = Rect::enclosing(&pixels);
        Self::new(issue_type, layer_index, pixels, bounding_rectangle)
    }

    pub fn empty_layer(layer_index: u32) -> Self {
        Self::new(IssueType::Empty, layer_index, Vec::new(), Rect::EMPTY)
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }
}

impl PartialEq for Issue {
    fn eq(&self, other: &Self) -> bool {
        self.issue_type == other.issue_type
            && self.layer_index == other.layer_index
            && self.pixels == other.pixels
    }
}

impl Eq for Issue {}

impl Hash for Issue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.issue_type.hash(state);
        self.layer_index.hash(state);
        self.pixels.hash(state);
    }
}

/// Issues the user has reviewed and chosen to suppress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreList(HashSet<Issue>);

impl IgnoreList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, issue: Issue) -> bool {
        self.0.insert(issue)
    }

    pub fn contains(&self, issue: &Issue) -> bool {
        self.0.contains(issue)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Issue> for IgnoreList {
    fn from_iter<I: IntoIterator<Item = Issue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Report order: type, then layer, then pixel count. Pixel lists break
/// remaining ties so the order is total and repeatable.
pub fn sort_issues(issues: &mut [Issue]) {
    issues.sort_by(|a, b| {
        (a.issue_type, a.layer_index, a.pixel_count())
            .cmp(&(b.issue_type, b.layer_index, b.pixel_count()))
            .then_with(|| a.pixels.cmp(&b.pixels))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn island(layer: u32, pixels: &[(u32, u32)]) -> Issue {
        Issue::from_pixels(
            IssueType::Island,
            layer,
            pixels.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        )
    }

    #[test]
    fn equality_ignores_bounding_rectangle() {
        let a = island(3, &[(1, 1)]);
        let mut b = a.clone();
        b.bounding_rectangle = Rect::new(0, 0, 9, 9);
        assert_eq!(a, b);
        assert_ne!(a, island(4, &[(1, 1)]));
    }

    #[test]
    fn from_pixels_computes_extent() {
        let issue = island(0, &[(2, 5), (4, 3)]);
        assert_eq!(issue.bounding_rectangle, Rect::new(2, 3, 3, 3));
        assert_eq!(issue.pixel_count(), 2);
    }

    #[test]
    fn ignore_list_matches_identity() {
        let ignored: IgnoreList = [island(1, &[(0, 0), (1, 0)])].into_iter().collect();
        assert!(ignored.contains(&island(1, &[(0, 0), (1, 0)])));
        assert!(!ignored.contains(&island(1, &[(0, 0)])));
    }

    #[test]
    fn sort_orders_by_type_layer_then_size() {
        let mut issues = vec![
            Issue::new(IssueType::ResinTrap, 0, vec![Point::new(0, 0)], Rect::EMPTY),
            island(5, &[(0, 0), (1, 0)]),
            island(5, &[(3, 3)]),
            island(2, &[(0, 0), (1, 0), (2, 0)]),
            Issue::empty_layer(9),
        ];
        sort_issues(&mut issues);
        let keys: Vec<(IssueType, u32, usize)> = issues
            .iter()
            .map(|i| (i.issue_type, i.layer_index, i.pixel_count()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (IssueType::Empty, 9, 0),
                (IssueType::Island, 2, 3),
                (IssueType::Island, 5, 1),
                (IssueType::Island, 5, 2),
                (IssueType::ResinTrap, 0, 1),
            ]
        );
    }

    #[test]
    fn ignore_list_reads_json() {
        let json = r#"[{"issue_type":"island","layer_index":4,"pixels":[{"x":1,"y":2}]}]"#;
        let ignored: IgnoreList = serde_json::from_str(json).unwrap();
        assert!(ignored.contains(&island(4, &[(1, 2)])));
    }
}
