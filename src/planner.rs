//! Histogram-driven access-path choice for a range predicate (§4.5).

use crate::column::{Column, IndexKind};

/// The access path chosen for a `[low, high]` range predicate against one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPath {
    /// Clustered column, B+-tree present: bracket the tree directly.
    ClusteredBTree,
    /// Clustered column, sorted but no B+-tree: binary search the column itself.
    ClusteredSorted,
    /// Unclustered column with a B+-tree: bracket the tree, unsorted output.
    UnclusteredBTree,
    /// Unclustered column with only a sorted projection index: bracket it, then sort.
    UnclusteredSorted,
    /// No usable index, or the predicate is not selective enough to bother: scan.
    Scan,
}

/// Choose an access path for `column` given `[low, high]` and the configured
/// selectivity threshold (§4.5: below threshold prefers index random access, at or
/// above it prefers sequential scan since that is memory-bandwidth-bound and wins on
/// non-selective predicates).
pub fn choose(column: &Column, low: Option<i32>, high: Option<i32>, selectivity_thres: f64) -> AccessPath {
    if column.index_kind == IndexKind::None {
        return AccessPath::Scan;
    }
    let selective_enough = match column.histogram() {
        Some(h) => h.selectivity(low, high) < selectivity_thres,
        None => true,
    };
    if !selective_enough {
        return AccessPath::Scan;
    }
    match (column.clustered, column.index_kind) {
        (true, IndexKind::BTree) => AccessPath::ClusteredBTree,
        (true, IndexKind::Sorted) => AccessPath::ClusteredSorted,
        (false, IndexKind::BTree) => AccessPath::UnclusteredBTree,
        (false, IndexKind::Sorted) => AccessPath::UnclusteredSorted,
        (_, IndexKind::None) => AccessPath::Scan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_index_always_scans() {
        let col = Column::create_in_memory("a");
        assert_eq!(choose(&col, Some(1), Some(2), 0.6), AccessPath::Scan);
    }

    #[test]
    fn wide_predicate_prefers_scan_even_with_index() {
        let mut col = Column::create_in_memory("a");
        for v in 0..1000 {
            col.push(v).unwrap();
        }
        col.declare_index(IndexKind::Sorted, false).unwrap();
        col.build_sorted_index();
        col.build_histogram(64);
        // Full range: selectivity ~1.0, well above the default threshold.
        assert_eq!(choose(&col, None, None, 0.6), AccessPath::Scan);
    }

    #[test]
    fn narrow_predicate_prefers_index() {
        let mut col = Column::create_in_memory("a");
        for v in 0..1000 {
            col.push(v).unwrap();
        }
        col.declare_index(IndexKind::Sorted, false).unwrap();
        col.build_sorted_index();
        col.build_histogram(64);
        assert_eq!(
            choose(&col, Some(500), Some(510), 0.6),
            AccessPath::UnclusteredSorted
        );
    }
}
