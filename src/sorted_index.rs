//! Unclustered sorted projection index: parallel `(values, positions)` arrays (§4.3).

/// `values` is non-decreasing; `positions[i]` is the original row index of `values[i]`.
/// `positions` is a permutation of `0..N`.
#[derive(Debug, Clone)]
pub struct SortedIndex {
    values: Vec<i32>,
    positions: Vec<i64>,
}

impl SortedIndex {
    /// Assemble directly from already-sorted parallel arrays (e.g. reconstructing the
    /// sorted-index projection from a loaded B+-tree's in-order traversal).
    pub fn from_parts(values: Vec<i32>, positions: Vec<i64>) -> Self {
        SortedIndex { values, positions }
    }

    /// Build from `column`, i.e. copy `(column[i], i)` pairs and stable-sort by
    /// `(value, position)`. Stability matters: ties land in original-row order, which
    /// is the invariant §3 calls out explicitly — see the open-question note in the
    /// design ledger.
    pub fn build(column: &[i32]) -> Self {
        let mut pairs: Vec<(i32, i64)> = column
            .iter()
            .enumerate()
            .map(|(i, &v)| (v, i as i64))
            .collect();
        pairs.sort_by(|a, b| a.cmp(b));
        let (values, positions) = pairs.into_iter().unzip();
        SortedIndex { values, positions }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn positions(&self) -> &[i64] {
        &self.positions
    }

    /// Index of the leftmost element `>= target` (a standard lower_bound).
    pub fn lower_bound(&self, target: i32) -> usize {
        self.values.partition_point(|&v| v < target)
    }

    /// Index one past the rightmost element `<= target` (a standard upper_bound).
    pub fn upper_bound(&self, target: i32) -> usize {
        self.values.partition_point(|&v| v <= target)
    }

    /// Inclusive `[low, high]` bracket, either bound `None` meaning +/- infinity.
    /// Returns the half-open `[start, end)` range of indices into `values`/`positions`.
    pub fn bracket(&self, low: Option<i32>, high: Option<i32>) -> (usize, usize) {
        let start = low.map(|v| self.lower_bound(v)).unwrap_or(0);
        let end = high.map(|v| self.upper_bound(v)).unwrap_or(self.values.len());
        (start, end.max(start))
    }

    /// Positions in `[low, high]`, sorted ascending (as required when a column has a
    /// sorted index but no B+-tree — §4.6 "the result must then be sorted ascending").
    pub fn select_sorted(&self, low: Option<i32>, high: Option<i32>) -> Vec<i64> {
        let (start, end) = self.bracket(low, high);
        let mut out: Vec<i64> = self.positions[start..end].to_vec();
        out.sort_unstable();
        out
    }

    /// Serialize as `N, values[], positions[]`, native-endian fixed width.
    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.values.len();
        let mut out = Vec::with_capacity(8 + n * 4 + n * 8);
        out.extend_from_slice(&(n as u64).to_le_bytes());
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for p in &self.positions {
            out.extend_from_slice(&p.to_le_bytes());
        }
        out
    }

    /// Inverse of [`SortedIndex::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Self {
        let n = crate::util::getu64(data, 0) as usize;
        let mut off = 8;
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(crate::util::geti32(data, off));
            off += 4;
        }
        let mut positions = Vec::with_capacity(n);
        for _ in 0..n {
            positions.push(crate::util::geti64(data, off));
            off += 8;
        }
        SortedIndex { values, positions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_non_decreasing() {
        let col = vec![5, 3, 3, 1, 4, 2];
        let ix = SortedIndex::build(&col);
        for w in ix.values().windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn positions_are_a_permutation() {
        let col = vec![5, 3, 3, 1, 4, 2];
        let ix = SortedIndex::build(&col);
        let mut sorted_pos = ix.positions().to_vec();
        sorted_pos.sort_unstable();
        assert_eq!(sorted_pos, (0..col.len() as i64).collect::<Vec<_>>());
    }

    #[test]
    fn ties_keep_original_row_order_stable() {
        let col = vec![1, 1, 1];
        let ix = SortedIndex::build(&col);
        assert_eq!(ix.positions(), &[0, 1, 2]);
    }

    #[test]
    fn bracket_matches_brute_force() {
        let col: Vec<i32> = vec![7, 2, 9, 2, 5, 5, 1, 8];
        let ix = SortedIndex::build(&col);
        let mut expect: Vec<i64> = col
            .iter()
            .enumerate()
            .filter(|&(_, &v)| (2..=5).contains(&v))
            .map(|(i, _)| i as i64)
            .collect();
        expect.sort_unstable();
        let mut got = ix.select_sorted(Some(2), Some(5));
        got.sort_unstable();
        assert_eq!(got, expect);
    }

    #[test]
    fn round_trips_through_bytes() {
        let col = vec![9, 1, 4, 4, 2];
        let ix = SortedIndex::build(&col);
        let bytes = ix.to_bytes();
        let ix2 = SortedIndex::from_bytes(&bytes);
        assert_eq!(ix.values(), ix2.values());
        assert_eq!(ix.positions(), ix2.positions());
    }
}
