//! A single table column: a fixed-width mapped array plus whatever indexing
//! structures (§3) have been built on it.

use crate::btree::BTree;
use crate::error::{ExecError, ExecResult};
use crate::histogram::Histogram;
use crate::sorted_index::SortedIndex;
use crate::storage::{ColumnStore, MmapColumnStore, VecColumnStore};

/// What kind of index (if any) a column carries, and whether it is clustered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    None,
    Sorted,
    BTree,
}

/// A column: logical row count `N`, backing capacity `C` (`N <= C`), and optional
/// sorted/B+-tree indexing structures built against it.
pub struct Column {
    pub name: String,
    store: Box<dyn ColumnStore>,
    /// Logical length `N`; `store.len()` is the capacity `C`.
    len: usize,
    pub index_kind: IndexKind,
    pub clustered: bool,
    sorted_index: Option<SortedIndex>,
    btree: Option<BTree>,
    histogram: Option<Histogram>,
}

const INITIAL_CAPACITY: usize = 16;

impl Column {
    /// A fresh, empty column backed by an mmap'd file at `path`.
    pub fn create_mapped(name: impl Into<String>, path: impl AsRef<std::path::Path>) -> ExecResult<Self> {
        let store = MmapColumnStore::open(path, INITIAL_CAPACITY)?;
        Ok(Column {
            name: name.into(),
            store: Box::new(store),
            len: 0,
            index_kind: IndexKind::None,
            clustered: false,
            sorted_index: None,
            btree: None,
            histogram: None,
        })
    }

    /// A fresh, empty in-memory column (for tests).
    pub fn create_in_memory(name: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            store: Box::new(VecColumnStore::new(INITIAL_CAPACITY)),
            len: 0,
            index_kind: IndexKind::None,
            clustered: false,
            sorted_index: None,
            btree: None,
            histogram: None,
        }
    }

    /// Reopen an existing column whose capacity/data is already on disk, given its
    /// persisted logical length.
    pub fn reopen_mapped(
        name: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        capacity: usize,
        len: usize,
    ) -> ExecResult<Self> {
        let store = MmapColumnStore::open(path, capacity)?;
        Ok(Column {
            name: name.into(),
            store: Box::new(store),
            len,
            index_kind: IndexKind::None,
            clustered: false,
            sorted_index: None,
            btree: None,
            histogram: None,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.store.len()
    }

    pub fn data(&self) -> &[i32] {
        &self.store.data()[..self.len]
    }

    pub fn data_mut(&mut self) -> &mut [i32] {
        let len = self.len;
        &mut self.store.data_mut()[..len]
    }

    /// Append `value`, doubling capacity (and remapping) if the column is full (§3 Lifecycle).
    pub fn push(&mut self, value: i32) -> ExecResult<()> {
        if self.len == self.store.len() {
            let new_cap = (self.store.len() * 2).max(INITIAL_CAPACITY);
            self.store.grow(new_cap)?;
        }
        self.store.data_mut()[self.len] = value;
        self.len += 1;
        // A row was appended outside a bulk load (the loader calls `Table::finish_load`
        // once at the end, which rebuilds from scratch). If this column already had
        // index structures built, they are now stale, and nothing will rebuild them
        // after a single `relational_insert` — so the declaration itself is dropped
        // back to `None` rather than leaving `index_kind` pointing at structures that
        // no longer exist (the planner must fall back to a scan, not panic on a stale
        // `Some(...).unwrap()`). A column whose index was only *declared* but never
        // actually built yet (row count was 0 at `create(idx,...)` time, awaiting the
        // first `load`) has nothing stale to drop, so its declaration survives the
        // pushes a bulk load performs before calling `finish_load`.
        if self.sorted_index.is_some() || self.btree.is_some() {
            self.index_kind = IndexKind::None;
            self.clustered = false;
        }
        self.sorted_index = None;
        self.btree = None;
        self.histogram = None;
        Ok(())
    }

    /// Overwrite the whole logical range in place (used by clustered re-permutation
    /// and test fixtures). `values.len()` must equal the current logical length.
    ///
    /// Unlike [`Column::push`], this never resets `index_kind`/`clustered`: every
    /// caller (`Table::cluster_by`, via `Table::finish_load`) clears the stale
    /// structures here and rebuilds them from the permuted data in the very same
    /// `finish_load` call, so the declaration must survive to drive that rebuild.
    pub fn set_all(&mut self, values: &[i32]) -> ExecResult<()> {
        assert_eq!(values.len(), self.len, "set_all length mismatch");
        self.data_mut().copy_from_slice(values);
        self.sorted_index = None;
        self.btree = None;
        self.histogram = None;
        Ok(())
    }

    pub fn flush(&mut self) -> ExecResult<()> {
        self.store.flush()
    }

    // --- indexing ---

    pub fn sorted_index(&self) -> Option<&SortedIndex> {
        self.sorted_index.as_ref()
    }

    pub fn btree(&self) -> Option<&BTree> {
        self.btree.as_ref()
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        self.histogram.as_ref()
    }

    /// Build (or rebuild) this column's sorted projection index.
    pub fn build_sorted_index(&mut self) {
        self.sorted_index = Some(SortedIndex::build(self.data()));
        self.index_kind = IndexKind::Sorted;
    }

    /// Build (or rebuild) this column's B+-tree. Clustered: keyed directly on the
    /// column's own positions. Unclustered: keyed on the sorted index's projection
    /// (built first if absent).
    pub fn build_btree(&mut self, fanout: usize) {
        if self.clustered {
            let pairs: Vec<(i32, i64)> = self
                .data()
                .iter()
                .enumerate()
                .map(|(i, &v)| (v, i as i64))
                .collect();
            self.btree = Some(BTree::build(pairs.into_iter(), fanout));
        } else {
            if self.sorted_index.is_none() {
                self.build_sorted_index();
            }
            let si = self.sorted_index.as_ref().unwrap();
            let pairs: Vec<(i32, i64)> = si
                .values()
                .iter()
                .zip(si.positions().iter())
                .map(|(&v, &p)| (v, p))
                .collect();
            self.btree = Some(BTree::build(pairs.into_iter(), fanout));
        }
        self.index_kind = IndexKind::BTree;
    }

    /// Build (or rebuild) the selectivity histogram.
    pub fn build_histogram(&mut self, num_bins: usize) {
        self.histogram = Some(Histogram::build(self.data(), num_bins));
    }

    /// Install index structures reconstructed from a snapshot (catalog reload), rather
    /// than building them from column data.
    #[allow(clippy::too_many_arguments)]
    pub fn install_loaded_index(
        &mut self,
        kind: IndexKind,
        clustered: bool,
        sorted_index: Option<SortedIndex>,
        btree: Option<BTree>,
        histogram: Option<Histogram>,
    ) {
        self.index_kind = kind;
        self.clustered = clustered;
        self.sorted_index = sorted_index;
        self.btree = btree;
        self.histogram = histogram;
    }

    /// Mark an index kind without building (used right after `create(idx,...)`,
    /// before the first load actually populates it — §6.1).
    pub fn declare_index(&mut self, kind: IndexKind, clustered: bool) -> ExecResult<()> {
        if clustered && kind == IndexKind::None {
            return Err(ExecError::IncorrectFormat(
                "clustered requires sorted or btree".into(),
            ));
        }
        self.index_kind = kind;
        self.clustered = clustered;
        Ok(())
    }
}
