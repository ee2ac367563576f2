//! Table: an ordered sequence of same-length columns (§3).

use crate::column::{Column, IndexKind};
use crate::config::Config;
use crate::error::{ExecError, ExecResult};

pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Declared column capacity `k` from `create(tbl,"N",db,k)` (§3: "a table is created
    /// with a fixed column capacity"); `Catalog::add_column` refuses once `columns.len()`
    /// reaches this.
    col_capacity: usize,
    /// Index of the clustered column, if any. At most one per table (§3 invariant).
    clustered_col: Option<usize>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>, col_capacity: usize) -> Self {
        Table {
            name: name.into(),
            columns,
            col_capacity,
            clustered_col: None,
        }
    }

    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    pub fn col_capacity(&self) -> usize {
        self.col_capacity
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Append one row. `values.len()` must equal the column count; all columns
    /// grow together so `N`/`C` stay equal across the table (§3 invariant).
    pub fn insert(&mut self, values: &[i32]) -> ExecResult<()> {
        if values.len() != self.columns.len() {
            return Err(ExecError::IncorrectFormat(format!(
                "expected {} values, got {}",
                self.columns.len(),
                values.len()
            )));
        }
        for (col, &v) in self.columns.iter_mut().zip(values) {
            col.push(v)?;
        }
        Ok(())
    }

    /// Declare that `col` should be indexed as `kind`, optionally clustered.
    /// If the table already has rows the index is built immediately; otherwise it is
    /// just recorded and [`Table::finish_load`] builds it once data arrives (§6.1).
    pub fn create_index(
        &mut self,
        col_name: &str,
        kind: IndexKind,
        clustered: bool,
        config: &Config,
    ) -> ExecResult<()> {
        if clustered && self.clustered_col.is_some() {
            return Err(ExecError::IncorrectFormat(
                "table already has a clustered column".into(),
            ));
        }
        let idx = self
            .column_index(col_name)
            .ok_or_else(|| ExecError::ObjectNotFound(col_name.to_string()))?;
        self.columns[idx].declare_index(kind, clustered)?;
        if clustered {
            self.clustered_col = Some(idx);
        }
        if self.row_count() > 0 {
            self.finish_load(config)?;
        }
        Ok(())
    }

    /// Called once after a bulk load (or immediately by `create_index` against a
    /// non-empty table): permutes the table by its clustered column (if any) and
    /// (re)builds every declared index and histogram.
    pub fn finish_load(&mut self, config: &Config) -> ExecResult<()> {
        if let Some(ci) = self.clustered_col {
            self.cluster_by(ci)?;
        }
        for col in self.columns.iter_mut() {
            match col.index_kind {
                IndexKind::None => {}
                IndexKind::Sorted => {
                    col.build_sorted_index();
                    col.build_histogram(config.num_bins);
                }
                IndexKind::BTree => {
                    col.build_btree(config.fanout);
                    col.build_histogram(config.num_bins);
                }
            }
        }
        Ok(())
    }

    /// Physically re-permute every column so column `ci` becomes sorted ascending,
    /// stably w.r.t. original row order (§3: "every other column in the same table is
    /// re-permuted to match").
    fn cluster_by(&mut self, ci: usize) -> ExecResult<()> {
        let n = self.row_count();
        let key = self.columns[ci].data().to_vec();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| key[i]);

        for col in self.columns.iter_mut() {
            let src = col.data().to_vec();
            let permuted: Vec<i32> = order.iter().map(|&i| src[i]).collect();
            col.set_all(&permuted)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> ExecResult<()> {
        for col in self.columns.iter_mut() {
            col.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_table(names: &[&str]) -> Table {
        let cols: Vec<Column> = names
            .iter()
            .map(|&n| Column::create_in_memory(n))
            .collect();
        let cap = cols.len();
        Table::new("t", cols, cap)
    }

    #[test]
    fn clustered_index_propagates_to_every_column() {
        let mut t = mem_table(&["a", "b"]);
        for (a, b) in [(3, 30), (1, 10), (2, 20)] {
            t.insert(&[a, b]).unwrap();
        }
        let cfg = Config::default();
        t.create_index("a", IndexKind::Sorted, true, &cfg).unwrap();
        assert_eq!(t.find_column("a").unwrap().data(), &[1, 2, 3]);
        assert_eq!(t.find_column("b").unwrap().data(), &[10, 20, 30]);
    }

    #[test]
    fn insert_rejects_wrong_arity() {
        let mut t = mem_table(&["a", "b"]);
        assert!(t.insert(&[1]).is_err());
    }
}
