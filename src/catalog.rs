//! In-memory directory of the one active database (§3, §4.2), persisted to two flat
//! metadata files plus per-column data/index files on snapshot.
//!
//! `Catalog` is the process-level service called for in Design Notes §9 ("Global
//! `current_db` -> process-level service with explicit lifecycle"): it owns at most
//! one [`Database`] at a time and is passed by reference into the executors, rather
//! than being reached for as a global.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::btree::BTree;
use crate::column::{Column, IndexKind};
use crate::config::Config;
use crate::error::{ExecError, ExecResult};
use crate::histogram::Histogram;
use crate::sorted_index::SortedIndex;
use crate::storage::read_whole;
use crate::table::Table;
use crate::util;

const NAME_FIELD: usize = 64;

/// The single active database: a name and its ordered tables.
pub struct Database {
    pub name: String,
    pub tables: Vec<Table>,
}

impl Database {
    pub fn find_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn find_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }
}

/// Owns the active [`Database`] (if any) and knows how to snapshot/reload it.
pub struct Catalog {
    pub config: Config,
    pub database: Option<Database>,
}

impl Catalog {
    /// Open a catalog rooted at `config.data_dir`, reloading a prior snapshot if the
    /// metadata files are present.
    pub fn open(config: Config) -> ExecResult<Self> {
        let mut cat = Catalog {
            config,
            database: None,
        };
        if cat.db_metadata_path().exists() {
            cat.load()?;
        }
        Ok(cat)
    }

    fn db_metadata_path(&self) -> PathBuf {
        self.config.data_dir.join("database.metadata")
    }

    fn tables_metadata_path(&self) -> PathBuf {
        self.config.data_dir.join("tables.metadata")
    }

    fn column_data_path(&self, table: &str, col: &str) -> PathBuf {
        self.config.data_dir.join("columns").join(table).join(format!("{col}.data"))
    }

    fn column_idx_path(&self, table: &str, col: &str) -> PathBuf {
        self.config.data_dir.join("columns").join(table).join(format!("{col}.idx"))
    }

    fn column_btree_path(&self, table: &str, col: &str) -> PathBuf {
        self.config.data_dir.join("btree").join(table).join(format!("{col}.btree"))
    }

    /// Replace any active database with a new, empty one named `name` (§6.1 `create(db,...)`).
    /// Snapshots and discards the prior database first.
    pub fn create_database(&mut self, name: &str) -> ExecResult<()> {
        util::validate_name(name)?;
        if self.database.is_some() {
            self.snapshot()?;
        }
        info!(db = name, "creating database");
        self.database = Some(Database {
            name: name.to_string(),
            tables: Vec::new(),
        });
        Ok(())
    }

    pub fn database(&self) -> ExecResult<&Database> {
        self.database
            .as_ref()
            .ok_or_else(|| ExecError::ObjectNotFound("no active database".into()))
    }

    pub fn database_mut(&mut self) -> ExecResult<&mut Database> {
        self.database
            .as_mut()
            .ok_or_else(|| ExecError::ObjectNotFound("no active database".into()))
    }

    /// Add an empty table with a fixed column capacity `expected_cols` (§3: "a table is
    /// created with a fixed column capacity"); columns are added one at a time via
    /// subsequent `create(col,...)` calls, and `add_column` enforces the capacity —
    /// §6.1 `create(tbl,"N",db,k)`.
    pub fn create_table(&mut self, name: &str, expected_cols: usize) -> ExecResult<()> {
        util::validate_name(name)?;
        let db = self.database_mut()?;
        if db.find_table(name).is_some() {
            return Err(ExecError::ObjectAlreadyExists(name.to_string()));
        }
        debug!(table = name, expected_cols, "creating table");
        db.tables.push(Table::new(name, Vec::new(), expected_cols));
        Ok(())
    }

    /// Append a mmap-backed column to `table` (§6.1 `create(col,...)`). Rejects once the
    /// table already holds its declared capacity's worth of columns (§3: "adding past
    /// capacity is an error").
    pub fn add_column(&mut self, table: &str, col_name: &str) -> ExecResult<()> {
        util::validate_name(col_name)?;
        let data_dir = self.config.data_dir.clone();
        let path = data_dir.join("columns").join(table).join(format!("{col_name}.data"));
        let db = self.database_mut()?;
        let t = db
            .find_table_mut(table)
            .ok_or_else(|| ExecError::ObjectNotFound(table.to_string()))?;
        if t.find_column(col_name).is_some() {
            return Err(ExecError::ObjectAlreadyExists(col_name.to_string()));
        }
        if t.col_count() >= t.col_capacity() {
            return Err(ExecError::IncorrectFormat(format!(
                "table '{table}' already has its declared capacity of {} columns",
                t.col_capacity()
            )));
        }
        let col = Column::create_mapped(col_name, path)?;
        t.columns.push(col);
        Ok(())
    }

    /// Write `database.metadata` and `tables.metadata`, flush every column's mapping,
    /// and persist each indexed column's sorted-index/B+-tree payload.
    pub fn snapshot(&mut self) -> ExecResult<()> {
        let Some(db) = self.database.as_mut() else {
            return Ok(());
        };
        std::fs::create_dir_all(&self.config.data_dir)
            .map_err(|e| ExecError::Execution(format!("create_dir_all data_dir: {e}")))?;

        let mut db_header = vec![0u8; NAME_FIELD];
        util::set_name(&mut db_header, 0, NAME_FIELD, &db.name);
        std::fs::write(self.db_metadata_path(), &db_header)
            .map_err(|e| ExecError::Execution(format!("write database.metadata: {e}")))?;

        let mut out = Vec::new();
        out.extend_from_slice(&(db.tables.len() as u64).to_le_bytes());
        for table in db.tables.iter_mut() {
            table.flush()?;
            write_table_record(&mut out, table);
        }
        std::fs::write(self.tables_metadata_path(), &out)
            .map_err(|e| ExecError::Execution(format!("write tables.metadata: {e}")))?;

        for table in db.tables.iter() {
            for col in table.columns.iter() {
                if let Some(si) = col.sorted_index() {
                    if col.index_kind == IndexKind::Sorted {
                        let path = self.column_idx_path(&table.name, &col.name);
                        write_file(&path, &si.to_bytes())?;
                    }
                }
                if let Some(bt) = col.btree() {
                    let path = self.column_btree_path(&table.name, &col.name);
                    write_file(&path, &bt.to_bytes())?;
                }
            }
        }
        info!(db = %db.name, tables = db.tables.len(), "snapshot complete");
        Ok(())
    }

    /// Rebuild the catalog, column mappings, indexes and B+-trees from disk (§4.2 "On load...").
    fn load(&mut self) -> ExecResult<()> {
        let db_header = read_whole(&self.db_metadata_path())
            .map_err(|e| ExecError::Execution(format!("read database.metadata: {e}")))?;
        let name = util::get_name(&db_header, 0, NAME_FIELD);

        let raw = read_whole(&self.tables_metadata_path())
            .map_err(|e| ExecError::Execution(format!("read tables.metadata: {e}")))?;
        let mut pos = 0usize;
        let table_count = util::getu64(&raw, pos) as usize;
        pos += 8;

        let mut tables = Vec::with_capacity(table_count);
        for _ in 0..table_count {
            let (table_name, col_capacity, col_count, row_count) = read_table_header(&raw, &mut pos);
            let mut columns = Vec::with_capacity(col_count);
            for _ in 0..col_count {
                let col = self.load_column(&table_name, &raw, &mut pos, row_count)?;
                columns.push(col);
            }
            tables.push(Table::new(table_name, columns, col_capacity));
        }

        self.database = Some(Database { name, tables });
        Ok(())
    }

    fn load_column(
        &self,
        table_name: &str,
        raw: &[u8],
        pos: &mut usize,
        row_count: usize,
    ) -> ExecResult<Column> {
        let col_name = util::get_name(raw, *pos, NAME_FIELD);
        *pos += NAME_FIELD;
        let capacity = util::getu64(raw, *pos) as usize;
        *pos += 8;
        let flags = raw[*pos];
        *pos += 1;
        let clustered = flags & 1 != 0;
        let built = flags & 2 != 0;
        let kind_byte = raw[*pos];
        *pos += 1;
        let kind = match kind_byte {
            1 => IndexKind::Sorted,
            2 => IndexKind::BTree,
            _ => IndexKind::None,
        };

        // `built` (not `kind != None`) gates whether a histogram payload follows —
        // a declared-but-not-yet-built index (no rows loaded yet) writes no payload
        // at all, see `write_table_record`.
        let histogram = if built { Some(read_histogram(raw, pos)) } else { None };

        let path = self.column_data_path(table_name, &col_name);
        let mut col = Column::reopen_mapped(&col_name, path, capacity, row_count)?;

        let (sorted_index, btree) = match (kind, built) {
            (IndexKind::None, _) | (_, false) => (None, None),
            (IndexKind::Sorted, true) => {
                let idx_path = self.column_idx_path(table_name, &col_name);
                let bytes = read_whole(&idx_path)
                    .map_err(|e| ExecError::Execution(format!("read {idx_path:?}: {e}")))?;
                (Some(SortedIndex::from_bytes(&bytes)), None)
            }
            (IndexKind::BTree, true) => {
                let bt_path = self.column_btree_path(table_name, &col_name);
                let bytes = read_whole(&bt_path)
                    .map_err(|e| ExecError::Execution(format!("read {bt_path:?}: {e}")))?;
                let bt = BTree::from_bytes(&bytes);
                // Unclustered B+-tree columns keep an in-memory sorted-index
                // projection too (used by the planner as a sorted fallback);
                // reconstruct it from the tree rather than persisting it twice.
                let si = if !clustered {
                    let mut pairs = bt.in_order();
                    pairs.sort();
                    let (values, positions) = pairs.into_iter().unzip();
                    Some(SortedIndex::from_parts(values, positions))
                } else {
                    None
                };
                (si, Some(bt))
            }
        };
        col.install_loaded_index(kind, clustered, sorted_index, btree, histogram);
        Ok(col)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> ExecResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ExecError::Execution(format!("create_dir_all {parent:?}: {e}")))?;
    }
    std::fs::write(path, bytes).map_err(|e| ExecError::Execution(format!("write {path:?}: {e}")))
}

fn write_table_record(out: &mut Vec<u8>, table: &Table) {
    let mut name_buf = vec![0u8; NAME_FIELD];
    util::set_name(&mut name_buf, 0, NAME_FIELD, &table.name);
    out.extend_from_slice(&name_buf);
    out.extend_from_slice(&(table.col_capacity() as u64).to_le_bytes());
    out.extend_from_slice(&(table.col_count() as u64).to_le_bytes());
    out.extend_from_slice(&(table.row_count() as u64).to_le_bytes());
    for col in table.columns.iter() {
        let mut cname = vec![0u8; NAME_FIELD];
        util::set_name(&mut cname, 0, NAME_FIELD, &col.name);
        out.extend_from_slice(&cname);
        out.extend_from_slice(&(col.capacity() as u64).to_le_bytes());
        // `built` is independent of `kind_byte`: a column can have an index *declared*
        // (`create(idx,...)` against an empty table) with no structures behind it yet,
        // awaiting the first `load`. Relying on `kind_byte != 0` alone to mean "a
        // histogram/sorted-index/btree payload follows" silently desynced from
        // `col.histogram()`/`col.sorted_index()`/`col.btree()` actually being `None`
        // (see design ledger) and corrupted the rest of this file's parse on reload;
        // `built` is the authoritative, explicit presence flag instead.
        let built = col.histogram().is_some();
        let flags: u8 = (col.clustered as u8) | ((built as u8) << 1);
        out.push(flags);
        let kind_byte: u8 = match col.index_kind {
            IndexKind::None => 0,
            IndexKind::Sorted => 1,
            IndexKind::BTree => 2,
        };
        out.push(kind_byte);
        if built {
            out.extend_from_slice(&col.histogram().unwrap().to_bytes());
        }
    }
}

fn read_table_header(raw: &[u8], pos: &mut usize) -> (String, usize, usize, usize) {
    let name = util::get_name(raw, *pos, NAME_FIELD);
    *pos += NAME_FIELD;
    let col_capacity = util::getu64(raw, *pos) as usize;
    *pos += 8;
    let col_count = util::getu64(raw, *pos) as usize;
    *pos += 8;
    let row_count = util::getu64(raw, *pos) as usize;
    *pos += 8;
    (name, col_capacity, col_count, row_count)
}

fn read_histogram(raw: &[u8], pos: &mut usize) -> Histogram {
    let num_bins = u32::from_le_bytes(raw[*pos + 8..*pos + 12].try_into().unwrap()) as usize;
    let len = 12 + num_bins * 4 + num_bins * 8;
    let h = Histogram::from_bytes(&raw[*pos..*pos + len]);
    *pos += len;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(tmp: &tempfile::TempDir) -> Config {
        Config::at(tmp.path())
    }

    #[test]
    fn snapshot_then_reload_is_bit_equal_for_an_indexed_table() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut catalog = Catalog::open(cfg(&tmp)).unwrap();
        catalog.create_database("d").unwrap();
        catalog.create_table("t", 2).unwrap();
        catalog.add_column("t", "a").unwrap();
        catalog.add_column("t", "b").unwrap();
        for (a, b) in [(3, 30), (1, 10), (4, 40), (1, 11), (5, 50)] {
            catalog
                .database_mut()
                .unwrap()
                .find_table_mut("t")
                .unwrap()
                .insert(&[a, b])
                .unwrap();
        }
        catalog
            .database_mut()
            .unwrap()
            .find_table_mut("t")
            .unwrap()
            .create_index("a", IndexKind::BTree, false, &catalog.config.clone())
            .unwrap();

        catalog.snapshot().unwrap();

        let reloaded = Catalog::open(cfg(&tmp)).unwrap();
        let before = catalog.database().unwrap();
        let after = reloaded.database().unwrap();
        assert_eq!(before.name, after.name);
        assert_eq!(before.tables.len(), after.tables.len());

        let t0 = before.find_table("t").unwrap();
        let t1 = after.find_table("t").unwrap();
        assert_eq!(t0.row_count(), t1.row_count());
        for name in ["a", "b"] {
            let c0 = t0.find_column(name).unwrap();
            let c1 = t1.find_column(name).unwrap();
            assert_eq!(c0.data(), c1.data());
            assert_eq!(c0.index_kind, c1.index_kind);
            assert_eq!(c0.clustered, c1.clustered);
        }

        let a0 = t0.find_column("a").unwrap();
        let a1 = t1.find_column("a").unwrap();
        assert_eq!(a0.btree().unwrap().in_order(), a1.btree().unwrap().in_order());
        assert_eq!(
            a0.histogram().unwrap().selectivity(Some(1), Some(5)),
            a1.histogram().unwrap().selectivity(Some(1), Some(5))
        );
    }

    #[test]
    fn a_declared_but_not_yet_built_index_reloads_without_corrupting_the_parse() {
        // `create(idx,...)` against an empty table only declares the index (§6.1:
        // "built after the first load") — no histogram/sorted-index/btree payload
        // exists yet, so the snapshot must not write (or expect on reload) one.
        let tmp = tempfile::TempDir::new().unwrap();
        let mut catalog = Catalog::open(cfg(&tmp)).unwrap();
        catalog.create_database("d").unwrap();
        catalog.create_table("t", 2).unwrap();
        catalog.add_column("t", "a").unwrap();
        catalog.add_column("t", "b").unwrap();
        catalog
            .database_mut()
            .unwrap()
            .find_table_mut("t")
            .unwrap()
            .create_index("a", IndexKind::Sorted, false, &catalog.config.clone())
            .unwrap();

        catalog.snapshot().unwrap();
        let reloaded = Catalog::open(cfg(&tmp)).unwrap();

        let t = reloaded.database().unwrap().find_table("t").unwrap();
        assert_eq!(t.find_column("a").unwrap().index_kind, IndexKind::Sorted);
        assert!(t.find_column("a").unwrap().histogram().is_none());
        assert_eq!(t.find_column("b").unwrap().index_kind, IndexKind::None);
    }

    #[test]
    fn a_later_plain_insert_drops_the_stale_index_declaration_instead_of_panicking() {
        // Regression test for the bug fixed in `Column::push`: building an index
        // against a non-empty table, then inserting another row the ordinary way
        // (not through a bulk `load`), must not leave `index_kind` pointing at
        // structures that were invalidated and never rebuilt.
        let tmp = tempfile::TempDir::new().unwrap();
        let mut catalog = Catalog::open(cfg(&tmp)).unwrap();
        catalog.create_database("d").unwrap();
        catalog.create_table("t", 1).unwrap();
        catalog.add_column("t", "a").unwrap();
        catalog
            .database_mut()
            .unwrap()
            .find_table_mut("t")
            .unwrap()
            .insert(&[5])
            .unwrap();
        catalog
            .database_mut()
            .unwrap()
            .find_table_mut("t")
            .unwrap()
            .create_index("a", IndexKind::Sorted, false, &catalog.config.clone())
            .unwrap();
        assert_eq!(
            catalog.database().unwrap().find_table("t").unwrap().find_column("a").unwrap().index_kind,
            IndexKind::Sorted
        );

        catalog
            .database_mut()
            .unwrap()
            .find_table_mut("t")
            .unwrap()
            .insert(&[6])
            .unwrap();

        let col = catalog.database().unwrap().find_table("t").unwrap().find_column("a").unwrap();
        assert_eq!(col.index_kind, IndexKind::None);
        assert!(col.sorted_index().is_none());

        // The planner must now pick a scan, not panic on an index that no longer exists.
        let result = crate::select::select_base(col, Some(1), Some(10), &catalog.config);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn add_column_rejects_past_declared_capacity() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut catalog = Catalog::open(cfg(&tmp)).unwrap();
        catalog.create_database("d").unwrap();
        catalog.create_table("t", 2).unwrap();
        catalog.add_column("t", "a").unwrap();
        catalog.add_column("t", "b").unwrap();
        assert!(matches!(
            catalog.add_column("t", "c"),
            Err(ExecError::IncorrectFormat(_))
        ));
        assert_eq!(
            catalog.database().unwrap().find_table("t").unwrap().col_count(),
            2
        );
    }

    #[test]
    fn names_longer_than_the_field_width_are_recoverable_errors_not_panics() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut catalog = Catalog::open(cfg(&tmp)).unwrap();
        let too_long = "x".repeat(64);
        assert!(matches!(
            catalog.create_database(&too_long),
            Err(ExecError::IncorrectFormat(_))
        ));

        catalog.create_database("d").unwrap();
        assert!(matches!(
            catalog.create_table(&too_long, 1),
            Err(ExecError::IncorrectFormat(_))
        ));
        catalog.create_table("t", 1).unwrap();
        assert!(matches!(
            catalog.add_column("t", &too_long),
            Err(ExecError::IncorrectFormat(_))
        ));
    }
}
