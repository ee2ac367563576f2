//! Bulk CSV loader (§6.1 `load("path")`).
//!
//! The header row is `db.tbl.col,db.tbl.col,...` (one field per column, all against the
//! same table); data rows are `int,int,...`. Rows are staged in a plain `Vec` chunk at a
//! time and only handed to `Table::insert` once a whole chunk parses cleanly, so a
//! malformed row or I/O error mid-file discards the in-progress chunk rather than
//! leaving the table partially written (§7: "load abort leaves the table in its prior
//! consistent state").

use std::io::BufRead;

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{ExecError, ExecResult};

const CHUNK_ROWS: usize = 4096;

/// Parsed header: the table every field belongs to, and each field's column name, in order.
struct Header {
    db: String,
    table: String,
    columns: Vec<String>,
}

fn parse_header(line: &str) -> ExecResult<Header> {
    let mut db = None;
    let mut table = None;
    let mut columns = Vec::new();
    for field in line.split(',') {
        let parts: Vec<&str> = field.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(ExecError::IncorrectFormat(format!(
                "load header field '{field}' must be db.tbl.col"
            )));
        }
        let (d, t, c) = (parts[0], parts[1], parts[2]);
        match (&db, &table) {
            (None, None) => {
                db = Some(d.to_string());
                table = Some(t.to_string());
            }
            (Some(db0), Some(t0)) if db0 == d && t0 == t => {}
            _ => {
                return Err(ExecError::IncorrectFormat(
                    "load requires every header field to name the same table".into(),
                ))
            }
        }
        columns.push(c.to_string());
    }
    Ok(Header {
        db: db.ok_or_else(|| ExecError::IncorrectFormat("empty load header".into()))?,
        table: table.ok_or_else(|| ExecError::IncorrectFormat("empty load header".into()))?,
        columns,
    })
}

fn parse_row(line: &str, expected: usize) -> ExecResult<Vec<i32>> {
    let values: Vec<i32> = line
        .split(',')
        .map(|s| {
            s.trim()
                .parse::<i32>()
                .map_err(|_| ExecError::IncorrectFormat(format!("not an integer: '{s}'")))
        })
        .collect::<ExecResult<Vec<i32>>>()?;
    if values.len() != expected {
        return Err(ExecError::IncorrectFormat(format!(
            "expected {expected} values, got {}",
            values.len()
        )));
    }
    Ok(values)
}

/// Load `path` into the table its header names. Returns the number of rows committed.
pub fn load(catalog: &mut Catalog, config: &Config, path: &str) -> ExecResult<usize> {
    let file = std::fs::File::open(path).map_err(|_| ExecError::FileNotFound(path.to_string()))?;
    let mut lines = std::io::BufReader::new(file).lines();

    let header_line = lines
        .next()
        .ok_or_else(|| ExecError::IncorrectFormat("empty load file".into()))?
        .map_err(|e| ExecError::Execution(format!("read header: {e}")))?;
    let header = parse_header(&header_line)?;

    if header.db != catalog.database()?.name {
        return Err(ExecError::ObjectNotFound(header.db));
    }

    // The header's column order need not match the table's own column order (they were
    // declared one at a time via `create(col,...)`), so every row is permuted from
    // header order into table order before it ever reaches `Table::insert`.
    let table = catalog
        .database()?
        .find_table(&header.table)
        .ok_or_else(|| ExecError::ObjectNotFound(header.table.clone()))?;
    let column_order: Vec<usize> = header
        .columns
        .iter()
        .map(|c| {
            table
                .column_index(c)
                .ok_or_else(|| ExecError::ObjectNotFound(c.clone()))
        })
        .collect::<ExecResult<Vec<usize>>>()?;

    let mut committed = 0usize;
    let mut chunk: Vec<Vec<i32>> = Vec::with_capacity(CHUNK_ROWS);

    for line in lines {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(path, error = %e, "load aborted mid-file, discarding in-progress chunk");
                return Err(ExecError::Execution(format!("read row: {e}")));
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let row = parse_row(&line, header.columns.len())?;
        chunk.push(reorder(row, &column_order));
        if chunk.len() == CHUNK_ROWS {
            commit_chunk(catalog, &header, &mut chunk)?;
            committed += CHUNK_ROWS;
        }
    }
    let remaining = chunk.len();
    if remaining > 0 {
        commit_chunk(catalog, &header, &mut chunk)?;
        committed += remaining;
    }

    let table = catalog.database_mut()?.find_table_mut(&header.table)
        .ok_or_else(|| ExecError::ObjectNotFound(header.table.clone()))?;
    table.finish_load(config)?;

    info!(path, rows = committed, table = %header.table, "load complete");
    Ok(committed)
}

/// Permute a row parsed in header-field order into table-column order: `row[i]` belongs
/// at table column `column_order[i]`.
fn reorder(row: Vec<i32>, column_order: &[usize]) -> Vec<i32> {
    let mut out = vec![0i32; row.len()];
    for (src_i, &dst_i) in column_order.iter().enumerate() {
        out[dst_i] = row[src_i];
    }
    out
}

fn commit_chunk(catalog: &mut Catalog, header: &Header, chunk: &mut Vec<Vec<i32>>) -> ExecResult<()> {
    let table = catalog
        .database_mut()?
        .find_table_mut(&header.table)
        .ok_or_else(|| ExecError::ObjectNotFound(header.table.clone()))?;
    for row in chunk.iter() {
        table.insert(row)?;
    }
    chunk.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::table::Table;
    use std::io::Write;

    fn catalog_with_table(tmp: &tempfile::TempDir, col_names: &[&str]) -> Catalog {
        let config = Config::at(tmp.path());
        let mut catalog = Catalog::open(config).unwrap();
        catalog.create_database("d").unwrap();
        let cols: Vec<Column> = col_names.iter().map(|&n| Column::create_in_memory(n)).collect();
        let cap = cols.len();
        catalog.database_mut().unwrap().tables.push(Table::new("t", cols, cap));
        catalog
    }

    #[test]
    fn loads_rows_and_builds_no_indexes_without_create_idx() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut catalog = catalog_with_table(&tmp, &["a", "b"]);
        let config = Config::default();

        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "d.t.a,d.t.b").unwrap();
        writeln!(f, "1,10").unwrap();
        writeln!(f, "2,20").unwrap();
        writeln!(f, "3,30").unwrap();

        let n = load(&mut catalog, &config, f.path().to_str().unwrap()).unwrap();
        assert_eq!(n, 3);
        let db = catalog.database().unwrap();
        let table = db.find_table("t").unwrap();
        assert_eq!(table.find_column("a").unwrap().data(), &[1, 2, 3]);
        assert_eq!(table.find_column("b").unwrap().data(), &[10, 20, 30]);
    }

    #[test]
    fn header_column_order_need_not_match_table_column_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        // Table declares columns a, b in that order...
        let mut catalog = catalog_with_table(&tmp, &["a", "b"]);
        let config = Config::default();

        let mut f = tempfile::NamedTempFile::new().unwrap();
        // ...but the load header lists b before a.
        writeln!(f, "d.t.b,d.t.a").unwrap();
        writeln!(f, "10,1").unwrap();
        writeln!(f, "20,2").unwrap();

        let n = load(&mut catalog, &config, f.path().to_str().unwrap()).unwrap();
        assert_eq!(n, 2);
        let db = catalog.database().unwrap();
        let table = db.find_table("t").unwrap();
        assert_eq!(table.find_column("a").unwrap().data(), &[1, 2]);
        assert_eq!(table.find_column("b").unwrap().data(), &[10, 20]);
    }

    #[test]
    fn malformed_row_aborts_the_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut catalog = catalog_with_table(&tmp, &["a", "b"]);
        let config = Config::default();

        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "d.t.a,d.t.b").unwrap();
        writeln!(f, "1,10").unwrap();
        writeln!(f, "not-a-number,20").unwrap();

        assert!(load(&mut catalog, &config, f.path().to_str().unwrap()).is_err());
    }
}
