//! Select executors: base-column range select and intermediate (position + value) select (§4.6).

use crate::column::Column;
use crate::config::Config;
use crate::error::{ExecError, ExecResult};
use crate::planner::{self, AccessPath};
use crate::value::TypedVec;

/// Select `column.data[i] in [low, high]` (`None` meaning +/- infinity), choosing an
/// access path via the planner. Always returns a `TypedVec::I64` of row positions.
pub fn select_base(column: &Column, low: Option<i32>, high: Option<i32>, config: &Config) -> TypedVec {
    let path = planner::choose(column, low, high, config.selectivity_thres);
    let positions = match path {
        AccessPath::ClusteredBTree => column.btree().unwrap().range(low, high),
        AccessPath::ClusteredSorted => {
            let (start, end) = sorted_bracket_on_column(column, low, high);
            (start as i64..end as i64).collect()
        }
        AccessPath::UnclusteredBTree => column.btree().unwrap().range(low, high),
        AccessPath::UnclusteredSorted => column.sorted_index().unwrap().select_sorted(low, high),
        AccessPath::Scan => scan(column, low, high),
    };
    TypedVec::I64(positions)
}

fn scan(column: &Column, low: Option<i32>, high: Option<i32>) -> Vec<i64> {
    column
        .data()
        .iter()
        .enumerate()
        .filter(|&(_, &v)| in_range(v, low, high))
        .map(|(i, _)| i as i64)
        .collect()
}

fn in_range(v: i32, low: Option<i32>, high: Option<i32>) -> bool {
    low.map(|l| v >= l).unwrap_or(true) && high.map(|h| v <= h).unwrap_or(true)
}

/// Binary search directly over a clustered, sorted-but-not-btree column (its own data
/// plays the role a `SortedIndex`'s `values` array would for an unclustered column).
fn sorted_bracket_on_column(column: &Column, low: Option<i32>, high: Option<i32>) -> (usize, usize) {
    let data = column.data();
    let start = low.map(|l| data.partition_point(|&v| v < l)).unwrap_or(0);
    let end = high.map(|h| data.partition_point(|&v| v <= h)).unwrap_or(data.len());
    (start, end.max(start))
}

/// Intermediate select: filter `positions` by the parallel `values`, keeping only
/// entries whose value is in `[low, high]`. Retains original positions (§4.6).
pub fn select_intermediate(
    positions: &TypedVec,
    values: &TypedVec,
    low: Option<i32>,
    high: Option<i32>,
) -> ExecResult<TypedVec> {
    let positions = positions
        .as_positions()
        .ok_or_else(|| ExecError::IncorrectFormat("select expects a position vector".into()))?;
    let values = match values {
        TypedVec::I32(v) => v,
        _ => {
            return Err(ExecError::IncorrectFormat(
                "intermediate select expects an int32 value vector".into(),
            ))
        }
    };
    if positions.len() != values.len() {
        return Err(ExecError::IncorrectFormat(
            "select(pos,val,...) requires equal-length inputs".into(),
        ));
    }
    let out: Vec<i64> = positions
        .iter()
        .zip(values.iter())
        .filter(|&(_, &v)| in_range(v, low, high))
        .map(|(&p, _)| p)
        .collect();
    Ok(TypedVec::I64(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::IndexKind;

    fn loaded_column(values: &[i32]) -> Column {
        let mut col = Column::create_in_memory("a");
        for &v in values {
            col.push(v).unwrap();
        }
        col
    }

    #[test]
    fn scan_matches_brute_force() {
        let col = loaded_column(&[5, 1, 9, 3, 7, 2]);
        let cfg = Config::default();
        let got = select_base(&col, Some(2), Some(7), &cfg);
        let mut positions: Vec<i64> = got.as_positions().unwrap().to_vec();
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 3, 4, 5]);
    }

    #[test]
    fn clustered_sorted_binary_search_matches_scan() {
        let mut col = loaded_column(&(0..200).collect::<Vec<_>>());
        col.declare_index(IndexKind::Sorted, true).unwrap();
        col.build_sorted_index();
        col.build_histogram(16);
        let cfg = Config {
            selectivity_thres: 1.1, // force index path regardless of selectivity
            ..Config::default()
        };
        let got = select_base(&col, Some(50), Some(60), &cfg);
        let positions: Vec<i64> = got.as_positions().unwrap().to_vec();
        assert_eq!(positions, (50i64..=60).collect::<Vec<_>>());
    }

    #[test]
    fn intermediate_select_retains_positions() {
        let positions = TypedVec::I64(vec![10, 11, 12, 13]);
        let values = TypedVec::I32(vec![5, 15, 25, 35]);
        let got = select_intermediate(&positions, &values, Some(10), Some(30)).unwrap();
        assert_eq!(got.as_positions().unwrap(), &[11, 12]);
    }
}
