//! Fetch (gather) executor: given a base column and a position vector, gather the
//! values at those positions into a fresh result (§4.7).

use crate::column::Column;
use crate::error::{ExecError, ExecResult};
use crate::value::TypedVec;

pub fn fetch(column: &Column, positions: &TypedVec) -> ExecResult<TypedVec> {
    let positions = positions
        .as_positions()
        .ok_or_else(|| ExecError::IncorrectFormat("fetch expects a position vector".into()))?;
    let data = column.data();
    let mut out = Vec::with_capacity(positions.len());
    for &p in positions {
        let idx = usize::try_from(p)
            .map_err(|_| ExecError::Execution(format!("negative position {p}")))?;
        let v = *data
            .get(idx)
            .ok_or_else(|| ExecError::Execution(format!("position {idx} out of range")))?;
        out.push(v);
    }
    Ok(TypedVec::I32(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gathers_values_at_positions() {
        let mut col = Column::create_in_memory("b");
        for v in [10, 20, 30, 40] {
            col.push(v).unwrap();
        }
        let positions = TypedVec::I64(vec![2, 0, 3]);
        let got = fetch(&col, &positions).unwrap();
        match got {
            TypedVec::I32(v) => assert_eq!(v, vec![30, 10, 40]),
            _ => panic!("expected I32"),
        }
    }

    #[test]
    fn rejects_out_of_range_position() {
        let col = Column::create_in_memory("b");
        let positions = TypedVec::I64(vec![0]);
        assert!(fetch(&col, &positions).is_err());
    }
}
