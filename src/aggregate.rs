//! Unary reductions (SUM/AVG/MIN/MAX) and binary element-wise arithmetic (ADD/SUB) (§4.8).

use crate::error::{ExecError, ExecResult};
use crate::value::TypedVec;

/// SUM: widens int32/int64 to int64, float32/float64 to float64.
pub fn sum(input: &TypedVec) -> TypedVec {
    match input {
        TypedVec::I32(v) => TypedVec::I64(vec![v.iter().map(|&x| x as i64).sum()]),
        TypedVec::I64(v) => TypedVec::I64(vec![v.iter().sum()]),
        TypedVec::F32(v) => TypedVec::F64(vec![v.iter().map(|&x| x as f64).sum()]),
        TypedVec::F64(v) => TypedVec::F64(vec![v.iter().sum()]),
    }
}

/// AVG: always float64; 0 for an empty input (§4.8).
pub fn avg(input: &TypedVec) -> TypedVec {
    let (total, count) = match input {
        TypedVec::I32(v) => (v.iter().map(|&x| x as f64).sum::<f64>(), v.len()),
        TypedVec::I64(v) => (v.iter().map(|&x| x as f64).sum::<f64>(), v.len()),
        TypedVec::F32(v) => (v.iter().map(|&x| x as f64).sum::<f64>(), v.len()),
        TypedVec::F64(v) => (v.iter().sum::<f64>(), v.len()),
    };
    let result = if count == 0 { 0.0 } else { total / count as f64 };
    TypedVec::F64(vec![result])
}

/// MIN: preserves the input element type.
pub fn min(input: &TypedVec) -> ExecResult<TypedVec> {
    fold_preserving(input, |a, b| if a < b { a } else { b })
}

/// MAX: preserves the input element type.
pub fn max(input: &TypedVec) -> ExecResult<TypedVec> {
    fold_preserving(input, |a, b| if a > b { a } else { b })
}

fn fold_preserving(input: &TypedVec, pick: impl Fn(f64, f64) -> f64) -> ExecResult<TypedVec> {
    if input.is_empty() {
        return Err(ExecError::IncorrectFormat(
            "min/max over an empty input is undefined".into(),
        ));
    }
    Ok(match input {
        TypedVec::I32(v) => {
            let r = v.iter().map(|&x| x as f64).fold(f64::NAN, |a, b| if a.is_nan() { b } else { pick(a, b) });
            TypedVec::I32(vec![r as i32])
        }
        TypedVec::I64(v) => {
            let r = v.iter().map(|&x| x as f64).fold(f64::NAN, |a, b| if a.is_nan() { b } else { pick(a, b) });
            TypedVec::I64(vec![r as i64])
        }
        TypedVec::F32(v) => {
            let r = v.iter().map(|&x| x as f64).fold(f64::NAN, |a, b| if a.is_nan() { b } else { pick(a, b) });
            TypedVec::F32(vec![r as f32])
        }
        TypedVec::F64(v) => {
            let r = v.iter().copied().fold(f64::NAN, |a, b| if a.is_nan() { b } else { pick(a, b) });
            TypedVec::F64(vec![r])
        }
    })
}

/// Widening rule for ADD/SUB (§4.8): int32+int32 -> int64; anything involving a float
/// variant -> float64.
fn widen(a: &TypedVec, b: &TypedVec) -> TypedVec {
    match (a, b) {
        (TypedVec::I32(_), TypedVec::I32(_)) => TypedVec::I64(Vec::new()),
        (TypedVec::F32(_), _) | (_, TypedVec::F32(_)) | (TypedVec::F64(_), _) | (_, TypedVec::F64(_)) => {
            TypedVec::F64(Vec::new())
        }
        _ => TypedVec::I64(Vec::new()),
    }
}

fn as_f64_vec(v: &TypedVec) -> Vec<f64> {
    match v {
        TypedVec::I32(v) => v.iter().map(|&x| x as f64).collect(),
        TypedVec::I64(v) => v.iter().map(|&x| x as f64).collect(),
        TypedVec::F32(v) => v.iter().map(|&x| x as f64).collect(),
        TypedVec::F64(v) => v.clone(),
    }
}

fn elementwise(a: &TypedVec, b: &TypedVec, op: impl Fn(f64, f64) -> f64) -> ExecResult<TypedVec> {
    if a.len() != b.len() {
        return Err(ExecError::IncorrectFormat(
            "add/sub require equal-length inputs".into(),
        ));
    }
    let av = as_f64_vec(a);
    let bv = as_f64_vec(b);
    let raw: Vec<f64> = av.iter().zip(bv.iter()).map(|(&x, &y)| op(x, y)).collect();
    Ok(match widen(a, b) {
        TypedVec::F64(_) => TypedVec::F64(raw),
        _ => TypedVec::I64(raw.into_iter().map(|x| x as i64).collect()),
    })
}

pub fn add(a: &TypedVec, b: &TypedVec) -> ExecResult<TypedVec> {
    elementwise(a, b, |x, y| x + y)
}

pub fn sub(a: &TypedVec, b: &TypedVec) -> ExecResult<TypedVec> {
    elementwise(a, b, |x, y| x - y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_widens_i32_to_i64() {
        let v = TypedVec::I32(vec![1, 2, 3]);
        match sum(&v) {
            TypedVec::I64(r) => assert_eq!(r, vec![6]),
            _ => panic!("expected I64"),
        }
    }

    #[test]
    fn avg_of_empty_is_zero() {
        let v = TypedVec::I32(Vec::new());
        match avg(&v) {
            TypedVec::F64(r) => assert_eq!(r, vec![0.0]),
            _ => panic!("expected F64"),
        }
    }

    #[test]
    fn min_preserves_element_type() {
        let v = TypedVec::F32(vec![3.0, 1.0, 2.0]);
        match min(&v).unwrap() {
            TypedVec::F32(r) => assert_eq!(r, vec![1.0]),
            _ => panic!("expected F32"),
        }
    }

    #[test]
    fn add_widens_to_i64_for_two_i32_inputs() {
        let a = TypedVec::I32(vec![1, 2, 3]);
        let b = TypedVec::I32(vec![10, 20, 30]);
        match add(&a, &b).unwrap() {
            TypedVec::I64(r) => assert_eq!(r, vec![11, 22, 33]),
            _ => panic!("expected I64"),
        }
    }

    #[test]
    fn sub_with_a_float_side_produces_float64() {
        let a = TypedVec::I32(vec![10, 20]);
        let b = TypedVec::F32(vec![1.5, 2.5]);
        match sub(&a, &b).unwrap() {
            TypedVec::F64(r) => assert_eq!(r, vec![8.5, 17.5]),
            _ => panic!("expected F64"),
        }
    }
}
