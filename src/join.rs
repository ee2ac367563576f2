//! Join executor: nested-loop, in-memory hash, and partitioned grace hash join (§4.10).
//!
//! Inputs are two `(values, positions)` pairs — typically the output of a fetch+select
//! on each side. Output is two aligned position vectors `(left_positions, right_positions)`
//! such that `left_values[i] == right_values[i]` for every emitted `i`.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::config::Config;

/// One side of a join: the fetched values and their originating positions, aligned.
pub struct JoinSide<'a> {
    pub values: &'a [i32],
    pub positions: &'a [i64],
}

/// Which strategy the DSL's `join(...,nested-loop|hash)` requested (§6.1). `Hash` is
/// adaptive: it runs as a plain in-memory hash join until either side crosses
/// `cache_size_threshold`, then silently escalates to grace/partitioned (§4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    NestedLoop,
    Hash,
}

/// Run the requested join strategy and return aligned `(left_positions, right_positions)`.
pub fn run(left: &JoinSide, right: &JoinSide, strategy: JoinStrategy, config: &Config) -> (Vec<i64>, Vec<i64>) {
    match strategy {
        JoinStrategy::NestedLoop => {
            debug!(left = left.values.len(), right = right.values.len(), "nested-loop join");
            nested_loop(left, right)
        }
        JoinStrategy::Hash => {
            if left.values.len() > config.cache_size_threshold && right.values.len() > config.cache_size_threshold {
                debug!(
                    left = left.values.len(),
                    right = right.values.len(),
                    "escalating hash join to grace/partitioned"
                );
                grace_hash(left, right, config)
            } else {
                debug!(left = left.values.len(), right = right.values.len(), "in-memory hash join");
                hash_join(left, right)
            }
        }
    }
}

/// `O(|L|*|R|)` brute force (§4.10).
fn nested_loop(left: &JoinSide, right: &JoinSide) -> (Vec<i64>, Vec<i64>) {
    let mut lp = Vec::new();
    let mut rp = Vec::new();
    for (li, &lv) in left.values.iter().enumerate() {
        for (ri, &rv) in right.values.iter().enumerate() {
            if lv == rv {
                lp.push(left.positions[li]);
                rp.push(right.positions[ri]);
            }
        }
    }
    (lp, rp)
}

/// Build a hash table on the smaller side, probe with the larger (§4.10).
fn hash_join(left: &JoinSide, right: &JoinSide) -> (Vec<i64>, Vec<i64>) {
    if left.values.len() <= right.values.len() {
        let table = build_index(left);
        probe(&table, left, right, false)
    } else {
        let table = build_index(right);
        let (rp, lp) = probe(&table, right, left, false);
        (lp, rp)
    }
}

fn build_index(side: &JoinSide) -> HashMap<i32, Vec<usize>> {
    let mut table: HashMap<i32, Vec<usize>> = HashMap::new();
    for (i, &v) in side.values.iter().enumerate() {
        table.entry(v).or_default().push(i);
    }
    table
}

/// Probe `table` (built over `built_side`) with `probe_side`, returning
/// `(built_side_positions, probe_side_positions)` unless `swap_output` requests the
/// reverse order.
fn probe(table: &HashMap<i32, Vec<usize>>, built_side: &JoinSide, probe_side: &JoinSide, swap_output: bool) -> (Vec<i64>, Vec<i64>) {
    let mut built_out = Vec::new();
    let mut probe_out = Vec::new();
    for (pi, &pv) in probe_side.values.iter().enumerate() {
        if let Some(built_indices) = table.get(&pv) {
            for &bi in built_indices {
                built_out.push(built_side.positions[bi]);
                probe_out.push(probe_side.positions[pi]);
            }
        }
    }
    if swap_output {
        (probe_out, built_out)
    } else {
        (built_out, probe_out)
    }
}

/// Partition both sides by `value / d` into `config.grace_partitions` buckets, then
/// join each partition pair in memory (§4.10).
fn grace_hash(left: &JoinSide, right: &JoinSide, config: &Config) -> (Vec<i64>, Vec<i64>) {
    let p = config.grace_partitions.max(1);
    let m = left.values.iter().copied().max().unwrap_or(0).max(0) as i64;
    // d = ceil(M / (P-1)), clamped to at least 1 so value/d never divides by zero
    // when every value is equal (the Open Questions §9 resolution for M == 0).
    let d = if p > 1 {
        ((m + (p as i64 - 2)) / (p as i64 - 1)).max(1)
    } else {
        1
    };

    let left_buckets = partition(left, d, p);
    let right_buckets = partition(right, d, p);

    let out_left = Mutex::new(Vec::new());
    let out_right = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for bucket in 0..p {
            let lb = &left_buckets[bucket];
            let rb = &right_buckets[bucket];
            let out_left = &out_left;
            let out_right = &out_right;
            scope.spawn(move || {
                if lb.values.is_empty() || rb.values.is_empty() {
                    return;
                }
                let (lp, rp) = hash_join(
                    &JoinSide { values: &lb.values, positions: &lb.positions },
                    &JoinSide { values: &rb.values, positions: &rb.positions },
                );
                let mut ol = out_left.lock().unwrap();
                let mut or = out_right.lock().unwrap();
                ol.extend(lp);
                or.extend(rp);
            });
        }
    });

    (out_left.into_inner().unwrap(), out_right.into_inner().unwrap())
}

struct Bucket {
    values: Vec<i32>,
    positions: Vec<i64>,
}

fn partition(side: &JoinSide, d: i64, p: usize) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = (0..p).map(|_| Bucket { values: Vec::new(), positions: Vec::new() }).collect();
    for (i, &v) in side.values.iter().enumerate() {
        let bucket_id = ((v as i64 / d).max(0) as usize).min(p - 1);
        buckets[bucket_id].values.push(v);
        buckets[bucket_id].positions.push(side.positions[i]);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sort_pairs(l: &[i64], r: &[i64]) -> Vec<(i64, i64)> {
        let mut pairs: Vec<(i64, i64)> = l.iter().copied().zip(r.iter().copied()).collect();
        pairs.sort_unstable();
        pairs
    }

    #[test]
    fn hash_join_matches_nested_loop() {
        let lv = vec![1, 2, 2, 3, 5];
        let lp = vec![10, 11, 12, 13, 14];
        let rv = vec![2, 3, 3, 7];
        let rp = vec![20, 21, 22, 23];
        let left = JoinSide { values: &lv, positions: &lp };
        let right = JoinSide { values: &rv, positions: &rp };
        let config = Config::default();

        let (nl_l, nl_r) = run(&left, &right, JoinStrategy::NestedLoop, &config);
        let (h_l, h_r) = run(&left, &right, JoinStrategy::Hash, &config);
        assert_eq!(sort_pairs(&nl_l, &nl_r), sort_pairs(&h_l, &h_r));
    }

    #[test]
    fn grace_hash_matches_in_memory_hash_join() {
        crate::test_support::init_tracing();
        let n = 4000;
        let lv: Vec<i32> = (0..n).map(|i| i % 500).collect();
        let lp: Vec<i64> = (0..n as i64).collect();
        let rv: Vec<i32> = (0..n).map(|i| (i * 7) % 500).collect();
        let rp: Vec<i64> = (n as i64..2 * n as i64).collect();
        let left = JoinSide { values: &lv, positions: &lp };
        let right = JoinSide { values: &rv, positions: &rp };

        let small_cache_config = Config {
            cache_size_threshold: 100,
            grace_partitions: 16,
            ..Config::default()
        };
        let big_cache_config = Config {
            cache_size_threshold: 1_000_000,
            ..Config::default()
        };

        let (g_l, g_r) = run(&left, &right, JoinStrategy::Hash, &small_cache_config);
        let (h_l, h_r) = run(&left, &right, JoinStrategy::Hash, &big_cache_config);
        assert_eq!(sort_pairs(&g_l, &g_r), sort_pairs(&h_l, &h_r));
    }

    #[test]
    fn partitioning_never_divides_by_zero_when_all_values_equal() {
        let lv = vec![0, 0, 0, 0];
        let lp = vec![0, 1, 2, 3];
        let rv = vec![0, 0];
        let rp = vec![4, 5];
        let left = JoinSide { values: &lv, positions: &lp };
        let right = JoinSide { values: &rv, positions: &rp };
        let config = Config { cache_size_threshold: 0, ..Config::default() };
        let (l, r) = run(&left, &right, JoinStrategy::Hash, &config);
        assert_eq!(l.len(), 8);
        assert_eq!(r.len(), 8);
    }
}
