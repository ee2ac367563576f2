//! Tunable constants collected into one struct, per the ambient configuration surface.

use std::path::PathBuf;

/// Build/runtime-tunable knobs for a [`crate::catalog::Catalog`].
///
/// `Config::default()` matches the constants named in the design ledger; override any
/// field for tests (e.g. a tiny `cache_size_threshold` to force grace-hash partitioning
/// without needing a million-row fixture).
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory under which `database.metadata`, `tables.metadata`, `columns/`
    /// and `btree/` live.
    pub data_dir: PathBuf,

    /// B+-tree fanout (max keys per node). >= 128 is recommended for cache friendliness.
    pub fanout: usize,

    /// Number of equi-width histogram bins per indexed column.
    pub num_bins: usize,

    /// Selectivity fraction below which the planner prefers index random access
    /// over sequential scan.
    pub selectivity_thres: f64,

    /// Cardinality threshold below which a join side is joined in memory rather
    /// than partitioned (tuned to fit an L1/L2 working set).
    pub cache_size_threshold: usize,

    /// Number of buckets the grace hash join partitions each side into.
    pub grace_partitions: usize,

    /// Worker thread count for the batched-select scheduler.
    pub batch_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("."),
            fanout: 128,
            num_bins: 64,
            selectivity_thres: 0.6,
            cache_size_threshold: 8192,
            grace_partitions: 64,
            batch_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl Config {
    /// A `Config` rooted at the given data directory, defaults otherwise.
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            data_dir: data_dir.into(),
            ..Config::default()
        }
    }
}
