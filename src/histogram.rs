//! Equi-width histogram used by the planner to estimate a range predicate's selectivity (§4.5).

/// Fixed-bin-count summary of a column's value distribution.
#[derive(Debug, Clone)]
pub struct Histogram {
    min: i32,
    max: i32,
    /// Bin boundary values; `bins.len() == num_bins`.
    bins: Vec<i32>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Build a histogram with `num_bins` equi-width bins from `values`. If all values
    /// are equal (or `values` is empty) every row falls in bin 0.
    pub fn build(values: &[i32], num_bins: usize) -> Self {
        let num_bins = num_bins.max(1);
        let min = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(0);
        let mut counts = vec![0u64; num_bins];
        let span = (max as i64 - min as i64).max(1) as f64;
        for &v in values {
            let bin = if max == min {
                0
            } else {
                (((v as i64 - min as i64) as f64 / span) * num_bins as f64) as usize
            };
            counts[bin.min(num_bins - 1)] += 1;
        }
        let bins = (0..num_bins)
            .map(|i| {
                let frac = i as f64 / num_bins as f64;
                (min as f64 + frac * span).round() as i32
            })
            .collect();
        Histogram {
            min,
            max,
            bins,
            counts,
        }
    }

    /// Total row count summarized (sum of bin counts).
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    fn bin_of(&self, v: i32) -> usize {
        if self.max == self.min {
            return 0;
        }
        let span = (self.max as i64 - self.min as i64) as f64;
        let frac = (v as i64 - self.min as i64) as f64 / span;
        ((frac * self.bins.len() as f64) as usize).min(self.bins.len() - 1)
    }

    /// Estimated selectivity (fraction of rows in `[low, high]`) of a range predicate.
    /// `None` endpoints denote +/- infinity.
    pub fn selectivity(&self, low: Option<i32>, high: Option<i32>) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let lo_bin = low.map(|v| self.bin_of(v.max(self.min))).unwrap_or(0);
        let hi_bin = high
            .map(|v| self.bin_of(v.min(self.max)))
            .unwrap_or(self.bins.len() - 1);
        if lo_bin > hi_bin {
            return 0.0;
        }
        let matching: u64 = self.counts[lo_bin..=hi_bin].iter().sum();
        matching as f64 / total as f64
    }

    /// Serialize as `min, max, num_bins, bins[], counts[]`, native-endian fixed width.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.bins.len() * 4 + self.counts.len() * 8);
        out.extend_from_slice(&self.min.to_le_bytes());
        out.extend_from_slice(&self.max.to_le_bytes());
        out.extend_from_slice(&(self.bins.len() as u32).to_le_bytes());
        for b in &self.bins {
            out.extend_from_slice(&b.to_le_bytes());
        }
        for c in &self.counts {
            out.extend_from_slice(&c.to_le_bytes());
        }
        out
    }

    /// Inverse of [`Histogram::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Self {
        let min = crate::util::geti32(data, 0);
        let max = crate::util::geti32(data, 4);
        let num_bins = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
        let mut off = 12;
        let mut bins = Vec::with_capacity(num_bins);
        for _ in 0..num_bins {
            bins.push(crate::util::geti32(data, off));
            off += 4;
        }
        let mut counts = Vec::with_capacity(num_bins);
        for _ in 0..num_bins {
            counts.push(crate::util::getu64(data, off));
            off += 8;
        }
        Histogram {
            min,
            max,
            bins,
            counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_sum_to_column_length() {
        let values: Vec<i32> = (0..1000).collect();
        let h = Histogram::build(&values, 64);
        assert_eq!(h.total(), 1000);
    }

    #[test]
    fn full_range_is_fully_selective() {
        let values: Vec<i32> = (0..1000).collect();
        let h = Histogram::build(&values, 64);
        assert!((h.selectivity(None, None) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn narrow_range_is_less_selective_than_wide() {
        let values: Vec<i32> = (0..1000).collect();
        let h = Histogram::build(&values, 64);
        let narrow = h.selectivity(Some(500), Some(510));
        let wide = h.selectivity(Some(0), Some(999));
        assert!(narrow < wide);
    }

    #[test]
    fn round_trips_through_bytes() {
        let values: Vec<i32> = (0..500).map(|i| i * 3).collect();
        let h = Histogram::build(&values, 32);
        let bytes = h.to_bytes();
        let h2 = Histogram::from_bytes(&bytes);
        assert_eq!(h.total(), h2.total());
        assert_eq!(h.selectivity(Some(10), Some(100)), h2.selectivity(Some(10), Some(100)));
    }
}
