//! Smoothed 2-D histogram of positive-box scale and aspect ratio.

use crate::positive::PositiveIndex;
use crate::types::{SamplerError, SamplerResult};
use log::info;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution as _;
use rand::RngCore;
use std::cell::OnceCell;

/// Piecewise-uniform density over (scale, aspect ratio).
///
/// Cell `i` spans `[origin.0, origin.0 + scale_bin_width)` in scale and
/// `[origin.1, origin.1 + aspect_bin_width)` in aspect ratio, and is drawn
/// with probability proportional to `bin_weights[i]`.
#[derive(Debug, Clone)]
pub struct Distribution {
    pub bin_origins: Vec<(f64, f64)>,
    pub bin_weights: Vec<f64>,
    pub scale_bin_width: f64,
    pub aspect_bin_width: f64,
    index: WeightedIndex<f64>,
}

impl Distribution {
    /// Histogram `samples` of `(scale, aspect)` into `bins x bins` cells.
    pub fn from_samples(
        samples: &[(f64, f64)],
        bins: usize,
        smoothing: f64,
    ) -> SamplerResult<Self> {
        if samples.is_empty() {
            return Err(SamplerError::EmptyPositiveIndex);
        }
        let scale_edges = HistogramAxis::spanning(samples.iter().map(|s| s.0), bins);
        let aspect_edges = HistogramAxis::spanning(samples.iter().map(|s| s.1), bins);

        // row-major: scale bin outer, aspect bin inner
        let mut freq = vec![0.0f64; bins * bins];
        for &(scale, aspect) in samples {
            if let (Some(i), Some(j)) = (scale_edges.bin_of(scale), aspect_edges.bin_of(aspect)) {
                freq[i * bins + j] += 1.0;
            }
        }

        let mut bin_origins = Vec::with_capacity(bins * bins);
        for i in 0..bins {
            for j in 0..bins {
                bin_origins.push((scale_edges.edge(i), aspect_edges.edge(j)));
            }
        }
        let bin_weights: Vec<f64> = freq.into_iter().map(|f| f + smoothing).collect();
        let index = WeightedIndex::new(&bin_weights)?;

        Ok(Self {
            bin_origins,
            bin_weights,
            scale_bin_width: scale_edges.width,
            aspect_bin_width: aspect_edges.width,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.bin_weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bin_weights.is_empty()
    }

    /// Weighted pick of a cell index.
    pub fn sample_cell(&self, rng: &mut dyn RngCore) -> usize {
        self.index.sample(rng)
    }

    /// Normalized cell probabilities.
    pub fn probabilities(&self) -> Vec<f64> {
        let total: f64 = self.bin_weights.iter().sum();
        self.bin_weights.iter().map(|w| w / total).collect()
    }
}

/// Equal-width bin edges over an observed value range.
#[derive(Debug, Clone, Copy)]
struct HistogramAxis {
    lo: f64,
    width: f64,
    bins: usize,
}

impl HistogramAxis {
    fn spanning(values: impl Iterator<Item = f64>, bins: usize) -> Self {
        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for v in values.filter(|v| v.is_finite()) {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if !lo.is_finite() {
            (lo, hi) = (0.0, 1.0);
        }
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        Self {
            lo,
            width: (hi - lo) / bins as f64,
            bins,
        }
    }

    fn edge(&self, i: usize) -> f64 {
        self.lo + self.width * i as f64
    }

    /// Bin index; the last bin is closed on the right.
    fn bin_of(&self, v: f64) -> Option<usize> {
        if !v.is_finite() || v < self.lo {
            return None;
        }
        let idx = ((v - self.lo) / self.width).floor() as usize;
        if idx < self.bins {
            Some(idx)
        } else if v <= self.edge(self.bins) + self.width * 1e-9 {
            Some(self.bins - 1)
        } else {
            None
        }
    }
}

/// Computes the [`Distribution`] once, on first use.
#[derive(Debug)]
pub struct DistributionEstimator {
    bins: usize,
    smoothing: f64,
    cached: OnceCell<Distribution>,
}

impl DistributionEstimator {
    pub fn new(bins: usize, smoothing: f64) -> Self {
        Self {
            bins,
            smoothing,
            cached: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cached.get().is_some()
    }

    /// Build the histogram from `positives` unless already cached.
    pub fn ensure_initialized(&self, positives: &PositiveIndex) -> SamplerResult<()> {
        if self.cached.get().is_none() {
            info!("Initializing the distribution");
            let samples: Vec<(f64, f64)> = positives
                .records()
                .iter()
                .map(|r| (r.scale(), r.aspect_ratio()))
                .collect();
            let distro = Distribution::from_samples(&samples, self.bins, self.smoothing)?;
            let _ = self.cached.set(distro);
        }
        Ok(())
    }

    pub fn get_distribution(&self, positives: &PositiveIndex) -> SamplerResult<&Distribution> {
        self.ensure_initialized(positives)?;
        self.cached.get().ok_or(SamplerError::EmptyPositiveIndex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BBox, PositiveRecord};

    fn record(w: f64, h: f64) -> PositiveRecord {
        PositiveRecord {
            image_name: "img".into(),
            bbox: BBox::new(0.0, 0.0, w, h),
            label: 1,
            image_w: 100,
            image_h: 100,
        }
    }

    #[test]
    fn histogram_counts_land_in_matching_cells() {
        // scales 0.0..1.0 spread, aspect 1 or 4
        let samples = [(0.0, 1.0), (0.05, 1.0), (1.0, 4.0), (0.95, 4.0), (0.55, 1.0)];
        let d = Distribution::from_samples(&samples, 10, 0.05).unwrap();
        assert_eq!(d.len(), 100);
        assert!((d.scale_bin_width - 0.1).abs() < 1e-12);
        assert!((d.aspect_bin_width - 0.3).abs() < 1e-12);
        // scale bin 0, aspect bin 0
        assert!((d.bin_weights[0] - 2.05).abs() < 1e-12);
        assert_eq!(d.bin_origins[0], (0.0, 1.0));
        // scale bin 9, aspect bin 9 holds the right-closed maxima
        assert!((d.bin_weights[99] - 2.05).abs() < 1e-12);
        // scale bin 5, aspect bin 0
        assert!((d.bin_weights[50] - 1.05).abs() < 1e-12);
        let (s, a) = d.bin_origins[50];
        assert!((s - 0.5).abs() < 1e-12 && (a - 1.0).abs() < 1e-12);
        let total: f64 = d.bin_weights.iter().sum();
        assert!((total - (5.0 + 100.0 * 0.05)).abs() < 1e-9);
    }

    #[test]
    fn smoothing_keeps_every_cell_reachable() {
        let d = Distribution::from_samples(&[(0.2, 1.0), (0.3, 2.0)], 10, 0.05).unwrap();
        assert!(d.probabilities().iter().all(|p| *p > 0.0));
    }

    #[test]
    fn degenerate_range_expands_by_half() {
        let d = Distribution::from_samples(&[(0.25, 1.0), (0.25, 1.0)], 10, 0.05).unwrap();
        assert!((d.scale_bin_width - 0.1).abs() < 1e-12);
        assert!((d.aspect_bin_width - 0.1).abs() < 1e-12);
    }

    #[test]
    fn estimator_caches_first_build() {
        let index = PositiveIndex::from_records(vec![record(10.0, 20.0), record(30.0, 30.0)]);
        let est = DistributionEstimator::new(10, 0.05);
        assert!(!est.is_initialized());
        let first = est.get_distribution(&index).unwrap() as *const Distribution;
        let second = est.get_distribution(&PositiveIndex::default()).unwrap() as *const Distribution;
        assert_eq!(first, second);
    }

    #[test]
    fn empty_index_fails() {
        let est = DistributionEstimator::new(10, 0.05);
        assert!(matches!(
            est.get_distribution(&PositiveIndex::default()),
            Err(SamplerError::EmptyPositiveIndex)
        ));
    }
}
