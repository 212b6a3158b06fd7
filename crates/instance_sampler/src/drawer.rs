//! Candidate box proposals: uniform or guided by the positive-box distribution.

use crate::distribution::DistributionEstimator;
use crate::positive::PositiveIndex;
use crate::types::{BBox, SamplerError, SamplerResult};
use log::debug;
use rand::{Rng, RngCore};

/// Uniform float in `[lo, hi]`; collapses to `lo` on an empty or inverted range.
pub(crate) fn uniform(rng: &mut dyn RngCore, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.random_range(lo..=hi)
    } else {
        lo
    }
}

#[derive(Debug)]
pub enum BoxDrawer {
    /// Uniform corners with sides of at least `gap` pixels.
    Random { gap: u32 },
    /// Rejection sampling from the scale/aspect histogram.
    Distribution {
        estimator: DistributionEstimator,
        max_attempts: usize,
    },
}

impl BoxDrawer {
    pub fn random(gap: u32) -> Self {
        BoxDrawer::Random { gap }
    }

    pub fn distribution(bins: usize, smoothing: f64, max_attempts: usize) -> Self {
        BoxDrawer::Distribution {
            estimator: DistributionEstimator::new(bins, smoothing),
            max_attempts,
        }
    }

    /// Pixel box `[x, y, w, h]` inside a `width x height` image.
    pub fn draw(
        &self,
        width: u32,
        height: u32,
        positives: &PositiveIndex,
        rng: &mut dyn RngCore,
    ) -> SamplerResult<BBox> {
        match self {
            BoxDrawer::Random { gap } => draw_random_bbox(width, height, *gap, rng),
            BoxDrawer::Distribution {
                estimator,
                max_attempts,
            } => draw_distro_bbox(width, height, estimator, positives, *max_attempts, rng),
        }
    }

    pub fn estimator(&self) -> Option<&DistributionEstimator> {
        match self {
            BoxDrawer::Distribution { estimator, .. } => Some(estimator),
            BoxDrawer::Random { .. } => None,
        }
    }
}

pub fn draw_random_bbox(
    width: u32,
    height: u32,
    gap: u32,
    rng: &mut dyn RngCore,
) -> SamplerResult<BBox> {
    if width <= gap + 1 || height <= gap + 1 {
        return Err(SamplerError::InvalidImageSize { width, height, gap });
    }
    let xmin = rng.random_range(0..width - gap - 1);
    let ymin = rng.random_range(0..height - gap - 1);
    let xmax = rng.random_range(xmin + gap..width);
    let ymax = rng.random_range(ymin + gap..height);
    Ok(BBox::new(
        f64::from(xmin),
        f64::from(ymin),
        f64::from(xmax - xmin),
        f64::from(ymax - ymin),
    ))
}

pub fn draw_distro_bbox(
    width: u32,
    height: u32,
    estimator: &DistributionEstimator,
    positives: &PositiveIndex,
    max_attempts: usize,
    rng: &mut dyn RngCore,
) -> SamplerResult<BBox> {
    let distro = estimator.get_distribution(positives)?;
    let (w, h) = (f64::from(width), f64::from(height));
    for _ in 0..max_attempts {
        let cell = distro.sample_cell(rng);
        let (scale0, ar0) = distro.bin_origins[cell];
        let scale = uniform(rng, scale0, scale0 + distro.scale_bin_width) * w * h;
        let ar = uniform(rng, ar0, ar0 + distro.aspect_bin_width);
        if !(scale > 0.0 && ar > 0.0) {
            continue;
        }
        let wi = (ar * scale).sqrt().round();
        let hi = (scale / ar).sqrt().round();
        // the placement range [0, side - extent - 1) must be non-empty
        if !(wi >= 1.0 && hi >= 1.0 && wi + 1.0 < w && hi + 1.0 < h) {
            continue;
        }
        let (wi, hi) = (wi as u32, hi as u32);
        let xmin = rng.random_range(0..width - wi - 1);
        let ymin = rng.random_range(0..height - hi - 1);
        return Ok(BBox::new(
            f64::from(xmin),
            f64::from(ymin),
            f64::from(wi),
            f64::from(hi),
        ));
    }
    debug!("distribution box draw exhausted {max_attempts} attempts on {width}x{height}");
    Err(SamplerError::GeometryInfeasible {
        width,
        height,
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PositiveRecord;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn positives(boxes: &[(f64, f64)]) -> PositiveIndex {
        PositiveIndex::from_records(
            boxes
                .iter()
                .map(|&(w, h)| PositiveRecord {
                    image_name: "p".into(),
                    bbox: BBox::new(0.0, 0.0, w, h),
                    label: 1,
                    image_w: 200,
                    image_h: 100,
                })
                .collect(),
        )
    }

    #[test]
    fn random_boxes_stay_inside_image() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let b = draw_random_bbox(64, 48, 10, &mut rng).unwrap();
            assert!(b.x >= 0.0 && b.y >= 0.0);
            assert!(b.w >= 10.0 && b.h >= 10.0);
            assert!(b.right() < 64.0 && b.bottom() < 48.0);
        }
    }

    #[test]
    fn random_box_rejects_tiny_images() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = draw_random_bbox(11, 100, 10, &mut rng).unwrap_err();
        assert!(matches!(err, SamplerError::InvalidImageSize { width: 11, .. }));
    }

    /// Record on a 200x100 image with the given scale and aspect ratio.
    fn shaped(scale: f64, aspect: f64) -> (f64, f64) {
        let area = scale * 200.0 * 100.0;
        ((area * aspect).sqrt(), (area / aspect).sqrt())
    }

    #[test]
    fn distribution_boxes_stay_within_corpus_support() {
        let index = positives(&[
            shaped(0.025, 1.0),
            shaped(0.05, 2.0),
            shaped(0.025, 2.0),
            shaped(0.05, 1.0),
            shaped(0.04, 1.5),
        ]);
        let drawer = BoxDrawer::distribution(10, 0.05, 1000);
        let mut rng = StdRng::seed_from_u64(17);
        // side rounding on a 400x300 image moves scale/aspect by a few percent
        let tol = 0.05;
        for _ in 0..5000 {
            let b = drawer.draw(400, 300, &index, &mut rng).unwrap();
            let scale = b.area() / (400.0 * 300.0);
            let aspect = b.w / b.h;
            assert!(
                scale >= 0.025 * (1.0 - tol) && scale <= 0.05 * (1.0 + tol),
                "scale {scale} for {b:?}"
            );
            assert!(
                aspect >= 1.0 - tol && aspect <= 2.0 * (1.0 + tol),
                "aspect {aspect} for {b:?}"
            );
        }
    }

    #[test]
    fn distribution_boxes_fit_inside_image() {
        let index = positives(&[(20.0, 10.0), (40.0, 20.0), (30.0, 15.0), (24.0, 12.0)]);
        let drawer = BoxDrawer::distribution(10, 0.05, 1000);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let b = drawer.draw(200, 100, &index, &mut rng).unwrap();
            assert!(b.w >= 1.0 && b.h >= 1.0);
            assert!(b.right() < 200.0 && b.bottom() < 100.0);
        }
        assert!(drawer.estimator().unwrap().is_initialized());
    }

    #[test]
    fn infeasible_distribution_gives_up() {
        // every corpus box is larger than the target image
        let index = positives(&[(150.0, 60.0), (160.0, 70.0)]);
        let drawer = BoxDrawer::distribution(10, 0.05, 25);
        let mut rng = StdRng::seed_from_u64(5);
        let err = drawer.draw(20, 20, &index, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            SamplerError::GeometryInfeasible { attempts: 25, .. }
        ));
    }
}
