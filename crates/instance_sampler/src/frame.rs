//! Contextual frame solving around a (possibly distorted) object box.
//!
//! All boxes here are normalized `[x, y, w, h]` in the unit square.

use crate::drawer::uniform;
use crate::geometry::{center2wh, wh2center, wh2xy, xy2wh};
use crate::types::{BBox, SamplerError, SamplerResult};
use log::debug;
use rand::{Rng, RngCore};

/// Upper bound applied to every component of an incoming box.
pub const ENTRY_CLAMP: f64 = 0.99;
/// Upper bound for corners of a fitted box.
pub const FIT_CLAMP: f64 = 0.999;
/// Largest relative growth of a distorted box.
pub const MAX_DISTORT_SCALE: f64 = 1.3;
/// Probability that a fit correction is only partially applied when jittering.
pub const FIT_JITTER_PROB: f64 = 0.7;

const INTERVAL_EPS: f64 = 1e-9;

/// Check that `bbox` can fit in the unit square and optionally shift it inside.
///
/// Returns `(good, box)`; `good` is `max(w, h) < 1`. When good and `adjust`
/// is set, an axis whose edge leaves `[0, 1]` is translated back; with
/// `jitter`, the translation is scaled by a factor in `[0.5, 1]` with
/// probability [`FIT_JITTER_PROB`]. Corners are then clamped to
/// `[0, FIT_CLAMP]`.
pub fn check_fits(
    bbox: BBox,
    adjust: bool,
    jitter: bool,
    rng: &mut dyn RngCore,
) -> (bool, BBox) {
    let good = bbox.w.max(bbox.h) < 1.0;
    if !(good && adjust) {
        return (good, bbox);
    }
    let mut xy = wh2xy(bbox.as_array());
    let mut delta = [axis_shift(xy[0], xy[2]), axis_shift(xy[1], xy[3])];
    if jitter && rng.random_range(0.0..1.0) < FIT_JITTER_PROB {
        let factor = rng.random_range(0.5..=1.0);
        delta.iter_mut().for_each(|d| *d *= factor);
    }
    for (i, v) in xy.iter_mut().enumerate() {
        *v = (*v + delta[i % 2]).clamp(0.0, FIT_CLAMP);
    }
    let [x, y, w, h] = xy2wh(xy);
    (good, BBox::new(x, y, fit_side(x, w), fit_side(y, h)))
}

/// Largest side not above `side` whose far edge `origin + side` stays at or
/// below `FIT_CLAMP` in floating point.
fn fit_side(origin: f64, side: f64) -> f64 {
    let mut side = side.min(FIT_CLAMP - origin).max(0.0);
    while side > 0.0 && origin + side > FIT_CLAMP {
        side = f64::from_bits(side.to_bits() - 1);
    }
    side
}

/// Translation that brings `[lo, hi]` back inside `[0, 1]`.
fn axis_shift(lo: f64, hi: f64) -> f64 {
    if lo < 0.0 {
        -lo
    } else if hi >= 1.0 {
        1.0 - hi
    } else {
        0.0
    }
}

/// Sample uniformly from `[lower, upper]`, refusing inverted intervals.
fn sample_interval(
    axis: &'static str,
    lower: f64,
    upper: f64,
    rng: &mut dyn RngCore,
) -> SamplerResult<f64> {
    if lower > upper + INTERVAL_EPS {
        return Err(SamplerError::EmptyInterval { axis, lower, upper });
    }
    Ok(uniform(rng, lower, upper.max(lower)))
}

#[derive(Debug, Clone, Copy)]
pub struct FrameSolver {
    pub min_context_area: f64,
    pub max_distort_attempts: usize,
}

impl FrameSolver {
    pub fn new(min_context_area: f64, max_distort_attempts: usize) -> Self {
        Self {
            min_context_area,
            max_distort_attempts,
        }
    }

    /// Randomly grow and shift `bbox`; `None` if no attempt fit with enough context.
    pub fn distort(&self, bbox: BBox, rng: &mut dyn RngCore) -> Option<BBox> {
        for _ in 0..self.max_distort_attempts {
            let scale_up = rng.random_range(1.0..=MAX_DISTORT_SCALE);
            let mut c = wh2center(bbox.as_array());
            c[2] *= scale_up;
            c[3] *= scale_up;
            let drift_x = c[2] * (scale_up - 1.0) / 2.0;
            let drift_y = c[3] * (scale_up - 1.0) / 2.0;
            c[0] += uniform(rng, -drift_x, drift_x);
            c[1] += uniform(rng, -drift_y, drift_y);
            let candidate = BBox::from_array(center2wh(c));
            let (good, fitted) = check_fits(candidate, true, true, rng);
            if good && 1.0 - fitted.area() > self.min_context_area {
                return Some(fitted);
            }
        }
        None
    }

    /// Solve a frame enclosing `bbox` that leaves `min_context_area` of context.
    ///
    /// Returns the object box actually framed (distorted when requested and
    /// possible) together with the frame.
    pub fn find_frame(
        &self,
        bbox: BBox,
        distort_bbox: bool,
        rng: &mut dyn RngCore,
    ) -> SamplerResult<(BBox, BBox)> {
        let mut bbox = settle(bbox);
        if distort_bbox {
            match self.distort(bbox, rng) {
                Some(distorted) => bbox = distorted.fit_within_unit(),
                None => debug!("no distortion fit for {bbox:?}; framing the input box"),
            }
        }
        let frame = self.frame_around(bbox, rng)?;
        Ok((bbox, frame))
    }

    /// Frame enclosing `bbox` as given; the box must already lie inside the
    /// unit square (as boxes returned by [`FrameSolver::find_frame`] do).
    pub fn frame_around(&self, bbox: BBox, rng: &mut dyn RngCore) -> SamplerResult<BBox> {
        let BBox { x, y, w, h } = bbox;

        // the frame minus the box must still hold min_context_area
        let min_area = self.min_context_area + w * h;
        let fw = uniform(rng, w.max(min_area).min(1.0), 1.0);
        let fh = uniform(rng, h.max(min_area / fw).min(1.0), 1.0);

        let fx = sample_interval("x", (x + w - fw).clamp(0.0, 1.0), (1.0 - fw).min(x), rng)?;
        let fy = sample_interval("y", (y + h - fh).clamp(0.0, 1.0), (1.0 - fh).min(y), rng)?;
        Ok(BBox::new(fx, fy, fw, fh))
    }
}

/// Clamp to `[0, ENTRY_CLAMP]` and pull the far edges inside the unit square.
fn settle(bbox: BBox) -> BBox {
    bbox.clamped(0.0, ENTRY_CLAMP).fit_within_unit()
}
