//! Core types, error definitions, and sample records for instance_sampler.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type SamplerResult<T> = Result<T, SamplerError>;

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("no box fits a {width}x{height} image after {attempts} draws")]
    GeometryInfeasible {
        width: u32,
        height: u32,
        attempts: usize,
    },
    #[error("no valid negative found ({}) after {rounds} rounds", .name.as_deref().unwrap_or("random images"))]
    NoValidNegative { name: Option<String>, rounds: usize },
    #[error("image {width}x{height} too small for a random box with gap {gap}")]
    InvalidImageSize { width: u32, height: u32, gap: u32 },
    #[error("empty frame placement interval on {axis} axis: [{lower}, {upper}]")]
    EmptyInterval {
        axis: &'static str,
        lower: f64,
        upper: f64,
    },
    #[error("positive index is empty")]
    EmptyPositiveIndex,
    #[error("no positive instance matches image name {0:?}")]
    NoPositiveMatch(String),
    #[error("unknown image {0:?}")]
    UnknownImage(String),
    #[error("unknown split {0:?}")]
    UnknownSplit(String),
    #[error("corpus has no images to sample from")]
    EmptyCorpus,
    #[error("invalid sampler config: {0}")]
    InvalidConfig(String),
    #[error("invalid histogram weights: {0}")]
    Weights(#[from] rand::distr::weighted::Error),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Axis-aligned box in top-left + size form.
///
/// The same struct carries pixel boxes (as read from annotations) and
/// normalized boxes in `[0, 1)` relative to the image size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BBox {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub const fn from_array(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub const fn as_array(&self) -> [f64; 4] {
        [self.x, self.y, self.w, self.h]
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Clamp every component into `[lo, hi]`.
    pub fn clamped(&self, lo: f64, hi: f64) -> Self {
        Self::new(
            self.x.clamp(lo, hi),
            self.y.clamp(lo, hi),
            self.w.clamp(lo, hi),
            self.h.clamp(lo, hi),
        )
    }

    /// Pixel box to normalized coordinates, clamped to `[0, 0.999]`.
    pub fn normalized(&self, width: u32, height: u32) -> Self {
        let (w, h) = (f64::from(width), f64::from(height));
        Self::new(self.x / w, self.y / h, self.w / w, self.h / h).clamped(0.0, 0.999)
    }

    /// Shrink the far edges so the box lies inside the unit square.
    pub fn fit_within_unit(&self) -> Self {
        Self::new(
            self.x,
            self.y,
            self.w.min(1.0 - self.x).max(0.0),
            self.h.min(1.0 - self.y).max(0.0),
        )
    }

    /// True if `other` lies entirely inside `self` (with a small tolerance).
    pub fn encloses(&self, other: &BBox) -> bool {
        const EPS: f64 = 1e-9;
        self.x <= other.x + EPS
            && self.y <= other.y + EPS
            && self.right() + EPS >= other.right()
            && self.bottom() + EPS >= other.bottom()
    }
}

/// Annotations of one image, as served by a [`crate::Loader`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Annotations {
    /// Pixel boxes, `[x, y, w, h]`.
    pub boxes: Vec<BBox>,
    pub labels: Vec<u32>,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub difficult: Vec<bool>,
}

impl Annotations {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn image_area(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }
}

/// One qualifying annotated instance of the positive split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositiveRecord {
    pub image_name: String,
    /// Pixel box.
    pub bbox: BBox,
    pub label: u32,
    pub image_w: u32,
    pub image_h: u32,
}

impl PositiveRecord {
    pub fn scale(&self) -> f64 {
        self.bbox.area() / (f64::from(self.image_w) * f64::from(self.image_h))
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.bbox.w / self.bbox.h
    }
}

/// Object box drawn by the selector, still in pixel units.
#[derive(Debug, Clone)]
pub struct RawSample<I> {
    pub image: I,
    pub image_name: String,
    pub bbox: BBox,
    pub label: u32,
    pub width: u32,
    pub height: u32,
}

impl<I> RawSample<I> {
    pub fn is_negative(&self) -> bool {
        self.label == 0
    }
}

/// Training record: one object box and its context frame, both normalized.
#[derive(Debug, Clone)]
pub struct TrainingSample<I> {
    pub image: I,
    pub image_name: String,
    pub bbox: BBox,
    pub label: u32,
    pub width: u32,
    pub height: u32,
    pub frame: BBox,
}

impl<I> TrainingSample<I> {
    pub fn descriptor(&self) -> SampleDescriptor {
        SampleDescriptor {
            image_name: self.image_name.clone(),
            bbox: self.bbox,
            label: self.label,
            width: self.width,
            height: self.height,
            frame: self.frame,
        }
    }
}

/// Inference record: parallel candidate boxes and frames for one image.
#[derive(Debug, Clone)]
pub struct InferenceSample<I> {
    pub image: I,
    pub image_name: String,
    pub bboxes: Vec<BBox>,
    pub frames: Vec<BBox>,
    pub width: u32,
    pub height: u32,
}

impl<I> InferenceSample<I> {
    pub fn len(&self) -> usize {
        self.bboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bboxes.is_empty()
    }

    pub fn descriptor(&self) -> InferenceDescriptor {
        InferenceDescriptor {
            image_name: self.image_name.clone(),
            bboxes: self.bboxes.clone(),
            frames: self.frames.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

/// Image-free view of a [`TrainingSample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDescriptor {
    pub image_name: String,
    pub bbox: BBox,
    pub label: u32,
    pub width: u32,
    pub height: u32,
    pub frame: BBox,
}

/// Image-free view of an [`InferenceSample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceDescriptor {
    pub image_name: String,
    pub bboxes: Vec<BBox>,
    pub frames: Vec<BBox>,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_divides_and_clamps() {
        let b = BBox::new(100.0, 50.0, 800.0, 100.0).normalized(800, 200);
        assert!((b.x - 0.125).abs() < 1e-12);
        assert!((b.y - 0.25).abs() < 1e-12);
        assert!((b.w - 0.999).abs() < 1e-12);
        assert!((b.h - 0.5).abs() < 1e-12);
    }

    #[test]
    fn fit_within_unit_is_idempotent() {
        let b = BBox::new(0.9, 0.2, 0.5, 0.3).fit_within_unit();
        assert!((b.right() - 1.0).abs() < 1e-12);
        assert_eq!(b, b.fit_within_unit());
    }

    #[test]
    fn encloses_checks_all_edges() {
        let outer = BBox::new(0.1, 0.1, 0.5, 0.5);
        assert!(outer.encloses(&BBox::new(0.2, 0.2, 0.1, 0.1)));
        assert!(!outer.encloses(&BBox::new(0.05, 0.2, 0.1, 0.1)));
        assert!(!outer.encloses(&BBox::new(0.5, 0.5, 0.2, 0.05)));
    }
}
