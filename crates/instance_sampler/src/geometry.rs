//! Box-format conversions and IoU.
//!
//! Formats, all as `[f64; 4]`:
//! - wh: `[x, y, w, h]` (top-left + size)
//! - xy: `[x0, y0, x1, y1]` (corners)
//! - center: `[cx, cy, w, h]`

use crate::types::BBox;

pub fn wh2xy(b: [f64; 4]) -> [f64; 4] {
    [b[0], b[1], b[0] + b[2], b[1] + b[3]]
}

pub fn xy2wh(b: [f64; 4]) -> [f64; 4] {
    [b[0], b[1], b[2] - b[0], b[3] - b[1]]
}

pub fn wh2center(b: [f64; 4]) -> [f64; 4] {
    [b[0] + b[2] / 2.0, b[1] + b[3] / 2.0, b[2], b[3]]
}

pub fn center2wh(b: [f64; 4]) -> [f64; 4] {
    [b[0] - b[2] / 2.0, b[1] - b[3] / 2.0, b[2], b[3]]
}

/// IoU of two wh-form boxes.
pub fn iou(a: &BBox, b: &BBox) -> f64 {
    let inter_w = (a.right().min(b.right()) - a.x.max(b.x)).max(0.0);
    let inter_h = (a.bottom().min(b.bottom()) - a.y.max(b.y)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.area() + b.area() - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// IoU between each of `boxes` and `other`.
pub fn batch_iou(boxes: &[BBox], other: &BBox) -> Vec<f64> {
    boxes.iter().map(|b| iou(b, other)).collect()
}

/// Fraction of each box in `gts` covered by `candidate`.
///
/// The intersection is recovered from IoU as `iou * (a + b) / (1 + iou)`.
/// Zero-area ground-truth boxes report 0.
pub fn inter_fractions(gts: &[BBox], candidate: &BBox) -> Vec<f64> {
    let area = candidate.area();
    batch_iou(gts, candidate)
        .into_iter()
        .zip(gts)
        .map(|(iou, gt)| {
            let gt_area = gt.area();
            if gt_area <= 0.0 {
                return 0.0;
            }
            let inter = iou * (gt_area + area) / (1.0 + iou);
            inter / gt_area
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: [f64; 4], b: [f64; 4]) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn corner_and_center_round_trips() {
        let boxes = [
            [0.0, 0.0, 1.0, 1.0],
            [0.1, 0.2, 0.3, 0.4],
            [12.5, 40.0, 200.0, 3.0],
            [0.999, 0.5, 0.0, 0.25],
        ];
        for b in boxes {
            assert_close(xy2wh(wh2xy(b)), b);
            assert_close(center2wh(wh2center(b)), b);
        }
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BBox::new(10.0, 10.0, 20.0, 20.0);
        let b = BBox::new(100.0, 100.0, 5.0, 5.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-12);
        assert_eq!(iou(&a, &b), 0.0);
        assert_eq!(batch_iou(&[a, b], &a).len(), 2);
    }

    #[test]
    fn inter_fraction_matches_direct_intersection() {
        let gt = BBox::new(100.0, 100.0, 200.0, 200.0);
        // covers the left half of the ground truth
        let cand = BBox::new(50.0, 100.0, 150.0, 200.0);
        let frac = inter_fractions(&[gt], &cand)[0];
        assert!((frac - 0.5).abs() < 1e-9, "got {frac}");
        // candidate fully inside
        let inner = BBox::new(150.0, 150.0, 10.0, 10.0);
        let frac = inter_fractions(&[gt], &inner)[0];
        assert!((frac - 100.0 / 40_000.0).abs() < 1e-9);
    }

    #[test]
    fn zero_area_ground_truth_is_ignored() {
        let gt = BBox::new(10.0, 10.0, 0.0, 5.0);
        let cand = BBox::new(0.0, 0.0, 50.0, 50.0);
        assert_eq!(inter_fractions(&[gt], &cand), vec![0.0]);
    }
}
