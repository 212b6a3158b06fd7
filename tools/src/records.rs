//! JSON-lines output records of the sampling tools.

use instance_sampler::{Distribution, InferenceDescriptor, SampleDescriptor};
use serde::Serialize;

/// One output line: a training or an inference sample, without pixels.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleLine {
    Train(SampleDescriptor),
    Test(InferenceDescriptor),
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionCell {
    pub scale: f64,
    pub aspect: f64,
    pub weight: f64,
    pub probability: f64,
}

/// Histogram dump for `--distribution`.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionRecord {
    pub scale_bin_width: f64,
    pub aspect_bin_width: f64,
    pub cells: Vec<DistributionCell>,
}

impl From<&Distribution> for DistributionRecord {
    fn from(d: &Distribution) -> Self {
        let cells = d
            .bin_origins
            .iter()
            .zip(&d.bin_weights)
            .zip(d.probabilities())
            .map(|((&(scale, aspect), &weight), probability)| DistributionCell {
                scale,
                aspect,
                weight,
                probability,
            })
            .collect();
        Self {
            scale_bin_width: d.scale_bin_width,
            aspect_bin_width: d.aspect_bin_width,
            cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance_sampler::BBox;

    #[test]
    fn sample_lines_are_tagged() {
        let line = SampleLine::Train(SampleDescriptor {
            image_name: "a.jpg".into(),
            bbox: BBox::new(0.1, 0.1, 0.2, 0.2),
            label: 3,
            width: 40,
            height: 30,
            frame: BBox::new(0.0, 0.0, 0.5, 0.5),
        });
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["kind"], "train");
        assert_eq!(json["label"], 3);
        assert_eq!(json["bbox"]["w"], 0.2);
    }

    #[test]
    fn distribution_record_keeps_every_cell() {
        let d = Distribution::from_samples(&[(0.1, 1.0), (0.3, 2.0)], 4, 0.05).unwrap();
        let rec = DistributionRecord::from(&d);
        assert_eq!(rec.cells.len(), 16);
        let total: f64 = rec.cells.iter().map(|c| c.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
