//! Flat table of positive instances that leave enough room for context.

use crate::config::SamplerConfig;
use crate::loader::Loader;
use crate::types::{PositiveRecord, SamplerError, SamplerResult};
use log::{info, warn};
use rand::{Rng, RngCore};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct PositiveIndex {
    records: Vec<PositiveRecord>,
    names: HashSet<String>,
}

impl PositiveIndex {
    /// Index every instance of the `"pos"` split whose box covers less than
    /// `1 - min_context_area` of its image.
    pub fn build<L: Loader>(loader: &L, config: &SamplerConfig) -> SamplerResult<Self> {
        let max_scale = 1.0 - config.min_context_area;
        let mut records = Vec::new();
        let mut skipped = 0usize;
        for name in loader.filenames_for("pos")? {
            if config.is_excluded(&name) {
                skipped += 1;
                continue;
            }
            let ann = loader.read_annotations(&name)?;
            let image_area = ann.image_area();
            if image_area <= 0.0 {
                warn!("positive image {name} has zero size; skipped");
                continue;
            }
            for (bbox, &label) in ann.boxes.iter().zip(&ann.labels) {
                if bbox.area() / image_area < max_scale {
                    records.push(PositiveRecord {
                        image_name: name.clone(),
                        bbox: *bbox,
                        label,
                        image_w: ann.width,
                        image_h: ann.height,
                    });
                }
            }
        }
        if skipped > 0 {
            info!("excluded {skipped} positive images");
        }
        info!("Created positive database of {} samples", records.len());
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<PositiveRecord>) -> Self {
        let names = records.iter().map(|r| r.image_name.clone()).collect();
        Self { records, names }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PositiveRecord] {
        &self.records
    }

    /// Exact image-name membership.
    pub fn contains_image(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Uniform pick over all records, or over those whose image name contains `name`.
    pub fn choose(
        &self,
        name: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> SamplerResult<&PositiveRecord> {
        match name {
            None => {
                if self.records.is_empty() {
                    return Err(SamplerError::EmptyPositiveIndex);
                }
                Ok(&self.records[rng.random_range(0..self.records.len())])
            }
            Some(pattern) => {
                let matches: Vec<&PositiveRecord> = self
                    .records
                    .iter()
                    .filter(|r| r.image_name.contains(pattern))
                    .collect();
                if matches.is_empty() {
                    return Err(SamplerError::NoPositiveMatch(pattern.to_string()));
                }
                Ok(matches[rng.random_range(0..matches.len())])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::types::{Annotations, BBox};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn square_of_area(frac: f64) -> BBox {
        // 100x100 image
        let side = (frac * 10_000.0).sqrt();
        BBox::new(0.0, 0.0, side, side)
    }

    fn corpus() -> MemoryLoader {
        MemoryLoader::new(4)
            .with_image(
                "img_a.jpg",
                Annotations {
                    boxes: vec![square_of_area(0.1), square_of_area(0.65), square_of_area(0.75)],
                    labels: vec![1, 2, 3],
                    width: 100,
                    height: 100,
                    difficult: vec![false; 3],
                },
            )
            .with_image(
                "img_b.jpg",
                Annotations {
                    boxes: vec![BBox::new(10.0, 10.0, 20.0, 20.0)],
                    labels: vec![2],
                    width: 100,
                    height: 100,
                    difficult: vec![false],
                },
            )
    }

    #[test]
    fn keeps_only_boxes_leaving_context() {
        let index = PositiveIndex::build(&corpus(), &SamplerConfig::default()).unwrap();
        let labels: Vec<u32> = index
            .records()
            .iter()
            .filter(|r| r.image_name == "img_a.jpg")
            .map(|r| r.label)
            .collect();
        assert_eq!(labels, vec![1, 2]);
        assert_eq!(index.len(), 3);
        assert!(index.contains_image("img_b.jpg"));
        assert!(!index.contains_image("img"));
    }

    #[test]
    fn excluded_images_are_skipped() {
        let cfg = SamplerConfig::builder().exclude(["img_a.jpg"]).build();
        let index = PositiveIndex::build(&corpus(), &cfg).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.records()[0].image_name, "img_b.jpg");
    }

    #[test]
    fn choose_filters_by_substring() {
        let index = PositiveIndex::build(&corpus(), &SamplerConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let rec = index.choose(Some("_b"), &mut rng).unwrap();
            assert_eq!(rec.image_name, "img_b.jpg");
        }
        assert!(matches!(
            index.choose(Some("missing"), &mut rng),
            Err(SamplerError::NoPositiveMatch(_))
        ));
        assert!(matches!(
            PositiveIndex::default().choose(None, &mut rng),
            Err(SamplerError::EmptyPositiveIndex)
        ));
    }
}
