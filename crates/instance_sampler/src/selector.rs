//! Positive/negative object selection with class balancing.

use crate::config::SamplerConfig;
use crate::drawer::BoxDrawer;
use crate::geometry::inter_fractions;
use crate::loader::Loader;
use crate::positive::PositiveIndex;
use crate::types::{RawSample, SamplerError, SamplerResult};
use log::debug;
use rand::{Rng, RngCore};

/// Label carried by negative samples.
pub const NEGATIVE_LABEL: u32 = 0;

#[derive(Debug, Clone)]
pub struct SampleSelector {
    pub neg_prob: f64,
    pub max_sample_tries: usize,
    pub max_negative_rounds: usize,
    pub max_inter_fraction: f64,
    exclude: Vec<String>,
}

/// Shared read-only state the selector draws from.
pub struct SelectionContext<'a, L: Loader> {
    pub loader: &'a L,
    pub positives: &'a PositiveIndex,
    pub drawer: &'a BoxDrawer,
}

impl SampleSelector {
    pub fn new(config: &SamplerConfig, num_classes: usize) -> Self {
        Self {
            neg_prob: config.neg_prob(num_classes),
            max_sample_tries: config.max_sample_tries,
            max_negative_rounds: config.max_negative_rounds,
            max_inter_fraction: config.max_inter_fraction,
            exclude: config.exclude.clone(),
        }
    }

    /// True with probability `neg_prob`.
    pub fn choose_negative(&self, rng: &mut dyn RngCore) -> bool {
        rng.random_range(0.0..1.0) <= self.neg_prob
    }

    pub fn rnd_sample<L: Loader>(
        &self,
        ctx: &SelectionContext<'_, L>,
        name: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> SamplerResult<RawSample<L::Image>> {
        if self.choose_negative(rng) {
            self.sample_negative(ctx, name, rng)
        } else {
            self.sample_positive(ctx, name, rng)
        }
    }

    /// Uniform pick among indexed positives, optionally restricted to image
    /// names containing `name`.
    pub fn sample_positive<L: Loader>(
        &self,
        ctx: &SelectionContext<'_, L>,
        name: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> SamplerResult<RawSample<L::Image>> {
        let record = ctx.positives.choose(name, rng)?;
        let image = ctx.loader.load_image(&record.image_name)?;
        Ok(RawSample {
            image,
            image_name: record.image_name.clone(),
            bbox: record.bbox,
            label: record.label,
            width: record.image_w,
            height: record.image_h,
        })
    }

    /// Draw a box that covers less than `max_inter_fraction` of every
    /// ground-truth box of its image.
    ///
    /// Without `name`, each round picks a fresh random image; with `name`
    /// every round retries that image. Fails with `NoValidNegative` after
    /// `max_negative_rounds` rounds.
    pub fn sample_negative<L: Loader>(
        &self,
        ctx: &SelectionContext<'_, L>,
        name: Option<&str>,
        rng: &mut dyn RngCore,
    ) -> SamplerResult<RawSample<L::Image>> {
        let pool: Vec<&String> = ctx
            .loader
            .filenames()
            .iter()
            .filter(|n| !self.exclude.contains(*n))
            .collect();
        if name.is_none() && pool.is_empty() {
            return Err(SamplerError::EmptyCorpus);
        }

        for round in 0..self.max_negative_rounds {
            let image_name = match name {
                Some(n) => n.to_string(),
                None => pool[rng.random_range(0..pool.len())].to_string(),
            };
            let ann = ctx.loader.read_annotations(&image_name)?;
            let image = ctx.loader.load_image(&image_name)?;

            let tries = if ann.is_empty() { 1 } else { self.max_sample_tries };
            for _ in 0..tries {
                let bbox = ctx.drawer.draw(ann.width, ann.height, ctx.positives, rng)?;
                let worst = inter_fractions(&ann.boxes, &bbox)
                    .into_iter()
                    .fold(0.0f64, f64::max);
                if worst < self.max_inter_fraction {
                    return Ok(RawSample {
                        image,
                        image_name,
                        bbox,
                        label: NEGATIVE_LABEL,
                        width: ann.width,
                        height: ann.height,
                    });
                }
            }
            debug!("round {round}: no negative in {image_name} after {tries} tries");
        }
        Err(SamplerError::NoValidNegative {
            name: name.map(str::to_string),
            rounds: self.max_negative_rounds,
        })
    }
}
