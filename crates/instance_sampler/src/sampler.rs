//! Public entry points assembling training and inference records.

use crate::config::SamplerConfig;
use crate::distribution::Distribution;
use crate::drawer::BoxDrawer;
use crate::frame::FrameSolver;
use crate::loader::Loader;
use crate::positive::PositiveIndex;
use crate::selector::{SampleSelector, SelectionContext};
use crate::types::{
    InferenceSample, RawSample, SamplerError, SamplerResult, TrainingSample,
};
use log::info;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Default number of frames in an inference sample.
pub const DEFAULT_TEST_CANDIDATES: usize = 200;

/// Creates and manages contextual samples generated around object boxes.
pub struct InstanceSampler<L: Loader, R: RngCore = StdRng> {
    loader: L,
    config: SamplerConfig,
    positives: PositiveIndex,
    drawer: BoxDrawer,
    frames: FrameSolver,
    selector: SampleSelector,
    rng: R,
    last_name: Option<String>,
}

impl<L: Loader> InstanceSampler<L, StdRng> {
    /// Sampler with an RNG seeded from `config.seed` (or the thread RNG).
    pub fn new(loader: L, config: SamplerConfig) -> SamplerResult<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self::with_rng(loader, config, rng)
    }
}

impl<L: Loader, R: RngCore> InstanceSampler<L, R> {
    pub fn with_rng(loader: L, config: SamplerConfig, rng: R) -> SamplerResult<Self> {
        config.validate()?;
        let positives = PositiveIndex::build(&loader, &config)?;
        let drawer = if config.random_box {
            BoxDrawer::random(config.random_box_gap)
        } else {
            BoxDrawer::distribution(
                config.histogram_bins,
                config.histogram_smoothing,
                config.max_draw_attempts,
            )
        };
        let frames = FrameSolver::new(config.min_context_area, config.max_distort_attempts);
        let selector = SampleSelector::new(&config, loader.num_classes());
        info!("instance sampler: {}", config.describe());
        Ok(Self {
            loader,
            config,
            positives,
            drawer,
            frames,
            selector,
            rng,
            last_name: None,
        })
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn positives(&self) -> &PositiveIndex {
        &self.positives
    }

    pub fn neg_prob(&self) -> f64 {
        self.selector.neg_prob
    }

    /// Image name behind the most recent sample.
    pub fn last_image_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    /// The scale/aspect histogram guiding box draws, built on first call.
    pub fn distribution(&self) -> SamplerResult<&Distribution> {
        if let Some(estimator) = self.drawer.estimator() {
            return estimator.get_distribution(&self.positives);
        }
        Err(SamplerError::InvalidConfig(
            "random_box sampler keeps no distribution".to_string(),
        ))
    }

    fn remember(&mut self, raw: &RawSample<L::Image>) {
        self.last_name = Some(raw.image_name.clone());
    }

    pub fn rnd_sample(&mut self, name: Option<&str>) -> SamplerResult<RawSample<L::Image>> {
        let ctx = SelectionContext {
            loader: &self.loader,
            positives: &self.positives,
            drawer: &self.drawer,
        };
        let raw = self.selector.rnd_sample(&ctx, name, &mut self.rng)?;
        self.remember(&raw);
        Ok(raw)
    }

    pub fn sample_positive(&mut self, name: Option<&str>) -> SamplerResult<RawSample<L::Image>> {
        let ctx = SelectionContext {
            loader: &self.loader,
            positives: &self.positives,
            drawer: &self.drawer,
        };
        let raw = self.selector.sample_positive(&ctx, name, &mut self.rng)?;
        self.remember(&raw);
        Ok(raw)
    }

    pub fn sample_negative(&mut self, name: Option<&str>) -> SamplerResult<RawSample<L::Image>> {
        let ctx = SelectionContext {
            loader: &self.loader,
            positives: &self.positives,
            drawer: &self.drawer,
        };
        let raw = self.selector.sample_negative(&ctx, name, &mut self.rng)?;
        self.remember(&raw);
        Ok(raw)
    }

    /// Training sample: a class-balanced object box and its context frame.
    ///
    /// A name found in the positive index is sampled like any other draw but
    /// restricted to that image; any other name is served as a negative.
    pub fn get_sample(&mut self, given_name: Option<&str>) -> SamplerResult<TrainingSample<L::Image>> {
        let raw = match given_name {
            Some(name) if !self.positives.contains_image(name) => self.sample_negative(Some(name))?,
            name => self.rnd_sample(name)?,
        };
        let normed = raw.bbox.normalized(raw.width, raw.height);
        let (bbox, frame) = self.frames.find_frame(normed, true, &mut self.rng)?;
        Ok(TrainingSample {
            image: raw.image,
            image_name: raw.image_name,
            bbox,
            label: raw.label,
            width: raw.width,
            height: raw.height,
            frame,
        })
    }

    /// Inference sample: `n_candidates` frames (rounded down to a multiple of
    /// `n_neighborhoods`) over candidate boxes of one image.
    pub fn get_test_sample(
        &mut self,
        name: &str,
        n_candidates: usize,
    ) -> SamplerResult<InferenceSample<L::Image>> {
        let image = self.loader.load_image(name)?;
        let ann = self.loader.read_annotations(name)?;
        let neighborhoods = self.config.n_neighborhoods;
        let base = n_candidates / neighborhoods;

        let mut bboxes = Vec::with_capacity(base * neighborhoods);
        let mut frames = Vec::with_capacity(base * neighborhoods);
        for _ in 0..base {
            let drawn = self
                .drawer
                .draw(ann.width, ann.height, &self.positives, &mut self.rng)?;
            let normed = drawn.normalized(ann.width, ann.height);
            let (cand, frame) = self.frames.find_frame(normed, true, &mut self.rng)?;
            bboxes.push(cand);
            frames.push(frame);
            // further neighborhoods reframe the same box
            for _ in 1..neighborhoods {
                frames.push(self.frames.frame_around(cand, &mut self.rng)?);
                bboxes.push(cand);
            }
        }
        self.last_name = Some(name.to_string());
        Ok(InferenceSample {
            image,
            image_name: name.to_string(),
            bboxes,
            frames,
            width: ann.width,
            height: ann.height,
        })
    }
}
