//! Constructor-time sampler configuration.

use crate::types::{SamplerError, SamplerResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Image names left out of the positive index and of random negative picks.
    pub exclude: Vec<String>,
    /// Draw candidate boxes uniformly instead of from the positive-box distribution.
    pub random_box: bool,
    /// Negative/positive balance; `1.0` means "one class worth of negatives".
    pub neg_bias: f64,
    /// Frames generated per candidate box in inference samples.
    pub n_neighborhoods: usize,
    /// Minimum fraction of a frame (or image) left as context around the object.
    pub min_context_area: f64,
    /// Candidate boxes tried per image when looking for a negative.
    pub max_sample_tries: usize,
    /// Images (or rounds on a pinned image) tried before giving up on a negative.
    pub max_negative_rounds: usize,
    /// Histogram draws before a distribution box is declared infeasible.
    pub max_draw_attempts: usize,
    /// Distortion attempts in frame solving before falling back to the input box.
    pub max_distort_attempts: usize,
    /// Minimum side of a uniformly drawn box, in pixels.
    pub random_box_gap: u32,
    /// Bins per dimension of the scale/aspect histogram.
    pub histogram_bins: usize,
    /// Added to every histogram cell.
    pub histogram_smoothing: f64,
    /// Largest covered fraction of any ground-truth box a negative may have.
    pub max_inter_fraction: f64,
    /// Seed for the sampler's RNG; `None` seeds from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            random_box: false,
            neg_bias: 1.0,
            n_neighborhoods: 1,
            min_context_area: 0.3,
            max_sample_tries: 50,
            max_negative_rounds: 100,
            max_draw_attempts: 1000,
            max_distort_attempts: 20,
            random_box_gap: 10,
            histogram_bins: 10,
            histogram_smoothing: 0.05,
            max_inter_fraction: 0.3,
            seed: None,
        }
    }
}

impl SamplerConfig {
    pub fn builder() -> SamplerConfigBuilder {
        SamplerConfigBuilder::new()
    }

    /// Defaults overridden by `INSTANCE_SAMPLER_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        fn parse<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok()?.parse().ok()
        }
        if let Some(v) = parse("INSTANCE_SAMPLER_RANDOM_BOX") {
            self.random_box = v;
        }
        if let Some(v) = parse("INSTANCE_SAMPLER_NEG_BIAS") {
            self.neg_bias = v;
        }
        if let Some(v) = parse("INSTANCE_SAMPLER_NEIGHBORHOODS") {
            self.n_neighborhoods = v;
        }
        if let Some(v) = parse("INSTANCE_SAMPLER_MIN_CONTEXT_AREA") {
            self.min_context_area = v;
        }
        if let Some(v) = parse("INSTANCE_SAMPLER_MAX_NEGATIVE_ROUNDS") {
            self.max_negative_rounds = v;
        }
        if let Some(v) = parse("INSTANCE_SAMPLER_MAX_DRAW_ATTEMPTS") {
            self.max_draw_attempts = v;
        }
        if let Some(v) = parse("INSTANCE_SAMPLER_SEED") {
            self.seed = Some(v);
        }
        if let Ok(list) = std::env::var("INSTANCE_SAMPLER_EXCLUDE") {
            self.exclude = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        self
    }

    pub fn validate(&self) -> SamplerResult<()> {
        let fail = |msg: String| Err(SamplerError::InvalidConfig(msg));
        if self.n_neighborhoods == 0 {
            return fail("n_neighborhoods must be at least 1".into());
        }
        if !(self.min_context_area > 0.0 && self.min_context_area < 1.0) {
            return fail(format!(
                "min_context_area {} outside (0, 1)",
                self.min_context_area
            ));
        }
        if !(self.neg_bias.is_finite() && self.neg_bias > 0.0) {
            return fail(format!("neg_bias {} must be positive", self.neg_bias));
        }
        if self.histogram_bins == 0 {
            return fail("histogram_bins must be at least 1".into());
        }
        if !(self.histogram_smoothing.is_finite() && self.histogram_smoothing >= 0.0) {
            return fail(format!(
                "histogram_smoothing {} must be non-negative",
                self.histogram_smoothing
            ));
        }
        if self.max_sample_tries == 0 || self.max_negative_rounds == 0 || self.max_draw_attempts == 0
        {
            return fail("retry caps must be at least 1".into());
        }
        if !(self.max_inter_fraction > 0.0 && self.max_inter_fraction <= 1.0) {
            return fail(format!(
                "max_inter_fraction {} outside (0, 1]",
                self.max_inter_fraction
            ));
        }
        Ok(())
    }

    /// Probability of drawing a negative in a class-balanced sample.
    pub fn neg_prob(&self, num_classes: usize) -> f64 {
        if (self.neg_bias - 1.0).abs() < f64::EPSILON {
            1.0 / num_classes.max(1) as f64
        } else {
            self.neg_bias / (1.0 + self.neg_bias)
        }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|e| e == name)
    }

    pub fn describe(&self) -> String {
        format!(
            "box={} neg_bias={:.2} neighborhoods={} min_context={:.2} tries={} rounds={} draw_attempts={} distort_attempts={} bins={} smoothing={:.3} max_inter={:.2} exclude={} seed={}",
            if self.random_box { "random" } else { "distribution" },
            self.neg_bias,
            self.n_neighborhoods,
            self.min_context_area,
            self.max_sample_tries,
            self.max_negative_rounds,
            self.max_draw_attempts,
            self.max_distort_attempts,
            self.histogram_bins,
            self.histogram_smoothing,
            self.max_inter_fraction,
            self.exclude.len(),
            self.seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfigBuilder {
    inner: SamplerConfig,
}

impl Default for SamplerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplerConfigBuilder {
    pub fn new() -> Self {
        Self {
            inner: SamplerConfig::default(),
        }
    }
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.exclude = names.into_iter().map(Into::into).collect();
        self
    }
    pub fn random_box(mut self, random_box: bool) -> Self {
        self.inner.random_box = random_box;
        self
    }
    pub fn neg_bias(mut self, neg_bias: f64) -> Self {
        self.inner.neg_bias = neg_bias;
        self
    }
    pub fn n_neighborhoods(mut self, n: usize) -> Self {
        self.inner.n_neighborhoods = n;
        self
    }
    pub fn min_context_area(mut self, area: f64) -> Self {
        self.inner.min_context_area = area;
        self
    }
    pub fn max_sample_tries(mut self, tries: usize) -> Self {
        self.inner.max_sample_tries = tries;
        self
    }
    pub fn max_negative_rounds(mut self, rounds: usize) -> Self {
        self.inner.max_negative_rounds = rounds;
        self
    }
    pub fn max_draw_attempts(mut self, attempts: usize) -> Self {
        self.inner.max_draw_attempts = attempts;
        self
    }
    pub fn histogram(mut self, bins: usize, smoothing: f64) -> Self {
        self.inner.histogram_bins = bins;
        self.inner.histogram_smoothing = smoothing;
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.inner.seed = seed;
        self
    }
    pub fn build(self) -> SamplerConfig {
        self.inner
    }
}
