//! Contextual instance sampling for detection training.
//!
//! This crate provides:
//! - An index of positive object instances with room for context
//! - A smoothed scale/aspect distribution of those instances
//! - Uniform and distribution-guided candidate box drawing
//! - Frame solving around object boxes, with random distortion
//! - Class-balanced positive/negative selection
//! - Training and inference sample assembly

pub mod config;
pub mod distribution;
pub mod drawer;
pub mod frame;
pub mod geometry;
pub mod loader;
pub mod positive;
pub mod sampler;
pub mod selector;
pub mod types;

pub use config::{SamplerConfig, SamplerConfigBuilder};
pub use distribution::{Distribution, DistributionEstimator};
pub use drawer::{draw_distro_bbox, draw_random_bbox, BoxDrawer};
pub use frame::{check_fits, FrameSolver};
pub use geometry::{batch_iou, inter_fractions, iou};
pub use loader::{CorpusManifest, Loader, ManifestImage, ManifestLoader, ManifestObject, MemoryLoader};
pub use positive::PositiveIndex;
pub use sampler::{InstanceSampler, DEFAULT_TEST_CANDIDATES};
pub use selector::{SampleSelector, SelectionContext, NEGATIVE_LABEL};
pub use types::*;
