pub mod config;
pub mod records;

pub use config::ToolConfig;
pub use records::{DistributionRecord, SampleLine};
