//! Draft generator: JSON project descriptions to editor draft bundles.

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::AppConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::{init_tracing, ConversionLogger};
pub use pipeline::{ConversionOutcome, ConversionPipeline, IndexRefresh};
