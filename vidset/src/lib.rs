//! Text-conditioned video dataset construction.
//!
//! Clips listed in a sample table are decoded, normalized to a fixed temporal
//! depth, paired with their vectorized annotations, packed into fixed-layout
//! tables and cached to a single file. The cached dataset is served through
//! [VideoDataset](dataset::VideoDataset) with positional and id-based access.

mod common;
pub mod assemble;
pub mod config;
pub mod dataset;
pub mod error;
pub mod sampler;
pub mod store;
pub mod stream;
#[cfg(feature = "tch")]
pub mod tensor;
pub mod text;

pub use config::{DatasetConfig, VideoShape};
pub use dataset::{BuildReport, MajorSample, MinorSample, Sample, Transform, VideoDataset};
pub use error::DatasetError;
pub use store::{MajorBatch, MinorBatch};
pub use text::{CsvTextTable, TextProcessor, TextSample, VectorizeMode};
