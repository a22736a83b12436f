pub use anyhow::{bail, Context, Result};
pub use argh::FromArgs;
pub use log::info;
pub use serde::{Deserialize, Serialize};
pub use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
};
pub use vidset::{
    store::DatasetStore,
    stream::{FrameSource, ImageSequenceSource},
    CsvTextTable, DatasetConfig, VideoDataset,
};
