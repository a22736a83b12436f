//! The build command configuration format.

use crate::common::*;

/// The build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The CSV sample table.
    pub table_file: PathBuf,
    /// The JSON vocabulary.
    pub vocab_file: PathBuf,
    #[serde(default)]
    pub backend: Backend,
    pub dataset: DatasetConfig,
}

/// The frame decoder used to read clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Clips are directories of frame images.
    ImageSequence,
    /// Clips are video files decoded by OpenCV.
    Opencv,
}

impl Default for Backend {
    fn default() -> Self {
        Self::ImageSequence
    }
}

impl Backend {
    pub fn frame_source(&self) -> Result<Arc<dyn FrameSource>> {
        let source: Arc<dyn FrameSource> = match self {
            Self::ImageSequence => Arc::new(ImageSequenceSource::new()),
            #[cfg(feature = "opencv")]
            Self::Opencv => Arc::new(vidset::stream::OpenCvSource::new()),
            #[cfg(not(feature = "opencv"))]
            Self::Opencv => bail!("the opencv backend requires the 'opencv' feature"),
        };
        Ok(source)
    }
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;

        // relative paths are resolved against the config file
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let config = Self {
            table_file: dir.join(&config.table_file),
            vocab_file: dir.join(&config.vocab_file),
            dataset: DatasetConfig {
                cache_dir: dir.join(&config.dataset.cache_dir),
                video_dir: config.dataset.video_dir.as_ref().map(|video_dir| dir.join(video_dir)),
                ..config.dataset
            },
            ..config
        };
        config.dataset.validate()?;
        Ok(config)
    }
}
