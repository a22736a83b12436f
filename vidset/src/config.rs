//! Dataset construction options.

use crate::{common::*, stream::FrameShape, text::VectorizeMode};

/// The options that determine the content of a dataset cache.
///
/// Every field except `cache_dir`, `workers` and `decode_timeout_secs`
/// changes the produced records, so a cache built with one configuration
/// must be deleted before building with another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// The directory where the cache file is stored.
    pub cache_dir: PathBuf,
    /// The directory of clip files. Defaults to `video` next to the
    /// directory holding the sample table.
    #[serde(default)]
    pub video_dir: Option<PathBuf>,
    /// The file extension of clips.
    #[serde(default = "default_video_ext")]
    pub video_ext: String,
    pub video_shape: VideoShape,
    /// The subsampling step applied after rate normalization.
    pub step: usize,
    /// The vectorization mode of the object phrase.
    pub mode: VectorizeMode,
    /// The maximum number of clips decoded at the same time.
    #[serde(default)]
    pub workers: Option<NonZeroUsize>,
    /// Give up decoding a clip after this many seconds.
    #[serde(default)]
    pub decode_timeout_secs: Option<f64>,
}

/// The target shape of a clip before subsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoShape {
    pub depth: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl VideoShape {
    pub fn frame_shape(&self) -> FrameShape {
        let Self {
            height,
            width,
            channels,
            ..
        } = *self;
        FrameShape {
            height,
            width,
            channels,
        }
    }
}

impl DatasetConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, video_shape: VideoShape, step: usize) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            video_dir: None,
            video_ext: default_video_ext(),
            video_shape,
            step,
            mode: VectorizeMode::Toy,
            workers: None,
            decode_timeout_secs: None,
        }
    }

    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let VideoShape {
            depth,
            height,
            width,
            channels,
        } = self.video_shape;

        ensure!(depth > 0, "video depth must be positive");
        ensure!(
            height > 0 && width > 0,
            "video height and width must be positive"
        );
        ensure!(
            channels == 1 || channels == 3,
            "only 1 or 3 channels are supported, but get {}",
            channels
        );
        ensure!(
            (1..=depth).contains(&self.step),
            "step must be in range 1..={}, but get {}",
            depth,
            self.step
        );
        ensure!(
            !self.video_ext.is_empty() && !self.video_ext.starts_with('.'),
            "video_ext must be a bare extension like 'webm'"
        );
        if let Some(secs) = self.decode_timeout_secs {
            ensure!(
                secs.is_finite() && secs > 0.0,
                "decode_timeout_secs must be a positive number"
            );
        }
        Ok(())
    }

    /// The temporal length of every stored clip.
    pub fn output_depth(&self) -> usize {
        self.video_shape.depth / self.step
    }

    pub fn decode_timeout(&self) -> Option<Duration> {
        self.decode_timeout_secs.map(Duration::from_secs_f64)
    }

    pub fn num_workers(&self) -> usize {
        self.workers.map(|n| n.get()).unwrap_or(1)
    }

    /// Resolve the clip directory for a sample table at `table_path`.
    pub fn resolve_video_dir(&self, table_path: &Path) -> PathBuf {
        match &self.video_dir {
            Some(dir) => dir.clone(),
            None => table_path
                .parent()
                .and_then(|dir| dir.parent())
                .unwrap_or_else(|| Path::new(""))
                .join("video"),
        }
    }
}

fn default_video_ext() -> String {
    "webm".into()
}
