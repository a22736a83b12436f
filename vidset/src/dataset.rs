//! The random access dataset backed by a cache file.

use crate::{
    assemble::assemble,
    common::*,
    config::DatasetConfig,
    error::DatasetError,
    sampler::{extract_clip, ClipOutcome, Rejection},
    store::{
        CacheHeader, CacheParams, DatasetBuilder, DatasetStore, MajorBatch, MinorBatch,
        PackedDataset,
    },
    stream::FrameSource,
    text::{TextEncoding, TextProcessor, TextVectorizer},
};
use indicatif::{ProgressBar, ProgressStyle};

/// A function applied to the video of every sample returned by
/// [VideoDataset::get].
pub type Transform = Arc<dyn Fn(Array4<f32>) -> Array4<f32> + Send + Sync>;

/// The label and video of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct MajorSample {
    pub label: Array1<i64>,
    pub label_len: i64,
    /// `[channels, depth / step, height, width]`.
    pub video: Array4<f32>,
}

/// The object and action of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct MinorSample {
    pub object: TextEncoding,
    pub action: Array1<i64>,
    pub action_len: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub major: MajorSample,
    pub minor: MinorSample,
}

/// What happened to each clip of the sample table during construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Accepted clip ids in record order.
    pub accepted: Vec<String>,
    /// Rejected clip ids in table order.
    pub rejected: Vec<(String, Rejection)>,
    /// The rate multiplier of each accepted clip, in record order.
    pub multipliers: Vec<usize>,
}

impl BuildReport {
    /// The number of clips skipped for being shorter than the target depth.
    pub fn num_short(&self) -> usize {
        self.rejected
            .iter()
            .filter(|(_, rejection)| !rejection.is_corrupted())
            .count()
    }

    /// The number of clips rejected after decoding started.
    pub fn num_corrupted(&self) -> usize {
        self.rejected
            .iter()
            .filter(|(_, rejection)| rejection.is_corrupted())
            .count()
    }
}

/// The dataset that can be random accessed.
pub trait RandomAccessDataset {
    /// Get number of records in the dataset.
    fn num_records(&self) -> usize;

    /// Get the nth record in the dataset.
    fn nth(&self, index: usize) -> Result<Sample>;
}

/// The text-conditioned video dataset.
///
/// Opening a dataset loads its cache file if present. Otherwise every clip
/// of the sample table is decoded and normalized, the accepted records are
/// packed and written to the cache before the dataset is returned.
pub struct VideoDataset {
    text: Arc<dyn TextProcessor>,
    config: DatasetConfig,
    store: DatasetStore,
    header: CacheHeader,
    data: PackedDataset,
    transform: Option<Transform>,
    report: Option<BuildReport>,
}

impl Debug for VideoDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoDataset")
            .field("cache", &self.store.path())
            .field("num_records", &self.data.len())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl VideoDataset {
    pub async fn open(
        config: DatasetConfig,
        text: Arc<dyn TextProcessor>,
        source: Arc<dyn FrameSource>,
        transform: Option<Transform>,
    ) -> Result<Self> {
        config.validate()?;
        let store = DatasetStore::for_table(&config.cache_dir, text.table_path())?;
        let params = cache_params(&config);

        let (header, data, report) = if store.exists() {
            let (header, data) = load_cache(store.clone(), &params).await?;
            (header, data, None)
        } else {
            tokio::fs::create_dir_all(&config.cache_dir)
                .await
                .with_context(|| {
                    format!(
                        "failed to create cache directory '{}'",
                        config.cache_dir.display()
                    )
                })?;
            let lock = store.lock()?;

            // the cache may have been written between the check above and
            // taking the lock
            if store.exists() {
                drop(lock);
                let (header, data) = load_cache(store.clone(), &params).await?;
                (header, data, None)
            } else {
                let (data, report) = build(&config, &*text, source).await?;
                let header = CacheHeader::new(text.table_path(), params, &data);

                info!("caching dataset to '{}'", store.path().display());
                let (header, data) = {
                    let store = store.clone();
                    tokio::task::spawn_blocking(move || -> Result<_> {
                        store.save(&header, &data)?;
                        Ok((header, data))
                    })
                    .await??
                };
                drop(lock);
                (header, data, Some(report))
            }
        };

        Ok(Self {
            text,
            config,
            store,
            header,
            data,
            transform,
            report,
        })
    }

    /// The number of records.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the record at `index` with the transform applied to its video.
    pub fn get(&self, index: usize) -> Result<Sample> {
        let len = self.len();
        if index >= len {
            return Err(DatasetError::IndexOutOfRange { index, len }.into());
        }
        let PackedDataset { major, minor, .. } = &self.data;

        let video = major.videos.index_axis(Axis(0), index).to_owned();
        let video = match &self.transform {
            Some(transform) => transform(video),
            None => video,
        };

        Ok(Sample {
            major: MajorSample {
                label: major.labels.row(index).to_owned(),
                label_len: major.label_lens[index],
                video,
            },
            minor: MinorSample {
                object: minor.objects[index].clone(),
                action: minor.actions.row(index).to_owned(),
                action_len: minor.action_lens[index],
            },
        })
    }

    /// Gather the records of clip `ids` in the requested order.
    ///
    /// The transform is not applied. Fails with
    /// [UnknownId](DatasetError::UnknownId) if an id is not in the dataset.
    pub fn get_by_ids<S>(&self, ids: &[S]) -> Result<(MajorBatch, MinorBatch)>
    where
        S: AsRef<str>,
    {
        self.data.select_ids(ids)
    }

    /// The record position of a clip id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.data.i2i.get(id).copied()
    }

    /// Clip ids in record order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.data.i2i.keys().map(|id| id.as_str())
    }

    pub fn packed(&self) -> &PackedDataset {
        &self.data
    }

    pub fn header(&self) -> &CacheHeader {
        &self.header
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn text_processor(&self) -> &dyn TextProcessor {
        &*self.text
    }

    pub fn cache_path(&self) -> &Path {
        self.store.path()
    }

    /// The construction report, or `None` if the dataset came from the cache.
    pub fn report(&self) -> Option<&BuildReport> {
        self.report.as_ref()
    }
}

impl RandomAccessDataset for VideoDataset {
    fn num_records(&self) -> usize {
        self.len()
    }

    fn nth(&self, index: usize) -> Result<Sample> {
        self.get(index)
    }
}

fn cache_params(config: &DatasetConfig) -> CacheParams {
    CacheParams {
        video_shape: config.video_shape,
        step: config.step,
        mode: config.mode,
        video_ext: config.video_ext.clone(),
    }
}

async fn load_cache(
    store: DatasetStore,
    params: &CacheParams,
) -> Result<(CacheHeader, PackedDataset)> {
    info!("loading dataset cache '{}'", store.path().display());
    let path = store.path().to_owned();
    let (header, data) = tokio::task::spawn_blocking(move || store.load())
        .await?
        .with_context(|| format!("failed to load cache file '{}'", path.display()))?;

    if &header.params != params {
        warn!(
            "cache '{}' was built with {:?}, which differs from the requested {:?}; \
             delete the cache to rebuild it",
            path.display(),
            header.params,
            params
        );
    }
    info!("loaded {} records", data.len());
    Ok((header, data))
}

/// Decode, normalize and pack every clip of the sample table.
async fn build(
    config: &DatasetConfig,
    text: &dyn TextProcessor,
    source: Arc<dyn FrameSource>,
) -> Result<(PackedDataset, BuildReport)> {
    let samples = text.samples();
    let video_dir = config.resolve_video_dir(text.table_path());
    let shape = config.video_shape.frame_shape();
    let depth = config.video_shape.depth;
    let step = config.step;
    let timeout = config.decode_timeout();
    let vectorizer = TextVectorizer::from_processor(text);

    info!(
        "preparing dataset from {} clips in '{}'",
        samples.len(),
        video_dir.display()
    );
    let progress = ProgressBar::new(samples.len() as u64);
    progress.set_style(ProgressStyle::with_template(
        "Preparing dataset {wide_bar} {pos}/{len} [{elapsed_precise}<{eta_precise}]",
    )?);

    // at most `workers` clips, and thus decoders, are in flight; buffered()
    // yields outcomes in table order
    let mut outcomes = Box::pin(
        stream::iter(samples.iter().enumerate())
            .map(|(index, sample)| {
                let source = source.clone();
                let path = video_dir.join(format!("{}.{}", sample.id, config.video_ext));
                async move {
                    let outcome = tokio::task::spawn_blocking(move || {
                        extract_clip(&*source, &path, shape, depth, step, timeout)
                    })
                    .await??;
                    Fallible::Ok((index, outcome))
                }
            })
            .buffered(config.num_workers()),
    );

    let video_dim = [
        config.video_shape.channels,
        config.output_depth(),
        config.video_shape.height,
        config.video_shape.width,
    ];
    let mut builder = DatasetBuilder::new(video_dim);
    let mut report = BuildReport::default();

    while let Some(result) = outcomes.next().await {
        let (index, outcome) = result?;
        let sample = &samples[index];
        progress.inc(1);

        match outcome {
            ClipOutcome::Accepted { plan, video } => {
                let record = assemble(video, sample, &vectorizer, config.mode)
                    .with_context(|| format!("failed to process clip '{}'", sample.id))?;
                builder.push(&sample.id, record)?;
                report.accepted.push(sample.id.clone());
                report.multipliers.push(plan.multiplier);
            }
            ClipOutcome::Rejected(rejection) => {
                if rejection.is_corrupted() {
                    warn!("reject corrupted clip '{}': {}", sample.id, rejection);
                } else {
                    debug!("skip short clip '{}': {}", sample.id, rejection);
                }
                report.rejected.push((sample.id.clone(), rejection));
            }
        }
    }

    progress.finish_and_clear();

    info!(
        "accepted {} clips, skipped {} short clips, number of corrupted videos: {}",
        report.accepted.len(),
        report.num_short(),
        report.num_corrupted()
    );

    let data = builder.finish()?;
    Ok((data, report))
}
