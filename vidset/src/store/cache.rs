use super::*;
use crate::{config::VideoShape, text::VectorizeMode};
use fs2::FileExt;
use tempfile::NamedTempFile;

pub const MAGIC: [u8; 8] = *b"VIDSETDB";
pub const FORMAT_VERSION: u32 = 1;

/// The cache file extension.
pub const CACHE_EXT: &str = "db";

/// The parameters a cache was built with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheParams {
    pub video_shape: VideoShape,
    pub step: usize,
    pub mode: VectorizeMode,
    pub video_ext: String,
}

/// The description of a cache file, stored ahead of the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHeader {
    /// The sample table the cache was built from.
    pub source: PathBuf,
    pub params: CacheParams,
    pub num_records: usize,
    pub label_width: usize,
    pub action_width: usize,
    /// `[channels, depth / step, height, width]`.
    pub video_dim: [usize; 4],
}

impl CacheHeader {
    pub fn new(source: impl Into<PathBuf>, params: CacheParams, dataset: &PackedDataset) -> Self {
        let (_, c, t, h, w) = dataset.major.videos.dim();
        Self {
            source: source.into(),
            params,
            num_records: dataset.len(),
            label_width: dataset.major.labels.ncols(),
            action_width: dataset.minor.actions.ncols(),
            video_dim: [c, t, h, w],
        }
    }
}

/// Derive the cache file name from the sample table path.
///
/// Everything after the first dot of the file name is dropped, so
/// `train.tok.csv` becomes `train.db`.
pub fn cache_file_name(table_path: &Path) -> Result<String> {
    let file_name = table_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format_err!("invalid sample table path '{}'", table_path.display()))?;
    let stem = file_name.split('.').next().unwrap_or("");
    ensure!(
        !stem.is_empty(),
        "unable to derive a cache name from '{}'",
        table_path.display()
    );
    Ok(format!("{}.{}", stem, CACHE_EXT))
}

/// Reads and writes dataset cache files.
///
/// A cache file holds the magic bytes, the format version, a bincode
/// encoded [CacheHeader] and the bincode encoded [PackedDataset].
#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store of the sample table at `table_path` inside `cache_dir`.
    pub fn for_table(cache_dir: &Path, table_path: &Path) -> Result<Self> {
        Ok(Self::new(cache_dir.join(cache_file_name(table_path)?)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the dataset. The file is written aside and renamed into place,
    /// so readers never observe a partial cache.
    pub fn save(&self, header: &CacheHeader, dataset: &PackedDataset) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create cache directory '{}'", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            writer.write_all(&MAGIC)?;
            bincode::serialize_into(&mut writer, &FORMAT_VERSION)?;
            bincode::serialize_into(&mut writer, header)?;
            bincode::serialize_into(&mut writer, dataset)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write cache file '{}'", self.path.display()))?;
        Ok(())
    }

    /// Read only the header of the cache.
    pub fn inspect(&self) -> Result<CacheHeader> {
        let mut reader = self.open_reader()?;
        let header = read_header(&mut reader)?;
        Ok(header)
    }

    /// Read the whole cache.
    pub fn load(&self) -> Result<(CacheHeader, PackedDataset)> {
        let mut reader = self.open_reader()?;
        let header = read_header(&mut reader)?;
        let dataset: PackedDataset = bincode::deserialize_from(&mut reader).map_err(|err| {
            DatasetError::InvalidCache {
                reason: format!("corrupted records: {}", err),
            }
        })?;
        dataset.validate()?;

        if header.num_records != dataset.len() {
            return Err(DatasetError::InvalidCache {
                reason: format!(
                    "header claims {} records, but found {}",
                    header.num_records,
                    dataset.len()
                ),
            }
            .into());
        }
        Ok((header, dataset))
    }

    /// Take exclusive ownership of the cache path until the lock is dropped.
    pub fn lock(&self) -> Result<CacheLock> {
        CacheLock::acquire(&self.path)
    }

    fn open_reader(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open cache file '{}'", self.path.display()))?;
        Ok(BufReader::new(file))
    }
}

fn read_header<R>(reader: &mut R) -> Result<CacheHeader>
where
    R: Read,
{
    let invalid = |reason: String| Error::from(DatasetError::InvalidCache { reason });

    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .map_err(|_| invalid("file is too short".into()))?;
    if magic != MAGIC {
        return Err(invalid("bad magic bytes".into()));
    }

    let version: u32 = bincode::deserialize_from(&mut *reader)
        .map_err(|err| invalid(format!("unreadable version: {}", err)))?;
    if version != FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported format version {}, expect {}",
            version, FORMAT_VERSION
        )));
    }

    let header: CacheHeader = bincode::deserialize_from(&mut *reader)
        .map_err(|err| invalid(format!("corrupted header: {}", err)))?;
    Ok(header)
}

/// An advisory lock on `<cache file>.lock`.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    pub fn acquire(cache_path: &Path) -> Result<Self> {
        let path = {
            let mut name = cache_path.as_os_str().to_owned();
            name.push(".lock");
            PathBuf::from(name)
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open lock file '{}'", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            return Err(DatasetError::CacheLocked {
                path: cache_path.display().to_string(),
            }
            .into());
        }
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        // the lock file stays, removing it would let a late opener lock a
        // stale inode
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!("failed to unlock '{}': {}", self.path.display(), err);
        }
    }
}
