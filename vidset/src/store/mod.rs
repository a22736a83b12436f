//! Packed record tables and their on-disk cache.

mod builder;
mod cache;

pub use builder::*;
pub use cache::*;

use crate::{common::*, error::DatasetError, text::TextEncoding};

/// The label and video fields of all records, one row per record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MajorTable {
    /// `[records, max_label_len]`, zero padded.
    pub labels: Array2<i64>,
    pub label_lens: Array1<i64>,
    /// `[records, channels, depth / step, height, width]`.
    pub videos: Array5<f32>,
}

/// The object and action fields of all records, one row per record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinorTable {
    /// The object encodings. Their shape depends on the vectorize mode.
    pub objects: Vec<TextEncoding>,
    /// `[records, max_action_len]`, zero padded.
    pub actions: Array2<i64>,
    pub action_lens: Array1<i64>,
}

/// Major fields gathered for a list of ids.
pub type MajorBatch = MajorTable;

/// Minor fields gathered for a list of ids.
pub type MinorBatch = MinorTable;

impl MajorTable {
    pub fn len(&self) -> usize {
        self.label_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gather rows in the given order.
    pub fn select(&self, positions: &[usize]) -> Self {
        Self {
            labels: self.labels.select(Axis(0), positions),
            label_lens: self.label_lens.select(Axis(0), positions),
            videos: self.videos.select(Axis(0), positions),
        }
    }
}

impl MinorTable {
    pub fn len(&self) -> usize {
        self.action_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gather rows in the given order.
    pub fn select(&self, positions: &[usize]) -> Self {
        Self {
            objects: positions
                .iter()
                .map(|&pos| self.objects[pos].clone())
                .collect(),
            actions: self.actions.select(Axis(0), positions),
            action_lens: self.action_lens.select(Axis(0), positions),
        }
    }
}

/// The complete dataset: parallel major and minor tables and the map from
/// clip id to row position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedDataset {
    pub major: MajorTable,
    pub minor: MinorTable,
    pub i2i: IndexMap<String, usize>,
}

impl PackedDataset {
    pub fn len(&self) -> usize {
        self.i2i.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The row position of a clip id.
    pub fn position(&self, id: &str) -> Result<usize> {
        self.i2i.get(id).copied().ok_or_else(|| {
            Error::from(DatasetError::UnknownId {
                id: id.to_owned(),
            })
        })
    }

    /// Gather the records of `ids` in the given order. Fails without
    /// gathering anything if one of the ids is unknown.
    pub fn select_ids<S>(&self, ids: &[S]) -> Result<(MajorBatch, MinorBatch)>
    where
        S: AsRef<str>,
    {
        let positions: Vec<usize> = ids
            .iter()
            .map(|id| self.position(id.as_ref()))
            .try_collect()?;
        Ok((self.major.select(&positions), self.minor.select(&positions)))
    }

    /// Check that the tables are parallel and the id map covers every row.
    pub fn validate(&self) -> Result<()> {
        let Self { major, minor, i2i } = self;
        let len = i2i.len();

        let check = |cond: bool, reason: &str| -> Result<()> {
            if cond {
                Ok(())
            } else {
                Err(DatasetError::InvalidCache {
                    reason: reason.to_owned(),
                }
                .into())
            }
        };

        check(
            major.labels.nrows() == len
                && major.label_lens.len() == len
                && major.videos.shape()[0] == len,
            "major table length does not match the id map",
        )?;
        check(
            minor.objects.len() == len
                && minor.actions.nrows() == len
                && minor.action_lens.len() == len,
            "minor table length does not match the id map",
        )?;

        let mut positions = i2i.values().copied().collect_vec();
        positions.sort_unstable();
        check(
            positions.into_iter().eq(0..len),
            "id map positions are not a permutation of the rows",
        )?;
        Ok(())
    }
}
