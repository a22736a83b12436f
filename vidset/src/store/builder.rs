use super::*;
use crate::{assemble::PendingRecord, text::pad};

/// Accumulates accepted records during one construction and packs them.
///
/// Records are buffered unpadded. [finish](Self::finish) computes the label
/// and action widths over all accepted records and pads every row to them.
#[derive(Debug)]
pub struct DatasetBuilder {
    video_dim: [usize; 4],
    records: Vec<PendingRecord>,
    i2i: IndexMap<String, usize>,
}

impl DatasetBuilder {
    /// `video_dim` is the `[channels, depth, height, width]` shape of every
    /// stored clip.
    pub fn new(video_dim: [usize; 4]) -> Self {
        Self {
            video_dim,
            records: vec![],
            i2i: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append the record of clip `id` and return its position.
    pub fn push(&mut self, id: &str, record: PendingRecord) -> Result<usize> {
        ensure!(
            record.video.shape() == self.video_dim,
            "expect video shape {:?}, but get {:?}",
            self.video_dim,
            record.video.shape()
        );
        if self.i2i.contains_key(id) {
            return Err(DatasetError::DuplicateId { id: id.to_owned() }.into());
        }

        let position = self.records.len();
        self.i2i.insert(id.to_owned(), position);
        self.records.push(record);
        Ok(position)
    }

    pub fn finish(self) -> Result<PackedDataset> {
        let Self {
            video_dim: [c, t, h, w],
            records,
            i2i,
        } = self;
        let len = records.len();

        let label_width = records.iter().map(|r| r.label.len()).max().unwrap_or(0);
        let action_width = records.iter().map(|r| r.action.len()).max().unwrap_or(0);

        let mut labels = Array2::zeros((len, label_width));
        let mut label_lens = Array1::zeros(len);
        let mut videos = Array5::zeros((len, c, t, h, w));
        let mut objects = Vec::with_capacity(len);
        let mut actions = Array2::zeros((len, action_width));
        let mut action_lens = Array1::zeros(len);

        for (index, record) in records.into_iter().enumerate() {
            let PendingRecord {
                label,
                label_len,
                video,
                object,
                action,
                action_len,
            } = record;

            labels
                .row_mut(index)
                .assign(&Array1::from(pad(&label, label_width)?));
            label_lens[index] = label_len;
            videos.index_axis_mut(Axis(0), index).assign(&video);
            objects.push(object);
            actions
                .row_mut(index)
                .assign(&Array1::from(pad(&action, action_width)?));
            action_lens[index] = action_len;
        }

        let dataset = PackedDataset {
            major: MajorTable {
                labels,
                label_lens,
                videos,
            },
            minor: MinorTable {
                objects,
                actions,
                action_lens,
            },
            i2i,
        };
        debug_assert!(dataset.validate().is_ok());
        Ok(dataset)
    }
}
