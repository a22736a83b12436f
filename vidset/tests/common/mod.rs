#![allow(dead_code)]

use anyhow::Result;
use ndarray::Array3;
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use vidset::{
    stream::{Frame, FrameShape, FrameSource, FrameStream},
    text::Vocabulary,
    CsvTextTable, TextSample,
};

/// Serves clips from memory. A clip claims `claimed` frames in its metadata
/// but decodes only `actual` of them. Every pixel of frame `i` is `i % 256`.
/// Ids without a clip fail to open.
#[derive(Debug, Default)]
pub struct SyntheticSource {
    clips: HashMap<String, (usize, usize)>,
    failures: HashMap<String, usize>,
    pub num_opened: AtomicUsize,
    pub open_now: Arc<AtomicUsize>,
    pub max_open: Arc<AtomicUsize>,
}

impl SyntheticSource {
    pub fn new<'a>(clips: impl IntoIterator<Item = (&'a str, usize, usize)>) -> Self {
        Self {
            clips: clips
                .into_iter()
                .map(|(id, claimed, actual)| (id.to_string(), (claimed, actual)))
                .collect(),
            ..Default::default()
        }
    }

    /// Make frame `index` of clip `id` fail to decode.
    pub fn fail_at(mut self, id: &str, index: usize) -> Self {
        self.failures.insert(id.to_string(), index);
        self
    }
}

impl FrameSource for SyntheticSource {
    fn open(&self, path: &Path, shape: FrameShape) -> Result<Box<dyn FrameStream>> {
        let id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap()
            .to_string();
        let (claimed, actual) = *self
            .clips
            .get(&id)
            .ok_or_else(|| anyhow::format_err!("no such clip '{}'", id))?;

        self.num_opened.fetch_add(1, Ordering::SeqCst);
        let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(SyntheticStream {
            claimed,
            actual,
            fail_at: self.failures.get(&id).copied(),
            cursor: 0,
            shape,
            open_now: self.open_now.clone(),
        }))
    }
}

struct SyntheticStream {
    claimed: usize,
    actual: usize,
    fail_at: Option<usize>,
    cursor: usize,
    shape: FrameShape,
    open_now: Arc<AtomicUsize>,
}

impl FrameStream for SyntheticStream {
    fn total_frames(&self) -> usize {
        self.claimed
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.actual {
            return Ok(None);
        }
        if self.fail_at == Some(self.cursor) {
            anyhow::bail!("corrupt frame {}", self.cursor);
        }
        let FrameShape {
            height,
            width,
            channels,
        } = self.shape;
        let frame = Array3::from_elem((height, width, channels), (self.cursor % 256) as u8);
        self.cursor += 1;
        Ok(Some(frame))
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.open_now.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(String::from).collect()
}

/// A sample whose label is `object` followed by `action` sharing the
/// action's first token.
pub fn sample(id: &str, object: &str, action: &str) -> TextSample {
    let object = tokens(object);
    let action = tokens(action);
    let label = object
        .iter()
        .chain(action.iter().skip(1))
        .cloned()
        .collect();
    TextSample {
        id: id.into(),
        label,
        object,
        action,
    }
}

pub fn vocabulary(samples: &[TextSample]) -> Vocabulary {
    let mut vocabulary = Vocabulary::new();
    samples
        .iter()
        .flat_map(|sample| sample.label.iter().chain(&sample.object).chain(&sample.action))
        .for_each(|token| {
            let next = vocabulary.len() as i64 + 1;
            vocabulary.entry(token.clone()).or_insert(next);
        });
    vocabulary
}

pub fn text_table(table_path: &Path, samples: Vec<TextSample>) -> Result<CsvTextTable> {
    let vocabulary = vocabulary(&samples);
    CsvTextTable::new(table_path, samples, vocabulary)
}
