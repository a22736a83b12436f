//! Pairing of normalized clips with their annotations.

use crate::{
    common::*,
    text::{TextEncoding, TextSample, TextVectorizer, VectorizeMode},
};

/// A clip and its vectorized annotations before packing.
///
/// The label and action indices are kept unpadded until the dataset-wide
/// widths are known.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub label: Vec<i64>,
    pub label_len: i64,
    pub video: Array4<f32>,
    pub object: TextEncoding,
    pub action: Vec<i64>,
    pub action_len: i64,
}

/// Combine a normalized clip with the vectorized text of the same sample.
///
/// The label is the object phrase followed by the action phrase with one
/// shared token, so its length is `action_len + object_len - 1`.
pub fn assemble(
    video: Array4<f32>,
    sample: &TextSample,
    vectorizer: &TextVectorizer<'_>,
    object_mode: VectorizeMode,
) -> Result<PendingRecord> {
    let TextSample {
        label,
        object,
        action,
        ..
    } = sample;

    let object_len = object.len() as i64;
    let action_len = action.len() as i64;
    let label_len = action_len + object_len - 1;

    let object = vectorizer.vectorize(object, object_mode)?;
    let action = vectorizer.indices(action)?;
    let label = vectorizer.indices(label)?;

    Ok(PendingRecord {
        label,
        label_len,
        video,
        object,
        action,
        action_len,
    })
}
