use super::*;
use crate::error::DatasetError;

/// The encoding applied to a token sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorizeMode {
    /// The index of the first token only.
    Toy,
    /// All indices without padding.
    Simple,
    /// Indices zero padded to the maximum action length.
    Action,
    /// Indices zero padded to the maximum label length.
    Label,
}

/// A vectorized token sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    Scalar(i64),
    Sequence(Vec<i64>),
    Padded { values: Vec<i64>, len: usize },
}

impl TextEncoding {
    /// The number of encoded tokens, excluding padding.
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Sequence(values) => values.len(),
            Self::Padded { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored values, including padding.
    pub fn values(&self) -> &[i64] {
        match self {
            Self::Scalar(value) => std::slice::from_ref(value),
            Self::Sequence(values) => values,
            Self::Padded { values, .. } => values,
        }
    }
}

/// Converts token sequences to vocabulary indices.
#[derive(Debug, Clone, Copy)]
pub struct TextVectorizer<'a> {
    vocabulary: &'a Vocabulary,
    max_label_len: usize,
    max_action_len: usize,
}

impl<'a> TextVectorizer<'a> {
    pub fn new(vocabulary: &'a Vocabulary, max_label_len: usize, max_action_len: usize) -> Self {
        Self {
            vocabulary,
            max_label_len,
            max_action_len,
        }
    }

    pub fn from_processor(processor: &'a dyn TextProcessor) -> Self {
        Self::new(
            processor.vocabulary(),
            processor.max_label_len(),
            processor.max_action_len(),
        )
    }

    /// Look up every token.
    pub fn indices<S>(&self, tokens: &[S]) -> Result<Vec<i64>>
    where
        S: AsRef<str>,
    {
        tokens
            .iter()
            .map(|token| {
                let token = token.as_ref();
                self.vocabulary.get(token).copied().ok_or_else(|| {
                    Error::from(DatasetError::MissingVocabularyEntry {
                        token: token.to_owned(),
                    })
                })
            })
            .try_collect()
    }

    pub fn vectorize<S>(&self, tokens: &[S], mode: VectorizeMode) -> Result<TextEncoding>
    where
        S: AsRef<str>,
    {
        let encoding = match mode {
            VectorizeMode::Toy => {
                let first = tokens.first().ok_or(DatasetError::EmptySequence)?;
                let index = self.indices(&[first.as_ref()])?[0];
                TextEncoding::Scalar(index)
            }
            VectorizeMode::Simple => TextEncoding::Sequence(self.indices(tokens)?),
            VectorizeMode::Action | VectorizeMode::Label => {
                let width = if mode == VectorizeMode::Action {
                    self.max_action_len
                } else {
                    self.max_label_len
                };
                let indices = self.indices(tokens)?;
                TextEncoding::Padded {
                    values: pad(&indices, width)?,
                    len: indices.len(),
                }
            }
        };
        Ok(encoding)
    }
}

/// Zero pad `indices` to `width`.
pub fn pad(indices: &[i64], width: usize) -> Result<Vec<i64>> {
    if indices.len() > width {
        return Err(DatasetError::SequenceTooLong {
            len: indices.len(),
            width,
        }
        .into());
    }
    let mut padded = vec![0; width];
    padded[..indices.len()].copy_from_slice(indices);
    Ok(padded)
}
