//! Annotation tables and token vectorization.

mod table;
mod vectorizer;

pub use table::*;
pub use vectorizer::*;

use crate::common::*;

/// Token to index map. The index `0` is reserved for padding.
pub type Vocabulary = HashMap<String, i64>;

/// One annotated clip of the sample table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSample {
    pub id: String,
    /// The full sentence. It is the object phrase followed by the action
    /// phrase, sharing one boundary token.
    pub label: Vec<String>,
    pub object: Vec<String>,
    pub action: Vec<String>,
}

/// The provider of the sample table, vocabulary and length bounds.
pub trait TextProcessor
where
    Self: Debug + Send + Sync,
{
    /// The path of the sample table. The cache name is derived from it.
    fn table_path(&self) -> &Path;

    /// The samples in table order.
    fn samples(&self) -> &[TextSample];

    fn vocabulary(&self) -> &Vocabulary;

    /// The maximum number of label tokens.
    fn max_label_len(&self) -> usize;

    /// The maximum number of action tokens.
    fn max_action_len(&self) -> usize;
}
