use super::*;

/// A sample table loaded from a CSV file with a JSON vocabulary.
///
/// The CSV file has the header `id,label,object,action`, tokens separated by
/// whitespace, and lines starting with `#` are comments. The vocabulary file
/// is a JSON object mapping tokens to positive indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTextTable {
    table_path: PathBuf,
    samples: Vec<TextSample>,
    vocabulary: Vocabulary,
    max_label_len: usize,
    max_action_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct CsvRow {
    id: String,
    label: String,
    object: String,
    action: String,
}

impl CsvTextTable {
    pub fn load(table_file: impl AsRef<Path>, vocab_file: impl AsRef<Path>) -> Result<Self> {
        let table_file = table_file.as_ref();
        let vocab_file = vocab_file.as_ref();

        let rows: Vec<CsvRow> = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .comment(Some(b'#'))
            .trim(::csv::Trim::All)
            .from_path(table_file)
            .with_context(|| format!("failed to open sample table '{}'", table_file.display()))?
            .deserialize()
            .try_collect()
            .with_context(|| format!("failed to parse sample table '{}'", table_file.display()))?;

        let samples: Vec<_> = rows
            .into_iter()
            .map(|row| {
                let CsvRow {
                    id,
                    label,
                    object,
                    action,
                } = row;
                let split = |text: &str| text.split_whitespace().map(String::from).collect_vec();
                TextSample {
                    label: split(&label),
                    object: split(&object),
                    action: split(&action),
                    id,
                }
            })
            .collect();

        let vocabulary: Vocabulary = {
            let reader = BufReader::new(File::open(vocab_file).with_context(|| {
                format!("failed to open vocabulary file '{}'", vocab_file.display())
            })?);
            serde_json::from_reader(reader).with_context(|| {
                format!("failed to parse vocabulary file '{}'", vocab_file.display())
            })?
        };

        Self::new(table_file, samples, vocabulary)
    }

    /// Build a table from samples in memory. Length bounds are the maxima
    /// over the samples.
    pub fn new(
        table_path: impl Into<PathBuf>,
        samples: Vec<TextSample>,
        vocabulary: Vocabulary,
    ) -> Result<Self> {
        if let Some((token, &index)) = vocabulary.iter().find(|(_, index)| **index <= 0) {
            bail!(
                "token '{}' maps to {}, but indices must be positive as 0 is reserved for padding",
                token,
                index
            );
        }

        let max_label_len = samples.iter().map(|s| s.label.len()).max().unwrap_or(0);
        let max_action_len = samples.iter().map(|s| s.action.len()).max().unwrap_or(0);

        Ok(Self {
            table_path: table_path.into(),
            samples,
            vocabulary,
            max_label_len,
            max_action_len,
        })
    }
}

impl TextProcessor for CsvTextTable {
    fn table_path(&self) -> &Path {
        &self.table_path
    }

    fn samples(&self) -> &[TextSample] {
        &self.samples
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn max_label_len(&self) -> usize {
        self.max_label_len
    }

    fn max_action_len(&self) -> usize {
        self.max_action_len
    }
}
