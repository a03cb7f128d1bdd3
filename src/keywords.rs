//! Keyword occurrence counting over abstracts.
//!
//! The vocabulary is a fixed list of machine-learning terms. Each keyword has
//! one or more synonym spellings; matches of any spelling count toward the
//! same keyword id. Matching is exact over lowercase ASCII word tokens: no
//! stemming, no partial words.

use std::collections::BTreeMap;

use tracing::instrument;

/// Dense keyword identifier (declaration order, from 0).
pub type KeywordId = i64;

/// Built-in vocabulary. Each row is one keyword; the first spelling is its display name.
const BUILTIN_KEYWORDS: &[&[&str]] = &[
    // general
    &["machine learning"],
    &["deep learning"],
    &["neural network", "neural net", "neural networks", "neural nets"],
    // techniques
    &["transformer", "transformers"],
    &["embedding", "embeddings"],
    &["cnn", "convolutional neural network", "cnns", "convolutional neural networks"],
    &["rnn", "recurrent neural network", "rnns", "recurrent neural networks"],
    &["vae", "variational autoencoder", "vaes", "variational autoencoders"],
    &[
        "gan",
        "generative adversarial network",
        "gans",
        "generative adversarial networks",
    ],
    &["lstm", "long short term memory", "lstms"],
    // domain terms
    &["backpropagation"],
    &["gradient descent"],
    &["activation function"],
    &["clustering"],
    &["training"],
    &["overfitting"],
    &["underfitting"],
    &["loss function", "cost function", "loss functions", "cost functions"],
    &["fine tuning"],
    &["dataset", "datasets"],
    &["classification"],
    &["regression"],
    &["segmentation"],
];

/// One vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    pub id: KeywordId,
    /// Display name (first synonym).
    pub name: String,
    /// Each synonym as its token sequence.
    pub synonyms: Vec<Vec<String>>,
}

/// Immutable keyword vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordVocabulary {
    keywords: Vec<Keyword>,
}

impl Default for KeywordVocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KeywordVocabulary {
    /// The built-in machine-learning vocabulary.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_groups(BUILTIN_KEYWORDS.iter().map(|group| group.iter().copied()))
    }

    /// Builds a vocabulary from synonym groups; ids follow iteration order.
    ///
    /// Spellings are tokenized the same way as counted text. Spellings with no
    /// word tokens are dropped, and a group left with no spellings keeps its id
    /// but never matches.
    #[must_use]
    pub fn from_groups<G, S>(groups: G) -> Self
    where
        G: IntoIterator,
        G::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = groups
            .into_iter()
            .zip(0..)
            .map(|(group, id)| {
                let spellings: Vec<String> =
                    group.into_iter().map(|s| s.as_ref().to_string()).collect();
                Keyword {
                    id,
                    name: spellings.first().cloned().unwrap_or_default(),
                    synonyms: spellings
                        .iter()
                        .map(|spelling| tokenize(spelling))
                        .filter(|tokens| !tokens.is_empty())
                        .collect(),
                }
            })
            .collect();
        Self { keywords }
    }

    /// All keywords in id order.
    #[must_use]
    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Counts keyword occurrences in `text`.
    ///
    /// Only keywords with a non-zero count appear in the result. Matches of
    /// different synonyms of one keyword add up, even where they overlap.
    ///
    /// ```
    /// use arxin_core::KeywordVocabulary;
    ///
    /// let vocabulary = KeywordVocabulary::from_groups([
    ///     ["neural network", "neural net", "neural networks", "neural nets"],
    /// ]);
    /// let counts = vocabulary.count("Neural networks use neural nets.");
    /// assert_eq!(counts.get(&0), Some(&2));
    /// ```
    #[must_use]
    #[instrument(skip_all, fields(chars = text.len()))]
    pub fn count(&self, text: &str) -> BTreeMap<KeywordId, u32> {
        let tokens = tokenize(text);
        let mut counts = BTreeMap::new();

        for keyword in &self.keywords {
            let total: usize = keyword
                .synonyms
                .iter()
                .map(|synonym| {
                    tokens
                        .windows(synonym.len())
                        .filter(|window| *window == synonym.as_slice())
                        .count()
                })
                .sum();
            if total > 0 {
                counts.insert(keyword.id, u32::try_from(total).unwrap_or(u32::MAX));
            }
        }

        counts
    }
}

/// Lowercases `text` and splits it into runs of ASCII letters.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
