//! arXiv category taxonomy.
//!
//! Maps category codes (`cs.CR`, `hep-th`, ...) to the stable integer ids
//! stored in the `category` table. The taxonomy is loaded once per process
//! and never changes afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Category list compiled into the binary.
const BUNDLED_CATEGORIES_JSON: &str = include_str!("../data/categories.json");

/// One taxonomy entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// Errors loading a taxonomy.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    /// The taxonomy file could not be read.
    #[error("failed to read category file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The taxonomy is not a JSON array of `{id, code, name}` objects.
    #[error("invalid category JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Two entries share a code.
    #[error("duplicate category code '{0}'")]
    DuplicateCode(String),

    /// Two entries share an id.
    #[error("duplicate category id {0}")]
    DuplicateId(i64),

    /// No entries at all.
    #[error("category taxonomy is empty")]
    Empty,
}

/// Immutable code-to-id lookup.
#[derive(Debug, Clone)]
pub struct CategoryTaxonomy {
    categories: Vec<Category>,
    by_code: HashMap<String, i64>,
}

impl CategoryTaxonomy {
    /// Loads the taxonomy shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError`] if the bundled data is invalid.
    pub fn bundled() -> Result<Self, TaxonomyError> {
        Self::from_json(BUNDLED_CATEGORIES_JSON)
    }

    /// Loads a taxonomy from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::Io`] when the file cannot be read, or a
    /// validation error for bad content.
    #[instrument(fields(path = %path.display()))]
    pub fn from_path(path: &Path) -> Result<Self, TaxonomyError> {
        let raw = fs::read_to_string(path).map_err(|source| TaxonomyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parses a JSON array of categories.
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError`] for malformed JSON, duplicates, or an empty list.
    pub fn from_json(raw: &str) -> Result<Self, TaxonomyError> {
        let categories: Vec<Category> = serde_json::from_str(raw)?;
        Self::from_categories(categories)
    }

    /// Builds a taxonomy from already-parsed entries.
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError`] for duplicate codes or ids, or an empty list.
    pub fn from_categories(categories: Vec<Category>) -> Result<Self, TaxonomyError> {
        if categories.is_empty() {
            return Err(TaxonomyError::Empty);
        }

        let mut by_code = HashMap::with_capacity(categories.len());
        let mut ids = HashMap::with_capacity(categories.len());
        for category in &categories {
            if by_code.insert(category.code.clone(), category.id).is_some() {
                return Err(TaxonomyError::DuplicateCode(category.code.clone()));
            }
            if ids.insert(category.id, ()).is_some() {
                return Err(TaxonomyError::DuplicateId(category.id));
            }
        }

        debug!(count = categories.len(), "loaded category taxonomy");
        Ok(Self {
            categories,
            by_code,
        })
    }

    /// Returns the id for a category code.
    #[must_use]
    pub fn resolve(&self, code: &str) -> Option<i64> {
        self.by_code.get(code).copied()
    }

    /// All entries in load order.
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
