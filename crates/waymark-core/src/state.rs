//! Applied state: the ordered record of executed migration identifiers.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Ordered record of applied migration identifiers.
///
/// The persisted form is exactly `{ "appliedIdentifiers": ["...", ...] }`.
/// Unknown fields, a missing field, a non-array value or non-string entries
/// are rejected when parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AppliedState {
    /// Identifiers in application order.
    pub applied_identifiers: Vec<String>,
}

/// A repeated identifier and the 1-indexed positions where it occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    /// The repeated identifier.
    pub id: String,
    /// First occurrence.
    pub first: usize,
    /// Second occurrence.
    pub second: usize,
}

impl AppliedState {
    /// Create an empty state.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a state from identifiers in application order.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            applied_identifiers: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of recorded identifiers.
    pub fn len(&self) -> usize {
        self.applied_identifiers.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.applied_identifiers.is_empty()
    }

    /// Recorded identifiers in application order.
    pub fn ids(&self) -> &[String] {
        &self.applied_identifiers
    }

    /// Whether `id` has been recorded.
    pub fn contains(&self, id: &str) -> bool {
        self.applied_identifiers.iter().any(|applied| applied == id)
    }

    /// Append an identifier.
    pub fn push(&mut self, id: impl Into<String>) {
        self.applied_identifiers.push(id.into());
    }

    /// The first repeated identifier, if any.
    pub fn first_duplicate(&self) -> Option<Duplicate> {
        first_duplicate(self.applied_identifiers.iter().map(String::as_str))
    }

    /// Strictly parse a persisted document.
    ///
    /// `path` is only used to label errors.
    pub fn parse_json(bytes: &[u8], path: &Path) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialize to the persisted document form.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec_pretty(self).map_err(StoreError::Serialize)
    }
}

/// Find the first identifier that occurs twice, by position of its second
/// occurrence.
pub(crate) fn first_duplicate<'a, I>(ids: I) -> Option<Duplicate>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (idx, id) in ids.into_iter().enumerate() {
        if let Some(&first) = seen.get(id) {
            return Some(Duplicate {
                id: id.to_string(),
                first: first + 1,
                second: idx + 1,
            });
        }
        seen.insert(id, idx);
    }
    None
}
