//! Encoding and decoding between records and the persisted row shape.
//!
//! Every backend stores the same flat shape: a key (the player id) plus
//! three nullable value fields, captured here as [`RecordRow`]. The codec
//! owns the encode/decode rules so the backends only differ in how they
//! physically read and write rows.
//!
//! # Decode leniency
//!
//! Persisted data must stay forward- and backward-tolerant of registry
//! changes, so decode never fails on unknown identifiers:
//! - an unknown activation mode falls back to the configured default
//! - an unknown category identifier is silently skipped
//! - an unknown or absent pattern identifier falls back to the configured
//!   default pattern

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::lookup::{CategoryLookup, PatternLookup};
use crate::record::{ActivationMode, PlayerRecord};

/// Separator between category identifiers in the persisted blob.
/// Category identifiers must not contain it.
pub const CATEGORY_DELIMITER: char = ',';

/// The flat persisted shape of one record, minus its key.
///
/// `None` means the field was never persisted. An empty disabled-category
/// set encodes as `None`, not as an empty string, because the two are
/// indistinguishable on decode otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    /// Stable identifier of the activation mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_mode: Option<String>,
    /// Delimiter-joined disabled category identifiers, sorted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_categories: Option<String>,
    /// Identifier of the selected behavior pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_id: Option<String>,
}

/// Applies the encode/decode rules against explicitly passed lookups.
#[derive(Clone)]
pub struct RecordCodec {
    categories: Arc<dyn CategoryLookup>,
    patterns: Arc<dyn PatternLookup>,
    default_mode: ActivationMode,
    default_pattern_id: Option<String>,
}

impl RecordCodec {
    /// Create a codec over the given lookup services and decode defaults.
    pub fn new(
        categories: Arc<dyn CategoryLookup>,
        patterns: Arc<dyn PatternLookup>,
        default_mode: ActivationMode,
        default_pattern_id: Option<String>,
    ) -> Self {
        Self {
            categories,
            patterns,
            default_mode,
            default_pattern_id,
        }
    }

    /// Flatten a record into its persisted row shape.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidRecord`] if a disabled-category
    /// identifier contains the delimiter character.
    pub fn encode(&self, record: &PlayerRecord) -> Result<RecordRow, StorageError> {
        for id in record.disabled_categories() {
            if id.contains(CATEGORY_DELIMITER) {
                return Err(StorageError::InvalidRecord {
                    message: format!("category id {id:?} contains the delimiter"),
                });
            }
        }

        let disabled = record.disabled_categories();
        let disabled_categories = if disabled.is_empty() {
            None
        } else {
            // BTreeSet iteration order makes the join canonical.
            let mut joined = String::new();
            for id in disabled {
                if !joined.is_empty() {
                    joined.push(CATEGORY_DELIMITER);
                }
                joined.push_str(id);
            }
            Some(joined)
        };

        Ok(RecordRow {
            activation_mode: Some(record.activation_mode().id().to_string()),
            disabled_categories,
            pattern_id: record.pattern_id().map(str::to_string),
        })
    }

    /// Apply a persisted row to a record and clear its dirty flag.
    ///
    /// Absent fields leave the record untouched.
    pub fn decode(&self, record: &mut PlayerRecord, row: &RecordRow) {
        if let Some(mode_id) = &row.activation_mode {
            record.activation_mode =
                ActivationMode::from_id(mode_id).unwrap_or_else(|| {
                    tracing::warn!(
                        mode = mode_id.as_str(),
                        "Unknown activation mode, falling back to default"
                    );
                    self.default_mode
                });
        }

        if let Some(joined) = &row.disabled_categories {
            record.disabled_categories.clear();
            for id in joined.split(CATEGORY_DELIMITER) {
                if let Some(canonical) = self.categories.resolve(id) {
                    record.disabled_categories.insert(canonical);
                } else {
                    tracing::debug!(category = id, "Skipping unregistered category");
                }
            }
        }

        if let Some(pattern_id) = &row.pattern_id {
            record.pattern_id = self
                .patterns
                .resolve(pattern_id)
                .map(Some)
                .unwrap_or_else(|| {
                    tracing::warn!(
                        pattern = pattern_id.as_str(),
                        "Unknown pattern, falling back to default"
                    );
                    self.default_pattern()
                });
        }

        // Freshly decoded state is by definition in sync with the backend.
        record.mark_clean();
    }

    fn default_pattern(&self) -> Option<String> {
        self.default_pattern_id
            .as_deref()
            .and_then(|id| self.patterns.resolve(id))
    }
}

impl std::fmt::Debug for RecordCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCodec")
            .field("default_mode", &self.default_mode)
            .field("default_pattern_id", &self.default_pattern_id)
            .finish_non_exhaustive()
    }
}
