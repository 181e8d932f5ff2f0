//! Data-driven registry of investor name variants.
//!
//! Rows live in the `investor_aliases` table: misspellings, nicknames,
//! and honorifics mapped to a canonical slug. The migration seeds the
//! common ones; `dealboard aliases add` extends the table at runtime.

use std::collections::HashMap;

use dealboard_shared::Result;
use dealboard_storage::Storage;

/// Source tag for hand-maintained alias rows.
pub const SOURCE_CURATED: &str = "curated";
/// Source tag for rows recorded automatically from slug derivation.
pub const SOURCE_AUTO: &str = "auto";

/// In-memory view of the alias table: normalized name variant to
/// canonical slug.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    by_alias: HashMap<String, String>,
}

impl AliasRegistry {
    /// Load every alias row from storage.
    pub async fn load(storage: &Storage) -> Result<Self> {
        let rows = storage.list_aliases().await?;
        let by_alias = rows
            .into_iter()
            .map(|row| (row.alias, row.slug))
            .collect();
        Ok(Self { by_alias })
    }

    /// Build a registry from `(alias, slug)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let by_alias = pairs
            .iter()
            .map(|(alias, slug)| (alias.to_string(), slug.to_string()))
            .collect();
        Self { by_alias }
    }

    /// Canonical slug for a normalized name variant, when one is known.
    pub fn canonical_slug(&self, normalized: &str) -> Option<&str> {
        self.by_alias.get(normalized).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }
}
