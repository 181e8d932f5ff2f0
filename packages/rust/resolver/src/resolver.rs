//! Create-or-get resolution of investor names.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, instrument};

use dealboard_shared::{DealboardError, Result};
use dealboard_storage::Storage;

use crate::aliases::AliasRegistry;
use crate::names::{derive_slug, normalize_name};

/// Resolves investor display names to stable ids for the duration of one
/// enrichment run.
///
/// The map is seeded with every stored investor under both slug and
/// normalized name. Lookups and creation run under a single async mutex,
/// so concurrent workers within a run converge on one id per name.
/// Independent processes can still race on brand-new names; the UNIQUE
/// slug constraint collapses exact-slug duplicates, differing spellings
/// are left for alias curation.
pub struct EntityResolver {
    storage: Arc<Storage>,
    aliases: AliasRegistry,
    known: Mutex<HashMap<String, String>>,
}

impl EntityResolver {
    /// Build a resolver, preloading the alias table and every stored
    /// investor.
    pub async fn new(storage: Arc<Storage>) -> Result<Self> {
        let aliases = AliasRegistry::load(&storage).await?;
        let mut known = HashMap::new();
        for investor in storage.list_investors().await? {
            known.insert(investor.slug.clone(), investor.id.clone());
            known.insert(normalize_name(&investor.name), investor.id);
        }
        debug!(
            aliases = aliases.len(),
            investors = known.len(),
            "resolver primed"
        );

        Ok(Self {
            storage,
            aliases,
            known: Mutex::new(known),
        })
    }

    /// Resolve a candidate name to an investor id, creating the investor
    /// when nothing matches.
    #[instrument(skip(self))]
    pub async fn resolve(&self, name: &str) -> Result<String> {
        let normalized = normalize_name(name);
        if normalized.is_empty() {
            return Err(DealboardError::validation("investor name is empty"));
        }

        let mut known = self.known.lock().await;

        let canonical = self.aliases.canonical_slug(&normalized);
        if let Some(slug) = canonical {
            if let Some(id) = known.get(slug) {
                return Ok(id.clone());
            }
        }
        if let Some(id) = known.get(&normalized) {
            return Ok(id.clone());
        }

        // A curated alias overrides slug derivation entirely.
        let slug = match canonical {
            Some(slug) => slug.to_string(),
            None => {
                let derived = derive_slug(&normalized);
                // Punctuation-only names would all share the empty slug
                // and collapse onto a single row.
                if derived.is_empty() {
                    return Err(DealboardError::validation(format!(
                        "cannot derive a slug from investor name {name:?}"
                    )));
                }
                derived
            }
        };
        if let Some(id) = known.get(&slug) {
            return Ok(id.clone());
        }

        let investor = self
            .storage
            .get_or_create_investor(name.trim(), &slug, true)
            .await?;
        debug!(slug = %investor.slug, "resolved by creation");

        known.insert(slug, investor.id.clone());
        known.insert(normalized, investor.id.clone());
        Ok(investor.id)
    }
}
