//! Core domain types for Dealboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CacheConfig;

/// Generate a new time-sortable row identifier (UUID v7, string form).
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// The kind of subject a search or enrichment run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Product,
    Investor,
    Season,
}

impl EntityType {
    /// Stable lowercase name used in DB columns and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Investor => "investor",
            Self::Season => "season",
        }
    }

    /// Cache TTL for this entity type, in days. Products churn (follow-on
    /// rounds, retail launches), investor bios barely move, seasons are
    /// effectively static once aired.
    pub fn ttl_days(&self, cache: &CacheConfig) -> u32 {
        match self {
            Self::Product => cache.product_ttl_days,
            Self::Investor => cache.investor_ttl_days,
            Self::Season => cache.season_ttl_days,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "product" => Ok(Self::Product),
            "investor" => Ok(Self::Investor),
            "season" => Ok(Self::Season),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// One ranked document from the search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document title.
    pub title: String,
    /// Source URL.
    pub url: String,
    /// Extracted text content.
    pub content: String,
    /// Provider relevance score, when given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// A cached search response, stored in the database keyed by query hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSearchResult {
    /// Unique row identifier (UUID v7).
    pub id: String,
    /// Subject kind the query was issued for.
    pub entity_type: EntityType,
    /// Subject row id, when the query targeted a known row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Subject display name at query time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    /// The query as sent to the provider.
    pub query: String,
    /// SHA-256 hex of the normalized query.
    pub query_hash: String,
    /// Ranked documents, provider order preserved.
    pub results: Vec<SearchHit>,
    /// When the provider was called.
    pub fetched_at: DateTime<Utc>,
    /// When this row stops being served; `None` means never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Token usage
// ---------------------------------------------------------------------------

/// Prompt/completion token counts for one or more generation calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

// ---------------------------------------------------------------------------
// Domain records
// ---------------------------------------------------------------------------

/// A product pitched on the show.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique row identifier (UUID v7).
    pub id: String,
    /// Display name.
    pub name: String,
    /// URL-safe unique slug.
    pub slug: String,
    /// Season the pitch aired in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<i64>,
    /// Episode within the season.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<i64>,
    /// Short description of the product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Category label (food, fitness, tech, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Company website.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Amount asked on air, USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_amount: Option<f64>,
    /// Equity offered on air, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_equity: Option<f64>,
    /// Amount agreed on air, USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_amount: Option<f64>,
    /// Equity agreed on air, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_equity: Option<f64>,
    /// Deal outcome: "funded", "no_deal", "fell_through", or unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_status: Option<String>,
    /// When enrichment last completed for this product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A canonical investor record. Created once per real-world party;
/// never deleted by the enrichment engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investor {
    /// Unique row identifier (UUID v7).
    pub id: String,
    /// Canonical display name.
    pub name: String,
    /// URL-safe unique slug, also the dedup key.
    pub slug: String,
    /// Short biography.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// True when the resolver created this row from an unrecognized
    /// name rather than a curated import.
    #[serde(default)]
    pub is_auto_created: bool,
    /// When enrichment last completed for this investor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product↔investor deal participation link. Replaced wholesale on
/// each enrichment run for the product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInvestor {
    pub product_id: String,
    pub investor_id: String,
    /// This investor's share of the deal amount, USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// This investor's share of the equity, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity_percent: Option<f64>,
    /// Whether this investor led the deal.
    #[serde(default)]
    pub is_lead: bool,
}
