//! Shared types, error model, and configuration for Dealboard.
//!
//! This crate is the foundation depended on by all other Dealboard crates.
//! It provides:
//! - [`DealboardError`] — the unified error type
//! - Domain types ([`Product`], [`Investor`], [`CachedSearchResult`], ...)
//! - Configuration ([`AppConfig`], [`EnrichSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, DefaultsConfig, EnrichSettings, OpenRouterConfig, PricingEntry,
    SearchConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_db_path, validate_openrouter_api_key, validate_search_api_key,
};
pub use error::{DealboardError, Result};
pub use types::{
    CachedSearchResult, EntityType, Investor, Product, ProductInvestor, SearchHit, TokenUsage,
    new_id,
};
