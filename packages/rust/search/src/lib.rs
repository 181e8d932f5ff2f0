//! Web search with a content-addressed response cache.
//!
//! This crate owns the three steps between "we need facts about a subject"
//! and "we have a bounded context string":
//! - [`provider`] — the search provider client behind [`SearchBackend`]
//! - [`cache`] — the TTL-scoped [`QueryCache`] in front of the provider
//! - [`compactor`] — greedy assembly of ranked hits into one string

pub mod cache;
pub mod compactor;
pub mod provider;

pub use cache::{QueryCache, normalize_query, query_hash};
pub use compactor::combine;
pub use provider::{MockSearch, SearchBackend, TavilySearch};
