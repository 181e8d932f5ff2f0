//! Enrichment orchestration for Dealboard.
//!
//! Ties the search cache, synthesis, and resolver layers into the
//! wave-based `enrich` flows and owns the prompt and payload shapes
//! they exchange.

pub mod pipeline;
pub mod prompts;
pub mod schemas;

pub use pipeline::{
    EnrichmentContext, EnrichmentSummary, ProgressReporter, SilentProgress, enrich_investors,
    enrich_products,
};
pub use schemas::{InvestorProfile, InvestorShare, ProductEnrichment};
