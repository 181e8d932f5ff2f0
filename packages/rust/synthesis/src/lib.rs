//! Structured synthesis for Dealboard.
//!
//! Takes compacted search context, runs it through a generation provider,
//! and turns the completion into schema-validated data: extraction
//! ([`extract`]), the provider client ([`client`]), the retry loop
//! ([`synthesizer`]), and token/cost accounting ([`usage`]).

pub mod client;
pub mod extract;
pub mod synthesizer;
pub mod usage;

pub use client::{Completion, GenerationBackend, GenerationRequest, MockGeneration, OpenRouterClient};
pub use extract::{ExtractOptions, extract_json, extract_json_with, strip_citations};
pub use synthesizer::{SynthesisOptions, SynthesisOutcome, Synthesizer};
pub use usage::UsageAccumulator;
