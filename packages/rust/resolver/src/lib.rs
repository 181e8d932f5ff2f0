//! Investor name resolution for Dealboard.
//!
//! Synthesis output refers to investors by whatever spelling the model
//! picked up from the web. This crate maps those candidate names onto
//! stable investor rows: alias lookup, slug derivation, and run-scoped
//! create-or-get.

pub mod aliases;
pub mod names;
pub mod resolver;

pub use aliases::{AliasRegistry, SOURCE_AUTO, SOURCE_CURATED};
pub use names::{derive_slug, normalize_name};
pub use resolver::EntityResolver;
