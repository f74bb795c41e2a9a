//! Enrich - formula variable enrichment over hierarchical record trees
//!
//! Given formula groups from the formula parser (each formula split into
//! plain variables and aggregation clauses) and a record tree, this library
//! resolves every variable to concrete values, per formula and per entity
//! instance, ready for numeric evaluation.
//!
//! # Features
//!
//! - Plain variables resolved by first match inside the instance subtree
//! - Aggregations scoped globally or to the instance subtree
//! - Filter expressions whose right-hand variables are resolved per instance
//! - Explicit empty entries when an aggregation matches nothing
//! - Optional parallel enrichment across entity instances
//!
//! # Example
//!
//! ```no_run
//! use royalbit_enrich::config::EnrichConfig;
//! use royalbit_enrich::core::Enricher;
//! use royalbit_enrich::parser::{parse_formula_groups, parse_tree};
//! use royalbit_enrich::tree::PathFilter;
//! use std::path::Path;
//!
//! let groups = parse_formula_groups(Path::new("extract_formulas.json"))?;
//! let tree = parse_tree(Path::new("data_tree.json"))?;
//!
//! let enricher = Enricher::from_config(PathFilter, &EnrichConfig::default())?;
//! let results = enricher.enrich(&groups, &tree)?;
//! println!("Enriched instances: {}", results.len());
//! # Ok::<(), royalbit_enrich::error::EnrichError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod parser;
pub mod resolver;
pub mod tree;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use crate::core::{enrich, Enricher};
pub use error::{EnrichError, EnrichResult};
pub use resolver::FilterVariableResolver;
pub use types::{
    AggregatedValue, AggregationClause, EnrichmentBundle, EnrichmentResult, EntityInstance,
    FilterBinding, Formula, FormulaGroup, ResolvedValueEntry,
};
