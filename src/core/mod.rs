//! Core enrichment engine

pub mod enricher;

pub use enricher::Enricher;

use crate::config::DEFAULT_VARIABLE_PATTERN;
use crate::error::EnrichResult;
use crate::resolver::FilterVariableResolver;
use crate::tree::TreeFilter;
use crate::types::{EnrichmentResult, FormulaGroup};

/// Enrich `groups` against `tree` with the default filter-variable pattern,
/// sequentially.
///
/// # Example
///
/// ```
/// use royalbit_enrich::core::enrich;
/// use royalbit_enrich::tree::{DataTree, Node, PathFilter};
/// use royalbit_enrich::types::{Formula, FormulaGroup};
/// use serde_json::json;
///
/// let tree = DataTree::new(vec![Node::new("e1").with_field("x", json!(10))]);
/// let groups = vec![FormulaGroup::new("Entity")
///     .with_formula(Formula::new("Entity.a", "x").with_var("x"))
///     .with_instance("e1")];
///
/// let results = enrich(&groups, &tree, PathFilter)?;
/// assert_eq!(results.len(), 1);
/// # Ok::<(), royalbit_enrich::EnrichError>(())
/// ```
pub fn enrich<F: TreeFilter>(
    groups: &[FormulaGroup],
    tree: &F::Tree,
    filter: F,
) -> EnrichResult<Vec<EnrichmentResult>> {
    let resolver = FilterVariableResolver::new(DEFAULT_VARIABLE_PATTERN)?;
    Enricher::new(filter, resolver).enrich(groups, tree)
}
