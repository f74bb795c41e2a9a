//! In-memory tree filter over [`DataTree`]

use super::expression::FilterExpression;
use super::{DataTree, FilterRequest, MatchedNode, Node, TreeFilter};
use crate::error::{EnrichError, EnrichResult};
use serde_json::Value;
use tracing::debug;

/// Searches a [`DataTree`] by field path
#[derive(Debug, Clone, Copy, Default)]
pub struct PathFilter;

impl PathFilter {
    pub fn new() -> Self {
        Self
    }

    fn collect_matches(
        records: &[&Node],
        variables: &[String],
        filter: Option<&FilterExpression>,
    ) -> Vec<MatchedNode> {
        records
            .iter()
            .filter(|record| !record.fields.is_empty())
            .filter(|record| filter.map_or(true, |f| f.matches(record)))
            .filter_map(|record| {
                let values: Vec<Option<Value>> = variables
                    .iter()
                    .map(|v| record.field(v).map(|field| field.resolved_value()))
                    .collect();
                if values.iter().all(Option::is_none) {
                    return None;
                }
                Some(MatchedNode::new(
                    record.id.clone(),
                    values
                        .into_iter()
                        .map(|v| v.unwrap_or(Value::Null))
                        .collect(),
                ))
            })
            .collect()
    }
}

/// First value of `variable` in `node` or below, pre-order. A child whose
/// `path` names the variable contributes the first field of its first item.
fn first_value(node: &Node, variable: &str) -> Option<Value> {
    if let Some(field) = node.field(variable) {
        return Some(field.resolved_value());
    }
    for child in &node.data {
        if child.path.as_deref() == Some(variable) {
            if let Some(field) = child.data.first().and_then(|item| item.fields.first()) {
                return Some(field.resolved_value());
            }
        }
    }
    node.data.iter().find_map(|child| first_value(child, variable))
}

impl TreeFilter for PathFilter {
    type Tree = DataTree;

    fn lookup_first(
        &self,
        tree: &DataTree,
        variable: &str,
        instance_id: &str,
    ) -> EnrichResult<Option<Value>> {
        let node = tree.find_node(instance_id).ok_or_else(|| {
            EnrichError::lookup(variable, Some(instance_id), "instance not found in tree")
        })?;
        Ok(first_value(node, variable))
    }

    fn lookup_filtered(
        &self,
        tree: &DataTree,
        request: &FilterRequest<'_>,
    ) -> EnrichResult<Vec<MatchedNode>> {
        let filter = request.filter.map(FilterExpression::parse).transpose()?;

        if let Some(instance_id) = request.instance_id {
            match tree.find_node(instance_id) {
                Some(node) => {
                    let matches =
                        Self::collect_matches(&node.subtree(), request.variables, filter.as_ref());
                    if !matches.is_empty() || request.scope_to_instance {
                        return Ok(matches);
                    }
                    debug!(
                        instance = instance_id,
                        "no match inside instance, widening search to the whole tree"
                    );
                }
                None if request.scope_to_instance => {
                    return Err(EnrichError::lookup(
                        request.variables.join(", "),
                        Some(instance_id),
                        "instance not found in tree",
                    ));
                }
                None => {}
            }
        }

        Ok(Self::collect_matches(
            &tree.records(),
            request.variables,
            filter.as_ref(),
        ))
    }
}
