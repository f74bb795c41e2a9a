//! Record tree model and the tree-filter collaborator boundary
//!
//! The enrichment engine only talks to trees through [`TreeFilter`].
//! [`PathFilter`] is the in-memory implementation over [`DataTree`].

pub mod expression;
pub mod path_filter;

pub use path_filter::PathFilter;

use crate::error::EnrichResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lookups the enrichment engine needs from a tree
pub trait TreeFilter: Sync {
    type Tree: ?Sized + Sync;

    /// First value of `variable` inside the subtree of `instance_id`
    fn lookup_first(
        &self,
        tree: &Self::Tree,
        variable: &str,
        instance_id: &str,
    ) -> EnrichResult<Option<Value>>;

    /// Nodes carrying the requested variables, optionally filtered and scoped
    fn lookup_filtered(
        &self,
        tree: &Self::Tree,
        request: &FilterRequest<'_>,
    ) -> EnrichResult<Vec<MatchedNode>>;
}

/// Parameters of a general tree search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterRequest<'a> {
    pub variables: &'a [String],
    pub instance_id: Option<&'a str>,
    /// Fully literal boolean expression (placeholders already substituted)
    pub filter: Option<&'a str>,
    pub scope_to_instance: bool,
}

impl<'a> FilterRequest<'a> {
    /// Search the whole tree
    pub fn global(variables: &'a [String]) -> Self {
        Self {
            variables,
            instance_id: None,
            filter: None,
            scope_to_instance: false,
        }
    }

    /// Search only the subtree of `instance_id`
    pub fn local(variables: &'a [String], instance_id: &'a str) -> Self {
        Self {
            variables,
            instance_id: Some(instance_id),
            filter: None,
            scope_to_instance: true,
        }
    }

    pub fn with_filter(mut self, filter: Option<&'a str>) -> Self {
        self.filter = filter;
        self
    }
}

/// One tree node matched by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedNode {
    #[serde(default)]
    pub id: Option<String>,
    /// One value per requested variable, in request order
    pub values: Vec<Value>,
}

impl MatchedNode {
    pub fn new(id: Option<String>, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    /// A single requested variable collapses to its value, several stay a list
    pub fn into_value(self) -> Value {
        let mut values = self.values;
        if values.len() == 1 {
            values.pop().unwrap_or(Value::Null)
        } else {
            Value::Array(values)
        }
    }
}

//==============================================================================
// In-memory record tree
//==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTree {
    #[serde(default)]
    pub data: Vec<Node>,
}

impl DataTree {
    pub fn new(data: Vec<Node>) -> Self {
        Self { data }
    }

    /// First node with the given id, depth-first
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.data.iter().find_map(|node| node.find(id))
    }

    /// Every node of the tree in pre-order
    pub fn records(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for node in &self.data {
            node.collect_preorder(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub data: Vec<Node>,
    /// Attributes the engine does not interpret, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_field(mut self, path: impl Into<String>, value: Value) -> Self {
        self.fields.push(Field::new(path, value));
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.data.push(child);
        self
    }

    /// Own field with the given path
    pub fn field(&self, path: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.path == path)
    }

    pub fn find(&self, id: &str) -> Option<&Node> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.data.iter().find_map(|child| child.find(id))
    }

    /// This node and all its descendants in pre-order
    pub fn subtree(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect_preorder(&mut out);
        out
    }

    fn collect_preorder<'a>(&'a self, out: &mut Vec<&'a Node>) {
        out.push(self);
        for child in &self.data {
            child.collect_preorder(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub path: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Field {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Value with nulls replaced by the default of the field type
    pub fn resolved_value(&self) -> Value {
        if !self.value.is_null() {
            return self.value.clone();
        }
        match self.kind.as_deref() {
            Some("numeric") => Value::from(0.0),
            _ => Value::String(String::new()),
        }
    }
}
