use crate::error::{EnrichError, EnrichResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

//==============================================================================
// Parser Output (input to enrichment)
//==============================================================================

/// All formulas defined for one entity type, plus every instance of that
/// entity present in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaGroup {
    pub path: String,
    #[serde(default)]
    pub formulas: Vec<Formula>,
    pub ids: Vec<EntityInstance>,
}

impl FormulaGroup {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            formulas: Vec::new(),
            ids: Vec::new(),
        }
    }

    pub fn with_formula(mut self, formula: Formula) -> Self {
        self.formulas.push(formula);
        self
    }

    pub fn with_instance(mut self, id: impl Into<String>) -> Self {
        self.ids.push(EntityInstance::new(id));
        self
    }

    /// Number of distinct formula paths (one output entry each, per instance)
    pub fn distinct_formula_count(&self) -> usize {
        self.formulas
            .iter()
            .map(|f| f.path.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Reject groups the upstream parser should never have produced
    pub fn validate(&self) -> EnrichResult<()> {
        if self.path.trim().is_empty() {
            return Err(EnrichError::StructuralInput(
                "formula group is missing its entity path".to_string(),
            ));
        }
        for (index, formula) in self.formulas.iter().enumerate() {
            if formula.path.trim().is_empty() {
                return Err(EnrichError::StructuralInput(format!(
                    "formula #{} of group '{}' is missing its path",
                    index, self.path
                )));
            }
            for clause in &formula.parsed.aggr {
                if clause.base.trim().is_empty() {
                    return Err(EnrichError::StructuralInput(format!(
                        "aggregation in formula '{}' is missing its base operator",
                        formula.path
                    )));
                }
            }
        }
        for instance in &self.ids {
            if instance.id.trim().is_empty() {
                return Err(EnrichError::StructuralInput(format!(
                    "group '{}' has an entity instance with an empty id",
                    self.path
                )));
            }
        }
        Ok(())
    }
}

/// A formula as emitted by the external parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub path: String,
    /// Raw expression text
    #[serde(default)]
    pub value: String,
    pub parsed: ParsedFormula,
}

impl Formula {
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
            parsed: ParsedFormula::default(),
        }
    }

    pub fn with_var(mut self, variable: impl Into<String>) -> Self {
        self.parsed.vars.push(variable.into());
        self
    }

    pub fn with_aggregation(mut self, clause: AggregationClause) -> Self {
        self.parsed.aggr.push(clause);
        self
    }
}

/// Plain variable references and aggregation clauses, in parser order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedFormula {
    #[serde(default)]
    pub vars: Vec<String>,
    #[serde(default)]
    pub aggr: Vec<AggregationClause>,
}

/// An aggregation such as `sum(amount)` with optional filter and scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationClause {
    /// Aggregation operator name (sum, avg, count, ...)
    pub base: String,
    #[serde(default)]
    pub vars: Vec<String>,
    #[serde(default)]
    pub filter: Option<String>,
    /// `true` searches the whole tree, `false` only the instance subtree
    #[serde(default)]
    pub global: bool,
}

impl AggregationClause {
    pub fn local(base: impl Into<String>, vars: &[&str]) -> Self {
        Self {
            base: base.into(),
            vars: vars.iter().map(|v| v.to_string()).collect(),
            filter: None,
            global: false,
        }
    }

    pub fn global(base: impl Into<String>, vars: &[&str]) -> Self {
        Self {
            global: true,
            ..Self::local(base, vars)
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// One concrete node of the entity type being iterated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityInstance {
    pub id: String,
}

impl EntityInstance {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

//==============================================================================
// Enrichment Output
//==============================================================================

/// A resolved value for one formula, either a plain lookup or one matched
/// node of an aggregation.
///
/// Serializes as `{"non_aggr": value}` or `{"aggr": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedValueEntry {
    NonAggr(Value),
    Aggr(AggregatedValue),
}

impl ResolvedValueEntry {
    pub fn as_aggregated(&self) -> Option<&AggregatedValue> {
        match self {
            ResolvedValueEntry::Aggr(aggr) => Some(aggr),
            ResolvedValueEntry::NonAggr(_) => None,
        }
    }

    pub fn is_aggregated(&self) -> bool {
        matches!(self, ResolvedValueEntry::Aggr(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedValue {
    pub base: String,
    /// Values of one matched node; `[]` when the aggregation matched nothing
    pub vars: Value,
    /// Filter variables resolved for this instance, in resolution order
    pub filter: Vec<FilterBinding>,
}

impl AggregatedValue {
    /// The explicit "zero matches" entry
    pub fn empty(base: impl Into<String>, filter: Vec<FilterBinding>) -> Self {
        Self {
            base: base.into(),
            vars: Value::Array(Vec::new()),
            filter,
        }
    }

    pub fn is_empty_match(&self) -> bool {
        matches!(&self.vars, Value::Array(values) if values.is_empty())
    }
}

/// A filter variable and the literal it resolved to, serialized as
/// `{"variable": literal}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<String, Value>",
    try_from = "BTreeMap<String, Value>"
)]
pub struct FilterBinding {
    pub variable: String,
    pub value: Value,
}

impl FilterBinding {
    pub fn new(variable: impl Into<String>, value: Value) -> Self {
        Self {
            variable: variable.into(),
            value,
        }
    }
}

impl From<FilterBinding> for BTreeMap<String, Value> {
    fn from(binding: FilterBinding) -> Self {
        let mut map = BTreeMap::new();
        map.insert(binding.variable, binding.value);
        map
    }
}

impl TryFrom<BTreeMap<String, Value>> for FilterBinding {
    type Error = String;

    fn try_from(map: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!(
                "filter binding must have exactly one entry, found {}",
                map.len()
            ));
        }
        let (variable, value) = map
            .into_iter()
            .next()
            .ok_or_else(|| "empty filter binding".to_string())?;
        Ok(FilterBinding { variable, value })
    }
}

/// Enriched data for one entity instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub entity: String,
    pub id: String,
    pub formula_data: FormulaData,
}

impl EnrichmentResult {
    pub fn formula(&self, path: &str) -> Option<&FormulaValues> {
        self.formula_data.formulas.iter().find(|f| f.formula == path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormulaData {
    pub formulas: Vec<FormulaValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaValues {
    pub formula: String,
    pub data: Vec<ResolvedValueEntry>,
}

/// Everything the numeric evaluator consumes for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentBundle<T> {
    pub enriched: Vec<EnrichmentResult>,
    pub extracted_formulas: Vec<FormulaGroup>,
    pub tree: T,
}
