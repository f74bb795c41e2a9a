use crate::config::EnrichConfig;
use crate::error::{EnrichError, EnrichResult};
use crate::resolver::FilterVariableResolver;
use crate::tree::{FilterRequest, TreeFilter};
use crate::types::{
    AggregatedValue, AggregationClause, EnrichmentResult, EntityInstance, FilterBinding, Formula,
    FormulaData, FormulaGroup, FormulaValues, ResolvedValueEntry,
};
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

/// Resolves formula variables and aggregations into concrete values, per
/// formula group and entity instance.
///
/// Holds no state between runs: every call to [`Enricher::enrich`] builds
/// its results from the read-only inputs alone.
pub struct Enricher<F: TreeFilter> {
    filter: F,
    resolver: FilterVariableResolver,
    parallel: bool,
}

/// Filter text ready for the tree search, plus the bindings that produced it
#[derive(Debug, Default)]
struct ResolvedFilter {
    expression: Option<String>,
    bindings: Vec<FilterBinding>,
}

/// Accumulated entries per formula path, in first-seen order
#[derive(Debug, Default)]
struct FormulaAccumulator {
    formulas: Vec<FormulaValues>,
}

impl FormulaAccumulator {
    fn entries(&mut self, path: &str) -> &mut Vec<ResolvedValueEntry> {
        let index = match self.formulas.iter().position(|f| f.formula == path) {
            Some(index) => index,
            None => {
                self.formulas.push(FormulaValues {
                    formula: path.to_string(),
                    data: Vec::new(),
                });
                self.formulas.len() - 1
            }
        };
        &mut self.formulas[index].data
    }

    /// Hand the accumulated entries over as an owned snapshot
    fn into_formula_data(self) -> FormulaData {
        FormulaData {
            formulas: self.formulas,
        }
    }
}

impl<F: TreeFilter> Enricher<F> {
    pub fn new(filter: F, resolver: FilterVariableResolver) -> Self {
        Self {
            filter,
            resolver,
            parallel: false,
        }
    }

    pub fn from_config(filter: F, config: &EnrichConfig) -> EnrichResult<Self> {
        config.validate()?;
        let resolver = FilterVariableResolver::from_config(config)?;
        Ok(Self::new(filter, resolver).with_parallel(config.parallel))
    }

    /// Enrich independent entity instances on the rayon pool
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn resolver(&self) -> &FilterVariableResolver {
        &self.resolver
    }

    /// One [`EnrichmentResult`] per (group, instance) pair, in input order.
    ///
    /// The first failure aborts the run; no partial output is returned.
    pub fn enrich(
        &self,
        groups: &[FormulaGroup],
        tree: &F::Tree,
    ) -> EnrichResult<Vec<EnrichmentResult>> {
        info!(
            groups = groups.len(),
            parallel = self.parallel,
            "starting formula variable enrichment"
        );

        for group in groups {
            group.validate()?;
        }

        let pairs: Vec<(&FormulaGroup, &EntityInstance)> = groups
            .iter()
            .flat_map(|group| group.ids.iter().map(move |instance| (group, instance)))
            .collect();

        let results = if self.parallel {
            pairs
                .par_iter()
                .map(|(group, instance)| self.enrich_instance(group, instance, tree))
                .collect::<EnrichResult<Vec<_>>>()
        } else {
            pairs
                .iter()
                .map(|(group, instance)| self.enrich_instance(group, instance, tree))
                .collect::<EnrichResult<Vec<_>>>()
        };

        match &results {
            Ok(results) => info!(
                results = results.len(),
                "formula variable enrichment complete"
            ),
            Err(e) => error!(error = %e, "formula variable enrichment aborted"),
        }
        results
    }

    /// Enrich every formula of `group` for a single entity instance
    pub fn enrich_instance(
        &self,
        group: &FormulaGroup,
        instance: &EntityInstance,
        tree: &F::Tree,
    ) -> EnrichResult<EnrichmentResult> {
        debug!(entity = %group.path, id = %instance.id, "processing entity instance");

        let mut accumulator = FormulaAccumulator::default();
        for formula in &group.formulas {
            debug!(formula = %formula.path, value = %formula.value, id = %instance.id, "processing formula");
            // register the path even when the formula resolves to nothing
            accumulator.entries(&formula.path);
            self.resolve_plain_vars(formula, &instance.id, tree, &mut accumulator)?;
            for clause in &formula.parsed.aggr {
                self.resolve_aggregation(formula, clause, &instance.id, tree, &mut accumulator)?;
            }
        }

        Ok(EnrichmentResult {
            entity: group.path.clone(),
            id: instance.id.clone(),
            formula_data: accumulator.into_formula_data(),
        })
    }

    fn resolve_plain_vars(
        &self,
        formula: &Formula,
        instance_id: &str,
        tree: &F::Tree,
        accumulator: &mut FormulaAccumulator,
    ) -> EnrichResult<()> {
        if formula.parsed.vars.is_empty() {
            return Ok(());
        }
        debug!(vars = ?formula.parsed.vars, "extracting non-aggregated variables");

        for variable in &formula.parsed.vars {
            let value = self
                .filter
                .lookup_first(tree, variable, instance_id)
                .inspect_err(|e| {
                    error!(variable = %variable, id = instance_id, error = %e, "non-aggregated lookup failed")
                })?;
            let value = value.unwrap_or_else(|| {
                warn!(variable = %variable, id = instance_id, "variable not found, recording null");
                serde_json::Value::Null
            });
            accumulator
                .entries(&formula.path)
                .push(ResolvedValueEntry::NonAggr(value));
        }
        Ok(())
    }

    fn resolve_aggregation(
        &self,
        formula: &Formula,
        clause: &AggregationClause,
        instance_id: &str,
        tree: &F::Tree,
        accumulator: &mut FormulaAccumulator,
    ) -> EnrichResult<()> {
        let resolved = self.resolve_filter(clause, instance_id, tree)?;
        debug!(
            base = %clause.base,
            vars = ?clause.vars,
            filter = ?resolved.expression,
            global = clause.global,
            "processing aggregation"
        );

        let scope = if clause.global {
            FilterRequest::global(&clause.vars)
        } else {
            FilterRequest::local(&clause.vars, instance_id)
        };
        let request = scope.with_filter(resolved.expression.as_deref());

        let nodes = self.filter.lookup_filtered(tree, &request).inspect_err(|e| {
            error!(base = %clause.base, global = clause.global, error = %e, "aggregation lookup failed")
        })?;
        debug!(matches = nodes.len(), "aggregation nodes found");

        let entries = accumulator.entries(&formula.path);
        if nodes.is_empty() {
            entries.push(ResolvedValueEntry::Aggr(AggregatedValue::empty(
                clause.base.clone(),
                resolved.bindings,
            )));
            return Ok(());
        }
        for node in nodes {
            entries.push(ResolvedValueEntry::Aggr(AggregatedValue {
                base: clause.base.clone(),
                vars: node.into_value(),
                filter: resolved.bindings.clone(),
            }));
        }
        Ok(())
    }

    /// Resolve the variables of the clause filter (right-hand-side names and
    /// written placeholders) for this instance and substitute them, whatever
    /// the aggregation scope.
    fn resolve_filter(
        &self,
        clause: &AggregationClause,
        instance_id: &str,
        tree: &F::Tree,
    ) -> EnrichResult<ResolvedFilter> {
        let Some(filter) = clause.filter.as_deref().filter(|f| !f.trim().is_empty()) else {
            return Ok(ResolvedFilter::default());
        };

        let variables = self.resolver.extract_unique_variables(filter);
        if variables.is_empty() {
            return Ok(ResolvedFilter {
                expression: Some(filter.to_string()),
                bindings: Vec::new(),
            });
        }

        debug!(filter, vars = ?variables, "resolving filter variables");
        let mut bindings = Vec::with_capacity(variables.len());
        for variable in variables {
            let value = self
                .filter
                .lookup_first(tree, &variable, instance_id)?
                .ok_or_else(|| {
                    EnrichError::lookup(
                        &variable,
                        Some(instance_id),
                        "no value found for filter variable",
                    )
                })
                .inspect_err(|e| error!(error = %e, "filter variable resolution failed"))?;
            debug!(variable = %variable, value = %value, "filter variable resolved");
            bindings.push(FilterBinding::new(variable, value));
        }

        let highlighted = self.resolver.highlight_variables(filter);
        let expression = self.resolver.substitute_all(&highlighted, &bindings)?;
        debug!(expression = %expression, "filter expression resolved");

        Ok(ResolvedFilter {
            expression: Some(expression),
            bindings,
        })
    }
}
