use crate::config::EnrichConfig;
use crate::core::Enricher;
use crate::error::{EnrichError, EnrichResult};
use crate::parser;
use crate::resolver::FilterVariableResolver;
use crate::tree::PathFilter;
use crate::types::{EnrichmentBundle, EnrichmentResult, FilterBinding};
use crate::writer;
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;

/// Options for the run command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub parallel: bool,
    pub variable_pattern: Option<String>,
    pub verbose: bool,
}

/// Config file first, then command-line overrides
fn resolve_config(options: &RunOptions) -> EnrichResult<EnrichConfig> {
    let mut config = match &options.config {
        Some(path) => EnrichConfig::load(path)?,
        None => EnrichConfig::default(),
    };
    if options.parallel {
        config.parallel = true;
    }
    if let Some(pattern) = &options.variable_pattern {
        config.variable_pattern = pattern.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Count of (aggregated entries, explicit empty entries) across results
fn count_aggregations(results: &[EnrichmentResult]) -> (usize, usize) {
    results
        .iter()
        .flat_map(|r| &r.formula_data.formulas)
        .flat_map(|f| &f.data)
        .filter_map(|entry| entry.as_aggregated())
        .fold((0, 0), |(total, empty), aggr| {
            (total + 1, empty + usize::from(aggr.is_empty_match()))
        })
}

/// Execute the run command
pub fn run(formulas: PathBuf, tree_path: PathBuf, options: RunOptions) -> EnrichResult<()> {
    let config = resolve_config(&options)?;

    // Stdout carries the JSON when no output file is given
    let to_stdout = options.output.is_none();
    let say = |line: String| {
        if to_stdout {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    };

    say(format!("{}", "🌳 Enrich - Resolving formula variables".bold().green()));
    say(format!("   Formulas: {}", formulas.display()));
    say(format!("   Tree:     {}", tree_path.display()));
    if config.parallel {
        say(format!("   Mode:     {}", "parallel".bright_yellow().bold()));
    }

    let groups = parser::parse_formula_groups(&formulas)?;
    let tree = parser::parse_tree(&tree_path)?;

    if options.verbose {
        let instances: usize = groups.iter().map(|g| g.ids.len()).sum();
        say(format!(
            "   Found {} formula groups, {} entity instances",
            groups.len(),
            instances
        ));
    }

    let enricher = Enricher::from_config(PathFilter, &config)?;
    let results = enricher.enrich(&groups, &tree)?;

    let (aggregated, empty) = count_aggregations(&results);
    say(format!("{}", "✅ Enrichment Results:".bold().green()));
    say(format!("   Instances enriched: {}", results.len().to_string().bold()));
    say(format!(
        "   Aggregated entries: {} ({} empty)",
        aggregated, empty
    ));

    match options.output {
        Some(path) => {
            let bundle = EnrichmentBundle {
                enriched: results,
                extracted_formulas: groups,
                tree,
            };
            writer::write_bundle(&path, &bundle)?;
            say(format!("   Written: {}", path.display().to_string().bright_blue()));
        }
        None => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }

    Ok(())
}

/// Execute the validate command
pub fn validate(files: Vec<PathBuf>) -> EnrichResult<()> {
    let mut failures = 0;

    for file in &files {
        println!("{}", "✅ Validating formula groups".bold().green());
        println!("   File: {}", file.display());

        match parser::parse_formula_groups(file) {
            Ok(groups) => {
                let formulas: usize = groups.iter().map(|g| g.formulas.len()).sum();
                let instances: usize = groups.iter().map(|g| g.ids.len()).sum();
                let aggregations: usize = groups
                    .iter()
                    .flat_map(|g| &g.formulas)
                    .map(|f| f.parsed.aggr.len())
                    .sum();
                println!(
                    "   {} groups, {} formulas, {} aggregations, {} instances",
                    groups.len(),
                    formulas,
                    aggregations,
                    instances
                );
                println!("   {}\n", "Valid".green());
            }
            Err(e) => {
                println!("   {} {}\n", "❌".red(), e.to_string().red());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(EnrichError::StructuralInput(format!(
            "{} of {} file(s) failed validation",
            failures,
            files.len()
        )));
    }
    Ok(())
}

/// Parse `name=value`; the value is JSON when it parses as JSON, text otherwise
pub fn parse_binding(raw: &str) -> EnrichResult<FilterBinding> {
    let (name, value) = raw.split_once('=').ok_or_else(|| {
        EnrichError::Config(format!("binding '{}' must look like name=value", raw))
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(EnrichError::Config(format!(
            "binding '{}' has an empty variable name",
            raw
        )));
    }
    let value = serde_json::from_str::<Value>(value.trim())
        .unwrap_or_else(|_| Value::String(value.trim().to_string()));
    Ok(FilterBinding::new(name, value))
}

/// Execute the filter command - show how a filter expression resolves
pub fn filter(
    expression: String,
    bindings: Vec<String>,
    config: Option<PathBuf>,
    variable_pattern: Option<String>,
) -> EnrichResult<()> {
    let config = resolve_config(&RunOptions {
        config,
        variable_pattern,
        ..RunOptions::default()
    })?;
    let resolver = FilterVariableResolver::from_config(&config)?;

    println!("{}", "🔍 Enrich - Filter Expression".bold().green());
    println!("   Expression: {}", expression.bright_yellow());
    println!();

    let variables = resolver.extract_unique_variables(&expression);
    if variables.is_empty() {
        println!("   No right-hand variables; the filter is used as written");
        return Ok(());
    }

    println!("{}", "📋 Variables:".bold().cyan());
    for variable in &variables {
        println!("   {}", variable.bright_blue());
    }

    let highlighted = resolver.highlight_variables(&expression);
    println!("   Highlighted: {}", highlighted.yellow());

    if bindings.is_empty() {
        return Ok(());
    }

    let bindings = bindings
        .iter()
        .map(|raw| parse_binding(raw))
        .collect::<EnrichResult<Vec<_>>>()?;
    let resolved = resolver.substitute_all(&highlighted, &bindings)?;
    println!("   Resolved:    {}", resolved.bold().green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AggregatedValue, FormulaData, FormulaValues, ResolvedValueEntry};
    use serde_json::json;

    #[test]
    fn test_parse_binding_json_and_text() {
        let binding = parse_binding("threshold=5").unwrap();
        assert_eq!(binding.variable, "threshold");
        assert_eq!(binding.value, json!(5));

        let binding = parse_binding("s = active").unwrap();
        assert_eq!(binding.variable, "s");
        assert_eq!(binding.value, json!("active"));

        assert!(parse_binding("novalue").is_err());
        assert!(parse_binding("=5").is_err());
    }

    #[test]
    fn test_resolve_config_overrides() {
        let options = RunOptions {
            parallel: true,
            variable_pattern: Some("[a-z]+".to_string()),
            ..Default::default()
        };
        let config = resolve_config(&options).unwrap();
        assert!(config.parallel);
        assert_eq!(config.variable_pattern, "[a-z]+");

        let options = RunOptions {
            variable_pattern: Some("(".to_string()),
            ..Default::default()
        };
        assert!(resolve_config(&options).is_err());
    }

    #[test]
    fn test_filter_uses_config_delimiters() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("enrich.yaml");
        std::fs::write(&path, "placeholder_prefix: '{{'\nplaceholder_suffix: '}}'\n").unwrap();

        let bindings = vec!["e00001v=1".to_string()];
        let err = filter(
            "qty > {{e00009v}}".to_string(),
            bindings.clone(),
            Some(path),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("e00009v"));

        // default delimiters see no placeholder there
        assert!(filter("qty > {{e00009v}}".to_string(), bindings, None, None).is_ok());
    }

    #[test]
    fn test_count_aggregations() {
        let results = vec![EnrichmentResult {
            entity: "E".to_string(),
            id: "e1".to_string(),
            formula_data: FormulaData {
                formulas: vec![FormulaValues {
                    formula: "E.a".to_string(),
                    data: vec![
                        ResolvedValueEntry::NonAggr(json!(1)),
                        ResolvedValueEntry::Aggr(AggregatedValue::empty("sum", vec![])),
                        ResolvedValueEntry::Aggr(AggregatedValue {
                            base: "sum".to_string(),
                            vars: json!(2),
                            filter: vec![],
                        }),
                    ],
                }],
            },
        }];
        assert_eq!(count_aggregations(&results), (2, 1));
    }
}
