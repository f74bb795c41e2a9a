//! Loading of parser output (formula groups) and record trees from disk

use crate::error::{EnrichError, EnrichResult};
use crate::tree::DataTree;
use crate::types::FormulaGroup;
use serde::de::DeserializeOwned;
use std::path::Path;

/// On-disk format, chosen by file extension (JSON unless .yaml/.yml)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Yaml,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                InputFormat::Yaml
            }
            _ => InputFormat::Json,
        }
    }
}

fn deserialize<T: DeserializeOwned>(content: &str, format: InputFormat) -> EnrichResult<T> {
    match format {
        InputFormat::Json => Ok(serde_json::from_str(content)?),
        InputFormat::Yaml => Ok(serde_yaml::from_str(content)?),
    }
}

/// Parse formula groups, rejecting any with missing required fields
pub fn parse_formula_groups_str(
    content: &str,
    format: InputFormat,
) -> EnrichResult<Vec<FormulaGroup>> {
    let groups: Vec<FormulaGroup> = deserialize(content, format).map_err(|e| match e {
        EnrichError::Json(e) => EnrichError::StructuralInput(format!("invalid formula groups: {}", e)),
        EnrichError::Yaml(e) => EnrichError::StructuralInput(format!("invalid formula groups: {}", e)),
        other => other,
    })?;
    for group in &groups {
        group.validate()?;
    }
    Ok(groups)
}

pub fn parse_formula_groups(path: &Path) -> EnrichResult<Vec<FormulaGroup>> {
    let content = std::fs::read_to_string(path)?;
    parse_formula_groups_str(&content, InputFormat::from_path(path))
}

pub fn parse_tree_str(content: &str, format: InputFormat) -> EnrichResult<DataTree> {
    deserialize(content, format)
}

pub fn parse_tree(path: &Path) -> EnrichResult<DataTree> {
    let content = std::fs::read_to_string(path)?;
    parse_tree_str(&content, InputFormat::from_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(InputFormat::from_path(Path::new("a.yaml")), InputFormat::Yaml);
        assert_eq!(InputFormat::from_path(Path::new("a.YML")), InputFormat::Yaml);
        assert_eq!(InputFormat::from_path(Path::new("a.json")), InputFormat::Json);
        assert_eq!(InputFormat::from_path(Path::new("a")), InputFormat::Json);
    }

    #[test]
    fn test_parse_yaml_formula_groups() {
        let yaml = r#"
        - path: Contract
          ids:
            - id: c1
          formulas:
            - path: Contract.total
              value: "sum(e00001v)"
              parsed:
                aggr:
                  - base: sum
                    vars: [e00001v]
        "#;

        let groups = parse_formula_groups_str(yaml, InputFormat::Yaml).unwrap();
        assert_eq!(groups.len(), 1);
        let clause = &groups[0].formulas[0].parsed.aggr[0];
        assert!(!clause.global);
        assert!(clause.filter.is_none());
        assert!(groups[0].formulas[0].parsed.vars.is_empty());
    }

    #[test]
    fn test_missing_parsed_is_structural_error() {
        let json = r#"[{"path": "Contract", "ids": [], "formulas": [{"path": "Contract.a"}]}]"#;
        let err = parse_formula_groups_str(json, InputFormat::Json).unwrap_err();
        assert!(matches!(err, EnrichError::StructuralInput(_)));
    }

    #[test]
    fn test_missing_ids_is_structural_error() {
        let json = r#"[{"path": "Contract", "formulas": []}]"#;
        assert!(matches!(
            parse_formula_groups_str(json, InputFormat::Json),
            Err(EnrichError::StructuralInput(_))
        ));
    }

    #[test]
    fn test_parse_tree_json() {
        let json = r#"{"data": [{"id": "c1", "fields": [{"path": "x", "value": 1}], "data": []}]}"#;
        let tree = parse_tree_str(json, InputFormat::Json).unwrap();
        assert!(tree.find_node("c1").is_some());
    }
}
