//! Error handling tests

use royalbit_enrich::error::{EnrichError, EnrichResult};

#[test]
fn test_lookup_failure_display_with_instance() {
    let err = EnrichError::lookup("e00001v", Some("c1"), "instance not found in tree");
    assert_eq!(
        err.to_string(),
        "Lookup failed for 'e00001v' on instance 'c1': instance not found in tree"
    );
}

#[test]
fn test_lookup_failure_display_without_instance() {
    let err = EnrichError::lookup("amount", None, "backend unavailable");
    assert_eq!(
        err.to_string(),
        "Lookup failed for 'amount': backend unavailable"
    );
}

#[test]
fn test_lookup_failure_fields() {
    match EnrichError::lookup("x", Some("e1"), "gone") {
        EnrichError::LookupFailure {
            variable,
            instance,
            reason,
        } => {
            assert_eq!(variable, "x");
            assert_eq!(instance, Some("e1".to_string()));
            assert_eq!(reason, "gone");
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn test_malformed_filter_display() {
    let err = EnrichError::malformed("qty >", "Unexpected end of expression");
    assert_eq!(
        err.to_string(),
        "Malformed filter expression 'qty >': Unexpected end of expression"
    );
}

#[test]
fn test_structural_and_config_display() {
    assert_eq!(
        EnrichError::StructuralInput("missing ids".to_string()).to_string(),
        "Structural input error: missing ids"
    );
    assert_eq!(
        EnrichError::Config("bad pattern".to_string()).to_string(),
        "Configuration error: bad pattern"
    );
}

#[test]
fn test_io_error_conversion() {
    fn read_missing() -> EnrichResult<String> {
        Ok(std::fs::read_to_string("/definitely/not/here.json")?)
    }
    let err = read_missing().unwrap_err();
    assert!(matches!(err, EnrichError::Io(_)));
    assert!(err.to_string().starts_with("IO error:"));
}

#[test]
fn test_json_error_conversion() {
    fn parse() -> EnrichResult<serde_json::Value> {
        Ok(serde_json::from_str("{not json")?)
    }
    assert!(matches!(parse().unwrap_err(), EnrichError::Json(_)));
}

#[test]
fn test_yaml_error_conversion() {
    fn parse() -> EnrichResult<Vec<String>> {
        Ok(serde_yaml::from_str("key: [unclosed")?)
    }
    let err = parse().unwrap_err();
    assert!(matches!(err, EnrichError::Yaml(_)));
    assert!(err.to_string().starts_with("YAML parsing error:"));
}
