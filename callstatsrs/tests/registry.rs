//! Integration tests for loading section definitions from disk.

use std::fs;

use callstats::registry::SectionRegistry;
use callstats::{AdvancedFilter, CallstatsError, TimeGranularity};
use tempfile::tempdir;

const VOLUME_YAML: &str = r#"
name: inbound_volume
title: Inbound volume
query:
  timeInterval: 30min
  startDate: "2025-04-01 00:00"
  filters:
    queues: [Sales, Support]
  advancedFilters:
    conditions:
      - field: inbound
        operator: ">"
        value: 0
    groups: []
"#;

const SLA_JSON: &str = r#"{
  "name": "sla",
  "query": {
    "timeInterval": "monthly",
    "columns": ["year", "month", "serviceLevel"],
    "advancedFilters": "serviceLevel < 80"
  }
}"#;

#[test]
fn loads_yaml_and_json_sections() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("volume.yaml"), VOLUME_YAML).unwrap();
    fs::write(dir.path().join("sla.json"), SLA_JSON).unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let registry = SectionRegistry::load_from_dir(dir.path()).unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["inbound_volume", "sla"]);

    let volume = registry.get("inbound_volume").unwrap();
    assert_eq!(volume.title.as_deref(), Some("Inbound volume"));
    assert_eq!(volume.query.time_interval.as_deref(), Some(TimeGranularity::Min30.as_str()));
    assert_eq!(volume.query.filters.queues, vec!["Sales", "Support"]);
    assert!(matches!(volume.query.advanced_filters, Some(AdvancedFilter::Tree(_))));

    let sla = registry.get("sla").unwrap();
    assert_eq!(sla.query.columns, vec!["year", "month", "serviceLevel"]);
    assert_eq!(
        sla.query.advanced_filters,
        Some(AdvancedFilter::Raw("serviceLevel < 80".to_string()))
    );
}

#[test]
fn duplicate_names_across_files_fail() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.yml"), VOLUME_YAML).unwrap();
    fs::write(dir.path().join("b.yaml"), VOLUME_YAML).unwrap();

    let err = SectionRegistry::load_from_dir(dir.path()).unwrap_err();
    match err {
        CallstatsError::Validation(msg) => {
            assert!(msg.contains("duplicate section inbound_volume"))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_directory_fails() {
    let dir = tempdir().unwrap();
    let err = SectionRegistry::load_from_dir(dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, CallstatsError::Validation(_)));
}

#[test]
fn malformed_file_reports_parse_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("bad.yml"), "name: x\nquery:\n  startDate: someday\n").unwrap();
    let err = SectionRegistry::load_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, CallstatsError::Yaml(_)));
}
