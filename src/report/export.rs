// src/report/export.rs — CSV and JSON exports of a suite result

use std::path::Path;

use crate::core::types::TestSuiteResult;
use crate::infra::errors::ProbeError;

pub const CSV_HEADER: &str =
    "description,runs,passed,failed,errored,pass_rate,flakiness,runtime_ms,failure_labels";

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One row per test case. Missing statistics are empty cells.
pub fn to_csv(result: &TestSuiteResult) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for r in &result.results {
        let s = &r.statistics;
        let row = [
            csv_field(&r.case.description),
            s.num_runs.to_string(),
            s.num_passed.to_string(),
            s.num_failed.to_string(),
            s.num_errored.to_string(),
            optional(s.pass_rate),
            optional(s.flakiness_index),
            s.runtime_ms.to_string(),
            csv_field(&r.failure_labels().join(";")),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

pub fn to_json(result: &TestSuiteResult) -> Result<String, ProbeError> {
    serde_json::to_string_pretty(result).map_err(|e| ProbeError::Other(e.into()))
}

pub fn write_csv(path: &Path, result: &TestSuiteResult) -> Result<(), ProbeError> {
    write(path, &to_csv(result))
}

pub fn write_json(path: &Path, result: &TestSuiteResult) -> Result<(), ProbeError> {
    write(path, &to_json(result)?)
}

fn write(path: &Path, contents: &str) -> Result<(), ProbeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::sample_result;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_csv_rows() {
        let csv = to_csv(&sample_result());
        assert_eq!(
            csv,
            "description,runs,passed,failed,errored,pass_rate,flakiness,runtime_ms,failure_labels\n\
             mixed,2,1,1,0,50,100,20,wrong\n\
             broken,2,0,0,2,,,20,\n"
        );
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a, b"), "\"a, b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_json_export() {
        let json: serde_json::Value = serde_json::from_str(&to_json(&sample_result()).unwrap()).unwrap();
        assert_eq!(json["suite"], "greet");
        assert_eq!(json["results"][0]["case"]["eval"], "equals");
        assert_eq!(json["results"][1]["statistics"]["pass_rate"], serde_json::Value::Null);
        assert_eq!(json["results"][0]["trials"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out/results.csv");
        write_csv(&path, &sample_result()).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().starts_with(CSV_HEADER));
    }
}
