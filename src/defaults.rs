//! YAML defaults/schema pair validation.
//!
//! Configuration template directories pair every `<name>.yaml` defaults
//! file with a `<name>.yaml.schema` sibling describing the accepted keys.
//! A defaults key that the schema does not know about would silently be
//! ignored at runtime, so the check requires every top-level defaults key
//! to exist in the schema.

use std::collections::BTreeSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml::Value;
use tracing::debug;

use crate::error::RsaptError;

/// Checks every defaults/schema pair under `dir` and returns the collected
/// violations, empty when everything passes.
pub fn check_defaults_dir(dir: &Utf8Path) -> Result<Vec<String>, RsaptError> {
    let mut violations = Vec::new();

    for path in yaml_files(dir)? {
        let schema_path = Utf8PathBuf::from(format!("{}.schema", path));
        if !schema_path.exists() {
            violations.push(format!("{}: missing schema file {}", path, schema_path));
            continue;
        }

        debug!("checking {} against {}", path, schema_path);
        let defaults_keys = top_level_keys(&path)?;
        let schema_keys = top_level_keys(&schema_path)?;

        for key in defaults_keys.difference(&schema_keys) {
            violations.push(format!("{}: key {:?} not present in {}", path, key, schema_path));
        }
    }

    Ok(violations)
}

/// [`check_defaults_dir`], failing with a `Validation` error when any pair
/// violates the schema.
pub fn validate_defaults_dir(dir: &Utf8Path) -> Result<(), RsaptError> {
    let violations = check_defaults_dir(dir)?;
    if violations.is_empty() {
        Ok(())
    } else {
        Err(RsaptError::Validation(format!(
            "defaults/schema mismatch:\n{}",
            violations.join("\n")
        )))
    }
}

/// Lists `*.yaml` files directly under `dir`, sorted for deterministic
/// reporting.
fn yaml_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, RsaptError> {
    let entries = fs::read_dir(dir).map_err(|e| RsaptError::io(dir.to_string(), e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RsaptError::io(dir.to_string(), e))?;
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            continue;
        };
        if path.extension() == Some("yaml") && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parses a YAML document and returns its top-level mapping keys.
///
/// An empty document has no keys; any other non-mapping top level is a
/// config error.
fn top_level_keys(path: &Utf8Path) -> Result<BTreeSet<String>, RsaptError> {
    let content = fs::read_to_string(path).map_err(|e| RsaptError::io(path.to_string(), e))?;

    let value: Value = serde_yaml::from_str(&content)
        .map_err(|e| RsaptError::Config(format!("YAML parse error in {}: {}", path, e)))?;

    match value {
        Value::Null => Ok(BTreeSet::new()),
        Value::Mapping(mapping) => Ok(mapping.keys().map(display_key).collect()),
        _ => Err(RsaptError::Config(format!(
            "{}: top-level YAML structure must be a mapping",
            path
        ))),
    }
}

fn display_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &std::path::Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).expect("failed to write fixture");
    }

    fn check(dir: &std::path::Path) -> Vec<String> {
        check_defaults_dir(Utf8Path::from_path(dir).unwrap()).expect("check should run")
    }

    #[test]
    fn test_matching_pair_passes() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        write(dir.path(), "os.yaml", "security_limits: {}\nsysctl: {}\n");
        write(dir.path(), "os.yaml.schema", "security_limits: {}\nsysctl: {}\nextra: {}\n");

        assert!(check(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_schema_reported() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        write(dir.path(), "os.yaml", "sysctl: {}\n");

        let violations = check(dir.path());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("missing schema file"));
    }

    #[test]
    fn test_unknown_defaults_key_reported() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        write(dir.path(), "ssh.yaml", "ciphers: []\nbogus: 1\n");
        write(dir.path(), "ssh.yaml.schema", "ciphers: []\n");

        let violations = check(dir.path());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("\"bogus\""));
    }

    #[test]
    fn test_empty_pair_passes() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        write(dir.path(), "empty.yaml", "");
        write(dir.path(), "empty.yaml.schema", "");

        assert!(check(dir.path()).is_empty());
    }

    #[test]
    fn test_non_yaml_files_ignored() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        write(dir.path(), "README.md", "# not yaml\n");
        write(dir.path(), "os.yaml", "sysctl: {}\n");
        write(dir.path(), "os.yaml.schema", "sysctl: {}\n");

        assert!(check(dir.path()).is_empty());
    }

    #[test]
    fn test_validate_wraps_violations() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        write(dir.path(), "net.yaml", "mtu: 9000\n");
        write(dir.path(), "net.yaml.schema", "");

        let err = validate_defaults_dir(Utf8Path::from_path(dir.path()).unwrap())
            .expect_err("mismatch should error");
        assert!(matches!(err, RsaptError::Validation(_)));
        assert!(err.to_string().contains("mtu"));
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        write(dir.path(), "bad.yaml", "key: value\n  broken_indent\n");
        write(dir.path(), "bad.yaml.schema", "key: value\n");

        let err = check_defaults_dir(Utf8Path::from_path(dir.path()).unwrap())
            .expect_err("parse failure should error");
        assert!(matches!(err, RsaptError::Config(_)));
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let err = check_defaults_dir(Utf8Path::new("/nonexistent/defaults"))
            .expect_err("missing dir should error");
        assert!(matches!(err, RsaptError::Io { .. }));
    }
}
