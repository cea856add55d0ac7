//! Rule validation.
//!
//! Turns raw rule records into [`Rule`]s. Records are untyped JSON values so
//! that wrong types surface as validation errors with the rule index attached,
//! rather than as opaque deserialization failures.
//!
//! Validation is fail-fast: the first bad record aborts the whole batch.
//!
//! A destination that resolves to its own source, or to a directory inside it,
//! is rejected: copying would truncate the originals or recurse into its output.

use crate::error::ValidationError;
use crate::exclude::{ExclusionRule, Exclusions, PatternMode};
use crate::model::Rule;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Validate every record in order, stopping at the first invalid one.
pub fn validate(raw_rules: &[Value]) -> Result<Vec<Rule>, ValidationError> {
    raw_rules
        .iter()
        .enumerate()
        .map(|(index, raw)| validate_rule(index, raw))
        .collect()
}

/// Validate a single record at position `index`.
pub fn validate_rule(index: usize, raw: &Value) -> Result<Rule, ValidationError> {
    let record = raw.as_object().ok_or_else(|| ValidationError::MalformedRule {
        index,
        reason: format!("expected an object, got {}", type_name(raw)),
    })?;

    let source = check_source(index, record.get("source"))?;
    let destination = check_destination(index, record.get("destination"))?;
    check_overlap(index, &source, &destination)?;
    let exclusions = match record.get("exclude") {
        None | Some(Value::Null) => Exclusions::default(),
        Some(exclude) => check_exclude(index, exclude)?,
    };

    debug!(
        index,
        source = %source.display(),
        destination = %destination.display(),
        "rule validated"
    );

    Ok(Rule {
        source,
        destination,
        exclusions,
    })
}

fn check_source(index: usize, value: Option<&Value>) -> Result<PathBuf, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidSource { index, reason };

    let source = match value {
        None | Some(Value::Null) => return Err(invalid("source is not defined".to_string())),
        Some(Value::String(s)) if s.is_empty() => {
            return Err(invalid("source is empty".to_string()))
        }
        Some(Value::String(s)) => PathBuf::from(s),
        Some(other) => {
            return Err(invalid(format!(
                "expected a string, got {}",
                type_name(other)
            )))
        }
    };

    match std::fs::metadata(&source) {
        Ok(metadata) if metadata.is_dir() => Ok(source),
        Ok(_) => Err(invalid(format!("{} is not a directory", source.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(invalid(format!("{} does not exist", source.display())))
        }
        Err(e) => Err(invalid(format!(
            "{} is not accessible: {}",
            source.display(),
            e
        ))),
    }
}

fn check_destination(index: usize, value: Option<&Value>) -> Result<PathBuf, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidDestination { index, reason };

    match value {
        None | Some(Value::Null) => Err(invalid("destination is not defined".to_string())),
        Some(Value::String(s)) if s.is_empty() => Err(invalid("destination is empty".to_string())),
        Some(Value::String(s)) => Ok(PathBuf::from(s)),
        Some(other) => Err(invalid(format!(
            "expected a string, got {}",
            type_name(other)
        ))),
    }
}

fn check_overlap(index: usize, source: &Path, destination: &Path) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidDestination { index, reason };

    let source_real = fs::canonicalize(source).map_err(|e| ValidationError::InvalidSource {
        index,
        reason: format!("{} is not accessible: {}", source.display(), e),
    })?;
    let destination_real = resolve(destination)
        .map_err(|e| invalid(format!("{} cannot be resolved: {}", destination.display(), e)))?;

    if destination_real == source_real {
        Err(invalid(format!(
            "{} is the source directory itself",
            destination.display()
        )))
    } else if destination_real.starts_with(&source_real) {
        Err(invalid(format!(
            "{} is inside source {}",
            destination.display(),
            source.display()
        )))
    } else {
        Ok(())
    }
}

/// Resolve `path` to an absolute path with symlinks followed, even if its tail
/// does not exist yet: the deepest existing ancestor is canonicalized and the
/// missing components are appended to it.
fn resolve(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    let mut missing = Vec::new();
    let mut existing = normalized.as_path();
    let mut resolved = loop {
        match fs::canonicalize(existing) {
            Ok(real) => break real,
            Err(e) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Err(e),
            },
        }
    };

    for name in missing.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

fn check_exclude(index: usize, value: &Value) -> Result<Exclusions, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidExclusion { index, reason };

    let block = value
        .as_object()
        .ok_or_else(|| invalid(format!("expected an object, got {}", type_name(value))))?;

    if !block.contains_key("files") && !block.contains_key("directories") {
        return Err(invalid(
            "exclude block defines neither files nor directories".to_string(),
        ));
    }

    let use_regex = check_flag(block, "use_regex").map_err(invalid)?;
    let use_glob = check_flag(block, "use_glob").map_err(invalid)?;
    let mode = match (use_regex, use_glob) {
        (true, true) => {
            return Err(invalid(
                "use_regex and use_glob are mutually exclusive".to_string(),
            ))
        }
        (true, false) => PatternMode::Regex,
        (false, true) => PatternMode::Glob,
        (false, false) => PatternMode::Literal,
    };

    Ok(Exclusions {
        files: check_exclude_list(block.get("files"), "files", mode).map_err(invalid)?,
        directories: check_exclude_list(block.get("directories"), "directories", mode)
            .map_err(invalid)?,
    })
}

fn check_flag(block: &Map<String, Value>, key: &str) -> Result<bool, String> {
    match block.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => Err(format!(
            "{} must be a boolean, got {}",
            key,
            type_name(other)
        )),
    }
}

fn check_exclude_list(
    value: Option<&Value>,
    key: &str,
    mode: PatternMode,
) -> Result<Vec<ExclusionRule>, String> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(format!(
                "{} must be a list of strings, got {}",
                key,
                type_name(other)
            ))
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(pattern) => ExclusionRule::compile(pattern, mode),
            other => Err(format!(
                "{} must be a list of strings, found {}",
                key,
                type_name(other)
            )),
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn source_dir() -> (tempfile::TempDir, String) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).expect("Failed to create src dir");
        let src = src.to_str().expect("Temp path is not UTF-8").to_string();
        (temp_dir, src)
    }

    #[test]
    fn test_validate_minimal_rule() {
        let (_temp_dir, src) = source_dir();
        let rules = validate(&[json!({"source": src, "destination": "/backup/a"})])
            .expect("Rule should validate");

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source, PathBuf::from(&src));
        assert_eq!(rules[0].destination, PathBuf::from("/backup/a"));
        assert!(rules[0].exclusions.is_empty());
    }

    #[test]
    fn test_missing_source() {
        let err = validate(&[json!({"destination": "/backup"})]).expect_err("Should fail");
        assert!(matches!(err, ValidationError::InvalidSource { index: 0, .. }));
    }

    #[test]
    fn test_source_wrong_type() {
        let err = validate(&[json!({"source": 42, "destination": "/backup"})])
            .expect_err("Should fail");
        match err {
            ValidationError::InvalidSource { reason, .. } => assert!(reason.contains("number")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_source_not_a_directory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, b"x").expect("Failed to write file");

        let err = validate(&[json!({"source": file, "destination": "/backup"})])
            .expect_err("Should fail");
        match err {
            ValidationError::InvalidSource { reason, .. } => {
                assert!(reason.contains("not a directory"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_source_checked_before_destination() {
        let err = validate(&[json!({"source": "/nonexistent/path/xyz"})]).expect_err("Should fail");
        assert!(matches!(err, ValidationError::InvalidSource { .. }));
    }

    #[test]
    fn test_destination_missing_empty_or_wrong_type() {
        let (_temp_dir, src) = source_dir();
        for destination in [Value::Null, json!(""), json!(["a"])] {
            let err = validate(&[json!({"source": src, "destination": destination})])
                .expect_err("Should fail");
            assert!(matches!(err, ValidationError::InvalidDestination { index: 0, .. }));
        }
    }

    #[test]
    fn test_destination_equal_to_source_is_rejected() {
        let (_temp_dir, src) = source_dir();
        let aliases = [
            src.clone(),
            format!("{}/.", src),
            format!("{}/sub/..", src),
        ];

        for destination in aliases {
            let err = validate(&[json!({"source": src, "destination": destination})])
                .expect_err("Should fail");
            match err {
                ValidationError::InvalidDestination { index: 0, reason } => {
                    assert!(reason.contains("source directory itself"), "{reason}")
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_destination_inside_source_is_rejected() {
        let (_temp_dir, src) = source_dir();
        let nested = PathBuf::from(&src).join("backup").join("daily");

        let err = validate(&[json!({"source": src, "destination": nested})])
            .expect_err("Should fail");
        match err {
            ValidationError::InvalidDestination { index: 0, reason } => {
                assert!(reason.contains("inside source"), "{reason}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!PathBuf::from(&src).join("backup").exists());
    }

    #[test]
    fn test_destination_next_to_source_is_accepted() {
        let (temp_dir, src) = source_dir();
        // Shares a name prefix with the source but is not inside it
        let sibling = temp_dir.path().join("src_backup");
        let parent = temp_dir.path().to_path_buf();

        let rules = validate(&[
            json!({"source": src, "destination": sibling}),
            json!({"source": src, "destination": parent}),
        ])
        .expect("Rules should validate");
        assert_eq!(rules.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_destination_symlinked_into_source_is_rejected() {
        let (temp_dir, src) = source_dir();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&src, &link).expect("Failed to create symlink");

        for destination in [link.clone(), link.join("backup")] {
            let err = validate(&[json!({"source": src, "destination": destination})])
                .expect_err("Should fail");
            assert!(matches!(err, ValidationError::InvalidDestination { index: 0, .. }));
        }
    }

    #[test]
    fn test_non_object_record() {
        let err = validate(&[json!("src -> dst")]).expect_err("Should fail");
        assert!(matches!(err, ValidationError::MalformedRule { index: 0, .. }));
    }

    #[test]
    fn test_fail_fast_reports_first_invalid_index() {
        let (_temp_dir, src) = source_dir();
        let raw = vec![
            json!({"source": src, "destination": "/backup/0"}),
            json!({"source": src, "destination": "/backup/1"}),
            json!({"source": "/nonexistent/path/xyz", "destination": "/backup/2"}),
            json!({"source": src}),
        ];

        let err = validate(&raw).expect_err("Should fail");
        assert_eq!(err.index(), 2);
        assert!(matches!(err, ValidationError::InvalidSource { .. }));
    }

    #[test]
    fn test_exclude_literal_by_default() {
        let (_temp_dir, src) = source_dir();
        let rules = validate(&[json!({
            "source": src,
            "destination": "/backup",
            "exclude": {"files": ["a.tmp"], "directories": [".git"]}
        })])
        .expect("Rule should validate");

        let exclusions = &rules[0].exclusions;
        assert!(exclusions.excludes_file("a.tmp"));
        assert!(!exclusions.excludes_file("b.tmp"));
        assert!(exclusions.excludes_directory(".git"));
    }

    #[test]
    fn test_exclude_regex_mode() {
        let (_temp_dir, src) = source_dir();
        let rules = validate(&[json!({
            "source": src,
            "destination": "/backup",
            "exclude": {"files": [r"\.tmp$"], "use_regex": true}
        })])
        .expect("Rule should validate");

        assert!(rules[0].exclusions.excludes_file("b.tmp"));
        assert!(rules[0].exclusions.directories.is_empty());
    }

    #[test]
    fn test_exclude_glob_mode() {
        let (_temp_dir, src) = source_dir();
        let rules = validate(&[json!({
            "source": src,
            "destination": "/backup",
            "exclude": {"directories": ["cache*"], "use_glob": true}
        })])
        .expect("Rule should validate");

        assert!(rules[0].exclusions.excludes_directory("cache-v2"));
        assert!(rules[0].exclusions.files.is_empty());
    }

    #[test]
    fn test_exclude_rejections() {
        let (_temp_dir, src) = source_dir();
        let bad_blocks = [
            json!(["*.log"]),
            json!({}),
            json!({"use_regex": true}),
            json!({"files": "*.log"}),
            json!({"files": ["ok", 3]}),
            json!({"directories": ["x"], "use_regex": "yes"}),
            json!({"files": ["(unclosed"], "use_regex": true}),
            json!({"files": ["a"], "use_regex": true, "use_glob": true}),
        ];

        for block in bad_blocks {
            let err = validate(&[json!({"source": src, "destination": "/backup", "exclude": block})])
                .expect_err("Exclude block should be rejected");
            assert!(
                matches!(err, ValidationError::InvalidExclusion { index: 0, .. }),
                "unexpected error: {err:?}"
            );
        }
    }

    #[test]
    fn test_null_exclude_lists_are_empty() {
        let (_temp_dir, src) = source_dir();
        let rules = validate(&[json!({
            "source": src,
            "destination": "/backup",
            "exclude": {"files": null, "directories": ["tmp"]}
        })])
        .expect("Rule should validate");
        assert!(rules[0].exclusions.files.is_empty());
        assert_eq!(rules[0].exclusions.directories.len(), 1);
    }

    #[test]
    fn test_empty_rule_set_is_valid() {
        assert!(validate(&[]).expect("Empty set should validate").is_empty());
    }
}
