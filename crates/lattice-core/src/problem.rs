use crate::compare::CompareMode;
use crate::entry::EntryHints;
use crate::error::GradeError;
use crate::value::Value;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const PROBLEM_FILE: &str = "problem.yaml";
const UNKNOWN_ID: &str = "unknown";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProblemSpec {
    #[serde(default, deserialize_with = "problem_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub test_cases: Vec<TestCase>,
    #[serde(default, alias = "starter_code", deserialize_with = "null_as_default")]
    pub starter_code_python: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entry_point: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timeout_ms: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comparison: CompareMode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestCase {
    #[serde(default = "unknown_id", deserialize_with = "case_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input: BTreeMap<String, Value>,
    #[serde(default)]
    pub expected: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub explanation: String,
    #[serde(default)]
    pub comparison: Option<CompareMode>,
}

fn unknown_id() -> String {
    UNKNOWN_ID.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn problem_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Str(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn case_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(problem_id(deserializer)?.unwrap_or_else(unknown_id))
}

impl ProblemSpec {
    /// Reads `path/problem.yaml` when `path` is a directory, otherwise `path`
    /// itself.
    pub fn load(path: &Path) -> Result<Self, GradeError> {
        let file = problem_file(path);
        if !file.is_file() {
            return Err(GradeError::ProblemNotFound(file));
        }
        let text = std::fs::read_to_string(&file).map_err(|source| GradeError::Io {
            path: file.clone(),
            source,
        })?;
        Self::from_yaml(&text, &file)
    }

    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, GradeError> {
        let spec: Option<ProblemSpec> =
            serde_yaml::from_str(text).map_err(|err| GradeError::ProblemParse {
                path: origin.to_path_buf(),
                message: err.to_string(),
            })?;
        let spec = spec.unwrap_or_default();
        if spec.test_cases.is_empty() {
            return Err(GradeError::NoTestCases);
        }
        Ok(spec)
    }

    pub fn entry_hints(&self) -> EntryHints {
        EntryHints {
            explicit: self.entry_point.clone(),
            starter_code: self.starter_code_python.clone(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.id
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(UNKNOWN_ID)
    }
}

pub fn problem_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(PROBLEM_FILE)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ProblemSpec, GradeError> {
        ProblemSpec::from_yaml(text, Path::new("problem.yaml"))
    }

    #[test]
    fn defaults_fill_missing_test_case_fields() {
        let spec = parse("test_cases:\n  - input: {x: 1}\n  - id: 7\n    expected: [1, 2]\n").unwrap();
        assert_eq!(spec.test_cases[0].id, "unknown");
        assert_eq!(spec.test_cases[0].expected, Value::Null);
        assert_eq!(spec.test_cases[1].id, "7");
        assert!(spec.test_cases[1].input.is_empty());
        assert_eq!(spec.comparison, CompareMode::Ordered);
        assert_eq!(parse("id: 12\ntest_cases: [{}]\n").unwrap().id.as_deref(), Some("12"));
    }

    #[test]
    fn starter_code_alias_and_overrides_are_read() {
        let spec = parse(
            "starter_code: \"def f(x):\\n    pass\\n\"\ntimeout_ms: 500\ncomparison: unordered\ntest_cases:\n  - id: a\n    comparison: ordered\n",
        )
        .unwrap();
        assert!(spec.starter_code_python.unwrap().starts_with("def f"));
        assert_eq!(spec.timeout_ms, Some(500));
        assert_eq!(spec.comparison, CompareMode::Unordered);
        assert_eq!(spec.test_cases[0].comparison, Some(CompareMode::Ordered));
    }

    #[test]
    fn empty_or_missing_test_cases_fail() {
        assert!(matches!(parse("title: x\ntest_cases: []\n"), Err(GradeError::NoTestCases)));
        assert!(matches!(parse(""), Err(GradeError::NoTestCases)));
        assert!(matches!(parse("test_cases:\n"), Err(GradeError::NoTestCases)));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = parse("test_cases: [\n").unwrap_err();
        assert!(err.to_string().starts_with("Error loading problem: problem.yaml: "));
    }

    #[test]
    fn missing_directory_reports_the_problem_file() {
        let err = ProblemSpec::load(Path::new("/nonexistent/lattice/problem")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Problem file not found: /nonexistent/lattice/problem"
        );
    }
}
