use crate::error::GradeError;
use crate::executor::{Execution, Outcome};
use crate::problem::TestCase;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub input: BTreeMap<String, Value>,
    pub expected: Value,
    pub explanation: String,
    pub passed: bool,
    pub output: Value,
    pub error: Option<String>,
    pub execution_time_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl TestResult {
    /// Folds one execution into a result; `passed` is only consulted for a
    /// returned value.
    pub fn from_execution(case: &TestCase, execution: Execution, passed: impl FnOnce(&Value) -> bool) -> Self {
        let mut result = TestResult {
            id: case.id.clone(),
            input: case.input.clone(),
            expected: case.expected.clone(),
            explanation: case.explanation.clone(),
            passed: false,
            output: Value::Null,
            error: None,
            execution_time_ms: round_ms(execution.elapsed),
            traceback: None,
        };
        match execution.outcome {
            Outcome::Returned(value) => {
                result.passed = passed(&value);
                result.output = value;
            }
            Outcome::Faulted(fault) => {
                result.error = Some(fault.to_string());
                result.traceback = fault.traceback().map(str::to_string);
            }
        }
        result
    }
}

fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub success: bool,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<TestResult>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn from_results(results: Vec<TestResult>) -> Self {
        let passed = results.iter().filter(|result| result.passed).count();
        Self {
            success: true,
            total: results.len(),
            passed,
            failed: results.len() - passed,
            results,
            error: None,
        }
    }

    pub fn failure(error: &GradeError) -> Self {
        Self {
            success: false,
            total: 0,
            passed: 0,
            failed: 0,
            results: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.success && self.failed == 0
    }

    /// One line per test case plus a summary, for terminals.
    pub fn render_text(&self) -> String {
        if let Some(error) = &self.error {
            return format!("ERROR {error}\n");
        }
        let mut out = String::new();
        for result in &self.results {
            let status = if result.passed { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "{status} {} ({:.2} ms)",
                result.id, result.execution_time_ms
            ));
            if let Some(error) = &result.error {
                out.push_str(&format!(": {error}"));
            } else if !result.passed {
                out.push_str(&format!(
                    ": expected {}, got {}",
                    result.expected, result.output
                ));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{} passed, {} failed, {} total\n",
            self.passed, self.failed, self.total
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Fault;

    fn case() -> TestCase {
        TestCase {
            id: "t1".to_string(),
            expected: Value::Int(3),
            ..TestCase::default()
        }
    }

    #[test]
    fn elapsed_is_rounded_to_two_decimals() {
        assert_eq!(round_ms(Duration::from_micros(1_234_567)), 1234.57);
    }

    #[test]
    fn faulted_execution_has_no_output_and_an_error() {
        let execution = Execution {
            outcome: Outcome::Faulted(Fault::timeout(Duration::from_secs(2))),
            elapsed: Duration::from_secs(2),
        };
        let result = TestResult::from_execution(&case(), execution, |_| true);
        assert!(!result.passed);
        assert_eq!(result.output, Value::Null);
        assert_eq!(
            result.error.as_deref(),
            Some("Timeout: execution exceeded 2 seconds")
        );
        assert_eq!(result.execution_time_ms, 2000.0);
    }

    #[test]
    fn mismatch_keeps_output_without_error() {
        let execution = Execution {
            outcome: Outcome::Returned(Value::Int(4)),
            elapsed: Duration::ZERO,
        };
        let report = RunReport::from_results(vec![TestResult::from_execution(
            &case(),
            execution,
            |_| false,
        )]);
        assert_eq!((report.total, report.passed, report.failed), (1, 0, 1));
        assert_eq!(report.results[0].output, Value::Int(4));
        assert!(report.results[0].error.is_none());
        assert!(report.render_text().contains("FAIL t1"));
        assert!(!report.all_passed());
    }

    #[test]
    fn failure_report_is_empty() {
        let report = RunReport::failure(&GradeError::NoTestCases);
        assert!(!report.success);
        assert_eq!((report.total, report.passed, report.failed), (0, 0, 0));
        assert_eq!(
            report.error.as_deref(),
            Some("No test cases found in problem definition")
        );
    }
}
