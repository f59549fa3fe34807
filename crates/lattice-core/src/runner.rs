use crate::candidate::CandidateLoader;
use crate::compare::compare;
use crate::config::GradeConfig;
use crate::entry::resolve_entry_point;
use crate::error::GradeError;
use crate::executor::{Executor, ProcessExecutor};
use crate::problem::ProblemSpec;
use crate::report::{RunReport, TestResult};
use std::path::Path;

/// Grades one candidate against one problem. Load and resolution failures
/// end the run; faults inside a test case only fail that case.
pub struct Grader {
    config: GradeConfig,
}

impl Grader {
    pub fn new(config: GradeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GradeConfig {
        &self.config
    }

    pub fn run(&self, problem_path: &Path, candidate_path: &Path) -> RunReport {
        match self.try_run(problem_path, candidate_path) {
            Ok(report) => report,
            Err(err) => {
                tracing::info!(error = %err, "run failed before executing tests");
                RunReport::failure(&err)
            }
        }
    }

    fn try_run(&self, problem_path: &Path, candidate_path: &Path) -> Result<RunReport, GradeError> {
        let problem = ProblemSpec::load(problem_path)?;
        tracing::debug!(
            problem = problem.display_name(),
            test_cases = problem.test_cases.len(),
            "problem loaded"
        );

        let namespace = CandidateLoader::new(&self.config).load(candidate_path)?;
        let entry_name = resolve_entry_point(
            &problem.entry_hints(),
            &self.config.fallback_names,
            namespace.symbols(),
        )?;
        tracing::debug!(entry = %entry_name, "entry point resolved");
        let entry = namespace
            .entry_point(&entry_name)
            .ok_or(GradeError::EntryPointNotFound)?;

        let deadline = self.config.effective_timeout(problem.timeout_ms);
        let executor = ProcessExecutor::new(entry, deadline, self.config.isolation);

        let mut results = Vec::with_capacity(problem.test_cases.len());
        for case in &problem.test_cases {
            let mode = case.comparison.unwrap_or(problem.comparison);
            let execution = executor.execute(&case.input);
            let result =
                TestResult::from_execution(case, execution, |actual| {
                    compare(actual, &case.expected, mode)
                });
            tracing::debug!(
                id = %result.id,
                passed = result.passed,
                error = result.error.as_deref().unwrap_or(""),
                "test case finished"
            );
            results.push(result);
        }
        Ok(RunReport::from_results(results))
    }
}
