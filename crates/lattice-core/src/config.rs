use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_DEPTH: usize = 1000;
pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_FALLBACK_NAMES: &[&str] = &[
    "solve",
    "solution",
    "main",
    "find_asteroid_pair",
    "find_top_k_pairs",
];

#[derive(Debug, Clone)]
pub struct GradeConfig {
    /// Per-call deadline. `None` defers to the problem's `timeout_ms`, then
    /// to [`DEFAULT_TIMEOUT`].
    pub timeout: Option<Duration>,
    pub load_timeout: Duration,
    /// Python recursion limit inside the worker.
    pub max_depth: usize,
    pub fallback_names: Vec<String>,
    pub python: PythonCommand,
    pub isolation: Isolation,
}

impl Default for GradeConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            fallback_names: DEFAULT_FALLBACK_NAMES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            python: PythonCommand::default(),
            isolation: Isolation::Shared,
        }
    }
}

impl GradeConfig {
    pub fn effective_timeout(&self, problem_timeout_ms: Option<u64>) -> Duration {
        self.timeout
            .or(problem_timeout_ms.map(Duration::from_millis))
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// Worker lifetime across the test cases of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Isolation {
    /// One worker for the whole run; module state carries over between
    /// calls until a call is killed.
    #[default]
    Shared,
    /// The candidate is reloaded in a fresh worker before every call after
    /// the first.
    Fresh,
}

/// Interpreter that runs the worker harness.
#[derive(Debug, Clone)]
pub struct PythonCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl PythonCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec!["-B".to_string()],
        }
    }
}

impl Default for PythonCommand {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}
