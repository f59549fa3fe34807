use std::path::PathBuf;
use thiserror::Error;

/// Failures that halt a grading run before or instead of executing tests.
#[derive(Debug, Error)]
pub enum GradeError {
    #[error("Problem file not found: {}", .0.display())]
    ProblemNotFound(PathBuf),

    #[error("Error loading problem: {}: {message}", .path.display())]
    ProblemParse { path: PathBuf, message: String },

    #[error("No test cases found in problem definition")]
    NoTestCases,

    #[error("Solution file not found: {}", .0.display())]
    CandidateNotFound(PathBuf),

    #[error("Syntax Error: {0}")]
    Syntax(String),

    #[error("Error loading solution: {0}")]
    Load(String),

    #[error("Could not start Python runtime {}: {message}", .program.display())]
    Runtime { program: PathBuf, message: String },

    #[error("Could not detect function to test")]
    EntryPointNotFound,

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
