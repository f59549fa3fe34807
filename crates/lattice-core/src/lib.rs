pub mod candidate;
pub mod compare;
pub mod config;
pub mod entry;
pub mod error;
pub mod executor;
pub mod problem;
pub mod report;
pub mod runner;
pub mod value;
pub mod worker;

pub use candidate::{CallError, CandidateLoader, CandidateNamespace, EntryPoint, Symbol, SymbolKind};
pub use compare::{compare, normalize, values_equal, CompareMode};
pub use config::{GradeConfig, Isolation, PythonCommand};
pub use entry::{resolve_entry_point, starter_function_names, EntryHints};
pub use error::GradeError;
pub use executor::{Execution, Executor, Fault, Outcome, ProcessExecutor};
pub use problem::{ProblemSpec, TestCase};
pub use report::{RunReport, TestResult};
pub use runner::Grader;
pub use value::Value;
pub use worker::{CallReply, LoadReply, Worker, WorkerError, WorkerRequest};
