mod process;

pub use process::ProcessExecutor;

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const INTERNAL_ERROR: &str = "InternalError";

/// Runs the resolved entry point once per test case input.
pub trait Executor {
    fn execute(&self, input: &BTreeMap<String, Value>) -> Execution;
}

#[derive(Debug, Clone)]
pub struct Execution {
    pub outcome: Outcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Returned(Value),
    Faulted(Fault),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fault {
    Timeout {
        deadline_ms: u64,
    },
    Execution {
        kind: String,
        message: String,
        /// Python's own rendering, outermost frame first.
        #[serde(default)]
        traceback: Option<String>,
    },
}

impl Fault {
    pub fn timeout(deadline: Duration) -> Self {
        Fault::Timeout {
            deadline_ms: deadline.as_millis().try_into().unwrap_or(u64::MAX),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Fault::Execution {
            kind: INTERNAL_ERROR.to_string(),
            message: message.into(),
            traceback: None,
        }
    }

    pub fn traceback(&self) -> Option<&str> {
        match self {
            Fault::Execution { traceback, .. } => traceback.as_deref(),
            Fault::Timeout { .. } => None,
        }
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::Timeout { deadline_ms } => write!(
                f,
                "Timeout: execution exceeded {} seconds",
                *deadline_ms as f64 / 1000.0
            ),
            Fault::Execution { kind, message, .. } => write!(f, "{kind}: {message}"),
        }
    }
}
