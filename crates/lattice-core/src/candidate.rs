use crate::config::{GradeConfig, Isolation, PythonCommand};
use crate::error::GradeError;
use crate::value::Value;
use crate::worker::{CallReply, LoadReply, Worker, WorkerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// A function or class defined in the candidate source.
    Function,
    /// Any other callable, such as an imported function.
    Native,
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// The name is also a Python builtin.
    #[serde(default)]
    pub shadows_builtin: bool,
}

impl Symbol {
    pub fn is_callable(&self) -> bool {
        self.kind != SymbolKind::Value
    }
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("call exceeded its deadline")]
    Timeout,
    #[error("reloading the candidate failed: {0}")]
    Reload(GradeError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

pub struct CandidateLoader {
    python: PythonCommand,
    load_timeout: Duration,
    max_depth: usize,
}

impl CandidateLoader {
    pub fn new(config: &GradeConfig) -> Self {
        Self {
            python: config.python.clone(),
            load_timeout: config.load_timeout,
            max_depth: config.max_depth,
        }
    }

    /// Starts a worker and executes the candidate's top-level statements in
    /// it exactly once, in a fresh module named `solution`.
    pub fn load(&self, path: &Path) -> Result<CandidateNamespace, GradeError> {
        if !path.is_file() {
            return Err(GradeError::CandidateNotFound(path.to_path_buf()));
        }
        let mut session = Session {
            python: self.python.clone(),
            candidate: path.to_path_buf(),
            load_timeout: self.load_timeout,
            max_depth: self.max_depth,
            worker: None,
            calls: 0,
        };
        let symbols = session.start()?;
        Ok(CandidateNamespace {
            path: path.to_path_buf(),
            symbols: symbols.into(),
            session: Arc::new(Mutex::new(session)),
        })
    }
}

struct Session {
    python: PythonCommand,
    candidate: PathBuf,
    load_timeout: Duration,
    max_depth: usize,
    worker: Option<Worker>,
    /// Calls served by the current worker.
    calls: usize,
}

impl Session {
    fn start(&mut self) -> Result<Vec<Symbol>, GradeError> {
        self.worker = None;
        let mut worker = Worker::spawn(&self.python).map_err(|err| GradeError::Runtime {
            program: self.python.program.clone(),
            message: err.to_string(),
        })?;
        let reply = worker.load(&self.candidate, self.max_depth, self.load_timeout);
        match reply {
            Ok(LoadReply::Loaded { symbols }) => {
                self.worker = Some(worker);
                self.calls = 0;
                Ok(symbols)
            }
            Ok(LoadReply::SyntaxError { message }) => Err(GradeError::Syntax(message)),
            Ok(LoadReply::Failed { kind, message, .. }) => {
                Err(GradeError::Load(format!("{kind}: {message}")))
            }
            Err(WorkerError::Deadline(_)) => {
                worker.kill();
                Err(GradeError::Load(format!(
                    "Timeout: top-level execution exceeded {} seconds",
                    self.load_timeout.as_secs_f64()
                )))
            }
            Err(err) => {
                worker.kill();
                Err(GradeError::Load(format!("InternalError: {err}")))
            }
        }
    }

    fn call(
        &mut self,
        entry: &str,
        input: &BTreeMap<String, Value>,
        deadline: Duration,
        isolation: Isolation,
    ) -> Result<CallReply, CallError> {
        let stale = isolation == Isolation::Fresh && self.calls > 0;
        if self.worker.is_none() || stale {
            tracing::debug!(candidate = %self.candidate.display(), "reloading candidate");
            self.start().map_err(CallError::Reload)?;
        }
        let Some(worker) = self.worker.as_mut() else {
            return Err(CallError::Worker(WorkerError::Exited));
        };
        self.calls += 1;
        match worker.call(entry, input, deadline) {
            Ok(reply) => Ok(reply),
            Err(err) => {
                worker.kill();
                self.worker = None;
                match err {
                    WorkerError::Deadline(_) => Err(CallError::Timeout),
                    other => Err(CallError::Worker(other)),
                }
            }
        }
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Top-level names of a loaded candidate, in definition order, together with
/// the worker that holds them.
#[derive(Clone)]
pub struct CandidateNamespace {
    path: PathBuf,
    symbols: Arc<[Symbol]>,
    session: Arc<Mutex<Session>>,
}

impl CandidateNamespace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn entry_point(&self, name: &str) -> Option<EntryPoint> {
        self.symbols
            .iter()
            .any(|symbol| symbol.name == name && symbol.is_callable())
            .then(|| EntryPoint {
                name: Arc::from(name),
                session: self.session.clone(),
            })
    }
}

/// A callable resolved from a [`CandidateNamespace`].
#[derive(Clone)]
pub struct EntryPoint {
    name: Arc<str>,
    session: Arc<Mutex<Session>>,
}

impl EntryPoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls the entry point with `input` bound as keyword arguments. A call
    /// that misses `deadline` kills the worker, and the next call reloads
    /// the candidate in a new one.
    pub fn invoke(
        &self,
        input: &BTreeMap<String, Value>,
        deadline: Duration,
        isolation: Isolation,
    ) -> Result<CallReply, CallError> {
        lock(&self.session).call(&self.name, input, deadline, isolation)
    }
}
