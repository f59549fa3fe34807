use crate::candidate::Symbol;
use crate::config::PythonCommand;
use crate::executor::Outcome;
use crate::value::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

/// Python side of the protocol, passed to the interpreter with `-c`.
const HARNESS: &str = include_str!("harness.py");

/// Time a worker gets to exit on its own once its stdin is closed.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// One line of JSON on the worker's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WorkerRequest {
    Load {
        candidate: PathBuf,
        max_depth: usize,
    },
    Call {
        entry: String,
        input: BTreeMap<String, Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadReply {
    Loaded {
        symbols: Vec<Symbol>,
    },
    SyntaxError {
        message: String,
    },
    Failed {
        kind: String,
        message: String,
        #[serde(default)]
        traceback: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallReply {
    pub outcome: Outcome,
    /// Time spent inside the candidate function, measured by the worker.
    #[serde(default)]
    pub elapsed_ms: Option<f64>,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to spawn {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("worker I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker exited without a reply")]
    Exited,
    #[error("no reply within {} ms", .0.as_millis())]
    Deadline(Duration),
    #[error("malformed worker message: {0}")]
    Protocol(#[from] serde_json::Error),
}

/// A Python interpreter running the harness, answering one request per
/// line. Dropping it closes stdin and reaps the process.
pub struct Worker {
    child: Child,
    stdin: Option<ChildStdin>,
    replies: Receiver<std::io::Result<String>>,
}

impl Worker {
    pub fn spawn(python: &PythonCommand) -> Result<Self, WorkerError> {
        let mut child = Command::new(&python.program)
            .args(&python.args)
            .arg("-c")
            .arg(HARNESS)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| WorkerError::Spawn {
                program: python.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let (tx, replies) = mpsc::channel();
        let worker = Worker {
            stdin: child.stdin.take(),
            child,
            replies,
        };
        if let Some(stdout) = stdout {
            thread::Builder::new()
                .name("lattice-worker-reader".to_string())
                .spawn(move || {
                    for line in BufReader::new(stdout).lines() {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                })?;
        }
        tracing::debug!(pid = worker.child.id(), "python worker started");
        Ok(worker)
    }

    pub fn load(
        &mut self,
        candidate: &Path,
        max_depth: usize,
        deadline: Duration,
    ) -> Result<LoadReply, WorkerError> {
        self.send(&WorkerRequest::Load {
            candidate: candidate.to_path_buf(),
            max_depth,
        })?;
        self.receive(deadline)
    }

    /// Calls `entry` with `input` as keyword arguments and waits at most
    /// `deadline` for the reply.
    pub fn call(
        &mut self,
        entry: &str,
        input: &BTreeMap<String, Value>,
        deadline: Duration,
    ) -> Result<CallReply, WorkerError> {
        let input = input
            .iter()
            .map(|(key, value)| (key.clone(), value.to_wire()))
            .collect();
        self.send(&WorkerRequest::Call {
            entry: entry.to_string(),
            input,
        })?;
        let CallReply {
            outcome,
            elapsed_ms,
        } = self.receive(deadline)?;
        let outcome = match outcome {
            Outcome::Returned(value) => Outcome::Returned(Value::from_wire(value)),
            faulted => faulted,
        };
        Ok(CallReply {
            outcome,
            elapsed_ms,
        })
    }

    pub fn kill(&mut self) {
        self.stdin.take();
        self.child.kill().ok();
        let _ = self.child.wait();
    }

    fn send(&mut self, request: &WorkerRequest) -> Result<(), WorkerError> {
        let stdin = self.stdin.as_mut().ok_or(WorkerError::Exited)?;
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        stdin.write_all(&line)?;
        stdin.flush()?;
        Ok(())
    }

    fn receive<T: DeserializeOwned>(&mut self, deadline: Duration) -> Result<T, WorkerError> {
        match self.replies.recv_timeout(deadline) {
            Ok(Ok(line)) => Ok(serde_json::from_str(&line)?),
            Ok(Err(err)) => Err(err.into()),
            Err(RecvTimeoutError::Timeout) => Err(WorkerError::Deadline(deadline)),
            Err(RecvTimeoutError::Disconnected) => Err(WorkerError::Exited),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stdin.take();
        if !matches!(self.child.wait_timeout(SHUTDOWN_GRACE), Ok(Some(_))) {
            self.child.kill().ok();
            let _ = self.child.wait();
        }
    }
}
