use super::{Execution, Executor, Fault, Outcome};
use crate::candidate::{CallError, EntryPoint};
use crate::config::Isolation;
use crate::value::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Runs each call in the candidate's Python worker. A call that misses its
/// deadline has its worker killed; the next call reloads the candidate.
pub struct ProcessExecutor {
    entry: EntryPoint,
    deadline: Duration,
    isolation: Isolation,
}

impl ProcessExecutor {
    pub fn new(entry: EntryPoint, deadline: Duration, isolation: Isolation) -> Self {
        Self {
            entry,
            deadline,
            isolation,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis().try_into().unwrap_or(u64::MAX)
}

impl Executor for ProcessExecutor {
    fn execute(&self, input: &BTreeMap<String, Value>) -> Execution {
        let started = Instant::now();
        let (outcome, elapsed) = match self.entry.invoke(input, self.deadline, self.isolation) {
            Ok(reply) => {
                let elapsed = reply
                    .elapsed_ms
                    .filter(|ms| ms.is_finite())
                    .map(|ms| Duration::from_secs_f64(ms.max(0.0) / 1000.0))
                    .unwrap_or_else(|| started.elapsed());
                (reply.outcome, elapsed)
            }
            Err(CallError::Timeout) => {
                tracing::warn!(
                    entry = self.entry.name(),
                    deadline_ms = millis(self.deadline),
                    "call exceeded deadline; worker killed"
                );
                (Outcome::Faulted(Fault::timeout(self.deadline)), started.elapsed())
            }
            Err(err) => (Outcome::Faulted(Fault::internal(err.to_string())), started.elapsed()),
        };
        Execution { outcome, elapsed }
    }
}
