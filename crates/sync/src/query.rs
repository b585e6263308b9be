use std::time::Duration;

use honey_core::{QueryService, QueryState, ServiceError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Fixed-interval polling budget. No backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query submission failed: {0}")]
    Submit(#[source] ServiceError),
    #[error("status check for {execution_id} failed: {source}")]
    Status {
        execution_id: String,
        #[source]
        source: ServiceError,
    },
    #[error("query {execution_id} failed: {reason}")]
    Failed { execution_id: String, reason: String },
    #[error("query {execution_id} did not finish after {attempts} status checks")]
    TimedOut { execution_id: String, attempts: u32 },
    #[error("stopped polling query {execution_id} after {attempts} status checks: shutting down")]
    Interrupted { execution_id: String, attempts: u32 },
}

/// Where a single execution is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    Submitted { execution_id: String },
    Polling { execution_id: String, attempt: u32 },
    Succeeded { execution_id: String },
    Failed { execution_id: String, reason: String },
    TimedOut { execution_id: String, attempts: u32 },
    Interrupted { execution_id: String, attempts: u32 },
}

/// Submits a query and polls it to a terminal state.
pub struct QueryRunner<'a, Q, C> {
    service: &'a Q,
    clock: &'a C,
    policy: PollPolicy,
}

impl<'a, Q: QueryService, C: Clock> QueryRunner<'a, Q, C> {
    pub fn new(service: &'a Q, clock: &'a C, policy: PollPolicy) -> Self {
        Self {
            service,
            clock,
            policy,
        }
    }

    /// One submission, no retry.
    pub fn submit(
        &self,
        query: &str,
        database: &str,
        workgroup: &str,
    ) -> Result<String, QueryError> {
        let execution_id = self
            .service
            .submit(query, database, workgroup)
            .map_err(QueryError::Submit)?;
        debug!(%execution_id, "query submitted");
        Ok(execution_id)
    }

    /// Polls `execution_id` until it succeeds, fails, or the budget runs out.
    /// Sleeps only between status checks.
    pub fn poll(&self, execution_id: &str) -> Result<String, QueryError> {
        let mut state = RunnerState::Submitted {
            execution_id: execution_id.to_string(),
        };
        loop {
            state = match state {
                RunnerState::Submitted { execution_id } => RunnerState::Polling {
                    execution_id,
                    attempt: 1,
                },
                RunnerState::Polling {
                    execution_id,
                    attempt,
                } => self.step(execution_id, attempt)?,
                RunnerState::Succeeded { execution_id } => {
                    info!(%execution_id, "query succeeded");
                    return Ok(execution_id);
                }
                RunnerState::Failed {
                    execution_id,
                    reason,
                } => {
                    warn!(%execution_id, %reason, "query failed");
                    return Err(QueryError::Failed {
                        execution_id,
                        reason,
                    });
                }
                RunnerState::TimedOut {
                    execution_id,
                    attempts,
                } => {
                    warn!(%execution_id, attempts, "query timed out");
                    return Err(QueryError::TimedOut {
                        execution_id,
                        attempts,
                    });
                }
                RunnerState::Interrupted {
                    execution_id,
                    attempts,
                } => {
                    info!(%execution_id, attempts, "stopped polling for shutdown");
                    return Err(QueryError::Interrupted {
                        execution_id,
                        attempts,
                    });
                }
            };
        }
    }

    pub fn run(&self, query: &str, database: &str, workgroup: &str) -> Result<String, QueryError> {
        let execution_id = self.submit(query, database, workgroup)?;
        self.poll(&execution_id)
    }

    fn step(&self, execution_id: String, attempt: u32) -> Result<RunnerState, QueryError> {
        let status = match self.service.get_status(&execution_id) {
            Ok(status) => status,
            Err(source) => {
                return Err(QueryError::Status {
                    execution_id,
                    source,
                });
            }
        };
        let next = match status.state {
            QueryState::Succeeded => RunnerState::Succeeded { execution_id },
            QueryState::Failed | QueryState::Cancelled => RunnerState::Failed {
                reason: status
                    .reason
                    .unwrap_or_else(|| format!("query ended in state {}", status.state)),
                execution_id,
            },
            QueryState::Queued | QueryState::Running if attempt >= self.policy.max_attempts => {
                RunnerState::TimedOut {
                    execution_id,
                    attempts: attempt,
                }
            }
            QueryState::Queued | QueryState::Running if self.clock.is_interrupted() => {
                RunnerState::Interrupted {
                    execution_id,
                    attempts: attempt,
                }
            }
            QueryState::Queued | QueryState::Running => {
                debug!(%execution_id, attempt, state = %status.state, "query still running");
                self.clock.sleep(self.policy.interval);
                RunnerState::Polling {
                    execution_id,
                    attempt: attempt + 1,
                }
            }
        };
        Ok(next)
    }
}
