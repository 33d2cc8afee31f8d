/*!
`types.rs`

Domain types shared between the command surface and the scheduler transport:

  - JobKey        : the four-part job identity (cluster/role/env/name)
  - TaskState     : per-instance state as reported by the scheduler
  - AggregateState: reduction of all instance states used by wait predicates
  - SchedulerResponse / ResponseCode : outcome of a scheduler RPC
  - SchedulerApi  : the narrow trait every transport implements
*/

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::cmd::shards::ShardSet;
use crate::config::JobConfig;

/* ------------------------------- Job identity ------------------------------ */

/// Raised when a job path does not have the `cluster/role/env/name` shape.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid job key '{path}': expected cluster/role/env/name")]
pub struct JobKeyError {
    pub path: String,
}

/// The four-part key identifying a job. Components are taken verbatim from
/// the path, with no trimming or case folding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub cluster: String,
    pub role: String,
    pub environment: String,
    pub name: String,
}

impl JobKey {
    /// Parse a `/`-delimited path into a key. Exactly four non-empty
    /// components are required; anything else is a [`JobKeyError`], never a
    /// partially-populated key.
    pub fn from_path(path: &str) -> Result<JobKey, JobKeyError> {
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            [cluster, role, environment, name]
                if !cluster.is_empty()
                    && !role.is_empty()
                    && !environment.is_empty()
                    && !name.is_empty() =>
            {
                Ok(JobKey {
                    cluster: cluster.to_string(),
                    role: role.to_string(),
                    environment: environment.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(JobKeyError {
                path: path.to_string(),
            }),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.cluster, self.role, self.environment, self.name
        )
    }
}

/// Scheduler web page for a job, used by `--open-browser`.
pub fn job_page_url(web: &Url, key: &JobKey) -> String {
    format!(
        "{}/scheduler/{}/{}/{}",
        web.as_str().trim_end_matches('/'),
        key.role,
        key.environment,
        key.name
    )
}

/* ------------------------------- Task states ------------------------------- */

/// Per-instance state as reported by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Accepted but not yet assigned to a host.
    Pending,
    /// Assigned and starting up.
    Assigned,
    /// Executing.
    Running,
    /// Completed successfully.
    Finished,
    /// Exited with an error.
    Failed,
    /// Terminated on request.
    Killed,
    /// The scheduler lost track of the instance.
    Lost,
}

impl TaskState {
    /// Terminal states will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Failed | TaskState::Killed | TaskState::Lost
        )
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TaskState::Pending | TaskState::Assigned)
    }
}

/// Status of one instance, as returned by a task status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub instance: u32,
    pub state: TaskState,
}

/// Reduction of all observed instance states into one classification.
///
/// `Unknown` covers a failed status query; it satisfies no wait predicate,
/// so a flaky scheduler is retried rather than mistaken for progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateState {
    Pending,
    Running,
    Finished,
    Unknown,
}

impl AggregateState {
    /// Classify a set of instance statuses. An empty set classifies as
    /// `Pending`: the job exists but no instance is visible yet.
    pub fn of(statuses: &[TaskStatus]) -> AggregateState {
        if statuses.is_empty() {
            return AggregateState::Pending;
        }
        if statuses.iter().any(|t| t.state.is_pending()) {
            AggregateState::Pending
        } else if statuses.iter().all(|t| t.state.is_terminal()) {
            AggregateState::Finished
        } else {
            AggregateState::Running
        }
    }

    /// Predicate: no instance remains pending.
    pub fn running_or_finished(self) -> bool {
        matches!(self, AggregateState::Running | AggregateState::Finished)
    }

    /// Predicate: every instance reached a terminal state.
    pub fn terminal(self) -> bool {
        matches!(self, AggregateState::Finished)
    }
}

/// Snapshot of instance states keyed by instance id, kept by the monitor
/// between polls so transitions can be logged.
pub type InstanceStates = BTreeMap<u32, TaskState>;

/* --------------------------- RPC outcome envelope -------------------------- */

/// Application-level result code carried in every scheduler response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    Ok,
    Error,
    PermissionDenied,
    JobNotFound,
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseCode::Ok => "OK",
            ResponseCode::Error => "ERROR",
            ResponseCode::PermissionDenied => "PERMISSION_DENIED",
            ResponseCode::JobNotFound => "JOB_NOT_FOUND",
        };
        f.write_str(s)
    }
}

/// Outcome of a scheduler RPC: a response code plus a human-readable
/// message. A non-OK response always carries a non-empty message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerResponse {
    pub code: ResponseCode,
    pub message: String,
}

impl SchedulerResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        SchedulerResponse {
            code: ResponseCode::Ok,
            message: message.into(),
        }
    }

    pub fn error(code: ResponseCode, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message = format!("scheduler returned {}", code);
        }
        SchedulerResponse { code, message }
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }
}

/* -------------------------------- API seam --------------------------------- */

/// Transport-level failure talking to a scheduler. Application-level
/// failures travel inside [`SchedulerResponse`] instead.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("scheduler request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode scheduler response: {0}")]
    Decode(String),

    #[error("status query rejected: {0}")]
    Query(String),
}

/// The narrow interface through which every command reaches a scheduler.
///
/// One handle is bound to one cluster's endpoint. Mutating calls return the
/// scheduler's [`SchedulerResponse`] even when the scheduler refuses the
/// operation; only transport and decoding problems surface as [`ApiError`].
pub trait SchedulerApi: Send + Sync {
    /// Submit a new job described by `config`.
    fn create_job(&self, config: &JobConfig) -> Result<SchedulerResponse, ApiError>;

    /// Kill all instances of a job, or only those in `shards`.
    fn kill_job(
        &self,
        key: &JobKey,
        shards: Option<&ShardSet>,
    ) -> Result<SchedulerResponse, ApiError>;

    /// Restart the given instances of a job.
    fn restart_shards(&self, key: &JobKey, shards: &[u32]) -> Result<SchedulerResponse, ApiError>;

    /// Current status of a job's instances, optionally shard-filtered.
    fn tasks_status(
        &self,
        key: &JobKey,
        shards: Option<&ShardSet>,
    ) -> Result<Vec<TaskStatus>, ApiError>;

    /// Base URL of the scheduler's web UI.
    fn web_url(&self) -> &Url;
}

/// Shared handle form used by the execution context and the monitor.
pub type SchedulerHandle = Arc<dyn SchedulerApi>;

/* --------------------------------- Tests ---------------------------------- */
