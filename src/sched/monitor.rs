/*!
`monitor.rs`

Polling loop that watches a job's instances until a caller-supplied
predicate over the aggregate state holds, or a retry budget runs out.

The loop is deliberately blocking: the CLI has nothing else to do while it
waits. A failed status query classifies the attempt as `Unknown` and is
retried against the same budget; it is never reported as progress.
*/

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::cmd::shards::ShardSet;
use crate::sched::types::{
    AggregateState, InstanceStates, JobKey, SchedulerHandle, TaskStatus,
};

/// Default pause between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Default retry budget; with the default interval this bounds a wait to
/// roughly half an hour.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 180;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("job {key} did not reach the requested state after {attempts} status checks")]
    Timeout { key: JobKey, attempts: u32 },
}

/// Working state of one wait loop. Owned exclusively by the monitor and
/// discarded when the loop exits.
struct PollState {
    attempts: u32,
    last_observed: InstanceStates,
}

impl PollState {
    fn observe(&mut self, key: &JobKey, statuses: &[TaskStatus]) {
        for status in statuses {
            let previous = self.last_observed.insert(status.instance, status.state);
            if previous != Some(status.state) {
                debug!(
                    job = %key,
                    instance = status.instance,
                    state = ?status.state,
                    "instance transition"
                );
            }
        }
    }
}

/// Watches one job, optionally restricted to a shard subset.
pub struct JobMonitor {
    api: SchedulerHandle,
    key: JobKey,
    shards: Option<ShardSet>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl JobMonitor {
    pub fn new(api: SchedulerHandle, key: JobKey) -> JobMonitor {
        JobMonitor {
            api,
            key,
            shards: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Restrict status queries to the given instances.
    pub fn with_shards(mut self, shards: ShardSet) -> JobMonitor {
        self.shards = Some(shards);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> JobMonitor {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> JobMonitor {
        self.max_attempts = attempts;
        self
    }

    /// Poll until `predicate` holds for the aggregate instance state.
    ///
    /// Performs at most `max_attempts` status queries, sleeping between
    /// them, and returns as soon as the predicate is satisfied. Exhausting
    /// the budget is a [`MonitorError::Timeout`].
    pub fn wait_until(
        &self,
        predicate: impl Fn(AggregateState) -> bool,
    ) -> Result<(), MonitorError> {
        let mut state = PollState {
            attempts: 0,
            last_observed: InstanceStates::new(),
        };

        while state.attempts < self.max_attempts {
            state.attempts += 1;
            let aggregate = self.poll(&mut state);
            debug!(
                job = %self.key,
                attempt = state.attempts,
                aggregate = ?aggregate,
                "status poll"
            );
            if predicate(aggregate) {
                return Ok(());
            }
            if state.attempts < self.max_attempts {
                thread::sleep(self.poll_interval);
            }
        }

        Err(MonitorError::Timeout {
            key: self.key.clone(),
            attempts: state.attempts,
        })
    }

    /// Convenience wrapper: wait until no instance remains pending.
    pub fn wait_until_running_or_finished(&self) -> Result<(), MonitorError> {
        self.wait_until(AggregateState::running_or_finished)
    }

    /// Convenience wrapper: wait until every instance is terminal.
    pub fn wait_until_terminal(&self) -> Result<(), MonitorError> {
        self.wait_until(AggregateState::terminal)
    }

    fn poll(&self, state: &mut PollState) -> AggregateState {
        match self.api.tasks_status(&self.key, self.shards.as_ref()) {
            Ok(statuses) => {
                state.observe(&self.key, &statuses);
                AggregateState::of(&statuses)
            }
            Err(err) => {
                warn!(job = %self.key, error = %err, "status query failed, retrying");
                AggregateState::Unknown
            }
        }
    }
}

/* --------------------------------- Tests ---------------------------------- */
