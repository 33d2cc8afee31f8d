/*!
Scheduler-facing side of the client: domain types, the cluster registry,
the HTTP transport, and the lifecycle monitor.

Commands reach all of this through the `SchedulerApi` trait; only the
execution context constructs concrete clients.
*/

pub mod client;
pub mod clusters;
pub mod monitor;
pub mod types;

pub use client::RestClient;
pub use clusters::{Cluster, Clusters, ClustersError};
pub use monitor::{JobMonitor, MonitorError};
pub use types::{
    AggregateState, ApiError, JobKey, JobKeyError, ResponseCode, SchedulerApi, SchedulerHandle,
    SchedulerResponse, TaskState, TaskStatus, job_page_url,
};
