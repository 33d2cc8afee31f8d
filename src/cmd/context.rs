/*!
`context.rs`

The capability surface a verb executes against.

Verbs never touch a transport, the filesystem, or the user's browser
directly; everything observable goes through [`ExecutionContext`]. The
default implementation, [`SchedulerContext`], binds those capabilities to
the cluster registry and the REST client. Tests substitute a recording
fake and assert on the calls instead of performing I/O.
*/

use std::collections::HashMap;
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cmd::dispatch::{CommandError, EXIT_NETWORK_ERROR, EXIT_PERMISSION_VIOLATION};
use crate::config::{ConfigRequest, JobConfig, load_job_config};
use crate::sched::{
    Clusters, JobKey, ResponseCode, RestClient, SchedulerHandle, SchedulerResponse,
};

/// Capabilities every verb executes against. All of them are mandatory; a
/// deployment that cannot provide one fails when the context is built, not
/// by silently skipping the capability later.
pub trait ExecutionContext {
    /// A scheduler handle bound to the named cluster. Implementations may
    /// cache per cluster; a repeated call within one invocation is cheap.
    fn scheduler_client(&mut self, cluster: &str) -> Result<SchedulerHandle, CommandError>;

    /// Load and validate the job config for `key`.
    fn load_job_config(
        &mut self,
        key: &JobKey,
        request: &ConfigRequest,
    ) -> Result<JobConfig, CommandError>;

    /// Log a scheduler response and convert a non-OK outcome into the
    /// matching command failure. Every RPC-backed verb routes its response
    /// through here; no verb decides success on its own.
    fn report_outcome(&mut self, response: &SchedulerResponse) -> Result<(), CommandError>;

    /// Best-effort page open. Never escalates a failure.
    fn open_in_browser(&mut self, url: &str);
}

/// Shared response check used by every context implementation, so fakes
/// classify outcomes exactly like the real context does.
pub(crate) fn check_response(response: &SchedulerResponse) -> Result<(), CommandError> {
    info!(
        "Response from scheduler: {} (message: {})",
        response.code, response.message
    );
    if response.is_ok() {
        return Ok(());
    }
    let code = match response.code {
        ResponseCode::PermissionDenied => EXIT_PERMISSION_VIOLATION,
        _ => EXIT_NETWORK_ERROR,
    };
    Err(CommandError::new(code, response.message.clone()))
}

/* ----------------------------- Default context ----------------------------- */

/// Production context: cluster registry + one cached REST client per
/// cluster touched during the invocation.
pub struct SchedulerContext {
    clusters: Clusters,
    handles: HashMap<String, SchedulerHandle>,
}

impl SchedulerContext {
    /// Build against the default cluster registry. A missing or invalid
    /// registry fails here, before any command logic runs.
    pub fn from_default_registry() -> Result<SchedulerContext, CommandError> {
        Ok(Self::new(Clusters::load_default()?))
    }

    pub fn new(clusters: Clusters) -> SchedulerContext {
        SchedulerContext {
            clusters,
            handles: HashMap::new(),
        }
    }
}

impl ExecutionContext for SchedulerContext {
    fn scheduler_client(&mut self, cluster: &str) -> Result<SchedulerHandle, CommandError> {
        if let Some(handle) = self.handles.get(cluster) {
            return Ok(handle.clone());
        }
        let entry = self.clusters.get(cluster)?;
        let client = RestClient::connect(entry)?;
        let handle: SchedulerHandle = Arc::new(client);
        self.handles.insert(cluster.to_string(), handle.clone());
        Ok(handle)
    }

    fn load_job_config(
        &mut self,
        key: &JobKey,
        request: &ConfigRequest,
    ) -> Result<JobConfig, CommandError> {
        Ok(load_job_config(key, request)?)
    }

    fn report_outcome(&mut self, response: &SchedulerResponse) -> Result<(), CommandError> {
        check_response(response)
    }

    fn open_in_browser(&mut self, url: &str) {
        let opener = if cfg!(target_os = "macos") {
            "open"
        } else if cfg!(target_os = "windows") {
            "explorer"
        } else {
            "xdg-open"
        };
        let spawned = Command::new(opener)
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(_) => debug!(url, "opened job page"),
            Err(err) => debug!(url, error = %err, "could not open browser"),
        }
    }
}

/* ------------------------------- Test doubles ------------------------------ */

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::cmd::shards::ShardSet;
    use crate::config::TaskSpec;
    use crate::sched::types::{ApiError, SchedulerApi, TaskState, TaskStatus};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use url::Url;

    /// Scheduler fake driven by a script of queued status results. Mutating
    /// calls are recorded and answered with configurable responses.
    pub struct ScriptedApi {
        status_script: Mutex<VecDeque<Result<Vec<TaskStatus>, String>>>,
        status_count: Mutex<usize>,
        status_filters: Mutex<Vec<Option<ShardSet>>>,
        create_calls: Mutex<Vec<JobConfig>>,
        kill_calls: Mutex<Vec<(JobKey, Option<Vec<u32>>)>>,
        restart_calls: Mutex<Vec<(JobKey, Vec<u32>)>>,
        create_response: Mutex<SchedulerResponse>,
        kill_response: Mutex<SchedulerResponse>,
        restart_response: Mutex<SchedulerResponse>,
        web: Url,
    }

    impl ScriptedApi {
        pub fn new() -> ScriptedApi {
            ScriptedApi {
                status_script: Mutex::new(VecDeque::new()),
                status_count: Mutex::new(0),
                status_filters: Mutex::new(Vec::new()),
                create_calls: Mutex::new(Vec::new()),
                kill_calls: Mutex::new(Vec::new()),
                restart_calls: Mutex::new(Vec::new()),
                create_response: Mutex::new(SchedulerResponse::ok("OK")),
                kill_response: Mutex::new(SchedulerResponse::ok("OK")),
                restart_response: Mutex::new(SchedulerResponse::ok("OK")),
                web: Url::parse("http://scheduler.example.org:8081").unwrap(),
            }
        }

        /// Queue one status result; instance ids are assigned in order.
        pub fn push_status(&self, states: &[TaskState]) {
            let statuses = states
                .iter()
                .enumerate()
                .map(|(i, s)| TaskStatus {
                    instance: i as u32,
                    state: *s,
                })
                .collect();
            self.status_script.lock().unwrap().push_back(Ok(statuses));
        }

        /// Queue one status result with explicit instance ids.
        pub fn push_status_instances(&self, instances: &[(u32, TaskState)]) {
            let statuses = instances
                .iter()
                .map(|(instance, state)| TaskStatus {
                    instance: *instance,
                    state: *state,
                })
                .collect();
            self.status_script.lock().unwrap().push_back(Ok(statuses));
        }

        /// Queue one failing status query.
        pub fn push_status_error(&self, message: &str) {
            self.status_script
                .lock()
                .unwrap()
                .push_back(Err(message.to_string()));
        }

        pub fn set_create_response(&self, response: SchedulerResponse) {
            *self.create_response.lock().unwrap() = response;
        }

        pub fn set_kill_response(&self, response: SchedulerResponse) {
            *self.kill_response.lock().unwrap() = response;
        }

        pub fn set_restart_response(&self, response: SchedulerResponse) {
            *self.restart_response.lock().unwrap() = response;
        }

        pub fn status_calls(&self) -> usize {
            *self.status_count.lock().unwrap()
        }

        pub fn last_status_filter(&self) -> Option<ShardSet> {
            self.status_filters.lock().unwrap().last().cloned().flatten()
        }

        pub fn create_calls(&self) -> Vec<JobConfig> {
            self.create_calls.lock().unwrap().clone()
        }

        pub fn kill_calls(&self) -> Vec<(JobKey, Option<Vec<u32>>)> {
            self.kill_calls.lock().unwrap().clone()
        }

        pub fn restart_calls(&self) -> Vec<(JobKey, Vec<u32>)> {
            self.restart_calls.lock().unwrap().clone()
        }
    }

    impl SchedulerApi for ScriptedApi {
        fn create_job(&self, config: &JobConfig) -> Result<SchedulerResponse, ApiError> {
            self.create_calls.lock().unwrap().push(config.clone());
            Ok(self.create_response.lock().unwrap().clone())
        }

        fn kill_job(
            &self,
            key: &JobKey,
            shards: Option<&ShardSet>,
        ) -> Result<SchedulerResponse, ApiError> {
            self.kill_calls
                .lock()
                .unwrap()
                .push((key.clone(), shards.map(|s| s.to_vec())));
            Ok(self.kill_response.lock().unwrap().clone())
        }

        fn restart_shards(
            &self,
            key: &JobKey,
            shards: &[u32],
        ) -> Result<SchedulerResponse, ApiError> {
            self.restart_calls
                .lock()
                .unwrap()
                .push((key.clone(), shards.to_vec()));
            Ok(self.restart_response.lock().unwrap().clone())
        }

        fn tasks_status(
            &self,
            _key: &JobKey,
            shards: Option<&ShardSet>,
        ) -> Result<Vec<TaskStatus>, ApiError> {
            *self.status_count.lock().unwrap() += 1;
            self.status_filters.lock().unwrap().push(shards.cloned());
            match self.status_script.lock().unwrap().pop_front() {
                Some(Ok(statuses)) => Ok(statuses),
                Some(Err(message)) => Err(ApiError::Query(message)),
                None => Ok(Vec::new()),
            }
        }

        fn web_url(&self) -> &Url {
            &self.web
        }
    }

    /// Context fake: hands out one [`ScriptedApi`] for every cluster and
    /// records config loads, reported outcomes, and opened pages.
    pub struct RecordingContext {
        pub api: Arc<ScriptedApi>,
        pub config: Option<JobConfig>,
        pub config_error: Option<String>,
        pub config_requests: Vec<ConfigRequest>,
        pub reported: Vec<SchedulerResponse>,
        pub opened_urls: Vec<String>,
    }

    impl RecordingContext {
        pub fn new() -> RecordingContext {
            RecordingContext {
                api: Arc::new(ScriptedApi::new()),
                config: None,
                config_error: None,
                config_requests: Vec::new(),
                reported: Vec::new(),
                opened_urls: Vec::new(),
            }
        }

        /// Pre-load a plausible config for the given key.
        pub fn with_config_for(mut self, key: &JobKey, instances: u32) -> RecordingContext {
            self.config = Some(JobConfig {
                cluster: key.cluster.clone(),
                role: key.role.clone(),
                environment: key.environment.clone(),
                name: key.name.clone(),
                instances,
                task: TaskSpec {
                    command: "echo hello".into(),
                    cpus: 0.1,
                    ram_mb: 64,
                    disk_mb: 64,
                },
            });
            self
        }
    }

    impl ExecutionContext for RecordingContext {
        fn scheduler_client(&mut self, _cluster: &str) -> Result<SchedulerHandle, CommandError> {
            Ok(self.api.clone())
        }

        fn load_job_config(
            &mut self,
            _key: &JobKey,
            request: &ConfigRequest,
        ) -> Result<JobConfig, CommandError> {
            self.config_requests.push(request.clone());
            if let Some(message) = &self.config_error {
                return Err(CommandError::invalid_configuration(message.clone()));
            }
            self.config
                .clone()
                .ok_or_else(|| CommandError::invalid_configuration("no config scripted"))
        }

        fn report_outcome(&mut self, response: &SchedulerResponse) -> Result<(), CommandError> {
            self.reported.push(response.clone());
            check_response(response)
        }

        fn open_in_browser(&mut self, url: &str) {
            self.opened_urls.push(url.to_string());
        }
    }
}
