/*!
`client.rs`

JSON/HTTP implementation of [`SchedulerApi`].

The CLI is synchronous end to end; this client owns a private tokio runtime
and drives each exchange to completion with `block_on`, so callers see plain
blocking methods. One client is bound to one cluster's endpoints.

Endpoints:
  POST {base}/jobs                                      submit a job
  POST {base}/jobs/{cluster}/{role}/{env}/{name}/kill   kill instances
  POST {base}/jobs/{cluster}/{role}/{env}/{name}/restart  restart instances
  GET  {base}/jobs/{cluster}/{role}/{env}/{name}/status   query instances
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use url::Url;

use crate::cmd::shards::ShardSet;
use crate::config::JobConfig;
use crate::sched::clusters::Cluster;
use crate::sched::types::{
    ApiError, JobKey, ResponseCode, SchedulerApi, SchedulerResponse, TaskStatus,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/* ------------------------------ Wire envelopes ----------------------------- */

#[derive(Debug, Deserialize)]
struct WireResponse {
    code: ResponseCode,
    #[serde(default)]
    message: String,
}

impl WireResponse {
    fn into_response(self) -> SchedulerResponse {
        match self.code {
            ResponseCode::Ok => SchedulerResponse::ok(self.message),
            code => SchedulerResponse::error(code, self.message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireStatusResponse {
    code: ResponseCode,
    #[serde(default)]
    message: String,
    #[serde(default)]
    tasks: Vec<TaskStatus>,
}

#[derive(Debug, Serialize)]
struct ShardPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    shards: Option<&'a [u32]>,
}

/* --------------------------------- Client ---------------------------------- */

/// Blocking JSON/HTTP scheduler client for one cluster.
pub struct RestClient {
    runtime: Runtime,
    http: reqwest::Client,
    base: String,
    web: Url,
}

impl RestClient {
    /// Build a client from a registry entry. Endpoint validation happened
    /// at registry load; runtime or TLS setup failures surface here.
    pub fn connect(cluster: &Cluster) -> Result<RestClient, ApiError> {
        let scheduler = cluster
            .scheduler_url()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let web = cluster
            .web_url()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let runtime = Runtime::new()
            .map_err(|e| ApiError::Decode(format!("cannot start IO runtime: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(RestClient {
            runtime,
            http,
            base: scheduler.as_str().trim_end_matches('/').to_string(),
            web,
        })
    }

    fn job_url(&self, key: &JobKey, action: &str) -> String {
        format!(
            "{}/jobs/{}/{}/{}/{}/{}",
            self.base, key.cluster, key.role, key.environment, key.name, action
        )
    }

    fn post_action(
        &self,
        url: String,
        shards: Option<&[u32]>,
    ) -> Result<SchedulerResponse, ApiError> {
        let payload = ShardPayload { shards };
        self.runtime.block_on(async {
            let wire: WireResponse = self
                .http
                .post(&url)
                .json(&payload)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .map_err(|e| ApiError::Decode(e.to_string()))?;
            Ok(wire.into_response())
        })
    }
}

impl SchedulerApi for RestClient {
    fn create_job(&self, config: &JobConfig) -> Result<SchedulerResponse, ApiError> {
        let url = format!("{}/jobs", self.base);
        self.runtime.block_on(async {
            let wire: WireResponse = self
                .http
                .post(&url)
                .json(config)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .map_err(|e| ApiError::Decode(e.to_string()))?;
            Ok(wire.into_response())
        })
    }

    fn kill_job(
        &self,
        key: &JobKey,
        shards: Option<&ShardSet>,
    ) -> Result<SchedulerResponse, ApiError> {
        let ids = shards.map(|s| s.to_vec());
        self.post_action(self.job_url(key, "kill"), ids.as_deref())
    }

    fn restart_shards(&self, key: &JobKey, shards: &[u32]) -> Result<SchedulerResponse, ApiError> {
        self.post_action(self.job_url(key, "restart"), Some(shards))
    }

    fn tasks_status(
        &self,
        key: &JobKey,
        shards: Option<&ShardSet>,
    ) -> Result<Vec<TaskStatus>, ApiError> {
        let mut url = self.job_url(key, "status");
        if let Some(filter) = shards {
            url.push_str(&format!("?shards={filter}"));
        }
        self.runtime.block_on(async {
            let wire: WireStatusResponse = self
                .http
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .map_err(|e| ApiError::Decode(e.to_string()))?;
            match wire.code {
                ResponseCode::Ok => Ok(wire.tasks),
                // A job the scheduler has not materialized yet polls as an
                // empty instance set, not as a query failure.
                ResponseCode::JobNotFound => Ok(Vec::new()),
                _ => Err(ApiError::Query(if wire.message.is_empty() {
                    format!("scheduler returned {}", wire.code)
                } else {
                    wire.message
                })),
            }
        })
    }

    fn web_url(&self) -> &Url {
        &self.web
    }
}

/* --------------------------------- Tests ---------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_response_normalizes_empty_error_message() {
        let wire: WireResponse =
            serde_json::from_str(r#"{"code":"ERROR"}"#).unwrap();
        let resp = wire.into_response();
        assert_eq!(resp.code, ResponseCode::Error);
        assert!(!resp.message.is_empty());
    }

    #[test]
    fn wire_status_decodes_tasks() {
        let wire: WireStatusResponse = serde_json::from_str(
            r#"{"code":"OK","tasks":[{"instance":0,"state":"RUNNING"},{"instance":1,"state":"PENDING"}]}"#,
        )
        .unwrap();
        assert_eq!(wire.tasks.len(), 2);
        assert_eq!(wire.tasks[1].instance, 1);
    }

    #[test]
    fn shard_payload_omits_absent_filter() {
        let body = serde_json::to_string(&ShardPayload { shards: None }).unwrap();
        assert_eq!(body, "{}");
        let body =
            serde_json::to_string(&ShardPayload { shards: Some(&[0, 2]) }).unwrap();
        assert_eq!(body, r#"{"shards":[0,2]}"#);
    }

    #[test]
    fn job_urls_embed_the_full_key() {
        let cluster = Cluster {
            name: "west".into(),
            scheduler_uri: "http://sched.west.example.org:8081/api/".into(),
            web_uri: None,
        };
        let client = RestClient::connect(&cluster).unwrap();
        let key = JobKey::from_path("west/bozo/test/hello").unwrap();
        assert_eq!(
            client.job_url(&key, "kill"),
            "http://sched.west.example.org:8081/api/jobs/west/bozo/test/hello/kill"
        );
    }
}
