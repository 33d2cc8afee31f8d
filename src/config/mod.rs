/*!
Job configuration loading.

A config file describes one or more jobs under a top-level `jobs:` list,
in YAML by default or JSON when requested. Before parsing, `{{name}}`
placeholders are substituted from `--bind NAME=VALUE` pairs; a placeholder
left unresolved after substitution is an error, not a literal.

The loader returns the single job matching every component of the requested
key. A file that parses but holds no such job is a distinguishable error so
the caller can exit with the configuration-error code rather than a generic
failure.
*/

use std::fs;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sched::JobKey;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("unbound template variable '{{{{{name}}}}}' in {path}")]
    UnboundVariable { name: String, path: String },

    #[error("malformed binding '{binding}': expected NAME=VALUE")]
    MalformedBinding { binding: String },

    #[error("config file {path} defines no job matching {key}")]
    NoMatchingJob { path: String, key: JobKey },

    #[error("job '{name}' must declare at least one instance")]
    NoInstances { name: String },
}

/* --------------------------------- Model ----------------------------------- */

/// Resource envelope and command line for one task replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub command: String,
    pub cpus: f64,
    pub ram_mb: u64,
    pub disk_mb: u64,
}

/// A fully-resolved job description, bound to exactly one job key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub cluster: String,
    pub role: String,
    pub environment: String,
    pub name: String,
    pub instances: u32,
    pub task: TaskSpec,
}

impl JobConfig {
    /// The key this config is bound to.
    pub fn key(&self) -> JobKey {
        JobKey {
            cluster: self.cluster.clone(),
            role: self.role.clone(),
            environment: self.environment.clone(),
            name: self.name.clone(),
        }
    }

    fn matches(&self, key: &JobKey) -> bool {
        self.cluster == key.cluster
            && self.role == key.role
            && self.environment == key.environment
            && self.name == key.name
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    jobs: Vec<JobConfig>,
}

/// What the caller wants loaded: a path, the input format, and bindings.
#[derive(Debug, Clone, Default)]
pub struct ConfigRequest {
    pub path: String,
    pub json: bool,
    /// `NAME=VALUE` pairs, exactly as given on the command line.
    pub bindings: Vec<String>,
}

/* --------------------------------- Loader ---------------------------------- */

/// Load the job config for `key` from `request.path`.
pub fn load_job_config(key: &JobKey, request: &ConfigRequest) -> Result<JobConfig, ConfigError> {
    let raw = fs::read_to_string(&request.path).map_err(|source| ConfigError::Io {
        path: request.path.clone(),
        source,
    })?;
    let substituted = substitute_bindings(&raw, &request.bindings, &request.path)?;

    let file: ConfigFile = if request.json {
        serde_json::from_str(&substituted).map_err(|e| ConfigError::Parse {
            path: request.path.clone(),
            reason: e.to_string(),
        })?
    } else {
        serde_yaml::from_str(&substituted).map_err(|e| ConfigError::Parse {
            path: request.path.clone(),
            reason: e.to_string(),
        })?
    };

    let config = file
        .jobs
        .into_iter()
        .find(|job| job.matches(key))
        .ok_or_else(|| ConfigError::NoMatchingJob {
            path: request.path.clone(),
            key: key.clone(),
        })?;

    if config.instances == 0 {
        return Err(ConfigError::NoInstances {
            name: config.name,
        });
    }
    Ok(config)
}

/// Replace every `{{name}}` placeholder from the bindings, then reject any
/// placeholder that survives.
fn substitute_bindings(
    raw: &str,
    bindings: &[String],
    path: &str,
) -> Result<String, ConfigError> {
    let mut text = raw.to_string();
    for binding in bindings {
        let Some((name, value)) = binding.split_once('=') else {
            return Err(ConfigError::MalformedBinding {
                binding: binding.clone(),
            });
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::MalformedBinding {
                binding: binding.clone(),
            });
        }
        text = text.replace(&format!("{{{{{name}}}}}"), value);
    }

    if let Some(start) = text.find("{{")
        && let Some(end) = text[start + 2..].find("}}")
    {
        let name = text[start + 2..start + 2 + end].trim().to_string();
        return Err(ConfigError::UnboundVariable {
            name,
            path: path.to_string(),
        });
    }
    Ok(text)
}

/* --------------------------------- Tests ---------------------------------- */
