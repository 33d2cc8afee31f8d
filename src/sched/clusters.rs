/*!
`clusters.rs`

Named-cluster registry: maps a cluster name (the first component of a job
key) to its scheduler API endpoint and web UI. Loaded once per invocation
from a YAML file; the path comes from the `SKEDCTL_CLUSTERS` environment
variable, falling back to `/etc/skedctl/clusters.yaml`.

Registry file shape:

```yaml
clusters:
  - name: west
    scheduler_uri: http://sched.west.example.org:8081/api
    web_uri: http://sched.west.example.org:8081
```
*/

use std::fs;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const CLUSTERS_ENV: &str = "SKEDCTL_CLUSTERS";
pub const DEFAULT_CLUSTERS_PATH: &str = "/etc/skedctl/clusters.yaml";

#[derive(Debug, Error)]
pub enum ClustersError {
    #[error("cannot read cluster registry {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse cluster registry {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("cluster '{name}' has an invalid {field} endpoint: {uri}")]
    BadEndpoint {
        name: String,
        field: &'static str,
        uri: String,
    },

    #[error("unknown cluster '{name}' (known: {known})")]
    Unknown { name: String, known: String },
}

/// One cluster entry: where its scheduler listens and where its UI lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub scheduler_uri: String,
    /// Web UI base; defaults to `scheduler_uri` when omitted.
    #[serde(default)]
    pub web_uri: Option<String>,
}

impl Cluster {
    /// Validated scheduler endpoint.
    pub fn scheduler_url(&self) -> Result<Url, ClustersError> {
        Url::parse(&self.scheduler_uri).map_err(|_| ClustersError::BadEndpoint {
            name: self.name.clone(),
            field: "scheduler",
            uri: self.scheduler_uri.clone(),
        })
    }

    /// Validated web UI endpoint.
    pub fn web_url(&self) -> Result<Url, ClustersError> {
        let uri = self.web_uri.as_deref().unwrap_or(&self.scheduler_uri);
        Url::parse(uri).map_err(|_| ClustersError::BadEndpoint {
            name: self.name.clone(),
            field: "web",
            uri: uri.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    clusters: Vec<Cluster>,
}

/// The loaded registry. Read-only after construction.
#[derive(Debug)]
pub struct Clusters {
    entries: Vec<Cluster>,
}

impl Clusters {
    /// Load from `SKEDCTL_CLUSTERS`, or the default path when unset.
    pub fn load_default() -> Result<Clusters, ClustersError> {
        let path = std::env::var(CLUSTERS_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLUSTERS_PATH.to_string());
        Self::load(&path)
    }

    /// Load and validate a registry file. Endpoint URLs are checked here so
    /// a bad registry fails before any command starts talking to it.
    pub fn load(path: &str) -> Result<Clusters, ClustersError> {
        let raw = fs::read_to_string(path).map_err(|source| ClustersError::Io {
            path: path.to_string(),
            source,
        })?;
        let file: RegistryFile =
            serde_yaml::from_str(&raw).map_err(|source| ClustersError::Parse {
                path: path.to_string(),
                source,
            })?;
        let registry = Clusters {
            entries: file.clusters,
        };
        for cluster in &registry.entries {
            cluster.scheduler_url()?;
            cluster.web_url()?;
        }
        Ok(registry)
    }

    /// Look up a cluster by name, failing closed with the known names.
    pub fn get(&self, name: &str) -> Result<&Cluster, ClustersError> {
        self.entries
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ClustersError::Unknown {
                name: name.to_string(),
                known: self
                    .entries
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/* --------------------------------- Tests ---------------------------------- */
