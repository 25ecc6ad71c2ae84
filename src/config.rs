use crate::error::CephError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Example cephcap.toml:
/// ```toml
/// [default]
/// creds_path = "/etc/ceph"
///
/// [cluster.prod]
/// conf = "prod.conf"
/// user = "admin"
/// type = "replicated"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default: DefaultConfig,

    #[serde(default, rename = "cluster")]
    pub clusters: BTreeMap<String, ClusterConf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultConfig {
    /// Directory holding each cluster's ceph.conf and keyring
    pub creds_path: PathBuf,
    /// Admin binary used to reach the monitors
    pub ceph_bin:   String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConf {
    /// Cluster config file name, relative to `creds_path` unless absolute
    pub conf: String,
    pub user: String,
    /// Informative label only
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Connection parameters for one cluster, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCluster {
    pub name:      String,
    pub user:      String,
    pub conf_path: PathBuf,
    pub ceph_bin:  String,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self { creds_path: PathBuf::from("/etc/ceph"), ceph_bin: default_ceph_bin() }
    }
}

fn default_ceph_bin() -> String { "ceph".to_string() }

impl ClusterConf {
    pub fn resolve(&self, name: &str, defaults: &DefaultConfig) -> ResolvedCluster {
        ResolvedCluster {
            name:      name.to_string(),
            user:      self.user.clone(),
            conf_path: defaults.creds_path.join(&self.conf),
            ceph_bin:  defaults.ceph_bin.clone(),
        }
    }
}

// ── Load ──────────────────────────────────────────────────────────────

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Config = toml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        if cfg.clusters.is_empty() {
            return Err(CephError::Config(format!("no [cluster.*] sections in {}", path.display())).into());
        }
        Ok(cfg)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cephcap").join("cephcap.toml"))
    }

    /// Resolved clusters in name order, restricted to `only` when it is non-empty.
    pub fn resolve(&self, only: &[String]) -> Result<Vec<ResolvedCluster>> {
        if let Some(missing) = only.iter().find(|n| !self.clusters.contains_key(n.as_str())) {
            return Err(CephError::Config(format!("unknown cluster {}", missing)).into());
        }
        Ok(self.clusters
            .iter()
            .filter(|(name, _)| only.is_empty() || only.contains(*name))
            .map(|(name, c)| c.resolve(name, &self.default))
            .collect())
    }
}
