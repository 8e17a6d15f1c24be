//! On-disk repository configuration: `<root>/config`, a JSON object
//! with at least `Addresses.{Swarm,API,Gateway}` and `Bootstrap`. A
//! `Default`-able struct with a JSON load/save pair.

use crate::error::{NodeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// The `Addresses` sub-object of the repository config.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Addresses {
    pub swarm: Vec<String>,
    pub api: String,
    pub gateway: String,
}

impl Default for Addresses {
    fn default() -> Self {
        Self {
            swarm: vec![
                "/ip4/0.0.0.0/tcp/4001".to_string(),
                "/ip6/::/tcp/4001".to_string(),
            ],
            api: "/ip4/127.0.0.1/tcp/5001".to_string(),
            gateway: "/ip4/127.0.0.1/tcp/8080".to_string(),
        }
    }
}

/// The repository config.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RepoConfig {
    pub addresses: Addresses,
    pub bootstrap: Vec<String>,
    #[serde(default = "default_inline_limit")]
    pub inline_limit: usize,
    #[serde(default = "default_chunk_size")]
    pub default_chunk_size: usize,
}

fn default_inline_limit() -> usize {
    ipfsd_block::cid::DEFAULT_INLINE_LIMIT
}

fn default_chunk_size() -> usize {
    ipfsd_block::chunker::DEFAULT_CHUNK_SIZE
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            addresses: Addresses::default(),
            bootstrap: Vec::new(),
            inline_limit: default_inline_limit(),
            default_chunk_size: default_chunk_size(),
        }
    }
}

impl RepoConfig {
    fn config_path(repo_root: impl AsRef<Path>) -> PathBuf {
        repo_root.as_ref().join("config")
    }

    /// Load `<root>/config`, writing the default config if absent.
    pub async fn load_or_init(repo_root: impl AsRef<Path>) -> Result<Self> {
        let path = Self::config_path(&repo_root);
        match fs::read(&path).await {
            Ok(bytes) => {
                let config: Self = serde_json::from_slice(&bytes)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save(&repo_root).await?;
                Ok(config)
            }
            Err(e) => Err(NodeError::Io(e)),
        }
    }

    pub async fn save(&self, repo_root: impl AsRef<Path>) -> Result<()> {
        let path = Self::config_path(&repo_root);
        let bytes = serde_json::to_vec_pretty(self)?;
        fs::write(path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_or_init_creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = RepoConfig::load_or_init(dir.path()).await.unwrap();
        assert_eq!(config.addresses.api, "/ip4/127.0.0.1/tcp/5001");
        assert!(dir.path().join("config").exists());
    }

    #[tokio::test]
    async fn saved_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RepoConfig::load_or_init(dir.path()).await.unwrap();
        config.bootstrap.push("/dns4/bootstrap.example/tcp/4001".to_string());
        config.save(dir.path()).await.unwrap();
        let reloaded = RepoConfig::load_or_init(dir.path()).await.unwrap();
        assert_eq!(reloaded.bootstrap, config.bootstrap);
    }
}
