//! Repository Migrator: an ordered list of migrations stepping the
//! on-disk repository version up or down one step at a time, the
//! current version persisted in a single-line text file at
//! `<root>/version`.

use crate::error::{NodeError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// One step in the repository's version history.
///
/// `upgrade`/`downgrade` must be idempotent and best-effort on corrupt
/// entries: a migration that finds a malformed entry skips it rather
/// than aborting the whole migration.
#[async_trait]
pub trait Migration: Send + Sync {
    /// The version this migration upgrades *to* (and downgrades *from*).
    fn version(&self) -> u32;

    fn can_upgrade(&self) -> bool {
        true
    }

    fn can_downgrade(&self) -> bool {
        true
    }

    async fn upgrade(&self, repo_root: &Path) -> Result<()>;
    async fn downgrade(&self, repo_root: &Path) -> Result<()>;
}

/// Drives an ordered list of [`Migration`]s against a repository root.
pub struct Migrator {
    repo_root: PathBuf,
    migrations: Vec<Box<dyn Migration>>,
}

fn version_path(repo_root: &Path) -> PathBuf {
    repo_root.join("version")
}

impl Migrator {
    pub fn new(repo_root: impl Into<PathBuf>, migrations: Vec<Box<dyn Migration>>) -> Self {
        let mut migrations = migrations;
        migrations.sort_by_key(|m| m.version());
        Self {
            repo_root: repo_root.into(),
            migrations,
        }
    }

    /// Read `<root>/version`, defaulting to `0` for a fresh repository
    /// (no file yet written).
    pub async fn current_version(&self) -> Result<u32> {
        match fs::read_to_string(version_path(&self.repo_root)).await {
            Ok(contents) => contents
            .trim()
            .parse::<u32>()
            .map_err(|e| NodeError::CorruptRepository(format!("unreadable version file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(NodeError::Io(e)),
        }
    }

    async fn persist_version(&self, version: u32) -> Result<()> {
        fs::write(version_path(&self.repo_root), version.to_string()).await?;
        Ok(())
    }

    fn migration_for(&self, version: u32) -> Option<&dyn Migration> {
        self.migrations.iter().find(|m| m.version() == version).map(|m| m.as_ref())
    }

    /// Step the repository from its current version to `target`, one
    /// migration at a time, persisting the new version after each
    /// successful step. Unknown target versions are rejected up front.
    pub async fn migrate_to(&self, target: u32) -> Result<()> {
        if target != 0 && self.migration_for(target).is_none() {
            return Err(NodeError::Conflict(format!("no known migration for version {target}")));
        }

        let mut current = self.current_version().await?;
        if current == target {
            info!(version = current, "repository already at target version");
            return Ok(());
        }

        while current != target {
            if current < target {
                let next = current + 1;
                let migration = self
                .migration_for(next)
                .ok_or_else(|| NodeError::Conflict(format!("no known migration to version {next}")))?;
                if !migration.can_upgrade() {
                    return Err(NodeError::Conflict(format!("migration to version {next} does not support upgrade")));
                }
                info!(from = current, to = next, "upgrading repository");
                migration.upgrade(&self.repo_root).await?;
                current = next;
            } else {
                let migration = self
                .migration_for(current)
                .ok_or_else(|| NodeError::Conflict(format!("no known migration from version {current}")))?;
                if !migration.can_downgrade() {
                    return Err(NodeError::Conflict(format!("migration from version {current} does not support downgrade")));
                }
                let next = current - 1;
                info!(from = current, to = next, "downgrading repository");
                migration.downgrade(&self.repo_root).await?;
                current = next;
            }
            self.persist_version(current).await?;
        }
        Ok(())
    }
}

/// v0 -> v1: introduces the `pins/` directory alongside `blocks/`
/// (early repositories had no pin set on disk). Best-effort: creating a
/// directory that already exists is not an error.
pub struct AddPinsDirectoryMigration;

#[async_trait]
impl Migration for AddPinsDirectoryMigration {
    fn version(&self) -> u32 {
        1
    }

    async fn upgrade(&self, repo_root: &Path) -> Result<()> {
        fs::create_dir_all(repo_root.join("pins")).await?;
        Ok(())
    }

    async fn downgrade(&self, repo_root: &Path) -> Result<()> {
        let pins_dir = repo_root.join("pins");
        if let Ok(mut entries) = fs::read_dir(&pins_dir).await {
            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        if fs::remove_file(entry.path()).await.is_err() {
                            warn!(path = %entry.path().display(), "skipping corrupt pin entry during downgrade");
                        }
                    }
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
        }
        Ok(())
    }
}

/// v1 -> v2: introduces the `ipns-seq/` directory for the name
/// manager's persisted sequence-monotonicity table.
pub struct AddIpnsSequenceDirectoryMigration;

#[async_trait]
impl Migration for AddIpnsSequenceDirectoryMigration {
    fn version(&self) -> u32 {
        2
    }

    async fn upgrade(&self, repo_root: &Path) -> Result<()> {
        fs::create_dir_all(repo_root.join("ipns-seq")).await?;
        Ok(())
    }

    async fn downgrade(&self, _repo_root: &Path) -> Result<()> {
        Ok(())
    }
}

/// The latest repository version [`default_migrations`] can reach.
pub const LATEST_VERSION: u32 = 2;

/// The migrations this node ships, in ascending version order.
pub fn default_migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(AddPinsDirectoryMigration),
        Box::new(AddIpnsSequenceDirectoryMigration),
    ]
}
