//! Drive-backed project repository.
//!
//! Translates project-level operations (create, load, save, delete, list)
//! into Drive folder and file operations. Every project is a folder under a
//! conventional root folder, holding exactly one content file; that
//! invariant is enforced, and more than one match is a conflict.
//!
//! Folder resolution is cached by name. The cache is advisory: it is cleared
//! wholesale once it passes its lifetime, and any provider `NotFound` that
//! followed a cache hit invalidates the entry and falls back to a fresh
//! lookup, so staleness can never turn into a write against the wrong
//! folder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use scribe_core::{ProjectName, ProjectSummary};

use crate::client::{DriveClient, FileRef};
use crate::config::{DuplicatePolicy, RepositoryConfig};
use crate::error::{DriveError, DriveResult, ErrorKind};
use crate::retry::{RetryPolicy, with_retry};
use crate::session::AuthSession;

/// Project repository over a single Drive identity.
pub struct ProjectRepository {
    session: Arc<AuthSession>,
    config: RepositoryConfig,
    retry: RetryPolicy,
    cache: Mutex<FolderCache>,
}

/// In-memory mapping from project name to resolved folder id.
#[derive(Debug)]
struct FolderCache {
    entries: HashMap<String, String>,
    root_id: Option<String>,
    swept_at: Instant,
}

impl FolderCache {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            root_id: None,
            swept_at: Instant::now(),
        }
    }

    /// Clears everything once the cache has outlived its lifetime.
    fn sweep_if_stale(&mut self, ttl: std::time::Duration) {
        if self.swept_at.elapsed() >= ttl {
            debug!("clearing stale folder cache ({} entries)", self.entries.len());
            self.entries.clear();
            self.root_id = None;
            self.swept_at = Instant::now();
        }
    }
}

impl ProjectRepository {
    /// Creates a repository over the given session.
    pub fn new(session: Arc<AuthSession>, config: RepositoryConfig) -> Self {
        Self {
            session,
            config,
            retry: RetryPolicy::default(),
            cache: Mutex::new(FolderCache::new()),
        }
    }

    /// Overrides the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Creates a new project: a folder under the root plus an initial
    /// content file with placeholder text.
    ///
    /// The existence check always goes to the provider — a stale cache entry
    /// must not make a re-creation fail.
    pub async fn create_project(&self, name: &ProjectName) -> DriveResult<FileRef> {
        let client = self.client().await?;
        let root_id = self.root_folder_id(&client).await?;

        let existing = with_retry(&self.retry, "find project folder", || {
            client.find_folder(name.as_str(), Some(&root_id))
        })
        .await?;

        if let Some(folder) = existing {
            return match self.config.duplicate_policy {
                DuplicatePolicy::Reject => Err(DriveError::already_exists(format!(
                    "project \"{}\" already exists",
                    name
                ))),
                DuplicatePolicy::ReturnExisting => {
                    warn!("project \"{}\" already exists, returning existing folder", name);
                    self.cache_put(name.as_str(), &folder.id);
                    Ok(folder)
                }
            };
        }

        let folder = with_retry(&self.retry, "create project folder", || {
            client.create_folder(name.as_str(), Some(&root_id))
        })
        .await?;

        with_retry(&self.retry, "create content file", || {
            client.create_text_file(
                &folder.id,
                &self.config.content_file,
                &self.config.placeholder_text,
            )
        })
        .await?;

        self.cache_put(name.as_str(), &folder.id);
        info!("created project \"{}\" ({})", name, folder.id);
        Ok(folder)
    }

    /// Loads the full content of a project.
    pub async fn load_project(&self, name: &ProjectName) -> DriveResult<String> {
        let client = self.client().await?;
        let mut allow_cache = true;

        loop {
            let Some((folder_id, from_cache)) =
                self.resolve_project(&client, name.as_str(), allow_cache).await?
            else {
                return Err(DriveError::not_found(format!(
                    "project \"{}\" not found",
                    name
                )));
            };

            match self.load_from_folder(&client, &folder_id).await {
                Err(e) if from_cache && e.kind() == ErrorKind::NotFound => {
                    self.cache_remove(name.as_str());
                    allow_cache = false;
                }
                result => return result,
            }
        }
    }

    /// Overwrites a project's content in full. Last writer wins.
    ///
    /// When backups are enabled, the previous content file is snapshotted
    /// first and old snapshots beyond the retention count are deleted,
    /// oldest first. Snapshot and rotation failures are logged, not fatal —
    /// the save itself takes priority.
    pub async fn save_project(&self, name: &ProjectName, content: &str) -> DriveResult<()> {
        let client = self.client().await?;
        let mut allow_cache = true;

        loop {
            let Some((folder_id, from_cache)) =
                self.resolve_project(&client, name.as_str(), allow_cache).await?
            else {
                return Err(DriveError::not_found(format!(
                    "project \"{}\" not found",
                    name
                )));
            };

            match self.save_to_folder(&client, &folder_id, content).await {
                Err(e) if from_cache && e.kind() == ErrorKind::NotFound => {
                    self.cache_remove(name.as_str());
                    allow_cache = false;
                }
                result => {
                    if result.is_ok() {
                        info!("saved project \"{}\"", name);
                    }
                    return result;
                }
            }
        }
    }

    /// Deletes a project folder and, per provider semantics, everything in
    /// it.
    pub async fn delete_project(&self, name: &ProjectName) -> DriveResult<()> {
        let client = self.client().await?;
        let mut allow_cache = true;

        loop {
            let Some((folder_id, from_cache)) =
                self.resolve_project(&client, name.as_str(), allow_cache).await?
            else {
                return Err(DriveError::not_found(format!(
                    "project \"{}\" not found",
                    name
                )));
            };

            let result = with_retry(&self.retry, "delete project folder", || {
                client.delete_file(&folder_id)
            })
            .await;

            match result {
                Err(e) if from_cache && e.kind() == ErrorKind::NotFound => {
                    self.cache_remove(name.as_str());
                    allow_cache = false;
                }
                result => {
                    self.cache_remove(name.as_str());
                    if result.is_ok() {
                        info!("deleted project \"{}\"", name);
                    }
                    return result;
                }
            }
        }
    }

    /// Lists all projects under the root folder.
    pub async fn list_projects(&self) -> DriveResult<Vec<ProjectSummary>> {
        let client = self.client().await?;
        let root_id = self.root_folder_id(&client).await?;

        let folders = with_retry(&self.retry, "list projects", || {
            client.list_folders(&root_id)
        })
        .await?;

        Ok(folders
            .into_iter()
            .map(|f| ProjectSummary {
                id: f.id,
                name: f.name,
                created_time: f.created_time,
            })
            .collect())
    }

    /// Builds a Drive client from the current credential.
    ///
    /// The client is derived per operation from whatever `ensure_valid`
    /// returns, so a refreshed token is picked up without shared client
    /// state.
    async fn client(&self) -> DriveResult<DriveClient> {
        let credential = self.session.ensure_valid().await?;
        let client = DriveClient::new(credential.access_token, self.config.timeout)?;
        Ok(match &self.config.api_base_url {
            Some(url) => client.with_base_url(url.clone()),
            None => client,
        })
    }

    /// Returns the root folder id, creating the folder on first use.
    async fn root_folder_id(&self, client: &DriveClient) -> DriveResult<String> {
        {
            let mut cache = self.cache.lock().unwrap();
            cache.sweep_if_stale(self.config.cache_ttl);
            if let Some(id) = cache.root_id.clone() {
                return Ok(id);
            }
        }

        let found = with_retry(&self.retry, "find root folder", || {
            client.find_folder(&self.config.root_folder, None)
        })
        .await?;

        let folder = match found {
            Some(folder) => folder,
            None => {
                info!("root folder \"{}\" not found, creating it", self.config.root_folder);
                with_retry(&self.retry, "create root folder", || {
                    client.create_folder(&self.config.root_folder, None)
                })
                .await?
            }
        };

        self.cache.lock().unwrap().root_id = Some(folder.id.clone());
        Ok(folder.id)
    }

    /// Resolves a project folder id, via the cache when allowed.
    ///
    /// Returns the id and whether it came from the cache, so callers can
    /// invalidate and retry on staleness.
    async fn resolve_project(
        &self,
        client: &DriveClient,
        name: &str,
        allow_cache: bool,
    ) -> DriveResult<Option<(String, bool)>> {
        if allow_cache && let Some(id) = self.cache_get(name) {
            debug!("folder cache hit for \"{}\"", name);
            return Ok(Some((id, true)));
        }

        let root_id = self.root_folder_id(client).await?;
        let folder = with_retry(&self.retry, "find project folder", || {
            client.find_folder(name, Some(&root_id))
        })
        .await?;

        Ok(folder.map(|f| {
            self.cache_put(name, &f.id);
            (f.id, false)
        }))
    }

    /// Finds the single content file in a folder.
    async fn content_file(
        &self,
        client: &DriveClient,
        folder_id: &str,
    ) -> DriveResult<Option<FileRef>> {
        let mut files = with_retry(&self.retry, "find content file", || {
            client.find_files(folder_id, &self.config.content_file)
        })
        .await?;

        match files.len() {
            0 => Ok(None),
            1 => Ok(Some(files.remove(0))),
            n => Err(DriveError::conflict(format!(
                "{} copies of {} found; resolve the duplication",
                n, self.config.content_file
            ))),
        }
    }

    async fn load_from_folder(&self, client: &DriveClient, folder_id: &str) -> DriveResult<String> {
        let file = self.content_file(client, folder_id).await?.ok_or_else(|| {
            DriveError::not_found(format!("{} not found in project", self.config.content_file))
        })?;

        with_retry(&self.retry, "download content file", || {
            client.download_text(&file.id)
        })
        .await
    }

    async fn save_to_folder(
        &self,
        client: &DriveClient,
        folder_id: &str,
        content: &str,
    ) -> DriveResult<()> {
        match self.content_file(client, folder_id).await? {
            None => {
                with_retry(&self.retry, "create content file", || {
                    client.create_text_file(folder_id, &self.config.content_file, content)
                })
                .await?;
                Ok(())
            }
            Some(file) => {
                if self.config.backups_enabled {
                    let snapshot = backup_name(&self.config.content_file);
                    let result = with_retry(&self.retry, "snapshot content file", || {
                        client.copy_file(&file.id, &snapshot)
                    })
                    .await;
                    if let Err(e) = result {
                        warn!("backup snapshot failed, saving anyway: {}", e);
                    }
                }

                with_retry(&self.retry, "update content file", || {
                    client.update_text_file(&file.id, content)
                })
                .await?;

                if self.config.backups_enabled {
                    if let Err(e) = self.rotate_backups(client, folder_id).await {
                        warn!("backup rotation failed: {}", e);
                    }
                }
                Ok(())
            }
        }
    }

    /// Deletes backup snapshots beyond the retention count, oldest first.
    async fn rotate_backups(&self, client: &DriveClient, folder_id: &str) -> DriveResult<()> {
        let children = with_retry(&self.retry, "list project files", || {
            client.list_children(folder_id)
        })
        .await?;

        let backups: Vec<&FileRef> = children
            .iter()
            .filter(|f| is_backup(&self.config.content_file, &f.name))
            .collect();

        for stale in excess_backups(&backups, self.config.backup_retention) {
            debug!("deleting stale backup {:?}", stale.name);
            with_retry(&self.retry, "delete stale backup", || {
                client.delete_file(&stale.id)
            })
            .await?;
        }
        Ok(())
    }

    fn cache_get(&self, name: &str) -> Option<String> {
        let mut cache = self.cache.lock().unwrap();
        cache.sweep_if_stale(self.config.cache_ttl);
        cache.entries.get(name).cloned()
    }

    fn cache_put(&self, name: &str, folder_id: &str) {
        self.cache
            .lock()
            .unwrap()
            .entries
            .insert(name.to_string(), folder_id.to_string());
    }

    fn cache_remove(&self, name: &str) {
        self.cache.lock().unwrap().entries.remove(name);
    }
}

/// Returns the backup snapshot prefix for a content file name
/// (`content.txt` -> `content-`).
fn backup_prefix(content_file: &str) -> String {
    let stem = content_file
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(content_file);
    format!("{}-", stem)
}

/// Builds a timestamped backup snapshot name.
fn backup_name(content_file: &str) -> String {
    format!(
        "{}{}.txt",
        backup_prefix(content_file),
        Utc::now().format("%Y%m%dT%H%M%S%.3f")
    )
}

/// Returns true if `name` is a backup snapshot of `content_file`.
fn is_backup(content_file: &str, name: &str) -> bool {
    name != content_file && name.starts_with(&backup_prefix(content_file))
}

/// Given backups ordered oldest first, returns the slice to delete so at
/// most `retention` remain.
fn excess_backups<'a>(backups: &'a [&'a FileRef], retention: usize) -> &'a [&'a FileRef] {
    let excess = backups.len().saturating_sub(retention);
    &backups[..excess]
}
