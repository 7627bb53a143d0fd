//! Local filesystem storage implementation.
//!
//! Every write goes to a temporary file first and is renamed into place, so a
//! reader never sees a half-written page record.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{PageResult, ScreenshotQualityIssue, ViewportName};
use crate::storage::{ResultStore, RunSummary};
use crate::utils::page_key;

/// Local filesystem storage backend.
#[derive(Debug)]
pub struct LocalStorage {
    root_dir: PathBuf,
    /// Serializes read-modify-write patches.
    patch_lock: Mutex<()>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            patch_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn page_path_key(run_id: &str, page_key: &str) -> String {
        format!("runs/{run_id}/pages/{page_key}.json")
    }

    fn run_key(run_id: &str) -> String {
        format!("runs/{run_id}/run.json")
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Summary of a specific run.
    pub async fn load_run_summary(&self, run_id: &str) -> Result<Option<RunSummary>> {
        self.read_json(&Self::run_key(run_id)).await
    }
}

#[async_trait]
impl ResultStore for LocalStorage {
    async fn save_page(&self, run_id: &str, result: &PageResult) -> Result<String> {
        let key = page_key(&result.url);
        self.write_json(&Self::page_path_key(run_id, &key), result)
            .await?;
        log::debug!("Saved {} as {}/{}", result.url, run_id, key);
        Ok(key)
    }

    async fn apply_quality(
        &self,
        run_id: &str,
        page_key: &str,
        quality: &BTreeMap<ViewportName, ScreenshotQualityIssue>,
    ) -> Result<()> {
        let _guard = self.patch_lock.lock().await;
        let key = Self::page_path_key(run_id, page_key);

        let mut result: PageResult = self.read_json(&key).await?.ok_or_else(|| {
            AppError::validation(format!("No saved page {page_key} in run {run_id}"))
        })?;
        result
            .screenshot_quality
            .extend(quality.iter().map(|(v, q)| (*v, q.clone())));

        self.write_json(&key, &result).await
    }

    async fn load_run(&self, run_id: &str) -> Result<Vec<PageResult>> {
        let dir = self.path(&format!("runs/{run_id}/pages"));
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("No pages found for run {}", run_id);
                return Ok(Vec::new());
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut pages = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            pages.push(serde_json::from_slice::<PageResult>(&bytes)?);
        }
        pages.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(pages)
    }

    async fn save_run_summary(&self, summary: &RunSummary) -> Result<()> {
        self.write_json(&Self::run_key(&summary.run_id), summary)
            .await?;
        self.write_json("latest.json", summary).await
    }

    async fn latest_run(&self) -> Result<Option<RunSummary>> {
        self.read_json("latest.json").await
    }
}
