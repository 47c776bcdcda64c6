use std::path::{Path, PathBuf};

use convoy_protocol::{ActivityLog, AgentActivity, EngineError, EngineResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

/// JSONL-backed activity log. One line per record, append-only; the file
/// is the audit trail, so records are never rewritten or compacted.
#[derive(Debug)]
pub struct FileActivityLog {
    root: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileActivityLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn log_path(&self) -> PathBuf {
        self.root.join("activity").join("agent_activity.jsonl")
    }

    async fn ensure_parent(path: &Path) -> EngineResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| EngineError::Io(format!("creating {parent:?}: {err}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityLog for FileActivityLog {
    async fn append(&self, activity: &AgentActivity) -> EngineResult<()> {
        let path = self.log_path();
        Self::ensure_parent(&path).await?;

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|err| EngineError::Io(format!("opening activity log {path:?}: {err}")))?;
        let line = serde_json::to_string(activity)?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        debug!(activity_id = %activity.activity_id, agent = %activity.agent_id, "activity appended");
        Ok(())
    }

    async fn recent(&self, limit: usize) -> EngineResult<Vec<AgentActivity>> {
        let path = self.log_path();
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let file = OpenOptions::new().read(true).open(&path).await?;
        let mut reader = BufReader::new(file).lines();
        let mut activities = Vec::new();

        while let Some(line) = reader.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let activity: AgentActivity = serde_json::from_str(&line)?;
            activities.push(activity);
        }

        activities.reverse();
        activities.truncate(limit);
        activities.reverse();

        Ok(activities)
    }
}

/// In-process activity log for tests and single-binary setups.
#[derive(Debug, Default)]
pub struct MemoryActivityLog {
    records: Mutex<Vec<AgentActivity>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityLog for MemoryActivityLog {
    async fn append(&self, activity: &AgentActivity) -> EngineResult<()> {
        self.records.lock().push(activity.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> EngineResult<Vec<AgentActivity>> {
        let records = self.records.lock();
        let start = records.len().saturating_sub(limit);
        Ok(records[start..].to_vec())
    }
}
