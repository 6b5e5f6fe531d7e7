use crate::error::HistoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

pub const MAX_RESPONSE_CHARS: usize = 5_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub query: String,
    pub response: String,
    pub response_time_secs: f64,
}

impl QueryRecord {
    pub fn new(
        user: impl Into<String>,
        query: impl Into<String>,
        response: &str,
        response_time: Duration,
    ) -> Self {
        let response = if response.chars().count() > MAX_RESPONSE_CHARS {
            let kept: String = response.chars().take(MAX_RESPONSE_CHARS).collect();
            format!("{kept}...")
        } else {
            response.to_string()
        };

        Self {
            timestamp: Utc::now(),
            user: user.into(),
            query: query.into(),
            response,
            response_time_secs: response_time.as_secs_f64(),
        }
    }
}

/// Append-only log of answered queries, one JSON document per line.
pub struct QueryHistory {
    path: PathBuf,
}

impl QueryHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &QueryRecord) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// A history file that does not exist yet reads as empty.
    pub async fn entries(&self) -> Result<Vec<QueryRecord>, HistoryError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(HistoryError::from))
            .collect()
    }

    /// Entries logged by `user`, newest first.
    pub async fn entries_for(&self, user: &str) -> Result<Vec<QueryRecord>, HistoryError> {
        let mut entries: Vec<QueryRecord> = self
            .entries()
            .await?
            .into_iter()
            .filter(|entry| entry.user == user)
            .collect();
        entries.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
        Ok(entries)
    }

    /// Removes the entries logged by `user` at `timestamp`; returns how many went.
    pub async fn delete(
        &self,
        timestamp: DateTime<Utc>,
        user: &str,
    ) -> Result<usize, HistoryError> {
        let entries = self.entries().await?;
        let before = entries.len();
        let kept: Vec<QueryRecord> = entries
            .into_iter()
            .filter(|entry| !(entry.timestamp == timestamp && entry.user == user))
            .collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let mut contents = String::new();
        for entry in &kept {
            contents.push_str(&serde_json::to_string(entry)?);
            contents.push('\n');
        }
        fs::write(&self.path, contents).await?;
        Ok(removed)
    }
}
