//! 日志落地后端
//!
//! 同步日志通过LogSink trait落地：生产环境写sync_log表并镜像到
//! 按天滚动的明文文件；测试环境使用内存后端。

use async_trait::async_trait;
use chrono::Utc;
use ecglink_core::{LogStatus, Result};
use ecglink_database::{DatabasePool, DatabaseQueries};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;

/// 日志落地trait
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write(
        &self,
        entry_type: &str,
        status: LogStatus,
        message: &str,
        affected_count: i64,
    ) -> Result<()>;
}

/// 数据库落地：sync_log表 + 按天明文日志文件
pub struct DatabaseSink {
    pool: Arc<DatabasePool>,
    log_dir: PathBuf,
}

impl DatabaseSink {
    pub fn new(pool: Arc<DatabasePool>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            log_dir: log_dir.into(),
        }
    }

    /// 追加一行到当天的明文日志文件
    ///
    /// 明文镜像是尽力而为的运维痕迹，失败只记录诊断日志。
    async fn append_plaintext(
        &self,
        entry_type: &str,
        status: LogStatus,
        message: &str,
        affected_count: i64,
    ) {
        let now = Utc::now();
        let path = self
            .log_dir
            .join(format!("sync-{}.log", now.format("%Y-%m-%d")));

        let line = format!(
            "[{}] [{}] [{}] {} (affected={})\n",
            now.format("%H:%M:%S"),
            status,
            entry_type,
            message,
            affected_count
        );

        let result = async {
            tokio::fs::create_dir_all(&self.log_dir).await?;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(line.as_bytes()).await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!("Plaintext log mirror write failed: {}", e);
        }
    }
}

#[async_trait]
impl LogSink for DatabaseSink {
    async fn write(
        &self,
        entry_type: &str,
        status: LogStatus,
        message: &str,
        affected_count: i64,
    ) -> Result<()> {
        let queries = DatabaseQueries::new(&self.pool);
        queries
            .insert_sync_log(entry_type, status, message, affected_count)
            .await?;

        self.append_plaintext(entry_type, status, message, affected_count)
            .await;

        Ok(())
    }
}

/// 内存后端记录的条目（测试用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEntry {
    pub entry_type: String,
    pub status: LogStatus,
    pub message: String,
    pub affected_count: i64,
}

/// 内存落地（测试用）
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<RecordedEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<RecordedEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write(
        &self,
        entry_type: &str,
        status: LogStatus,
        message: &str,
        affected_count: i64,
    ) -> Result<()> {
        self.entries.lock().unwrap().push(RecordedEntry {
            entry_type: entry_type.to_string(),
            status,
            message: message.to_string(),
            affected_count,
        });
        Ok(())
    }
}
