//! 镜像同步
//!
//! 对给定(远程目录, 本地目录, 文件名模式)执行仅复制的镜像：远程文件
//! 从不被修改或删除。复制后校验目标大小，不一致则删除半成品并留待
//! 下次调度重试（缓存未写入）。远程目录不可达不是错误，降级为警告
//! 并以零复制结束本周期。

use crate::cache::{cache_key, CopiedFileCache};
use ecglink_core::utils::matches_pattern;
use ecglink_core::{LogStatus, Result};
use ecglink_logger::SyncLogger;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

/// 日志条目类型
const LOG_TYPE: &str = "mirror_sync";

/// 远程文件信息（list-remote诊断命令使用）
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub name: String,
    pub size: u64,
    pub modified_secs: u64,
}

/// 单次镜像运行的统计
#[derive(Debug, Default, Clone, Copy)]
pub struct MirrorStats {
    pub copied: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// 镜像同步器
pub struct MirrorSync {
    logger: Arc<SyncLogger>,
}

/// 文件修改时间（Unix秒），取不到时归零
fn mtime_secs(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl MirrorSync {
    pub fn new(logger: Arc<SyncLogger>) -> Self {
        Self { logger }
    }

    /// 执行一次镜像周期
    ///
    /// 单个文件的失败不会中断同一周期内其余文件的处理；
    /// 运行结束后缓存被持久化。
    pub async fn run(
        &self,
        remote_dir: &Path,
        local_dir: &Path,
        pattern: &str,
        cache: &mut CopiedFileCache,
    ) -> MirrorStats {
        let mut stats = MirrorStats::default();

        if let Err(e) = tokio::fs::create_dir_all(local_dir).await {
            self.logger
                .critical(
                    LOG_TYPE,
                    LogStatus::Error,
                    &format!("Falha ao criar diretorio local {}: {}", local_dir.display(), e),
                    0,
                )
                .await;
            return stats;
        }

        let mut read_dir = match tokio::fs::read_dir(remote_dir).await {
            Ok(rd) => rd,
            Err(e) => {
                // 环境性故障：共享不可达，本周期零复制，下次调度重试
                self.logger
                    .log(
                        LOG_TYPE,
                        LogStatus::Warning,
                        &format!("Compartilhamento inacessivel {}: {}", remote_dir.display(), e),
                        0,
                    )
                    .await;
                return stats;
            }
        };

        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Remote directory listing interrupted: {}", e);
                    break;
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();
            if !matches_pattern(&name, pattern) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    self.logger
                        .log(
                            LOG_TYPE,
                            LogStatus::Error,
                            &format!("Falha ao ler atributos de {}: {}", name, e),
                            0,
                        )
                        .await;
                    stats.failed += 1;
                    continue;
                }
            };

            if metadata.len() == 0 {
                self.logger
                    .log(
                        LOG_TYPE,
                        LogStatus::Warning,
                        &format!("Arquivo remoto vazio ignorado: {}", name),
                        0,
                    )
                    .await;
                stats.skipped += 1;
                continue;
            }

            let key = cache_key(&name, metadata.len(), mtime_secs(&metadata));
            if cache.contains(&key) {
                stats.skipped += 1;
                continue;
            }

            let destination = local_dir.join(&name);

            // 同名同大小的本地文件视为已复制，回填缓存
            if let Ok(local_meta) = tokio::fs::metadata(&destination).await {
                if local_meta.len() == metadata.len() {
                    cache.insert(key);
                    stats.skipped += 1;
                    continue;
                }
            }

            match self.copy_verified(&entry.path(), &destination, metadata.len()).await {
                Ok(()) => {
                    cache.insert(key);
                    stats.copied += 1;
                }
                Err(e) => {
                    self.logger
                        .log(
                            LOG_TYPE,
                            LogStatus::Error,
                            &format!("Falha ao copiar {}: {}", name, e),
                            0,
                        )
                        .await;
                    stats.failed += 1;
                }
            }
        }

        if let Err(e) = cache.save() {
            self.logger
                .critical(
                    LOG_TYPE,
                    LogStatus::Error,
                    &format!("Falha ao persistir cache de copias: {}", e),
                    0,
                )
                .await;
        }

        self.logger
            .log(
                LOG_TYPE,
                LogStatus::Success,
                &format!(
                    "Espelhamento de {} concluido: {} copiados, {} ignorados, {} falhas",
                    remote_dir.display(),
                    stats.copied,
                    stats.skipped,
                    stats.failed
                ),
                stats.copied as i64,
            )
            .await;

        stats
    }

    /// 复制并校验目标大小；不一致时删除半成品
    async fn copy_verified(
        &self,
        source: &Path,
        destination: &Path,
        expected_size: u64,
    ) -> Result<()> {
        tokio::fs::copy(source, destination).await?;

        let copied_size = tokio::fs::metadata(destination).await?.len();
        if copied_size != expected_size {
            let _ = tokio::fs::remove_file(destination).await;
            return Err(ecglink_core::EcgLinkError::Storage(format!(
                "tamanho divergente apos copia: esperado {} bytes, obtido {}",
                expected_size, copied_size
            )));
        }

        Ok(())
    }

    /// 列出远程目录中匹配模式的文件（诊断命令）
    pub async fn list_remote_files(remote_dir: &Path, pattern: &str) -> Result<Vec<RemoteFile>> {
        let mut files = Vec::new();
        let mut read_dir = tokio::fs::read_dir(remote_dir).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !matches_pattern(&name, pattern) {
                continue;
            }
            if let Ok(metadata) = entry.metadata().await {
                if metadata.is_file() {
                    files.push(RemoteFile {
                        name,
                        size: metadata.len(),
                        modified_secs: mtime_secs(&metadata),
                    });
                }
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}
