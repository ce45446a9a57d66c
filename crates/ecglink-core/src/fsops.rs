//! 文件系统操作
//!
//! "已处理"子目录移动是两阶段协议中的尽力清理步骤：数据库写入才是
//! 权威提交，移动失败不回滚数据库，遗留文件在下次扫描时经数据库
//! 存在性检查被跳过。

use crate::error::{EcgLinkError, Result};
use std::path::{Path, PathBuf};

/// 将源文件移动到同级的"已处理"子目录
///
/// 优先rename；跨文件系统rename失败时回退为先复制后删除源文件。
pub async fn move_to_processed(source: &Path, processed_subdir: &str) -> Result<PathBuf> {
    let parent = source.parent().unwrap_or_else(|| Path::new("."));
    let processed_dir = parent.join(processed_subdir);
    tokio::fs::create_dir_all(&processed_dir).await?;

    let file_name = source
        .file_name()
        .ok_or_else(|| EcgLinkError::Storage(format!("caminho sem nome de arquivo: {}", source.display())))?;
    let destination = processed_dir.join(file_name);

    match tokio::fs::rename(source, &destination).await {
        Ok(()) => Ok(destination),
        Err(rename_err) => {
            tracing::debug!(
                "Rename to processed failed ({}), falling back to copy+delete",
                rename_err
            );
            tokio::fs::copy(source, &destination).await?;
            tokio::fs::remove_file(source).await?;
            Ok(destination)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_move_to_processed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("exame.wxml");
        std::fs::write(&source, b"conteudo").unwrap();

        let destination = move_to_processed(&source, "processed").await.unwrap();

        assert!(!source.exists());
        assert_eq!(destination, dir.path().join("processed").join("exame.wxml"));
        assert_eq!(std::fs::read(&destination).unwrap(), b"conteudo");
    }

    #[tokio::test]
    async fn test_move_creates_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("laudo.pdf");
        std::fs::write(&source, b"pdf").unwrap();

        move_to_processed(&source, "processed").await.unwrap();
        assert!(dir.path().join("processed").is_dir());
    }
}
