//! 外部文本提取
//!
//! 扫描件是二进制的，文本提取委托给外部命令（默认pdftotext），
//! 尽力而为：任何失败都只产生警告并退化为空文本。

use std::path::Path;
use tokio::process::Command;

/// 调用外部命令提取报告明文；失败时返回空串
pub async fn extract_text(command: &str, path: &Path) -> String {
    if command.trim().is_empty() {
        return String::new();
    }

    let output = Command::new(command)
        .arg(path)
        .arg("-") // 输出到stdout
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
        Ok(out) => {
            tracing::warn!(
                "Text extraction for {} exited with {}, proceeding with empty text",
                path.display(),
                out.status
            );
            String::new()
        }
        Err(e) => {
            tracing::warn!(
                "Text extraction command {:?} failed for {}: {}, proceeding with empty text",
                command,
                path.display(),
                e
            );
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_command_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("laudo.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let text = extract_text("comando-inexistente-ecglink", &file).await;
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_empty_command_skips_extraction() {
        let text = extract_text("", Path::new("/tmp/x.pdf")).await;
        assert!(text.is_empty());
    }
}
