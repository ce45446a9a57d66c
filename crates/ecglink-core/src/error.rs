//! 错误定义模块

use thiserror::Error;

/// ECGLINK管道统一错误类型
#[derive(Error, Debug)]
pub enum EcgLinkError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("元数据解析错误: {0}")]
    Parse(String),

    #[error("文件名不符合约定: {0}")]
    Filename(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("记录未找到: {0}")]
    NotFound(String),

    #[error("检查匹配失败: {0}")]
    Unmatched(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// ECGLINK管道统一结果类型
pub type Result<T> = std::result::Result<T, EcgLinkError>;
