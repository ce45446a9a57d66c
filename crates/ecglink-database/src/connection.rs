//! 数据库连接管理

use ecglink_core::config::DatabaseConfig;
use ecglink_core::{EcgLinkError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// 数据库连接池
///
/// 每次批处理调用构建一次；连接获取受短超时约束，数据库不可达时
/// 由调用方按环境性故障降级处理。
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// 按配置建立连接池
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    /// 获取底层连接池引用
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 连通性检查
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| EcgLinkError::Database(e.to_string()))?;
        Ok(())
    }
}
