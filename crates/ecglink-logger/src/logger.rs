//! 受控写入量的同步日志器
//!
//! 过滤管道按序应用：
//! 1. 每(类型, 当前分钟)计数，超过上限后该分钟内同类型调用整体丢弃；
//! 2. 内容指纹（类型+状态+消息前200字符）在识别窗口内的重复不落行，
//!    累计重复次数与affected总量，达到阈值且距上次聚合写入满最小间隔时
//!    写出一条聚合行并重置计数；
//! 3. 可选地整体抑制例行类型的success条目（默认禁用）。
//!
//! critical入口绕过全部过滤，立即写入。所有计数器均为进程内实例状态，
//! 各阶段为短生命周期批处理进程，窗口在两次调度之间自然重置。

use crate::clock::Clock;
use crate::sink::LogSink;
use chrono::{DateTime, Duration, Utc};
use ecglink_core::config::LoggerConfig;
use ecglink_core::LogStatus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 指纹识别用的消息前缀长度
const FINGERPRINT_PREFIX_CHARS: usize = 200;

/// 指纹状态
struct FingerprintState {
    last_seen: DateTime<Utc>,
    repeats: u32,
    affected_total: i64,
    last_batch: Option<DateTime<Utc>>,
}

/// 同步日志器
///
/// 每次批处理调用构建一次；log从不返回错误，落地失败只记录诊断日志。
pub struct SyncLogger {
    sink: Arc<dyn LogSink>,
    clock: Arc<dyn Clock>,
    config: LoggerConfig,
    minute_counters: Mutex<HashMap<(String, i64), u32>>,
    fingerprints: Mutex<HashMap<String, FingerprintState>>,
}

impl SyncLogger {
    pub fn new(sink: Arc<dyn LogSink>, clock: Arc<dyn Clock>, config: LoggerConfig) -> Self {
        Self {
            sink,
            clock,
            config,
            minute_counters: Mutex::new(HashMap::new()),
            fingerprints: Mutex::new(HashMap::new()),
        }
    }

    /// 记录一条管道操作日志，经过全部过滤
    pub async fn log(&self, entry_type: &str, status: LogStatus, message: &str, affected: i64) {
        let now = self.clock.now();

        // 过滤1：每分钟上限
        if self.over_minute_ceiling(entry_type, now) {
            return;
        }

        // 过滤2：内容指纹聚合
        let prefix: String = message.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
        let key = format!("{}|{}|{}", entry_type, status, prefix);

        let to_write = {
            let mut fingerprints = self.fingerprints.lock().unwrap();
            let window = Duration::seconds(self.config.dedup_window_secs);

            match fingerprints.get_mut(&key) {
                Some(state) if now - state.last_seen <= window => {
                    state.last_seen = now;
                    state.repeats += 1;
                    state.affected_total += affected;

                    let interval_elapsed = state
                        .last_batch
                        .map_or(true, |t| now - t >= Duration::seconds(self.config.batch_interval_secs));

                    if state.repeats >= self.config.batch_threshold && interval_elapsed {
                        let batch_message =
                            format!("[BATCH] {}x - {}", state.repeats, prefix);
                        let total = state.affected_total;
                        state.repeats = 0;
                        state.affected_total = 0;
                        state.last_batch = Some(now);
                        Some((batch_message, total))
                    } else {
                        None
                    }
                }
                _ => {
                    fingerprints.insert(
                        key,
                        FingerprintState {
                            last_seen: now,
                            repeats: 0,
                            affected_total: 0,
                            last_batch: None,
                        },
                    );
                    Some((message.to_string(), affected))
                }
            }
        };

        let Some((message, affected)) = to_write else {
            return;
        };

        // 过滤3：例行类型success抑制
        if status == LogStatus::Success
            && self
                .config
                .suppress_success_types
                .iter()
                .any(|t| t == entry_type)
        {
            return;
        }

        self.write(entry_type, status, &message, affected).await;
    }

    /// 关键日志入口，绕过全部过滤立即写入
    ///
    /// 用于绝不允许被静默丢弃的条件。
    pub async fn critical(&self, entry_type: &str, status: LogStatus, message: &str, affected: i64) {
        self.write(entry_type, status, message, affected).await;
    }

    /// 每分钟上限判定，超限调用整体丢弃（不进入后续过滤）
    fn over_minute_ceiling(&self, entry_type: &str, now: DateTime<Utc>) -> bool {
        let minute = now.timestamp() / 60;
        let mut counters = self.minute_counters.lock().unwrap();

        // 只保留当前分钟的计数，避免状态无界增长
        counters.retain(|(_, m), _| *m == minute);

        let count = counters
            .entry((entry_type.to_string(), minute))
            .or_insert(0);
        *count += 1;

        *count > self.config.per_minute_ceiling
    }

    /// 实际落地，失败被吞掉（日志器从不抛错）
    async fn write(&self, entry_type: &str, status: LogStatus, message: &str, affected: i64) {
        if let Err(e) = self.sink.write(entry_type, status, message, affected).await {
            tracing::warn!("Sync log write failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sink::MemorySink;
    use chrono::TimeZone;

    fn test_logger(config: LoggerConfig) -> (Arc<MemorySink>, Arc<ManualClock>, SyncLogger) {
        let sink = Arc::new(MemorySink::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 12, 15, 10, 0, 0).unwrap(),
        ));
        let logger = SyncLogger::new(sink.clone(), clock.clone(), config);
        (sink, clock, logger)
    }

    #[tokio::test]
    async fn test_plain_write() {
        let (sink, _clock, logger) = test_logger(LoggerConfig::default());

        logger
            .log("metadata_import", LogStatus::Success, "1 exame importado", 1)
            .await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, "metadata_import");
        assert_eq!(entries[0].affected_count, 1);
    }

    #[tokio::test]
    async fn test_minute_ceiling_drops_excess() {
        let config = LoggerConfig {
            per_minute_ceiling: 5,
            ..LoggerConfig::default()
        };
        let (sink, _clock, logger) = test_logger(config);

        // 消息各不相同，指纹过滤不介入
        for i in 0..8 {
            logger
                .log("mirror_sync", LogStatus::Success, &format!("arquivo {}", i), 1)
                .await;
        }

        assert_eq!(sink.entries().len(), 5);
    }

    #[tokio::test]
    async fn test_ceiling_resets_next_minute() {
        let config = LoggerConfig {
            per_minute_ceiling: 2,
            ..LoggerConfig::default()
        };
        let (sink, clock, logger) = test_logger(config);

        for i in 0..4 {
            logger
                .log("mirror_sync", LogStatus::Success, &format!("a{}", i), 1)
                .await;
        }
        assert_eq!(sink.entries().len(), 2);

        clock.advance(Duration::seconds(61));
        logger
            .log("mirror_sync", LogStatus::Success, "proxima janela", 1)
            .await;
        assert_eq!(sink.entries().len(), 3);
    }

    #[tokio::test]
    async fn test_repeat_batching() {
        let (sink, clock, logger) = test_logger(LoggerConfig::default());

        // 同一(类型,状态,消息)重复25次，每次间隔1秒
        for _ in 0..25 {
            logger
                .log("report_match", LogStatus::Error, "laudo sem correspondencia", 1)
                .await;
            clock.advance(Duration::seconds(1));
        }

        let entries = sink.entries();
        // 首条正常写入 + 一条聚合行（第二次达到阈值时聚合间隔未满）
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "laudo sem correspondencia");
        assert!(entries[1].message.starts_with("[BATCH] 10x - "));
        assert_eq!(entries[1].affected_count, 10);
    }

    #[tokio::test]
    async fn test_window_expiry_writes_again() {
        let (sink, clock, logger) = test_logger(LoggerConfig::default());

        logger
            .log("report_match", LogStatus::Error, "repetido", 1)
            .await;
        clock.advance(Duration::seconds(31)); // 超出30秒识别窗口
        logger
            .log("report_match", LogStatus::Error, "repetido", 1)
            .await;

        assert_eq!(sink.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_success_suppression() {
        let config = LoggerConfig {
            suppress_success_types: vec!["mirror_sync".to_string()],
            ..LoggerConfig::default()
        };
        let (sink, _clock, logger) = test_logger(config);

        logger
            .log("mirror_sync", LogStatus::Success, "copiado", 1)
            .await;
        logger
            .log("mirror_sync", LogStatus::Error, "falha de copia", 0)
            .await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, LogStatus::Error);
    }

    #[tokio::test]
    async fn test_critical_bypasses_filters() {
        let config = LoggerConfig {
            per_minute_ceiling: 1,
            ..LoggerConfig::default()
        };
        let (sink, _clock, logger) = test_logger(config);

        logger.log("db", LogStatus::Error, "x", 0).await;
        logger.log("db", LogStatus::Error, "y", 0).await; // 超限丢弃
        logger
            .critical("db", LogStatus::Error, "banco inacessivel", 0)
            .await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].message, "banco inacessivel");
    }
}
