//! # ECGLINK同步日志模块
//!
//! 受控写入量的审计日志，被管道所有阶段共享。
//! 管道每1-5分钟调度一次且单次可能处理大量文件，
//! 因此写入量通过每分钟上限与内容指纹聚合双重过滤。

pub mod clock;
pub mod logger;
pub mod sink;

pub use clock::{Clock, SystemClock};
pub use logger::SyncLogger;
pub use sink::{DatabaseSink, LogSink, MemorySink};
