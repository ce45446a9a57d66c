//! # ECGLINK Core
//!
//! ECGLINK同步管道的核心模块，提供基础数据结构、错误定义、配置和通用工具。

pub mod config;
pub mod error;
pub mod fsops;
pub mod models;
pub mod utils;

pub use config::EcgLinkConfig;
pub use error::{EcgLinkError, Result};
pub use models::*;
