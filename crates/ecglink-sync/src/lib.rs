//! # ECGLINK镜像同步模块
//!
//! 将远程只读共享上的新文件复制到本地暂存目录，从不删除或移动源文件。

pub mod cache;
pub mod mirror;

pub use cache::CopiedFileCache;
pub use mirror::{MirrorStats, MirrorSync, RemoteFile};
