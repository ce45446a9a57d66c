//! 已复制文件缓存
//!
//! 以 文件名|大小|修改时间 为键标记远程文件已镜像，持久化为本地JSON文件，
//! 上限保留最近插入的1000条（先丢弃最旧的）。缓存不是数据库表，丢失后
//! 最多导致一次无害的重新比对。

use ecglink_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// 缓存条目上限
const MAX_ENTRIES: usize = 1000;

/// 缓存文件格式版本
const CACHE_VERSION: u32 = 1;

/// 磁盘上的缓存文件内容
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    /// 按插入顺序保存的键
    entries: Vec<String>,
}

/// 已复制文件缓存
#[derive(Debug)]
pub struct CopiedFileCache {
    path: PathBuf,
    entries: Vec<String>,
    index: HashSet<String>,
}

/// 由文件属性构造缓存键
pub fn cache_key(name: &str, size: u64, mtime_secs: u64) -> String {
    format!("{}|{}|{}", name, size, mtime_secs)
}

impl CopiedFileCache {
    /// 从磁盘加载缓存；文件缺失或损坏时从空缓存开始
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<CacheFile>(&raw) {
                Ok(file) if file.version == CACHE_VERSION => file.entries,
                Ok(_) => {
                    tracing::warn!("Copied-file cache version mismatch, starting empty");
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!("Copied-file cache unreadable, starting empty: {}", e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        let index = entries.iter().cloned().collect();
        Self {
            path,
            entries,
            index,
        }
    }

    /// 键是否已知
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// 插入新键（重复插入是无操作）
    pub fn insert(&mut self, key: String) {
        if self.index.insert(key.clone()) {
            self.entries.push(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 清空缓存并持久化（clear-cache诊断命令）
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.index.clear();
        self.save()
    }

    /// 持久化缓存，截断到最近的MAX_ENTRIES条
    pub fn save(&mut self) -> Result<()> {
        if self.entries.len() > MAX_ENTRIES {
            let drop_count = self.entries.len() - MAX_ENTRIES;
            for old in self.entries.drain(..drop_count) {
                self.index.remove(&old);
            }
        }

        if let Some(parent) = self.path.parent() {
            if parent != Path::new("") {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = CacheFile {
            version: CACHE_VERSION,
            entries: self.entries.clone(),
        };
        std::fs::write(&self.path, serde_json::to_string(&file)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = CopiedFileCache::load(&path);
        assert!(cache.is_empty());

        cache.insert(cache_key("a.wxml", 100, 1700000000));
        cache.insert(cache_key("b.pdf", 2048, 1700000001));
        cache.save().unwrap();

        let reloaded = CopiedFileCache::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains(&cache_key("a.wxml", 100, 1700000000)));
        assert!(!reloaded.contains(&cache_key("a.wxml", 101, 1700000000)));
    }

    #[test]
    fn test_cap_drops_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = CopiedFileCache::load(&path);
        for i in 0..1005 {
            cache.insert(format!("file{}.pdf|{}|0", i, i));
        }
        cache.save().unwrap();

        let reloaded = CopiedFileCache::load(&path);
        assert_eq!(reloaded.len(), 1000);
        assert!(!reloaded.contains("file0.pdf|0|0"));
        assert!(!reloaded.contains("file4.pdf|4|0"));
        assert!(reloaded.contains("file5.pdf|5|0"));
        assert!(reloaded.contains("file1004.pdf|1004|0"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json at all").unwrap();

        let cache = CopiedFileCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = CopiedFileCache::load(dir.path().join("cache.json"));

        cache.insert("x|1|1".to_string());
        cache.insert("x|1|1".to_string());
        assert_eq!(cache.len(), 1);
    }
}
