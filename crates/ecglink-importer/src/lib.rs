//! # ECGLINK结构化元数据导入模块
//!
//! 解析设备导出的结构化元数据文件，解析/创建患者与医生实体，
//! 幂等地插入或更新检查记录。

pub mod importer;
pub mod parser;

pub use importer::{ImportStats, MetadataImporter};
pub use parser::{parse_metadata, ExamMetadata};
