//! # ECGLINK报告匹配模块
//!
//! 解析报告文件名中拼接的患者姓名与嵌入时间戳，按三级回退策略定位
//! 所属检查并附加报告：精确元数据关联、姓名重建+时间窗口、文件名
//! 直接作为检查号。

pub mod extract;
pub mod filename;
pub mod matcher;
pub mod name;
pub mod sections;

pub use filename::{parse_report_filename, ReportFilename};
pub use matcher::{MatchStats, ReportMatcher};
pub use name::{compact_name, reconstruct_name};
pub use sections::{split_sections, ReportSections};
