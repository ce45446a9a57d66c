//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,                   // 规范化后的全名
    pub cpf: Option<String>,            // 外部近唯一标识（巴西个人税号）
    pub birth_date: Option<NaiveDate>,  // 出生日期
    pub gender: Gender,                 // 性别
    pub record_number: Option<String>,  // 院内病历号
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 性别枚举（固定三值集合）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    Masculino,
    Feminino,
    Outro,
}

/// 医生信息
///
/// 按CRM（执业许可证号）优先去重，其次按姓名；懒创建，检查上可为空。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub crm: Option<String>, // 执业许可证号
    pub created_at: DateTime<Utc>,
}

/// 检查记录
///
/// 业务主键为检查号（非取消状态下唯一），由结构化元数据导入器创建，
/// 报告匹配器在成功附加报告时将状态强制置为Finalizado。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: Uuid,
    pub exam_number: String, // 检查号（业务主键）
    pub patient_id: Uuid,
    pub exam_date: NaiveDate,
    pub exam_time: NaiveTime,
    pub doctor_id: Option<Uuid>,            // 责任医生
    pub requesting_doctor_id: Option<Uuid>, // 申请医生
    pub metadata_filename: Option<String>,  // 结构化元数据源文件名（一级匹配键）
    pub metadata_processed: bool,
    pub report_processed: bool,
    pub status: ExamStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 检查状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ExamStatus {
    Realizado,   // 已执行
    Processando, // 处理中
    Finalizado,  // 已出报告
    Cancelado,   // 已取消（排除在所有匹配查询之外）
}

/// 检查报告（每个检查至多一份有效报告）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub stored_path: String,
    pub file_size: i64,
    pub report_date: NaiveDate,
    pub report_time: NaiveTime,
    pub findings: String,   // 启发式提取的"所见"文本
    pub conclusion: String, // 启发式提取的"结论"文本
    pub created_at: DateTime<Utc>,
}

/// 同步日志条目（追加写入，供运维工具读取）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: Uuid,
    pub entry_type: String,
    pub status: LogStatus,
    pub message: String,
    pub affected_count: i64,
    pub created_at: DateTime<Utc>,
}

/// 日志条目状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LogStatus {
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogStatus::Success => write!(f, "success"),
            LogStatus::Warning => write!(f, "warning"),
            LogStatus::Error => write!(f, "error"),
        }
    }
}
