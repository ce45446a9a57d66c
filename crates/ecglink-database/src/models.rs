//! 数据库模型

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use ecglink_core::models::*;
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 性别的数据库编码
pub fn gender_to_db(gender: Gender) -> &'static str {
    match gender {
        Gender::Masculino => "M",
        Gender::Feminino => "F",
        Gender::Outro => "O",
    }
}

/// 性别的数据库解码，未知值回落到Outro
pub fn gender_from_db(raw: &str) -> Gender {
    match raw {
        "M" => Gender::Masculino,
        "F" => Gender::Feminino,
        _ => Gender::Outro,
    }
}

/// 检查状态的数据库编码
pub fn status_to_db(status: ExamStatus) -> &'static str {
    match status {
        ExamStatus::Realizado => "realizado",
        ExamStatus::Processando => "processando",
        ExamStatus::Finalizado => "finalizado",
        ExamStatus::Cancelado => "cancelado",
    }
}

/// 检查状态的数据库解码
pub fn status_from_db(raw: &str) -> ExamStatus {
    match raw {
        "realizado" => ExamStatus::Realizado,
        "processando" => ExamStatus::Processando,
        "finalizado" => ExamStatus::Finalizado,
        "cancelado" => ExamStatus::Cancelado,
        _ => ExamStatus::Realizado, // 默认状态
    }
}

/// 日志状态的数据库编码
pub fn log_status_to_db(status: LogStatus) -> &'static str {
    match status {
        LogStatus::Success => "success",
        LogStatus::Warning => "warning",
        LogStatus::Error => "error",
    }
}

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub name: String,
    pub cpf: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: String, // 存储为字符串，转换为Gender枚举
    pub record_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbPatient> for Patient {
    fn from(db: DbPatient) -> Self {
        Patient {
            id: db.id,
            name: db.name,
            cpf: db.cpf,
            birth_date: db.birth_date,
            gender: gender_from_db(&db.gender),
            record_number: db.record_number,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// 数据库医生表
#[derive(Debug, FromRow)]
pub struct DbDoctor {
    pub id: Uuid,
    pub name: String,
    pub crm: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbDoctor> for Doctor {
    fn from(db: DbDoctor) -> Self {
        Doctor {
            id: db.id,
            name: db.name,
            crm: db.crm,
            created_at: db.created_at,
        }
    }
}

/// 数据库检查表
#[derive(Debug, FromRow)]
pub struct DbExam {
    pub id: Uuid,
    pub exam_number: String,
    pub patient_id: Uuid,
    pub exam_date: NaiveDate,
    pub exam_time: NaiveTime,
    pub doctor_id: Option<Uuid>,
    pub requesting_doctor_id: Option<Uuid>,
    pub metadata_filename: Option<String>,
    pub metadata_processed: bool,
    pub report_processed: bool,
    pub status: String, // 存储为字符串，转换为ExamStatus枚举
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbExam> for Exam {
    fn from(db: DbExam) -> Self {
        Exam {
            id: db.id,
            exam_number: db.exam_number,
            patient_id: db.patient_id,
            exam_date: db.exam_date,
            exam_time: db.exam_time,
            doctor_id: db.doctor_id,
            requesting_doctor_id: db.requesting_doctor_id,
            metadata_filename: db.metadata_filename,
            metadata_processed: db.metadata_processed,
            report_processed: db.report_processed,
            status: status_from_db(&db.status),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// 数据库报告表
#[derive(Debug, FromRow)]
pub struct DbReport {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub stored_path: String,
    pub file_size: i64,
    pub report_date: NaiveDate,
    pub report_time: NaiveTime,
    pub findings: String,
    pub conclusion: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbReport> for Report {
    fn from(db: DbReport) -> Self {
        Report {
            id: db.id,
            exam_id: db.exam_id,
            original_filename: db.original_filename,
            stored_filename: db.stored_filename,
            stored_path: db.stored_path,
            file_size: db.file_size,
            report_date: db.report_date,
            report_time: db.report_time,
            findings: db.findings,
            conclusion: db.conclusion,
            created_at: db.created_at,
        }
    }
}

// 插入模型 - 用于创建新记录

/// 新患者插入模型
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub cpf: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Gender,
    pub record_number: Option<String>,
}

/// 新医生插入模型
#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub crm: Option<String>,
}

/// 新检查插入模型
#[derive(Debug, Clone)]
pub struct NewExam {
    pub exam_number: String,
    pub patient_id: Uuid,
    pub exam_date: NaiveDate,
    pub exam_time: NaiveTime,
    pub doctor_id: Option<Uuid>,
    pub requesting_doctor_id: Option<Uuid>,
    pub metadata_filename: Option<String>,
    pub metadata_processed: bool,
    pub status: ExamStatus,
}

/// 新报告插入模型
#[derive(Debug, Clone)]
pub struct NewReport {
    pub exam_id: Uuid,
    pub original_filename: String,
    pub stored_filename: String,
    pub stored_path: String,
    pub file_size: i64,
    pub report_date: NaiveDate,
    pub report_time: NaiveTime,
    pub findings: String,
    pub conclusion: String,
}
