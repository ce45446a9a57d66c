//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use chrono::{NaiveDate, Utc};
use ecglink_core::{Doctor, EcgLinkError, Exam, ExamStatus, LogStatus, Patient, Report, Result};
use sqlx::Row;
use uuid::Uuid;

/// 管道状态统计（status诊断命令使用）
#[derive(Debug, Clone)]
pub struct PipelineStatus {
    pub patients: i64,
    pub doctors: i64,
    pub exams: i64,
    pub exams_awaiting_report: i64,
    pub reports: i64,
    pub log_errors_today: i64,
}

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

/// 判断sqlx错误是否为唯一键冲突（并发调用竞争同一记录）
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        // 创建患者表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS patients (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                cpf VARCHAR(14) UNIQUE,
                birth_date DATE,
                gender CHAR(1) NOT NULL DEFAULT 'O',
                record_number VARCHAR(64),
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| EcgLinkError::Database(e.to_string()))?;

        // 创建医生表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS doctors (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                crm VARCHAR(32) UNIQUE,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| EcgLinkError::Database(e.to_string()))?;

        // 创建检查表
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS exams (
                id UUID PRIMARY KEY,
                exam_number VARCHAR(64) NOT NULL,
                patient_id UUID NOT NULL REFERENCES patients(id),
                exam_date DATE NOT NULL,
                exam_time TIME NOT NULL DEFAULT '00:00:00',
                doctor_id UUID REFERENCES doctors(id),
                requesting_doctor_id UUID REFERENCES doctors(id),
                metadata_filename VARCHAR(255),
                metadata_processed BOOLEAN NOT NULL DEFAULT FALSE,
                report_processed BOOLEAN NOT NULL DEFAULT FALSE,
                status VARCHAR(20) NOT NULL DEFAULT 'realizado',
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| EcgLinkError::Database(e.to_string()))?;

        // 创建报告表（每个检查至多一份）
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS reports (
                id UUID PRIMARY KEY,
                exam_id UUID UNIQUE NOT NULL REFERENCES exams(id),
                original_filename VARCHAR(255) NOT NULL,
                stored_filename VARCHAR(255) NOT NULL,
                stored_path VARCHAR(512) NOT NULL,
                file_size BIGINT NOT NULL,
                report_date DATE NOT NULL,
                report_time TIME NOT NULL DEFAULT '00:00:00',
                findings TEXT NOT NULL DEFAULT '',
                conclusion TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| EcgLinkError::Database(e.to_string()))?;

        // 创建同步日志表（追加写入）
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS sync_log (
                id UUID PRIMARY KEY,
                entry_type VARCHAR(64) NOT NULL,
                status VARCHAR(16) NOT NULL,
                message TEXT NOT NULL,
                affected_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
        "#).execute(pool).await.map_err(|e| EcgLinkError::Database(e.to_string()))?;

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            // 检查号在非取消状态下唯一（业务主键）
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_exams_exam_number_active ON exams(exam_number) WHERE status <> 'cancelado'",
            "CREATE INDEX IF NOT EXISTS idx_patients_cpf ON patients(cpf)",
            "CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name)",
            "CREATE INDEX IF NOT EXISTS idx_doctors_crm ON doctors(crm)",
            "CREATE INDEX IF NOT EXISTS idx_exams_patient_id ON exams(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_exams_exam_date ON exams(exam_date)",
            "CREATE INDEX IF NOT EXISTS idx_exams_metadata_filename ON exams(metadata_filename)",
            "CREATE INDEX IF NOT EXISTS idx_reports_exam_id ON reports(exam_id)",
            "CREATE INDEX IF NOT EXISTS idx_sync_log_created_at ON sync_log(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_sync_log_entry_type ON sync_log(entry_type)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(|e| EcgLinkError::Database(e.to_string()))?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }

    // ========== 患者相关操作 ==========

    /// 创建新患者
    ///
    /// CPF唯一键冲突（并发调用竞争同一患者）时回查CPF并返回既有行的id。
    pub async fn create_patient(&self, patient: &NewPatient) -> Result<Uuid> {
        let pool = self.pool.pool();
        let id = Uuid::new_v4();

        let insert = sqlx::query(r#"
            INSERT INTO patients (id, name, cpf, birth_date, gender, record_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
        "#)
        .bind(id)
        .bind(&patient.name)
        .bind(&patient.cpf)
        .bind(patient.birth_date)
        .bind(gender_to_db(patient.gender))
        .bind(&patient.record_number)
        .fetch_one(pool)
        .await;

        match insert {
            Ok(row) => Ok(row.get("id")),
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(name = %patient.name, "患者插入冲突，回查既有行");
                let existing = match &patient.cpf {
                    Some(cpf) => self.get_patient_by_cpf(cpf).await?,
                    None => None,
                };
                match existing {
                    Some(found) => Ok(found.id),
                    None => Err(EcgLinkError::Database(e.to_string())),
                }
            }
            Err(e) => Err(EcgLinkError::Database(e.to_string())),
        }
    }

    /// 根据CPF查找患者
    pub async fn get_patient_by_cpf(&self, cpf: &str) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE cpf = $1"
        )
        .bind(cpf)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Patient::from))
    }

    /// 根据姓名与出生日期精确查找患者
    pub async fn get_patient_by_name_and_birth(
        &self,
        name: &str,
        birth_date: NaiveDate,
    ) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE name = $1 AND birth_date = $2 ORDER BY created_at DESC LIMIT 1"
        )
        .bind(name)
        .bind(birth_date)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Patient::from))
    }

    /// 根据姓名精确查找患者
    pub async fn get_patient_by_exact_name(&self, name: &str) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE name = $1 ORDER BY created_at DESC LIMIT 1"
        )
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Patient::from))
    }

    /// 根据姓名子串查找患者，并列时最近创建者优先
    pub async fn get_patient_by_name_fragment(&self, fragment: &str) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE name ILIKE $1 ORDER BY created_at DESC LIMIT 1"
        )
        .bind(format!("%{}%", fragment))
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Patient::from))
    }

    /// 根据压缩姓名（去空格大写）查找患者
    ///
    /// 用于全大写文件名姓名段无法按大小写切分的场景。
    pub async fn get_patient_by_compact_name(&self, compact: &str) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients WHERE REPLACE(UPPER(name), ' ', '') = $1 ORDER BY created_at DESC LIMIT 1"
        )
        .bind(compact)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Patient::from))
    }

    // ========== 医生相关操作 ==========

    /// 创建新医生
    ///
    /// CRM唯一键冲突（并发调用竞争同一医生）时回查CRM并返回既有行的id。
    pub async fn create_doctor(&self, doctor: &NewDoctor) -> Result<Uuid> {
        let pool = self.pool.pool();
        let id = Uuid::new_v4();

        let insert = sqlx::query(r#"
            INSERT INTO doctors (id, name, crm)
            VALUES ($1, $2, $3)
            RETURNING id
        "#)
        .bind(id)
        .bind(&doctor.name)
        .bind(&doctor.crm)
        .fetch_one(pool)
        .await;

        match insert {
            Ok(row) => Ok(row.get("id")),
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(name = %doctor.name, "医生插入冲突，回查既有行");
                let existing = match &doctor.crm {
                    Some(crm) => self.get_doctor_by_crm(crm).await?,
                    None => None,
                };
                match existing {
                    Some(found) => Ok(found.id),
                    None => Err(EcgLinkError::Database(e.to_string())),
                }
            }
            Err(e) => Err(EcgLinkError::Database(e.to_string())),
        }
    }

    /// 根据CRM查找医生
    pub async fn get_doctor_by_crm(&self, crm: &str) -> Result<Option<Doctor>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbDoctor>(
            "SELECT * FROM doctors WHERE crm = $1"
        )
        .bind(crm)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Doctor::from))
    }

    /// 根据姓名精确查找医生
    pub async fn get_doctor_by_name(&self, name: &str) -> Result<Option<Doctor>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbDoctor>(
            "SELECT * FROM doctors WHERE name = $1 ORDER BY created_at DESC LIMIT 1"
        )
        .bind(name)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Doctor::from))
    }

    // ========== 检查相关操作 ==========

    /// 创建新检查
    ///
    /// 唯一键冲突（并发调用竞争同一元数据文件）时回查检查号并返回既有行的id，
    /// 使同一文件的并发导入安全。
    pub async fn create_exam(&self, exam: &NewExam) -> Result<Uuid> {
        let pool = self.pool.pool();
        let id = Uuid::new_v4();

        let insert = sqlx::query(r#"
            INSERT INTO exams (id, exam_number, patient_id, exam_date, exam_time,
                               doctor_id, requesting_doctor_id, metadata_filename,
                               metadata_processed, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
        "#)
        .bind(id)
        .bind(&exam.exam_number)
        .bind(exam.patient_id)
        .bind(exam.exam_date)
        .bind(exam.exam_time)
        .bind(exam.doctor_id)
        .bind(exam.requesting_doctor_id)
        .bind(&exam.metadata_filename)
        .bind(exam.metadata_processed)
        .bind(status_to_db(exam.status))
        .fetch_one(pool)
        .await;

        match insert {
            Ok(row) => Ok(row.get("id")),
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(exam_number = %exam.exam_number, "检查插入冲突，回查既有行");
                match self.get_exam_by_number(&exam.exam_number).await? {
                    Some(existing) => Ok(existing.id),
                    None => Err(EcgLinkError::Database(e.to_string())),
                }
            }
            Err(e) => Err(EcgLinkError::Database(e.to_string())),
        }
    }

    /// 根据检查号查找检查（排除已取消）
    pub async fn get_exam_by_number(&self, exam_number: &str) -> Result<Option<Exam>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbExam>(
            "SELECT * FROM exams WHERE exam_number = $1 AND status <> 'cancelado'"
        )
        .bind(exam_number)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Exam::from))
    }

    /// 根据元数据文件名查找检查（排除已取消）
    pub async fn get_exam_by_metadata_filename(&self, filename: &str) -> Result<Option<Exam>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbExam>(
            "SELECT * FROM exams WHERE metadata_filename = $1 AND status <> 'cancelado'"
        )
        .bind(filename)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Exam::from))
    }

    /// 查找患者指定日期的检查（排除已取消）
    pub async fn get_exam_by_patient_and_date(
        &self,
        patient_id: &Uuid,
        exam_date: NaiveDate,
    ) -> Result<Option<Exam>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbExam>(r#"
            SELECT * FROM exams
            WHERE patient_id = $1 AND exam_date = $2 AND status <> 'cancelado'
            ORDER BY exam_time DESC LIMIT 1
        "#)
        .bind(patient_id)
        .bind(exam_date)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Exam::from))
    }

    /// 查找患者在日期区间内最近的检查（排除已取消）
    pub async fn get_latest_exam_in_range(
        &self,
        patient_id: &Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<Exam>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbExam>(r#"
            SELECT * FROM exams
            WHERE patient_id = $1 AND exam_date BETWEEN $2 AND $3 AND status <> 'cancelado'
            ORDER BY exam_date DESC, exam_time DESC LIMIT 1
        "#)
        .bind(patient_id)
        .bind(from)
        .bind(to)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Exam::from))
    }

    /// 更新检查的元数据关联字段（重新导入路径）
    pub async fn update_exam_metadata(
        &self,
        exam_id: &Uuid,
        exam: &NewExam,
    ) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            UPDATE exams
            SET exam_date = $1, exam_time = $2, doctor_id = $3, requesting_doctor_id = $4,
                metadata_filename = $5, metadata_processed = $6, updated_at = NOW()
            WHERE id = $7
        "#)
        .bind(exam.exam_date)
        .bind(exam.exam_time)
        .bind(exam.doctor_id)
        .bind(exam.requesting_doctor_id)
        .bind(&exam.metadata_filename)
        .bind(exam.metadata_processed)
        .bind(exam_id)
        .execute(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(())
    }

    /// 数据库级"已导入"检查：元数据文件是否已处理
    ///
    /// 处理标志以数据库为准，从不查询文件系统。
    pub async fn is_metadata_processed(&self, filename: &str) -> Result<bool> {
        let pool = self.pool.pool();

        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM exams WHERE metadata_filename = $1 AND metadata_processed) AS processed"
        )
        .bind(filename)
        .fetch_one(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(row.get("processed"))
    }

    /// 标记检查已附加报告：置report_processed并强制状态finalizado
    pub async fn mark_report_attached(&self, exam_id: &Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(r#"
            UPDATE exams
            SET report_processed = TRUE, status = 'finalizado', updated_at = NOW()
            WHERE id = $1
        "#)
        .bind(exam_id)
        .execute(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(())
    }

    // ========== 报告相关操作 ==========

    /// 根据检查ID查找报告
    pub async fn get_report_by_exam_id(&self, exam_id: &Uuid) -> Result<Option<Report>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbReport>(
            "SELECT * FROM reports WHERE exam_id = $1"
        )
        .bind(exam_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(result.map(Report::from))
    }

    /// 创建新报告
    ///
    /// exam_id唯一键冲突（并发调用竞争同一报告文件）时就地更新既有行，
    /// 而不是报错。
    pub async fn create_report(&self, report: &NewReport) -> Result<Uuid> {
        let pool = self.pool.pool();
        let id = Uuid::new_v4();

        let insert = sqlx::query(r#"
            INSERT INTO reports (id, exam_id, original_filename, stored_filename, stored_path,
                                 file_size, report_date, report_time, findings, conclusion)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
        "#)
        .bind(id)
        .bind(report.exam_id)
        .bind(&report.original_filename)
        .bind(&report.stored_filename)
        .bind(&report.stored_path)
        .bind(report.file_size)
        .bind(report.report_date)
        .bind(report.report_time)
        .bind(&report.findings)
        .bind(&report.conclusion)
        .fetch_one(pool)
        .await;

        match insert {
            Ok(row) => Ok(row.get("id")),
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(exam_id = %report.exam_id, "报告插入冲突，就地更新既有行");
                self.update_report_in_place(report).await
            }
            Err(e) => Err(EcgLinkError::Database(e.to_string())),
        }
    }

    /// 就地更新既有报告行（唯一键竞争恢复路径）
    async fn update_report_in_place(&self, report: &NewReport) -> Result<Uuid> {
        let pool = self.pool.pool();

        let row = sqlx::query(r#"
            UPDATE reports
            SET original_filename = $1, stored_filename = $2, stored_path = $3,
                file_size = $4, report_date = $5, report_time = $6,
                findings = $7, conclusion = $8
            WHERE exam_id = $9
            RETURNING id
        "#)
        .bind(&report.original_filename)
        .bind(&report.stored_filename)
        .bind(&report.stored_path)
        .bind(report.file_size)
        .bind(report.report_date)
        .bind(report.report_time)
        .bind(&report.findings)
        .bind(&report.conclusion)
        .bind(report.exam_id)
        .fetch_one(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(row.get("id"))
    }

    // ========== 同步日志相关操作 ==========

    /// 写入一条同步日志
    pub async fn insert_sync_log(
        &self,
        entry_type: &str,
        status: LogStatus,
        message: &str,
        affected_count: i64,
    ) -> Result<Uuid> {
        let pool = self.pool.pool();
        let id = Uuid::new_v4();

        sqlx::query(r#"
            INSERT INTO sync_log (id, entry_type, status, message, affected_count)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        "#)
        .bind(id)
        .bind(entry_type)
        .bind(log_status_to_db(status))
        .bind(message)
        .bind(affected_count)
        .fetch_one(pool)
        .await
        .map(|row| row.get("id"))
        .map_err(|e| EcgLinkError::Database(e.to_string()))
    }

    /// 管道状态统计
    pub async fn pipeline_status(&self) -> Result<PipelineStatus> {
        let pool = self.pool.pool();
        let today = Utc::now().date_naive();

        let counts = sqlx::query(r#"
            SELECT
                (SELECT COUNT(*) FROM patients) AS patients,
                (SELECT COUNT(*) FROM doctors) AS doctors,
                (SELECT COUNT(*) FROM exams WHERE status <> 'cancelado') AS exams,
                (SELECT COUNT(*) FROM exams WHERE status <> 'cancelado' AND NOT report_processed) AS awaiting,
                (SELECT COUNT(*) FROM reports) AS reports,
                (SELECT COUNT(*) FROM sync_log WHERE status = 'error' AND created_at::date = $1) AS errors_today
        "#)
        .bind(today)
        .fetch_one(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(PipelineStatus {
            patients: counts.get("patients"),
            doctors: counts.get("doctors"),
            exams: counts.get("exams"),
            exams_awaiting_report: counts.get("awaiting"),
            reports: counts.get("reports"),
            log_errors_today: counts.get("errors_today"),
        })
    }

    /// 标记检查的metadata_processed标志
    pub async fn mark_metadata_processed(&self, exam_id: &Uuid) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(
            "UPDATE exams SET metadata_processed = TRUE, updated_at = NOW() WHERE id = $1"
        )
        .bind(exam_id)
        .execute(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(())
    }

    /// 检查状态更新
    pub async fn update_exam_status(&self, exam_id: &Uuid, status: ExamStatus) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query(
            "UPDATE exams SET status = $1, updated_at = NOW() WHERE id = $2"
        )
        .bind(status_to_db(status))
        .bind(exam_id)
        .execute(pool)
        .await
        .map_err(|e| EcgLinkError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecglink_core::config::DatabaseConfig;
    use ecglink_core::Gender;

    // 以下测试需要本地Postgres实例，默认跳过:
    // ECGLINK_TEST_DATABASE_URL=... cargo test -p ecglink-database -- --ignored

    async fn live_pool() -> DatabasePool {
        let config = DatabaseConfig {
            url: std::env::var("ECGLINK_TEST_DATABASE_URL")
                .unwrap_or_else(|_| DatabaseConfig::default().url),
            ..DatabaseConfig::default()
        };
        let pool = DatabasePool::connect(&config)
            .await
            .expect("banco de teste indisponivel");
        DatabaseQueries::new(&pool).create_tables().await.unwrap();
        pool
    }

    /// 11位数字CPF，每次运行唯一
    fn unique_cpf() -> String {
        format!("{:011}", Uuid::new_v4().as_u128() % 100_000_000_000)
    }

    #[tokio::test]
    #[ignore]
    async fn test_create_patient_recovers_duplicate_cpf() {
        let pool = live_pool().await;
        let queries = DatabaseQueries::new(&pool);

        let patient = NewPatient {
            name: "Joao Concorrente".to_string(),
            cpf: Some(unique_cpf()),
            birth_date: None,
            gender: Gender::Masculino,
            record_number: None,
        };

        // 两次并发导入竞争同一CPF：第二次插入回查既有行而不是报错
        let first = queries.create_patient(&patient).await.unwrap();
        let second = queries.create_patient(&patient).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    #[ignore]
    async fn test_create_doctor_recovers_duplicate_crm() {
        let pool = live_pool().await;
        let queries = DatabaseQueries::new(&pool);

        let suffix = Uuid::new_v4().simple().to_string();
        let doctor = NewDoctor {
            name: "Dr Concorrente".to_string(),
            crm: Some(format!("{}-SP", &suffix[..8])),
        };

        let first = queries.create_doctor(&doctor).await.unwrap();
        let second = queries.create_doctor(&doctor).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    #[ignore]
    async fn test_create_exam_recovers_duplicate_number() {
        let pool = live_pool().await;
        let queries = DatabaseQueries::new(&pool);

        let suffix = Uuid::new_v4().simple().to_string();
        let patient_id = queries
            .create_patient(&NewPatient {
                name: format!("Paciente {}", &suffix[..8]),
                cpf: None,
                birth_date: None,
                gender: Gender::Outro,
                record_number: None,
            })
            .await
            .unwrap();

        let exam = NewExam {
            exam_number: format!("E{}", &suffix[..8]),
            patient_id,
            exam_date: NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
            exam_time: chrono::NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            doctor_id: None,
            requesting_doctor_id: None,
            metadata_filename: None,
            metadata_processed: true,
            status: ExamStatus::Realizado,
        };

        let first = queries.create_exam(&exam).await.unwrap();
        let second = queries.create_exam(&exam).await.unwrap();
        assert_eq!(first, second);
    }
}
