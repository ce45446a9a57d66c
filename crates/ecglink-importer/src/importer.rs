//! 结构化元数据导入器
//!
//! 合同：每个元数据文件产生或更新恰好一条检查记录，按需创建患者与
//! 医生，数据库写入成功后才把文件移入"已处理"子目录。"是否已导入"
//! 以检查记录上的processed标志为准（数据库存在性检查），从不依赖
//! 文件系统状态，因此提交与移动之间的崩溃至多造成一次无害的重扫。

use crate::parser::{parse_metadata, ExamMetadata};
use ecglink_core::fsops::move_to_processed;
use ecglink_core::utils::matches_pattern;
use ecglink_core::{ExamStatus, LogStatus, Result};
use ecglink_database::{DatabasePool, DatabaseQueries, NewDoctor, NewExam, NewPatient};
use ecglink_logger::SyncLogger;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// 日志条目类型
const LOG_TYPE: &str = "metadata_import";

/// 单次导入运行的统计
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportStats {
    pub imported: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// 结构化元数据导入器
pub struct MetadataImporter {
    logger: Arc<SyncLogger>,
}

impl MetadataImporter {
    pub fn new(logger: Arc<SyncLogger>) -> Self {
        Self { logger }
    }

    /// 执行一次导入周期
    ///
    /// 逐文件处理，单个文件的失败不会中断其余文件。
    pub async fn run(
        &self,
        pool: &DatabasePool,
        staging_dir: &Path,
        pattern: &str,
        processed_subdir: &str,
    ) -> ImportStats {
        let mut stats = ImportStats::default();
        let queries = DatabaseQueries::new(pool);

        let mut read_dir = match tokio::fs::read_dir(staging_dir).await {
            Ok(rd) => rd,
            Err(e) => {
                self.logger
                    .log(
                        LOG_TYPE,
                        LogStatus::Warning,
                        &format!("Diretorio de staging inacessivel {}: {}", staging_dir.display(), e),
                        0,
                    )
                    .await;
                return stats;
            }
        };

        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if !matches_pattern(&name, pattern) {
                continue;
            }
            if !entry.path().is_file() {
                continue;
            }

            match self.import_file(&queries, &entry.path(), &name, processed_subdir).await {
                Ok(true) => stats.imported += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    // 失败文件原地保留，供人工检查，下次调度安全重试
                    stats.failed += 1;
                    self.logger
                        .log(
                            LOG_TYPE,
                            LogStatus::Error,
                            &format!("Falha ao importar {}: {}", name, e),
                            0,
                        )
                        .await;
                }
            }
        }

        self.logger
            .log(
                LOG_TYPE,
                LogStatus::Success,
                &format!(
                    "Importacao concluida: {} importados, {} ignorados, {} falhas",
                    stats.imported, stats.skipped, stats.failed
                ),
                stats.imported as i64,
            )
            .await;

        stats
    }

    /// 导入单个元数据文件；返回false表示数据库已记录为处理完毕
    async fn import_file(
        &self,
        queries: &DatabaseQueries<'_>,
        path: &Path,
        filename: &str,
        processed_subdir: &str,
    ) -> Result<bool> {
        // 权威"已导入"检查走数据库，不看文件系统
        if queries.is_metadata_processed(filename).await? {
            tracing::debug!("Metadata file {} already imported, skipping", filename);
            return Ok(false);
        }

        let content = tokio::fs::read_to_string(path).await?;
        let metadata = parse_metadata(filename, &content)?;

        let patient_id = self.resolve_patient(queries, &metadata).await?;
        let doctor_id = self
            .resolve_doctor(queries, metadata.doctor_name.as_deref(), metadata.doctor_crm.as_deref())
            .await?;
        let requesting_doctor_id = self
            .resolve_doctor(
                queries,
                metadata.requesting_doctor_name.as_deref(),
                metadata.requesting_doctor_crm.as_deref(),
            )
            .await?;

        let new_exam = NewExam {
            exam_number: metadata.exam_number.clone(),
            patient_id,
            exam_date: metadata.exam_date,
            exam_time: metadata.exam_time,
            doctor_id,
            requesting_doctor_id,
            metadata_filename: Some(filename.to_string()),
            metadata_processed: true,
            status: ExamStatus::Realizado,
        };

        let exam_id = match queries.get_exam_by_number(&metadata.exam_number).await? {
            Some(existing) => {
                queries.update_exam_metadata(&existing.id, &new_exam).await?;
                existing.id
            }
            None => queries.create_exam(&new_exam).await?,
        };

        self.logger
            .log(
                LOG_TYPE,
                LogStatus::Success,
                &format!("Exame {} importado de {}", metadata.exam_number, filename),
                1,
            )
            .await;

        // 数据库写入已提交；移动失败不回滚，遗留文件下次经数据库检查跳过
        if let Err(e) = move_to_processed(path, processed_subdir).await {
            self.logger
                .log(
                    LOG_TYPE,
                    LogStatus::Warning,
                    &format!("Exame {} importado mas arquivo {} nao movido: {}", exam_id, filename, e),
                    0,
                )
                .await;
        }

        Ok(true)
    }

    /// 患者实体解析：CPF优先，其次(姓名, 出生日期)精确匹配，否则创建
    ///
    /// 一经创建从不自动合并。
    async fn resolve_patient(
        &self,
        queries: &DatabaseQueries<'_>,
        metadata: &ExamMetadata,
    ) -> Result<Uuid> {
        if let Some(cpf) = &metadata.patient_cpf {
            if let Some(patient) = queries.get_patient_by_cpf(cpf).await? {
                return Ok(patient.id);
            }
        }

        if let Some(birth_date) = metadata.patient_birth_date {
            if let Some(patient) = queries
                .get_patient_by_name_and_birth(&metadata.patient_name, birth_date)
                .await?
            {
                return Ok(patient.id);
            }
        }

        let new_patient = NewPatient {
            name: metadata.patient_name.clone(),
            cpf: metadata.patient_cpf.clone(),
            birth_date: metadata.patient_birth_date,
            gender: metadata.patient_gender,
            record_number: metadata.patient_record_number.clone(),
        };

        tracing::info!("Creating patient {}", new_patient.name);
        queries.create_patient(&new_patient).await
    }

    /// 医生实体解析：CRM优先，其次姓名精确匹配；姓名与CRM都为空时
    /// 解析为"无医生"
    async fn resolve_doctor(
        &self,
        queries: &DatabaseQueries<'_>,
        name: Option<&str>,
        crm: Option<&str>,
    ) -> Result<Option<Uuid>> {
        let name = name.map(str::trim).filter(|s| !s.is_empty());
        let crm = crm.map(str::trim).filter(|s| !s.is_empty());

        if let Some(crm) = crm {
            if let Some(doctor) = queries.get_doctor_by_crm(crm).await? {
                return Ok(Some(doctor.id));
            }
        }

        if let Some(name) = name {
            if let Some(doctor) = queries.get_doctor_by_name(name).await? {
                return Ok(Some(doctor.id));
            }
        }

        if name.is_none() && crm.is_none() {
            return Ok(None);
        }

        let new_doctor = NewDoctor {
            name: name.unwrap_or("").to_string(),
            crm: crm.map(str::to_string),
        };
        let id = queries.create_doctor(&new_doctor).await?;
        Ok(Some(id))
    }
}

impl ImportStats {
    pub fn total(&self) -> u64 {
        self.imported + self.skipped + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecglink_core::config::{DatabaseConfig, LoggerConfig};
    use ecglink_logger::{MemorySink, SystemClock};

    #[test]
    fn test_stats_total() {
        let stats = ImportStats {
            imported: 2,
            skipped: 1,
            failed: 1,
        };
        assert_eq!(stats.total(), 4);
    }

    // 以下测试需要本地Postgres实例，默认跳过:
    // ECGLINK_TEST_DATABASE_URL=... cargo test -p ecglink-importer -- --ignored

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

    fn test_logger() -> Arc<SyncLogger> {
        Arc::new(SyncLogger::new(
            Arc::new(MemorySink::new()),
            Arc::new(SystemClock),
            LoggerConfig::default(),
        ))
    }

    #[tokio::test]
    #[ignore]
    async fn test_double_import_yields_single_patient_and_exam() {
        let pool = live_pool().await;
        let queries = DatabaseQueries::new(&pool);
        let staging = tempfile::tempdir().unwrap();

        let suffix = Uuid::new_v4().simple().to_string();
        let exam_number = format!("E{}", &suffix[..8]);
        let cpf = format!("{:011}", Uuid::new_v4().as_u128() % 100_000_000_000);
        let filename = format!("{}.WXML", exam_number);
        let content = format!(
            r#"<Exame>
                <NumeroExame>{}</NumeroExame>
                <NomePaciente>Paciente {}</NomePaciente>
                <CPF>{}</CPF>
                <DataExame>15/12/2025</DataExame>
                <HoraExame>14:30</HoraExame>
            </Exame>"#,
            exam_number,
            &suffix[..8],
            cpf
        );

        std::fs::write(staging.path().join(&filename), &content).unwrap();
        let importer = MetadataImporter::new(test_logger());
        let first = importer.run(&pool, staging.path(), "*.wxml", "processed").await;
        assert_eq!(first.imported, 1);
        assert_eq!(first.failed, 0);

        // 同一文件再次出现（如移动失败遗留），数据库存在性检查跳过
        std::fs::write(staging.path().join(&filename), &content).unwrap();
        let second = importer.run(&pool, staging.path(), "*.wxml", "processed").await;
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 1);

        let exam = queries.get_exam_by_number(&exam_number).await.unwrap().unwrap();
        let patient = queries.get_patient_by_cpf(&cpf).await.unwrap().unwrap();
        assert_eq!(exam.patient_id, patient.id);
        assert_eq!(exam.status, ExamStatus::Realizado);
    }
}
