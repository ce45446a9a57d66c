//! 报告附加匹配器
//!
//! 匹配层级按序尝试，先命中者胜：
//! 1. 精确关联：检查的元数据文件名等于报告文件名换扩展名后的候选名；
//! 2. 姓名重建+时间窗口：从姓名段重建患者姓名，按提取日期找检查，
//!    再退到可配置尾随窗口内该患者最近的检查；
//! 3. 文件名主干直接作为检查号（为从不遵守命名约定的文件保留）。
//! 全部落空则该文件失败：记错误日志、原地保留、等待人工干预；由于
//! 没有任何变更，之后每次运行重试都是安全的。

use crate::extract::extract_text;
use crate::filename::{candidate_metadata_filename, parse_report_filename, ReportFilename};
use crate::name::{compact_name, reconstruct_name};
use crate::sections::split_sections;
use ecglink_core::config::MatcherConfig;
use ecglink_core::fsops::move_to_processed;
use ecglink_core::utils::{file_stem, matches_pattern};
use ecglink_core::{EcgLinkError, Exam, LogStatus, Patient, Result};
use ecglink_database::{DatabasePool, DatabaseQueries, NewReport};
use ecglink_logger::SyncLogger;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// 日志条目类型
const LOG_TYPE: &str = "report_match";

/// 单次匹配运行的统计
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchStats {
    pub attached: u64,
    pub already_attached: u64,
    pub failed: u64,
}

/// 附加结果
enum AttachOutcome {
    Attached,
    AlreadyAttached,
}

/// 报告附加匹配器
pub struct ReportMatcher {
    logger: Arc<SyncLogger>,
    config: MatcherConfig,
    storage_dir: PathBuf,
}

/// 报告文件扩展名（小写），缺省pdf
fn report_extension(filename: &str) -> String {
    match filename.rfind('.') {
        Some(idx) if idx + 1 < filename.len() => filename[idx + 1..].to_lowercase(),
        _ => "pdf".to_string(),
    }
}

impl ReportMatcher {
    pub fn new(logger: Arc<SyncLogger>, config: MatcherConfig, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            logger,
            config,
            storage_dir: storage_dir.into(),
        }
    }

    /// 执行一次匹配周期
    ///
    /// 逐文件处理，单个文件的失败不会中断其余文件。
    pub async fn run(
        &self,
        pool: &DatabasePool,
        staging_dir: &Path,
        pattern: &str,
        processed_subdir: &str,
    ) -> MatchStats {
        let mut stats = MatchStats::default();
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

            match self.process_file(&queries, &entry.path(), &name, processed_subdir).await {
                Ok(AttachOutcome::Attached) => stats.attached += 1,
                Ok(AttachOutcome::AlreadyAttached) => stats.already_attached += 1,
                Err(e) => {
                    // 文件原地保留；无层级命中与解析失败在日志中可区分
                    stats.failed += 1;
                    let status = LogStatus::Error;
                    let message = match &e {
                        EcgLinkError::Unmatched(m) => {
                            format!("Laudo sem correspondencia: {}", m)
                        }
                        _ => format!("Falha ao processar laudo {}: {}", name, e),
                    };
                    self.logger.log(LOG_TYPE, status, &message, 0).await;
                }
            }
        }

        self.logger
            .log(
                LOG_TYPE,
                LogStatus::Success,
                &format!(
                    "Correspondencia concluida: {} anexados, {} ja processados, {} falhas",
                    stats.attached, stats.already_attached, stats.failed
                ),
                stats.attached as i64,
            )
            .await;

        stats
    }

    /// 处理单个报告文件：定位检查并附加
    async fn process_file(
        &self,
        queries: &DatabaseQueries<'_>,
        path: &Path,
        filename: &str,
        processed_subdir: &str,
    ) -> Result<AttachOutcome> {
        let parsed = parse_report_filename(filename);
        let exam = self.resolve_exam(queries, filename, parsed.as_ref()).await?;
        self.attach(queries, &exam, path, filename, parsed.as_ref(), processed_subdir)
            .await
    }

    /// 三级回退定位所属检查
    async fn resolve_exam(
        &self,
        queries: &DatabaseQueries<'_>,
        filename: &str,
        parsed: Option<&ReportFilename>,
    ) -> Result<Exam> {
        // 一级：精确元数据关联（置信度最高，导入器已关联同一逻辑记录）
        let candidate = candidate_metadata_filename(filename, &self.config.metadata_extension);
        if let Some(exam) = queries.get_exam_by_metadata_filename(&candidate).await? {
            tracing::debug!("Report {} matched via metadata linkage", filename);
            return Ok(exam);
        }

        // 二级：姓名重建 + 时间窗口
        if let Some(parsed) = parsed {
            if let Some(patient) = self.resolve_patient(queries, &parsed.name_token).await? {
                if let Some(exam) = queries
                    .get_exam_by_patient_and_date(&patient.id, parsed.date)
                    .await?
                {
                    tracing::debug!("Report {} matched via patient name and date", filename);
                    return Ok(exam);
                }

                let from = parsed.date - chrono::Duration::days(self.config.window_days);
                if let Some(exam) = queries
                    .get_latest_exam_in_range(&patient.id, from, parsed.date)
                    .await?
                {
                    tracing::debug!("Report {} matched via trailing window", filename);
                    return Ok(exam);
                }
            }
        }

        // 三级：文件名主干作为字面检查号
        if let Some(exam) = queries.get_exam_by_number(file_stem(filename)).await? {
            tracing::debug!("Report {} matched via literal exam number", filename);
            return Ok(exam);
        }

        Err(EcgLinkError::Unmatched(filename.to_string()))
    }

    /// 从姓名段解析患者：重建名精确匹配，其次子串匹配（最近创建者
    /// 优先），最后对全大写段做去空格比较
    async fn resolve_patient(
        &self,
        queries: &DatabaseQueries<'_>,
        name_token: &str,
    ) -> Result<Option<Patient>> {
        let reconstructed = reconstruct_name(name_token);
        if reconstructed.is_empty() {
            return Ok(None);
        }

        if let Some(patient) = queries.get_patient_by_exact_name(&reconstructed).await? {
            return Ok(Some(patient));
        }
        if let Some(patient) = queries.get_patient_by_name_fragment(&reconstructed).await? {
            return Ok(Some(patient));
        }
        queries.get_patient_by_compact_name(&compact_name(name_token)).await
    }

    /// 附加报告到检查
    async fn attach(
        &self,
        queries: &DatabaseQueries<'_>,
        exam: &Exam,
        path: &Path,
        filename: &str,
        parsed: Option<&ReportFilename>,
        processed_subdir: &str,
    ) -> Result<AttachOutcome> {
        // 已有报告：无操作成功，不覆盖
        if exam.report_processed || queries.get_report_by_exam_id(&exam.id).await?.is_some() {
            // 此前运行可能在写入报告后、落标志前中断，此处补齐标志与状态
            if !exam.report_processed {
                queries.mark_report_attached(&exam.id).await?;
            }
            self.logger
                .log(
                    LOG_TYPE,
                    LogStatus::Success,
                    &format!("Exame {} ja possui laudo, ignorando {}", exam.exam_number, filename),
                    0,
                )
                .await;
            self.move_processed_best_effort(path, filename, processed_subdir).await;
            return Ok(AttachOutcome::AlreadyAttached);
        }

        // 复制到托管存储，生成唯一文件名并校验大小
        let stored_filename = format!("{}.{}", Uuid::new_v4(), report_extension(filename));
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        let stored_path = self.storage_dir.join(&stored_filename);

        let expected_size = tokio::fs::metadata(path).await?.len();
        tokio::fs::copy(path, &stored_path).await?;
        let stored_size = tokio::fs::metadata(&stored_path).await?.len();
        if stored_size != expected_size {
            let _ = tokio::fs::remove_file(&stored_path).await;
            return Err(EcgLinkError::Storage(format!(
                "tamanho divergente ao armazenar {}: esperado {} bytes, obtido {}",
                filename, expected_size, stored_size
            )));
        }

        // 尽力而为的文本提取，失败退化为空文本
        let text = extract_text(&self.config.text_extract_command, path).await;
        if text.is_empty() {
            self.logger
                .log(
                    LOG_TYPE,
                    LogStatus::Warning,
                    &format!("Sem texto extraido de {}", filename),
                    0,
                )
                .await;
        }
        let sections = split_sections(&text);

        let (report_date, report_time) = match parsed {
            Some(p) => (p.date, p.time),
            None => (exam.exam_date, exam.exam_time),
        };

        let new_report = NewReport {
            exam_id: exam.id,
            original_filename: filename.to_string(),
            stored_filename,
            stored_path: stored_path.to_string_lossy().to_string(),
            file_size: expected_size as i64,
            report_date,
            report_time,
            findings: sections.findings,
            conclusion: sections.conclusion,
        };

        // 唯一键竞争在查询层内就地更新恢复
        queries.create_report(&new_report).await?;
        queries.mark_report_attached(&exam.id).await?;

        self.logger
            .log(
                LOG_TYPE,
                LogStatus::Success,
                &format!("Laudo {} anexado ao exame {}", filename, exam.exam_number),
                1,
            )
            .await;

        self.move_processed_best_effort(path, filename, processed_subdir).await;
        Ok(AttachOutcome::Attached)
    }

    /// 数据库提交后的尽力清理：移动失败只警告
    async fn move_processed_best_effort(&self, path: &Path, filename: &str, processed_subdir: &str) {
        if let Err(e) = move_to_processed(path, processed_subdir).await {
            self.logger
                .log(
                    LOG_TYPE,
                    LogStatus::Warning,
                    &format!("Laudo {} processado mas nao movido: {}", filename, e),
                    0,
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use ecglink_core::config::{DatabaseConfig, LoggerConfig};
    use ecglink_core::{ExamStatus, Gender};
    use ecglink_database::{NewExam, NewPatient};
    use ecglink_logger::{MemorySink, SystemClock};

    #[test]
    fn test_report_extension() {
        assert_eq!(report_extension("laudo.PDF"), "pdf");
        assert_eq!(report_extension("MMD#A##151220251430#D#E.Pdf"), "pdf");
        assert_eq!(report_extension("semextensao"), "pdf");
    }

    // 以下测试需要本地Postgres实例，默认跳过:
    // ECGLINK_TEST_DATABASE_URL=... cargo test -p ecglink-matcher -- --ignored

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

    fn test_config() -> MatcherConfig {
        // 集成测试不依赖外部提取命令
        MatcherConfig {
            text_extract_command: String::new(),
            ..MatcherConfig::default()
        }
    }

    fn short_suffix() -> String {
        Uuid::new_v4().simple().to_string()[..8].to_string()
    }

    async fn seed_patient(queries: &DatabaseQueries<'_>, name: &str) -> Uuid {
        queries
            .create_patient(&NewPatient {
                name: name.to_string(),
                cpf: None,
                birth_date: None,
                gender: Gender::Outro,
                record_number: None,
            })
            .await
            .unwrap()
    }

    fn exam_template(exam_number: &str, patient_id: Uuid) -> NewExam {
        NewExam {
            exam_number: exam_number.to_string(),
            patient_id,
            exam_date: NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
            exam_time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            doctor_id: None,
            requesting_doctor_id: None,
            metadata_filename: None,
            metadata_processed: true,
            status: ExamStatus::Realizado,
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_exact_linkage_beats_literal_exam_number() {
        let pool = live_pool().await;
        let queries = DatabaseQueries::new(&pool);
        let staging = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();

        let suffix = short_suffix();
        let report_filename = format!(
            "MMD#PACIENTE{}##151220251430#DRX#E.PDF",
            suffix.to_uppercase()
        );

        // 一级目标：元数据文件名精确关联
        let linked_patient = seed_patient(&queries, &format!("Paciente Um {}", suffix)).await;
        let mut linked = exam_template(&format!("A{}", suffix), linked_patient);
        linked.metadata_filename =
            Some(candidate_metadata_filename(&report_filename, "WXML"));
        let linked_id = queries.create_exam(&linked).await.unwrap();

        // 三级诱饵：检查号等于报告文件名主干
        let decoy_patient = seed_patient(&queries, &format!("Paciente Dois {}", suffix)).await;
        let decoy =
            exam_template(file_stem(&report_filename), decoy_patient);
        let decoy_id = queries.create_exam(&decoy).await.unwrap();

        std::fs::write(staging.path().join(&report_filename), b"%PDF-1.4 laudo").unwrap();

        let matcher = ReportMatcher::new(test_logger(), test_config(), storage.path());
        let stats = matcher.run(&pool, staging.path(), "*.pdf", "processed").await;

        assert_eq!(stats.attached, 1);
        assert_eq!(stats.failed, 0);
        assert!(queries.get_report_by_exam_id(&linked_id).await.unwrap().is_some());
        assert!(queries.get_report_by_exam_id(&decoy_id).await.unwrap().is_none());

        let finalized = queries
            .get_exam_by_number(&format!("A{}", suffix))
            .await
            .unwrap()
            .unwrap();
        assert!(finalized.report_processed);
        assert_eq!(finalized.status, ExamStatus::Finalizado);
    }

    #[tokio::test]
    #[ignore]
    async fn test_already_attached_is_noop_and_reasserts_flags() {
        let pool = live_pool().await;
        let queries = DatabaseQueries::new(&pool);
        let staging = tempfile::tempdir().unwrap();
        let storage = tempfile::tempdir().unwrap();

        let suffix = short_suffix();
        let exam_number = format!("L{}", suffix);
        let patient_id = seed_patient(&queries, &format!("Paciente Tres {}", suffix)).await;
        let exam_id = queries
            .create_exam(&exam_template(&exam_number, patient_id))
            .await
            .unwrap();

        // 模拟此前运行在写入报告后、落标志前中断
        queries
            .create_report(&NewReport {
                exam_id,
                original_filename: format!("{}.PDF", exam_number),
                stored_filename: format!("{}.pdf", Uuid::new_v4()),
                stored_path: "/tmp/laudo-anterior.pdf".to_string(),
                file_size: 8,
                report_date: NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
                report_time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
                findings: String::new(),
                conclusion: String::new(),
            })
            .await
            .unwrap();
        let report_before = queries.get_report_by_exam_id(&exam_id).await.unwrap().unwrap();

        // 文件名主干即检查号，三级命中
        std::fs::write(
            staging.path().join(format!("{}.PDF", exam_number)),
            b"%PDF-1.4",
        )
        .unwrap();

        let matcher = ReportMatcher::new(test_logger(), test_config(), storage.path());
        let stats = matcher.run(&pool, staging.path(), "*.pdf", "processed").await;

        assert_eq!(stats.already_attached, 1);
        assert_eq!(stats.attached, 0);

        // 既有报告行原样保留，无第二行
        let report_after = queries.get_report_by_exam_id(&exam_id).await.unwrap().unwrap();
        assert_eq!(report_after.id, report_before.id);
        assert_eq!(report_after.stored_filename, report_before.stored_filename);

        // 中断运行遗漏的标志与状态被补齐
        let exam = queries.get_exam_by_number(&exam_number).await.unwrap().unwrap();
        assert!(exam.report_processed);
        assert_eq!(exam.status, ExamStatus::Finalizado);
    }
}
