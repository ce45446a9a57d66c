//! 结构化元数据解析
//!
//! 设备导出的层级文档模式并不严格固定：期望的标签可能嵌套在检查
//! 元素之下，也可能直接出现在文档根部。解析按候选标签名在全部后代
//! 节点中查找，对两种布局一视同仁。

use chrono::{NaiveDate, NaiveTime, Utc};
use ecglink_core::utils::{
    file_stem, normalize_date, normalize_gender, normalize_time, parse_filename_timestamp,
};
use ecglink_core::{EcgLinkError, Gender, Result};

/// 解析后的检查元数据
#[derive(Debug, Clone)]
pub struct ExamMetadata {
    pub exam_number: String,
    pub patient_name: String,
    pub patient_cpf: Option<String>,
    pub patient_birth_date: Option<NaiveDate>,
    pub patient_gender: Gender,
    pub patient_record_number: Option<String>,
    pub doctor_name: Option<String>,
    pub doctor_crm: Option<String>,
    pub requesting_doctor_name: Option<String>,
    pub requesting_doctor_crm: Option<String>,
    pub exam_date: NaiveDate,
    pub exam_time: NaiveTime,
}

/// 在全部后代元素中按候选标签名（忽略大小写）查找首个非空文本
fn find_text(doc: &roxmltree::Document, candidates: &[&str]) -> Option<String> {
    doc.descendants()
        .filter(|n| n.is_element())
        .find(|n| {
            candidates
                .iter()
                .any(|c| n.tag_name().name().eq_ignore_ascii_case(c))
        })
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// 解析一个结构化元数据文件
///
/// `filename`用于两处回退：检查号缺失时以文件名主干代替（检查号是
/// 结构唯一键），日期缺失时从文件名嵌入的时间戳块推导，再退到当天。
pub fn parse_metadata(filename: &str, content: &str) -> Result<ExamMetadata> {
    let doc = roxmltree::Document::parse(content)
        .map_err(|e| EcgLinkError::Parse(format!("{}: {}", filename, e)))?;

    let patient_name = find_text(&doc, &["NomePaciente", "Paciente", "Nome"])
        .ok_or_else(|| EcgLinkError::Parse(format!("{}: nome do paciente ausente", filename)))?;

    let exam_number = match find_text(&doc, &["NumeroExame", "Numero", "CodigoExame"]) {
        Some(n) => n,
        None => {
            tracing::warn!(
                "Metadata file {} carries no exam number, falling back to filename stem",
                filename
            );
            file_stem(filename).to_string()
        }
    };

    let filename_timestamp = parse_filename_timestamp(filename);

    let raw_date = find_text(&doc, &["DataExame", "Data"]);
    let exam_date = match raw_date.as_deref().and_then(normalize_date) {
        Some(d) => d,
        None => match filename_timestamp {
            Some((d, _)) => d,
            None => {
                tracing::warn!(
                    "Metadata file {} carries no recognizable date, defaulting to today",
                    filename
                );
                Utc::now().date_naive()
            }
        },
    };

    let raw_time = find_text(&doc, &["HoraExame", "Hora"]);
    let exam_time = match raw_time.as_deref() {
        Some(t) => normalize_time(t),
        None => filename_timestamp
            .map(|(_, t)| t)
            .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default()),
    };

    let patient_gender = find_text(&doc, &["Sexo", "Genero"])
        .map(|g| normalize_gender(&g))
        .unwrap_or(Gender::Outro);

    let patient_birth_date = find_text(&doc, &["DataNascimento", "Nascimento"])
        .as_deref()
        .and_then(normalize_date);

    Ok(ExamMetadata {
        exam_number,
        patient_name,
        patient_cpf: find_text(&doc, &["CPF", "CpfPaciente"]),
        patient_birth_date,
        patient_gender,
        patient_record_number: find_text(&doc, &["Prontuario", "Registro"]),
        doctor_name: find_text(&doc, &["MedicoResponsavel", "Medico"]),
        doctor_crm: find_text(&doc, &["CRM", "CrmMedico"]),
        requesting_doctor_name: find_text(&doc, &["MedicoSolicitante", "Solicitante"]),
        requesting_doctor_crm: find_text(&doc, &["CrmSolicitante"]),
        exam_date,
        exam_time,
    })
}
