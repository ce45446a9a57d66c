//! 报告文件名解析
//!
//! 设备命名约定（尽力而为，设备并不总是遵守）：
//! `MMD#<姓名拼接>##<DDMMYYYYHHMM>#<医生段>#E.<扩展名>`
//! 解析为纯函数，不做任何I/O。

use chrono::{NaiveDate, NaiveTime};
use ecglink_core::utils::{file_stem, parse_filename_timestamp};

/// 解析后的报告文件名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilename {
    /// 拼接的患者姓名段
    pub name_token: String,
    /// 时间戳块中的日期
    pub date: NaiveDate,
    /// 时间戳块中的时间
    pub time: NaiveTime,
    /// 医生段（原样保留）
    pub doctor_token: String,
}

/// 按设备约定解析报告文件名；不符合约定返回None（只剩三级回退可用）
pub fn parse_report_filename(filename: &str) -> Option<ReportFilename> {
    let (date, time) = parse_filename_timestamp(filename)?;

    let stem = file_stem(filename);
    let segments: Vec<&str> = stem.split('#').collect();

    // 期望段布局: ["MMD", 姓名, "", 时间戳, 医生, "E"]
    if segments.len() < 5 || !segments[0].eq_ignore_ascii_case("MMD") {
        return None;
    }
    let name_token = segments[1].trim();
    if name_token.is_empty() {
        return None;
    }

    let doctor_token = segments
        .iter()
        .skip(3)
        .find(|s| !s.is_empty() && !s.chars().all(|c| c.is_ascii_digit()) && !s.eq_ignore_ascii_case("E"))
        .copied()
        .unwrap_or("");

    Some(ReportFilename {
        name_token: name_token.to_string(),
        date,
        time,
        doctor_token: doctor_token.to_string(),
    })
}

/// 推导候选元数据文件名：同一文件名换成元数据扩展名
///
/// 导入器已按此文件名关联过同一逻辑记录时，一级匹配直接命中。
pub fn candidate_metadata_filename(report_filename: &str, metadata_extension: &str) -> String {
    format!("{}.{}", file_stem(report_filename), metadata_extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_convention() {
        let parsed = parse_report_filename("MMD#JOAOSILVA##151220251430#DRJOSE#E.PDF")
            .expect("expected convention match");

        assert_eq!(parsed.name_token, "JOAOSILVA");
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2025, 12, 15).unwrap());
        assert_eq!(parsed.time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert_eq!(parsed.doctor_token, "DRJOSE");
    }

    #[test]
    fn test_nonconforming_names_rejected() {
        assert!(parse_report_filename("7001.pdf").is_none());
        assert!(parse_report_filename("laudo-2025.pdf").is_none());
        // 时间戳块存在但前缀不对
        assert!(parse_report_filename("XYZ#A##151220251430#D#E.PDF").is_none());
        // 姓名段为空
        assert!(parse_report_filename("MMD###151220251430#D#E.PDF").is_none());
    }

    #[test]
    fn test_candidate_metadata_filename() {
        assert_eq!(
            candidate_metadata_filename("MMD#JOAOSILVA##151220251430#DRJOSE#E.PDF", "WXML"),
            "MMD#JOAOSILVA##151220251430#DRJOSE#E.WXML"
        );
        assert_eq!(candidate_metadata_filename("7001.pdf", "WXML"), "7001.WXML");
    }
}
