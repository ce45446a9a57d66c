//! 通用工具函数
//!
//! 设备导出内容的规范化均为纯函数，便于独立单元测试。

use crate::models::Gender;
use chrono::{NaiveDate, NaiveTime};

/// 性别同义词规范化
///
/// 设备导出中出现过多种写法，统一映射到固定三值集合，未识别默认Outro。
pub fn normalize_gender(raw: &str) -> Gender {
    match raw.trim().to_uppercase().as_str() {
        "M" | "MASC" | "MASCULINO" | "MALE" | "H" | "HOMEM" => Gender::Masculino,
        "F" | "FEM" | "FEMININO" | "FEMALE" | "MULHER" => Gender::Feminino,
        _ => Gender::Outro,
    }
}

/// 日期规范化，接受 DD/MM/YYYY 或 YYYY-MM-DD
///
/// 无法识别时返回None，由调用方决定回退策略（文件名时间戳或当天）。
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(trimmed, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}

/// 时间规范化，容忍 HH:MM、HH:MM:SS 及常见畸形写法，默认 00:00:00
pub fn normalize_time(raw: &str) -> NaiveTime {
    let trimmed = raw.trim();

    if let Ok(t) = NaiveTime::parse_from_str(trimmed, "%H:%M:%S") {
        return t;
    }
    if let Ok(t) = NaiveTime::parse_from_str(trimmed, "%H:%M") {
        return t;
    }

    // 畸形写法：只保留前两个数字段再尝试一次
    let digits: Vec<&str> = trimmed
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .collect();
    if digits.len() >= 2 {
        if let (Ok(h), Ok(m)) = (digits[0].parse::<u32>(), digits[1].parse::<u32>()) {
            if let Some(t) = NaiveTime::from_hms_opt(h, m, 0) {
                return t;
            }
        }
    }

    NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default()
}

/// 从文件名中提取嵌入的12位时间戳块（DDMMYYYYHHMM）
///
/// 设备文件名约定：`MMD#<姓名>##<DDMMYYYYHHMM>#<医生>#E.<扩展名>`，
/// 时间戳位于双#分隔的段内。不符合约定时返回None。
pub fn parse_filename_timestamp(filename: &str) -> Option<(NaiveDate, NaiveTime)> {
    let segment = filename
        .split('#')
        .find(|s| s.len() == 12 && s.chars().all(|c| c.is_ascii_digit()))?;

    let day: u32 = segment[0..2].parse().ok()?;
    let month: u32 = segment[2..4].parse().ok()?;
    let year: i32 = segment[4..8].parse().ok()?;
    let hour: u32 = segment[8..10].parse().ok()?;
    let minute: u32 = segment[10..12].parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some((date, time))
}

/// 文件名模式匹配，大小写不敏感，支持单个`*`通配
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    let name = name.to_lowercase();
    let pattern = pattern.to_lowercase();

    match pattern.find('*') {
        Some(pos) => {
            let (prefix, suffix) = (&pattern[..pos], &pattern[pos + 1..]);
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
        None => name == pattern,
    }
}

/// 去掉文件名扩展名，返回主干
pub fn file_stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => &filename[..idx],
        _ => filename,
    }
}
