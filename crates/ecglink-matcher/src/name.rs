//! 患者姓名重建
//!
//! 文件名中的姓名段是去空格拼接的。重建为人类可读姓名：在小写→大写
//! 转换处、以及大写连串后接小写字母处插入词边界，整体转小写后逐词
//! 首字母大写，再把固定介词表中的词（首词除外）恢复为小写。
//! 全大写的姓名段不含任何大小写边界，无法按此切分，匹配器改用
//! compact_name做去空格比较。

/// 葡语姓名中保持小写的介词
const PREPOSITIONS: &[&str] = &["da", "de", "do", "das", "dos", "e"];

/// 把拼接的姓名段重建为人类可读姓名（纯函数）
pub fn reconstruct_name(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        let boundary = i > 0
            && ((chars[i - 1].is_lowercase() && c.is_uppercase())
                || (c.is_uppercase()
                    && chars[i - 1].is_uppercase()
                    && chars.get(i + 1).is_some_and(|n| n.is_lowercase())));

        if boundary && !current.is_empty() {
            words.push(current.clone());
            current.clear();
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            // 首词从不小写，即使是介词
            if i > 0 && PREPOSITIONS.contains(&lower.as_str()) {
                lower
            } else {
                title_case(&lower)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 首字母大写
fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// 压缩姓名：去掉空格并全部大写，用于与全大写姓名段比较
pub fn compact_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_uppercase())
        .collect()
}
