//! 报告文本启发式分段
//!
//! 提取出的明文按固定临床关键词集合切为"所见"，按节标记短语后的行
//! 切为"结论"（上限5行；无标记时取最后3个非空行）。提取失败时文本
//! 为空，两段均为空串。

/// 所见段的临床关键词（逐词比较，避免子串误中）
const FINDING_KEYWORDS: &[&str] = &[
    "ritmo",
    "frequencia",
    "frequência",
    "intervalo",
    "onda",
    "eixo",
    "qrs",
    "sinusal",
    "bloqueio",
    "taquicardia",
    "bradicardia",
    "repolarizacao",
    "repolarização",
];

/// 结论段的节标记短语
const CONCLUSION_MARKERS: &[&str] = &["conclusao", "conclusão", "impressao", "impressão", "parecer"];

/// 标记后收集的结论行上限
const MAX_CONCLUSION_LINES: usize = 5;

/// 无标记时取用的末尾非空行数
const FALLBACK_TAIL_LINES: usize = 3;

/// 分段结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSections {
    pub findings: String,
    pub conclusion: String,
}

/// 行内是否含有任一临床关键词（按词比较）
fn line_has_finding_keyword(line: &str) -> bool {
    line.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| FINDING_KEYWORDS.contains(&word))
}

/// 行内是否含有任一结论节标记
fn line_has_conclusion_marker(line: &str) -> bool {
    let lower = line.to_lowercase();
    CONCLUSION_MARKERS.iter().any(|m| lower.contains(m))
}

/// 把提取出的报告文本切为所见与结论（纯函数）
pub fn split_sections(text: &str) -> ReportSections {
    if text.trim().is_empty() {
        return ReportSections::default();
    }

    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let findings = lines
        .iter()
        .filter(|l| !l.is_empty() && line_has_finding_keyword(l))
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    let conclusion = match lines.iter().position(|l| line_has_conclusion_marker(l)) {
        Some(marker_idx) => lines
            .iter()
            .skip(marker_idx + 1)
            .filter(|l| !l.is_empty())
            .take(MAX_CONCLUSION_LINES)
            .copied()
            .collect::<Vec<_>>()
            .join("\n"),
        None => {
            // 回退：最后3个非空行
            let non_empty: Vec<&str> = lines.iter().filter(|l| !l.is_empty()).copied().collect();
            let start = non_empty.len().saturating_sub(FALLBACK_TAIL_LINES);
            non_empty[start..].join("\n")
        }
    };

    ReportSections {
        findings,
        conclusion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Laudo de Eletrocardiograma
Paciente: Joao Silva

Ritmo sinusal regular
Frequencia cardiaca de 72 bpm
Intervalo PR dentro da normalidade
Sem alteracoes significativas

Conclusao:
Exame dentro dos limites da normalidade.
Recomenda-se acompanhamento de rotina.
";

    #[test]
    fn test_findings_by_keyword() {
        let sections = split_sections(SAMPLE);
        assert!(sections.findings.contains("Ritmo sinusal regular"));
        assert!(sections.findings.contains("Frequencia cardiaca de 72 bpm"));
        assert!(sections.findings.contains("Intervalo PR"));
        assert!(!sections.findings.contains("Paciente"));
    }

    #[test]
    fn test_conclusion_after_marker() {
        let sections = split_sections(SAMPLE);
        assert_eq!(
            sections.conclusion,
            "Exame dentro dos limites da normalidade.\nRecomenda-se acompanhamento de rotina."
        );
    }

    #[test]
    fn test_conclusion_capped_at_five_lines() {
        let text = "Conclusao:\na\nb\nc\nd\ne\nf\ng";
        let sections = split_sections(text);
        assert_eq!(sections.conclusion, "a\nb\nc\nd\ne");
    }

    #[test]
    fn test_conclusion_fallback_last_three_lines() {
        let text = "linha um\nlinha dois\n\nlinha tres\nlinha quatro";
        let sections = split_sections(text);
        assert_eq!(sections.conclusion, "linha dois\nlinha tres\nlinha quatro");
    }

    #[test]
    fn test_empty_text_yields_empty_sections() {
        assert_eq!(split_sections(""), ReportSections::default());
        assert_eq!(split_sections("  \n \n"), ReportSections::default());
    }

    #[test]
    fn test_keyword_match_is_word_level() {
        // "impressao" 含 "pr"，但逐词比较不应命中所见关键词
        let sections = split_sections("Impressao diagnostica pendente\nOutra linha\nTerceira");
        assert!(sections.findings.is_empty());
    }
}
