//! 下载文件命名

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

fn whitespace() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// 空白替换为下划线，并去掉在文件名或响应头中有特殊含义的字符
fn file_name_part(text: &str) -> String {
    whitespace()
        .replace_all(text.trim(), "_")
        .chars()
        .filter(|c| !matches!(c, '"' | '/' | '\\' | ';' | '\r' | '\n'))
        .collect()
}

/// `ordem_servico_<姓名>[_ID<患者ID>]_<YYYY-MM-DD>.pdf`
pub fn document_file_name(patient_name: &str, patient_id: Option<&str>, date: NaiveDate) -> String {
    let mut patient = file_name_part(patient_name);
    if let Some(id) = patient_id.map(str::trim).filter(|id| !id.is_empty()) {
        patient.push_str("_ID");
        patient.push_str(&file_name_part(id));
    }
    format!("ordem_servico_{}_{}.pdf", patient, date.format("%Y-%m-%d"))
}
