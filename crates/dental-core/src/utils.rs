//! 通用工具函数

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use uuid::Uuid;

/// 订单号随机后缀长度
pub const ORDER_SUFFIX_LEN: usize = 9;

/// 生成订单号：`ORD-<毫秒时间戳>-<9位大写字母数字>`
pub fn generate_order_number() -> String {
    generate_order_number_at(Utc::now())
}

/// 以指定创建时间生成订单号
pub fn generate_order_number_at(created_at: DateTime<Utc>) -> String {
    format!(
        "ORD-{}-{}",
        created_at.timestamp_millis(),
        random_suffix(ORDER_SUFFIX_LEN)
    )
}

/// 大写字母数字随机串
pub fn random_suffix(len: usize) -> String {
    let mut suffix = String::with_capacity(len);
    while suffix.len() < len {
        let chunk = Uuid::new_v4().simple().to_string().to_uppercase();
        suffix.push_str(&chunk[..(len - suffix.len()).min(chunk.len())]);
    }
    suffix
}

fn order_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^ORD-\d+-[A-Z0-9]{9}$").expect("order number pattern is valid")
    })
}

/// 验证订单号格式
pub fn is_valid_order_number(order_number: &str) -> bool {
    order_number_pattern().is_match(order_number)
}

/// 空白字符串视为缺失
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_order_number() {
        let number = generate_order_number();
        assert!(is_valid_order_number(&number), "{}", number);
    }

    #[test]
    fn test_order_number_embeds_creation_time() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let number = generate_order_number_at(at);
        assert!(number.starts_with("ORD-1700000000123-"));
        assert_eq!(number.len(), "ORD-1700000000123-".len() + ORDER_SUFFIX_LEN);
    }

    #[test]
    fn test_order_numbers_differ() {
        let at = Utc::now();
        assert_ne!(generate_order_number_at(at), generate_order_number_at(at));
    }

    #[test]
    fn test_is_valid_order_number() {
        assert!(is_valid_order_number("ORD-1700000000000-ABC123XYZ"));
        assert!(!is_valid_order_number("ORD-1700000000000-abc123xyz"));
        assert!(!is_valid_order_number("ORD-17000-ABC12"));
        assert!(!is_valid_order_number(""));
    }

    #[test]
    fn test_random_suffix_length() {
        assert_eq!(random_suffix(40).len(), 40);
        assert!(random_suffix(9).chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
