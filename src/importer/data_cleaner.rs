// ==========================================
// CSV 数据导入系统 - 单元格值清洗
// ==========================================
// 职责: TRIM / 日期 / 数值 / 工时 / 列表 / 问题引用解析，注释截断
// 约定: 解析失败返回 None，由调用方决定记为行失败
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

/// 工时注释最大字符数
pub const COMMENT_MAX_CHARS: usize = 255;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

fn composite_reference() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\d+):").ok()).as_ref()
}

pub struct DataCleaner;

impl DataCleaner {
    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let value = value.trim();
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
    }

    /// 日期时间；仅有日期时取当日零点
    pub fn parse_datetime(&self, value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .or_else(|| self.parse_date(value).and_then(|d| d.and_hms_opt(0, 0, 0)))
    }

    /// 小数（兼容逗号作小数点）
    pub fn parse_decimal(&self, value: &str) -> Option<f64> {
        value
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }

    /// 工时: "1.5" / "1,5" / "1:30" / "1h30"
    pub fn parse_hours(&self, value: &str) -> Option<f64> {
        let value = value.trim();
        if let Some(hours) = self.parse_decimal(value) {
            return Some(hours);
        }
        let (h, m) = value
            .split_once(':')
            .or_else(|| value.split_once('h'))?;
        let h: u32 = h.trim().parse().ok()?;
        let m = m.trim().trim_end_matches('m');
        let m: u32 = if m.is_empty() { 0 } else { m.parse().ok()? };
        if m >= 60 {
            return None;
        }
        Some(f64::from(h) + f64::from(m) / 60.0)
    }

    /// 完成率（允许 "%" 后缀）
    pub fn parse_ratio(&self, value: &str) -> Option<i32> {
        value.trim().trim_end_matches('%').trim().parse::<i32>().ok()
    }

    /// 问题引用: "12" / "#12" / "#12: 标题"
    pub fn parse_issue_reference(&self, value: &str) -> Option<i64> {
        let value = value.trim();
        let digits = extract_reference(value).unwrap_or_else(|| value.trim_start_matches('#'));
        digits.parse::<i64>().ok().filter(|id| *id > 0)
    }

    /// 逗号分隔列表（去空白、去空项）
    pub fn split_list<'a>(&self, value: &'a str) -> Vec<&'a str> {
        value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// 注释: 去空白 → 截取前 255 字符 → 再去尾部空白
    pub fn truncate_comment(&self, value: &str) -> String {
        let truncated: String = value.trim().chars().take(COMMENT_MAX_CHARS).collect();
        truncated.trim_end().to_string()
    }
}

/// 非纯数字值中提取 `#<数字>:` 引用（"id: #123: Title" → "123"）
pub fn extract_reference(value: &str) -> Option<&str> {
    if value.is_empty() || value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    composite_reference()?
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// 诊断信息截断（保留前 n 个字符，超出部分以 "..." 表示）
pub fn truncate_diagnostic(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let head: String = message.chars().take(max_chars).collect();
    format!("{}...", head)
}
