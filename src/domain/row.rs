// ==========================================
// CSV 数据导入系统 - 数据行
// ==========================================
// 用途: 解析器产出的单行数据（按表头名取值）
// 生命周期: 仅在导入流程内；失败行被保留到导入结果中
// ==========================================

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    position: usize,        // 数据行序号（从 1 开始，不含表头）
    headers: Arc<[String]>, // 与同一文件的所有行共享
    cells: Vec<String>,     // 已按表头长度补齐
}

impl Row {
    pub fn new(position: usize, headers: Arc<[String]>, mut cells: Vec<String>) -> Self {
        // 缺失的尾列视为空值
        if cells.len() < headers.len() {
            cells.resize(headers.len(), String::new());
        }
        Self {
            position,
            headers,
            cells,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// 按表头名取原始单元格（列不存在返回 None）
    pub fn raw(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|idx| self.cells.get(idx))
            .map(String::as_str)
    }

    /// 按表头名取非空值（空白单元格视为缺失）
    pub fn value(&self, column: &str) -> Option<&str> {
        self.raw(column).filter(|v| !v.trim().is_empty())
    }

    /// (表头, 值) 对，用于日志与失败行展示
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.cells.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Arc<[String]> {
        names.iter().map(|s| s.to_string()).collect::<Vec<_>>().into()
    }

    #[test]
    fn test_short_row_is_padded() {
        let row = Row::new(1, headers(&["a", "b", "c"]), vec!["1".to_string()]);

        assert_eq!(row.cells().len(), 3);
        assert_eq!(row.raw("c"), Some(""));
        assert_eq!(row.value("c"), None);
        assert_eq!(row.value("a"), Some("1"));
    }

    #[test]
    fn test_unknown_column() {
        let row = Row::new(1, headers(&["a"]), vec!["x".to_string()]);
        assert_eq!(row.raw("zzz"), None);
    }

    #[test]
    fn test_whitespace_value_is_missing() {
        let row = Row::new(2, headers(&["a"]), vec!["   ".to_string()]);
        assert_eq!(row.value("a"), None);
        assert_eq!(row.raw("a"), Some("   "));
    }
}
