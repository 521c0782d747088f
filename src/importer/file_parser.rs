// ==========================================
// CSV 数据导入系统 - 分隔文本解析器
// ==========================================
// 职责: 将规范化后的 UTF-8 文本解析为表头 + 惰性数据行序列
// 规则:
// - 引号字段可包含分隔符与换行；连续两个引号还原为一个
// - 空表头替换为占位名，并产生作业级警告
// - 行列数少于表头时补空；多出的非空单元格视为解析错误
// - 未闭合引号、非法 UTF-8 报告行号
// ==========================================

use crate::domain::row::Row;
use crate::importer::error::{ImportError, ImportResult};
use csv::{ByteRecord, ReaderBuilder};
use std::sync::Arc;

/// 空表头占位名
pub const EMPTY_HEADER_PLACEHOLDER: &str = "------";

/// 预览行数
pub const PREVIEW_ROW_COUNT: usize = 5;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ==========================================
// DelimitedParser
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct DelimitedParser {
    separator: u8,
    quote: u8,
    has_headers: bool,
}

impl DelimitedParser {
    /// 创建解析器（分隔符与引号必须为单字节 ASCII 字符）
    pub fn new(separator: char, quote: char) -> ImportResult<Self> {
        Ok(Self {
            separator: ascii_byte("column separator", separator)?,
            quote: ascii_byte("quote character", quote)?,
            has_headers: true,
        })
    }

    /// 首行不是表头时，列名按序号生成（1, 2, ...）
    pub fn without_headers(mut self) -> Self {
        self.has_headers = false;
        self
    }

    /// 解析表头并返回惰性行序列
    pub fn parse<'a>(&self, data: &'a [u8]) -> ImportResult<Rows<'a>> {
        let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
        check_quotes(data, self.separator, self.quote)?;

        let mut reader = ReaderBuilder::new()
            .delimiter(self.separator)
            .quote(self.quote)
            .double_quote(true)
            .flexible(true)
            .has_headers(self.has_headers)
            .from_reader(data);

        let raw_headers = reader.byte_headers().map_err(parse_error)?.clone();
        let mut warnings = Vec::new();
        let mut headers = Vec::with_capacity(raw_headers.len());

        for (idx, raw) in raw_headers.iter().enumerate() {
            if !self.has_headers {
                headers.push((idx + 1).to_string());
                continue;
            }
            let name = std::str::from_utf8(raw).map_err(|_| ImportError::Parse {
                line: 1,
                message: format!("invalid UTF-8 in header column {}", idx + 1),
            })?;
            let name = name.trim();
            if name.is_empty() {
                warnings.push(format!("Column name empty error (column {})", idx + 1));
                headers.push(EMPTY_HEADER_PLACEHOLDER.to_string());
            } else {
                headers.push(name.to_string());
            }
        }

        Ok(Rows {
            reader,
            headers: headers.into(),
            warnings,
            record: ByteRecord::new(),
            position: 0,
            done: false,
        })
    }

    /// 取前 n 行预览（不消费其余数据）
    pub fn preview(&self, data: &[u8], n: usize) -> ImportResult<Preview> {
        let mut rows = self.parse(data)?;
        let samples = rows
            .by_ref()
            .take(n)
            .map(|row| row.map(|r| r.cells().to_vec()))
            .collect::<ImportResult<Vec<_>>>()?;

        Ok(Preview {
            headers: rows.headers().to_vec(),
            warnings: rows.warnings().to_vec(),
            rows: samples,
        })
    }
}

fn ascii_byte(what: &str, c: char) -> ImportResult<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| ImportError::Parse {
            line: 0,
            message: format!("{} must be a single ASCII character, got {:?}", what, c),
        })
}

fn parse_error(err: csv::Error) -> ImportError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    ImportError::Parse {
        line,
        message: err.to_string(),
    }
}

/// 预扫描未闭合的引号字段（csv 读取器对此宽容处理，需提前拦截）
fn check_quotes(data: &[u8], separator: u8, quote: u8) -> ImportResult<()> {
    let mut line: u64 = 1;
    let mut opened_at: u64 = 0;
    let mut in_quotes = false;
    let mut field_start = true;
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        if in_quotes {
            if b == quote {
                if data.get(i + 1) == Some(&quote) {
                    i += 1;
                } else {
                    in_quotes = false;
                }
            } else if b == b'\n' {
                line += 1;
            }
        } else if b == quote && field_start {
            in_quotes = true;
            opened_at = line;
            field_start = false;
        } else {
            field_start = b == separator || b == b'\n' || b == b'\r';
            if b == b'\n' {
                line += 1;
            }
        }
        i += 1;
    }

    if in_quotes {
        return Err(ImportError::Parse {
            line: opened_at,
            message: "unterminated quoted field".to_string(),
        });
    }
    Ok(())
}

// ==========================================
// Rows - 惰性、有限、不可重启的行序列
// ==========================================
pub struct Rows<'a> {
    reader: csv::Reader<&'a [u8]>,
    headers: Arc<[String]>,
    warnings: Vec<String>,
    record: ByteRecord,
    position: usize,
    done: bool,
}

impl<'a> Rows<'a> {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// 表头处理产生的作业级警告
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn current_row(&self) -> ImportResult<Row> {
        let line = self.record.position().map(|p| p.line()).unwrap_or(0);

        let mut cells = Vec::with_capacity(self.record.len());
        for (idx, raw) in self.record.iter().enumerate() {
            let cell = std::str::from_utf8(raw).map_err(|e| ImportError::Parse {
                line,
                message: format!(
                    "invalid UTF-8 in column {} at byte {}",
                    idx + 1,
                    e.valid_up_to()
                ),
            })?;
            cells.push(cell.to_string());
        }

        if cells.len() > self.headers.len() {
            if cells[self.headers.len()..].iter().any(|c| !c.trim().is_empty()) {
                return Err(ImportError::Parse {
                    line,
                    message: format!(
                        "expected at most {} fields, found {}",
                        self.headers.len(),
                        cells.len()
                    ),
                });
            }
            cells.truncate(self.headers.len());
        }

        Ok(Row::new(self.position, Arc::clone(&self.headers), cells))
    }
}

impl<'a> Iterator for Rows<'a> {
    type Item = ImportResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_byte_record(&mut self.record) {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => {
                self.position += 1;
                let row = self.current_row();
                if row.is_err() {
                    self.done = true;
                }
                Some(row)
            }
            Err(e) => {
                self.done = true;
                Some(Err(parse_error(e)))
            }
        }
    }
}

/// 预览结果
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub headers: Vec<String>,
    pub warnings: Vec<String>,
    pub rows: Vec<Vec<String>>,
}
