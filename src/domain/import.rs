// ==========================================
// 表格批量导入引擎 - 导入管道领域模型
// ==========================================
// 职责: 原始行 / 字段错误 / 已校验行 / 既有记录 / 导入结果
// 生命周期: 仅在单次导入流程内（ImportOutcome 除外，写入批次日志）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// CellValue - 单元格原始值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// 空单元格或纯空白文本
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// 以文本形式读取（数值按最短表示输出，整数不带小数部分）
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Number(n) => Some(format_number(*n)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ==========================================
// RawRow - 解码后的原始行
// ==========================================
// 行号: 表格内物理行号（1 起，表头 = 1，首个数据行 = 2）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub row_number: usize,
    pub cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new(row_number: usize, cells: Vec<(String, CellValue)>) -> Self {
        Self { row_number, cells }
    }

    /// 按原始表头文本取值（首个同名列）
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v)
    }

    /// 按列序号取值
    pub fn cell_at(&self, column: usize) -> &CellValue {
        self.cells
            .get(column)
            .map(|(_, v)| v)
            .unwrap_or(&CellValue::Empty)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_blank())
    }
}

// ==========================================
// FieldErrorCode - 字段错误分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorCode {
    Required,
    InvalidDate,
    InvalidNumber,
    InvalidEnum,
    InvalidLength,
    ConditionalRequired,
}

impl FieldErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldErrorCode::Required => "required",
            FieldErrorCode::InvalidDate => "invalid_date",
            FieldErrorCode::InvalidNumber => "invalid_number",
            FieldErrorCode::InvalidEnum => "invalid_enum",
            FieldErrorCode::InvalidLength => "invalid_length",
            FieldErrorCode::ConditionalRequired => "conditional_required",
        }
    }
}

impl fmt::Display for FieldErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// FieldError - 行级字段错误
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub row_number: usize,
    pub field: String,
    pub code: FieldErrorCode,
}

impl FieldError {
    pub fn new(row_number: usize, field: &str, code: FieldErrorCode) -> Self {
        Self {
            row_number,
            field: field.to_string(),
            code,
        }
    }
}

// ==========================================
// BatchError - 批次级错误（不属于任何行）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchError {
    /// 行数超过上限，仅校验前 limit 行
    LimitExceeded { limit: usize, actual: usize },
    /// 必填字段在表头中找不到（每行仍会产生 required 错误）
    MissingRequiredColumns { fields: Vec<String> },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::LimitExceeded { limit, actual } => {
                write!(f, "行数 {} 超过上限 {}，仅处理前 {} 行", actual, limit, limit)
            }
            BatchError::MissingRequiredColumns { fields } => {
                write!(f, "缺少必填列: {}", fields.join(", "))
            }
        }
    }
}

// ==========================================
// ValidatedRow - 校验通过的类型化行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedRow<P> {
    pub row_number: usize,
    pub natural_key: String,
    pub payload: P,
}

// ==========================================
// ExistingRecord - 存储中未删除的既有记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRecord {
    pub id: i64,
    pub natural_key: String,
}

// ==========================================
// ImportOutcome - 单次导入执行结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub created_count: usize,
    pub updated_count: usize,
    pub failed_count: usize,
    pub errors: Vec<RowError>,
    /// 执行中途被取消：已写入的行保持提交
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_blank() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::Text("   ".to_string()).is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
        assert!(!CellValue::Text("x".to_string()).is_blank());
    }

    #[test]
    fn test_cell_value_number_as_text() {
        assert_eq!(CellValue::Number(5321234567.0).as_text(), Some("5321234567".to_string()));
        assert_eq!(CellValue::Number(12.5).as_text(), Some("12.5".to_string()));
        assert_eq!(CellValue::Empty.as_text(), None);
    }

    #[test]
    fn test_field_error_code_serializes_snake_case() {
        let json = serde_json::to_string(&FieldErrorCode::ConditionalRequired).unwrap();
        assert_eq!(json, "\"conditional_required\"");
    }

    #[test]
    fn test_batch_error_display() {
        let limit = BatchError::LimitExceeded {
            limit: 500,
            actual: 612,
        };
        assert_eq!(limit.to_string(), "行数 612 超过上限 500，仅处理前 500 行");

        let missing = BatchError::MissingRequiredColumns {
            fields: vec!["code".to_string(), "name".to_string()],
        };
        assert_eq!(missing.to_string(), "缺少必填列: code, name");
    }

    #[test]
    fn test_raw_row_lookup() {
        let row = RawRow::new(
            2,
            vec![
                ("Kod".to_string(), CellValue::from("DK230")),
                ("Fiyat".to_string(), CellValue::Number(10.0)),
            ],
        );
        assert_eq!(row.get("Kod"), Some(&CellValue::Text("DK230".to_string())));
        assert_eq!(row.cell_at(5), &CellValue::Empty);
        assert!(!row.is_blank());
    }
}
