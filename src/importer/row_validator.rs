// ==========================================
// 表格批量导入引擎 - 行校验器
// ==========================================
// 状态: Decoded → Resolved → Coerced → Valid | Invalid
// 规则: 逐字段收集全部错误（不在首个错误处中断），再执行跨字段规则
// ==========================================

use crate::domain::import::{CellValue, FieldError, FieldErrorCode, RawRow, ValidatedRow};
use crate::importer::coercers::{
    self, BoolFallback, Coerced, IntRange, SynonymTable,
};
use crate::importer::flows::ImportFlow;
use crate::importer::header_resolver::{HeaderResolution, ResolvedRow};
use chrono::NaiveDate;
use std::fmt;
use tracing::trace;

/// 单行在校验过程中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Decoded,
    Resolved,
    Coerced,
    Valid,
    Invalid,
}

impl fmt::Display for RowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RowState::Decoded => "decoded",
            RowState::Resolved => "resolved",
            RowState::Coerced => "coerced",
            RowState::Valid => "valid",
            RowState::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

// ==========================================
// FieldCollector - 字段转换 + 错误收集
// ==========================================
// 各访问器在出错时记录 FieldError 并返回 None；
// 流实现只需在最后判断 has_errors() 再构造载荷
pub struct FieldCollector<'a> {
    row: &'a ResolvedRow,
    errors: Vec<FieldError>,
}

impl<'a> FieldCollector<'a> {
    pub fn new(row: &'a ResolvedRow) -> Self {
        Self {
            row,
            errors: Vec::new(),
        }
    }

    pub fn row_number(&self) -> usize {
        self.row.row_number
    }

    pub fn cell(&self, field: &str) -> &'a CellValue {
        self.row.get(field)
    }

    /// 记录一条字段错误（跨字段规则使用）
    pub fn reject(&mut self, field: &str, code: FieldErrorCode) {
        trace!(row_number = self.row.row_number, field, code = %code, "字段错误");
        self.errors
            .push(FieldError::new(self.row.row_number, field, code));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn finish(self) -> Vec<FieldError> {
        self.errors
    }

    fn record<T>(&mut self, field: &str, result: Result<T, FieldErrorCode>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(code) => {
                self.reject(field, code);
                None
            }
        }
    }

    fn record_optional<T>(&mut self, field: &str, result: Coerced<T>) -> Option<T> {
        self.record(field, result).flatten()
    }

    fn record_required<T>(&mut self, field: &str, result: Coerced<T>) -> Option<T> {
        match self.record(field, result) {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.reject(field, FieldErrorCode::Required);
                None
            }
            None => None,
        }
    }

    // ===== 访问器 =====

    pub fn string(&mut self, field: &str) -> Option<String> {
        coercers::trimmed_or_null(self.cell(field))
    }

    pub fn required_string(&mut self, field: &str) -> Option<String> {
        let value = Ok(coercers::trimmed_or_null(self.cell(field)));
        self.record_required(field, value)
    }

    pub fn date(&mut self, field: &str) -> Option<NaiveDate> {
        let value = coercers::parse_date(self.cell(field));
        self.record_optional(field, value)
    }

    pub fn required_date(&mut self, field: &str) -> Option<NaiveDate> {
        let value = coercers::parse_date(self.cell(field));
        self.record_required(field, value)
    }

    /// 空值取默认值
    pub fn decimal(&mut self, field: &str, default: f64) -> Option<f64> {
        let value = coercers::decimal_or(self.cell(field), default);
        self.record(field, value)
    }

    pub fn required_decimal(&mut self, field: &str) -> Option<f64> {
        let value = coercers::parse_decimal(self.cell(field));
        self.record_required(field, value)
    }

    pub fn bounded_int(&mut self, field: &str, range: &IntRange) -> Option<i64> {
        let value = coercers::bounded_int(self.cell(field), range);
        self.record(field, value)
    }

    pub fn digits(&mut self, field: &str, min: usize, max: usize) -> Option<String> {
        let value = coercers::digits_between(self.cell(field), min, max);
        self.record_optional(field, value)
    }

    pub fn enumeration<T>(&mut self, field: &str, table: &SynonymTable<T>) -> Option<T>
    where
        T: Copy + fmt::Debug,
    {
        let value = table.resolve(self.cell(field));
        self.record_optional(field, value)
    }

    pub fn required_enumeration<T>(&mut self, field: &str, table: &SynonymTable<T>) -> Option<T>
    where
        T: Copy + fmt::Debug,
    {
        let value = table.resolve(self.cell(field));
        self.record_required(field, value)
    }

    pub fn boolean(&mut self, field: &str, fallback: BoolFallback) -> Option<bool> {
        let value = coercers::parse_bool(self.cell(field), fallback);
        self.record_optional(field, value)
    }
}

// ==========================================
// RowValidator - 单行校验
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome<P> {
    Valid(ValidatedRow<P>),
    Invalid(Vec<FieldError>),
}

pub struct RowValidator<'a, F: ImportFlow> {
    flow: &'a F,
    resolution: &'a HeaderResolution,
}

impl<'a, F: ImportFlow> RowValidator<'a, F> {
    pub fn new(flow: &'a F, resolution: &'a HeaderResolution) -> Self {
        Self { flow, resolution }
    }

    pub fn validate(&self, raw: &RawRow) -> RowOutcome<F::Payload> {
        let row_number = raw.row_number;
        trace!(row_number, state = %RowState::Decoded);

        let resolved = self.resolution.project(raw);
        trace!(row_number, state = %RowState::Resolved);

        let mut fields = FieldCollector::new(&resolved);
        let payload = self.flow.coerce_row(&mut fields);
        trace!(row_number, state = %RowState::Coerced);

        let mut errors = fields.finish();
        match payload {
            Some(payload) if errors.is_empty() => {
                trace!(row_number, state = %RowState::Valid);
                RowOutcome::Valid(ValidatedRow {
                    row_number,
                    natural_key: self.flow.natural_key(&payload).to_string(),
                    payload,
                })
            }
            _ => {
                if errors.is_empty() {
                    // 流未给出原因时归因于自然键字段
                    errors.push(FieldError::new(
                        row_number,
                        self.flow.natural_key_field(),
                        FieldErrorCode::Required,
                    ));
                }
                trace!(row_number, state = %RowState::Invalid, error_count = errors.len());
                RowOutcome::Invalid(errors)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::coercers::OutOfRange;
    use std::collections::HashMap;

    fn row(values: &[(&'static str, CellValue)]) -> ResolvedRow {
        let map: HashMap<&'static str, CellValue> = values.iter().cloned().collect();
        ResolvedRow::new(7, map)
    }

    #[test]
    fn test_collector_gathers_all_errors() {
        let resolved = row(&[
            ("start", CellValue::from("2025-13-01")),
            ("amount", CellValue::from("abc")),
        ]);
        let mut fields = FieldCollector::new(&resolved);

        assert_eq!(fields.required_string("code"), None);
        assert_eq!(fields.required_date("start"), None);
        assert_eq!(fields.required_decimal("amount"), None);

        let errors = fields.finish();
        let codes: Vec<_> = errors.iter().map(|e| (e.field.as_str(), e.code)).collect();
        assert_eq!(
            codes,
            vec![
                ("code", FieldErrorCode::Required),
                ("start", FieldErrorCode::InvalidDate),
                ("amount", FieldErrorCode::InvalidNumber),
            ]
        );
        assert!(errors.iter().all(|e| e.row_number == 7));
    }

    #[test]
    fn test_optional_accessors_accept_empty() {
        let resolved = row(&[]);
        let mut fields = FieldCollector::new(&resolved);
        let range = IntRange {
            min: 1,
            max: 28,
            default: 1,
            on_out_of_range: OutOfRange::ClampToDefault,
        };

        assert_eq!(fields.string("notes"), None);
        assert_eq!(fields.date("end"), None);
        assert_eq!(fields.decimal("fee", 0.0), Some(0.0));
        assert_eq!(fields.bounded_int("day", &range), Some(1));
        assert!(!fields.has_errors());
    }
}
