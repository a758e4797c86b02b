// ==========================================
// 表格批量导入引擎 - 批次校验器
// ==========================================
// 职责: 行数上限 + 表头解析 + 逐行校验
// 不变式: 每个 RawRow 恰好落入 空行过滤 / 有效行 / ≥1 条错误 之一
// ==========================================

use crate::domain::import::{BatchError, FieldError, RawRow, ValidatedRow};
use crate::importer::flows::ImportFlow;
use crate::importer::header_resolver::HeaderResolution;
use crate::importer::row_validator::{RowOutcome, RowValidator};
use serde::Serialize;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ROWS: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct BatchValidation<P> {
    pub valid_rows: Vec<ValidatedRow<P>>,
    pub errors: Vec<FieldError>,
    pub batch_errors: Vec<BatchError>,
    /// 实际参与校验的行数（截断后）
    pub rows_seen: usize,
    pub resolution: HeaderResolution,
}

impl<P> BatchValidation<P> {
    pub fn invalid_row_count(&self) -> usize {
        let mut rows: Vec<usize> = self.errors.iter().map(|e| e.row_number).collect();
        rows.dedup();
        rows.len()
    }

    pub fn is_truncated(&self) -> bool {
        self.batch_errors
            .iter()
            .any(|e| matches!(e, BatchError::LimitExceeded { .. }))
    }
}

pub struct BatchValidator {
    max_rows: usize,
}

impl Default for BatchValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROWS)
    }
}

impl BatchValidator {
    pub fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn validate<F: ImportFlow>(
        &self,
        flow: &F,
        headers: &[String],
        rows: &[RawRow],
    ) -> BatchValidation<F::Payload> {
        let mut batch_errors = Vec::new();

        // 行数上限：只校验前 max_rows 行
        let accepted = if rows.len() > self.max_rows {
            warn!(
                flow = %flow.kind(),
                limit = self.max_rows,
                actual = rows.len(),
                "行数超过上限，仅校验前 limit 行"
            );
            batch_errors.push(BatchError::LimitExceeded {
                limit: self.max_rows,
                actual: rows.len(),
            });
            &rows[..self.max_rows]
        } else {
            rows
        };

        let resolution = flow.header_map().resolve(headers);
        debug!(
            flow = %flow.kind(),
            bound = resolution.bindings.len(),
            unmatched = ?resolution.unmatched_headers,
            "表头解析完成"
        );
        if !resolution.missing_required.is_empty() {
            batch_errors.push(BatchError::MissingRequiredColumns {
                fields: resolution
                    .missing_required
                    .iter()
                    .map(|f| f.to_string())
                    .collect(),
            });
        }

        let validator = RowValidator::new(flow, &resolution);
        let mut valid_rows = Vec::new();
        let mut errors = Vec::new();
        for raw in accepted {
            // 解码阶段已过滤空行；此处兜底，空行不计入任何一侧
            if raw.is_blank() {
                continue;
            }
            match validator.validate(raw) {
                RowOutcome::Valid(row) => valid_rows.push(row),
                RowOutcome::Invalid(row_errors) => errors.extend(row_errors),
            }
        }

        let validation = BatchValidation {
            valid_rows,
            errors,
            batch_errors,
            rows_seen: accepted.len(),
            resolution,
        };

        info!(
            flow = %flow.kind(),
            rows_seen = validation.rows_seen,
            valid = validation.valid_rows.len(),
            invalid = validation.invalid_row_count(),
            batch_errors = validation.batch_errors.len(),
            "批次校验完成"
        );

        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::{CellValue, FieldErrorCode};
    use crate::importer::flows::MaterialsFlow;

    fn headers() -> Vec<String> {
        vec!["Malzeme Kodu".to_string(), "Malzeme Adı".to_string()]
    }

    fn material_row(row_number: usize, code: &str, name: &str) -> RawRow {
        RawRow::new(
            row_number,
            vec![
                ("Malzeme Kodu".to_string(), CellValue::from(code)),
                ("Malzeme Adı".to_string(), CellValue::from(name)),
            ],
        )
    }

    #[test]
    fn test_limit_exceeded_truncates() {
        let rows: Vec<RawRow> = (0..501)
            .map(|i| material_row(i + 2, &format!("M{}", i), "Vida"))
            .collect();

        let validation = BatchValidator::default().validate(&MaterialsFlow, &headers(), &rows);

        assert_eq!(validation.valid_rows.len(), 500);
        assert_eq!(validation.rows_seen, 500);
        assert_eq!(
            validation.batch_errors,
            vec![BatchError::LimitExceeded {
                limit: 500,
                actual: 501
            }]
        );
        assert_eq!(validation.valid_rows.last().unwrap().row_number, 501);
    }

    #[test]
    fn test_each_row_is_valid_or_has_errors() {
        let rows = vec![
            material_row(2, "A", "Vida"),
            material_row(3, "", "Somun"),
            material_row(4, "", ""),
            material_row(5, "B", "Pul"),
        ];

        let validation = BatchValidator::new(10).validate(&MaterialsFlow, &headers(), &rows);

        let valid: Vec<usize> = validation.valid_rows.iter().map(|r| r.row_number).collect();
        assert_eq!(valid, vec![2, 5]);
        assert_eq!(
            validation.errors,
            vec![FieldError::new(3, "code", FieldErrorCode::Required)]
        );
        assert!(validation.batch_errors.is_empty());
    }

    #[test]
    fn test_missing_required_column_is_reported_once_and_per_row() {
        let rows = vec![RawRow::new(
            2,
            vec![("Malzeme Kodu".to_string(), CellValue::from("A"))],
        )];
        let validation =
            BatchValidator::default().validate(&MaterialsFlow, &["Malzeme Kodu".to_string()], &rows);

        assert_eq!(
            validation.batch_errors,
            vec![BatchError::MissingRequiredColumns {
                fields: vec!["name".to_string()]
            }]
        );
        assert_eq!(validation.errors.len(), 1);
        assert_eq!(validation.errors[0].field, "name");
    }
}
