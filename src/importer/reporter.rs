// ==========================================
// 表格批量导入引擎 - 导入结果汇总
// ==========================================
// 计数口径:
//   created / updated 仅统计成功写入的行
//   failed = 计划总行数 − (created + updated)
//   errors 按行号升序
// ==========================================

use crate::domain::import::{BatchError, FieldError, ImportOutcome, RowError};
use crate::importer::batch_executor::{RowExecution, WriteAction, WriteFailure};
use crate::importer::flows::FlowKind;
use crate::importer::reconciliation::SupersededRow;
use serde::Serialize;
use std::fmt;

pub struct ImportReporter;

impl ImportReporter {
    pub fn outcome(total_planned: usize, executions: &[RowExecution]) -> ImportOutcome {
        let mut created_count = 0;
        let mut updated_count = 0;
        let mut errors = Vec::new();
        let mut partial = false;

        for execution in executions {
            match (&execution.result, execution.action) {
                (Ok(_), WriteAction::Insert) => created_count += 1,
                (Ok(_), WriteAction::Update) => updated_count += 1,
                (Err(failure), _) => {
                    if *failure == WriteFailure::Cancelled {
                        partial = true;
                    }
                    errors.push(RowError {
                        row_number: execution.row_number,
                        reason: failure.reason_code().to_string(),
                    });
                }
            }
        }
        errors.sort_by_key(|e| e.row_number);

        ImportOutcome {
            created_count,
            updated_count,
            failed_count: total_planned.saturating_sub(created_count + updated_count),
            errors,
            partial,
        }
    }
}

// ==========================================
// ImportReport - 面向展示/日志的完整报告
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub flow: FlowKind,
    pub file_name: Option<String>,
    /// 实际参与校验的行数
    pub rows_seen: usize,
    pub valid_rows: usize,
    /// ValidationPolicy::BlockOnErrors 下存在字段错误，或批次上限阻断
    pub blocked: bool,
    /// 执行前被取消，计划已丢弃
    pub discarded: bool,
    pub outcome: ImportOutcome,
    pub field_errors: Vec<FieldError>,
    pub batch_errors: Vec<BatchError>,
    pub superseded: Vec<SupersededRow>,
    pub unmatched_headers: Vec<String>,
    pub elapsed_ms: i64,
}

impl ImportReport {
    /// 被拒绝的行数（字段错误按行去重）
    pub fn rejected_rows(&self) -> usize {
        let mut rows: Vec<usize> = self.field_errors.iter().map(|e| e.row_number).collect();
        rows.sort_unstable();
        rows.dedup();
        rows.len()
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "批次 {} [{}]", self.batch_id, self.flow)?;
        writeln!(
            f,
            "  校验: {} 行, 有效 {}, 拒绝 {}",
            self.rows_seen,
            self.valid_rows,
            self.rejected_rows()
        )?;
        for err in &self.batch_errors {
            writeln!(f, "  ! {}", err)?;
        }
        if self.blocked {
            writeln!(f, "  已阻断，未写入任何行")?;
        } else if self.discarded {
            writeln!(f, "  执行前已取消，未写入任何行")?;
        } else {
            writeln!(
                f,
                "  写入: 新增 {}, 更新 {}, 失败 {}{}",
                self.outcome.created_count,
                self.outcome.updated_count,
                self.outcome.failed_count,
                if self.outcome.partial { "（已取消，部分完成）" } else { "" }
            )?;
        }
        for err in &self.field_errors {
            writeln!(f, "  行 {}: {} {}", err.row_number, err.field, err.code)?;
        }
        for err in &self.outcome.errors {
            writeln!(f, "  行 {}: {}", err.row_number, err.reason)?;
        }
        for row in &self.superseded {
            writeln!(
                f,
                "  行 {}: 键 {} 被行 {} 覆盖",
                row.row_number, row.natural_key, row.superseded_by
            )?;
        }
        Ok(())
    }
}
