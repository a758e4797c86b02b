// ==========================================
// 表格批量导入引擎 - 导入批次日志仓储
// ==========================================
// 表: import_batch（每次导入一行，含完整报告 JSON）
// 红线: 只追加，不修改历史批次
// ==========================================

use crate::importer::reporter::ImportReport;
use crate::repository::error::RepositoryResult;
use crate::repository::import_repo::lock_conn;
use chrono::Utc;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// 批次列表摘要（不含报告正文）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportBatchSummary {
    pub batch_id: String,
    pub flow: String,
    pub file_name: Option<String>,
    pub rows_seen: i64,
    pub rejected_rows: i64,
    pub created_count: i64,
    pub updated_count: i64,
    pub failed_count: i64,
    pub blocked: bool,
    pub partial: bool,
    pub elapsed_ms: i64,
    pub imported_at: String,
}

pub struct ImportBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ImportBatchRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 记录一次导入批次
    pub fn record(&self, report: &ImportReport) -> RepositoryResult<()> {
        let report_json = serde_json::to_string(report)?;
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, flow, file_name, rows_seen, rejected_rows,
                created_count, updated_count, failed_count, blocked, partial,
                elapsed_ms, report_json, imported_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                report.batch_id,
                report.flow.as_str(),
                report.file_name,
                report.rows_seen as i64,
                report.rejected_rows() as i64,
                report.outcome.created_count as i64,
                report.outcome.updated_count as i64,
                report.outcome.failed_count as i64,
                report.blocked,
                report.outcome.partial,
                report.elapsed_ms,
                report_json,
                Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            ],
        )?;
        Ok(())
    }

    /// 最近的批次（新 → 旧）
    pub fn recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatchSummary>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, flow, file_name, rows_seen, rejected_rows,
                   created_count, updated_count, failed_count, blocked, partial,
                   elapsed_ms, imported_at
            FROM import_batch
            ORDER BY imported_at DESC, rowid DESC
            LIMIT ?
            "#,
        )?;
        let batches = stmt
            .query_map(params![limit as i64], map_summary)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(batches)
    }

    /// 取回某批次的完整报告 JSON
    pub fn report_json(&self, batch_id: &str) -> RepositoryResult<Option<serde_json::Value>> {
        let conn = lock_conn(&self.conn)?;
        let raw: Option<String> = match conn.query_row(
            "SELECT report_json FROM import_batch WHERE batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        ) {
            Ok(raw) => Some(raw),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }
}

fn map_summary(row: &Row<'_>) -> SqliteResult<ImportBatchSummary> {
    Ok(ImportBatchSummary {
        batch_id: row.get(0)?,
        flow: row.get(1)?,
        file_name: row.get(2)?,
        rows_seen: row.get(3)?,
        rejected_rows: row.get(4)?,
        created_count: row.get(5)?,
        updated_count: row.get(6)?,
        failed_count: row.get(7)?,
        blocked: row.get(8)?,
        partial: row.get(9)?,
        elapsed_ms: row.get(10)?,
        imported_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::import::{FieldError, FieldErrorCode, ImportOutcome};
    use crate::importer::flows::FlowKind;

    fn report(batch_id: &str) -> ImportReport {
        ImportReport {
            batch_id: batch_id.to_string(),
            flow: FlowKind::Materials,
            file_name: Some("urunler.xlsx".to_string()),
            rows_seen: 4,
            valid_rows: 3,
            blocked: false,
            discarded: false,
            outcome: ImportOutcome {
                created_count: 2,
                updated_count: 1,
                failed_count: 0,
                errors: vec![],
                partial: false,
            },
            field_errors: vec![
                FieldError::new(3, "code", FieldErrorCode::Required),
                FieldError::new(3, "name", FieldErrorCode::Required),
            ],
            batch_errors: vec![],
            superseded: vec![],
            unmatched_headers: vec![],
            elapsed_ms: 12,
        }
    }

    #[test]
    fn test_record_and_list_recent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let repo = ImportBatchRepository::new(Arc::new(Mutex::new(conn)));

        repo.record(&report("b-1")).unwrap();
        repo.record(&report("b-2")).unwrap();

        let recent = repo.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].batch_id, "b-2");
        assert_eq!(recent[0].flow, "materials");
        assert_eq!(recent[0].rejected_rows, 1);
        assert_eq!(recent[0].created_count, 2);

        assert_eq!(repo.recent(1).unwrap().len(), 1);

        let json = repo.report_json("b-1").unwrap().unwrap();
        assert_eq!(json["field_errors"][0]["code"], "required");
        assert!(repo.report_json("missing").unwrap().is_none());
    }
}
