// ==========================================
// 表格批量导入引擎 - 批次执行器
// ==========================================
// 语义: 无整体事务，每行独立写入；单行失败不影响其他行
// 模式: Sequential / Concurrent { max_in_flight }
// 取消: 每行写入前检查 CancelHandle；未尝试的行记为 cancelled
// ==========================================

use crate::domain::import::ValidatedRow;
use crate::importer::reconciliation::ReconciliationPlan;
use crate::repository::error::RepositoryError;
use crate::repository::import_repo::ImportRepository;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ==========================================
// ExecutionMode
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    /// 计划已按自然键去重，并发写入不会在同一键上竞争
    Concurrent { max_in_flight: usize },
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Sequential
    }
}

// ==========================================
// CancelHandle - 协作式取消
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ==========================================
// 行级执行结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Update,
    Insert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailure {
    UniqueViolation,
    RecordNotFound,
    ForeignKeyViolation,
    StorageError(String),
    Cancelled,
}

impl WriteFailure {
    /// 面向操作员的原因代码
    pub fn reason_code(&self) -> &'static str {
        match self {
            WriteFailure::UniqueViolation => "unique_violation",
            WriteFailure::RecordNotFound => "record_not_found",
            WriteFailure::ForeignKeyViolation => "foreign_key_violation",
            WriteFailure::StorageError(_) => "storage_error",
            WriteFailure::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason_code())
    }
}

impl From<RepositoryError> for WriteFailure {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(_) => WriteFailure::UniqueViolation,
            RepositoryError::NotFound { .. } => WriteFailure::RecordNotFound,
            RepositoryError::ForeignKeyViolation(_) => WriteFailure::ForeignKeyViolation,
            other => WriteFailure::StorageError(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowExecution {
    pub row_number: usize,
    pub natural_key: String,
    pub action: WriteAction,
    pub result: Result<i64, WriteFailure>,
}

enum RowJob<'a, P> {
    Update(i64, &'a ValidatedRow<P>),
    Insert(&'a ValidatedRow<P>),
}

impl<P> RowJob<'_, P> {
    fn row(&self) -> &ValidatedRow<P> {
        match self {
            RowJob::Update(_, row) | RowJob::Insert(row) => row,
        }
    }

    fn action(&self) -> WriteAction {
        match self {
            RowJob::Update(..) => WriteAction::Update,
            RowJob::Insert(_) => WriteAction::Insert,
        }
    }
}

// ==========================================
// BatchExecutor
// ==========================================
pub struct BatchExecutor {
    mode: ExecutionMode,
    cancel: CancelHandle,
}

impl BatchExecutor {
    pub fn new(mode: ExecutionMode, cancel: CancelHandle) -> Self {
        Self { mode, cancel }
    }

    /// 执行计划，返回按行号排序的逐行结果
    pub async fn execute<P, R>(&self, plan: &ReconciliationPlan<P>, repo: &R) -> Vec<RowExecution>
    where
        P: Send + Sync,
        R: ImportRepository<P> + ?Sized,
    {
        let jobs: Vec<RowJob<'_, P>> = plan
            .to_update
            .iter()
            .map(|(id, row)| RowJob::Update(*id, row))
            .chain(plan.to_insert.iter().map(RowJob::Insert))
            .collect();

        info!(
            mode = ?self.mode,
            to_update = plan.to_update.len(),
            to_insert = plan.to_insert.len(),
            "开始执行导入计划"
        );

        let mut results = match self.mode {
            ExecutionMode::Sequential => {
                let mut results = Vec::with_capacity(jobs.len());
                for job in jobs {
                    results.push(self.execute_one(repo, job).await);
                }
                results
            }
            ExecutionMode::Concurrent { max_in_flight } => {
                stream::iter(jobs)
                    .map(|job| self.execute_one(repo, job))
                    .buffer_unordered(max_in_flight.max(1))
                    .collect::<Vec<_>>()
                    .await
            }
        };

        results.sort_by_key(|r| r.row_number);
        results
    }

    async fn execute_one<P, R>(&self, repo: &R, job: RowJob<'_, P>) -> RowExecution
    where
        P: Send + Sync,
        R: ImportRepository<P> + ?Sized,
    {
        let row = job.row();
        let action = job.action();

        let result = if self.cancel.is_cancelled() {
            Err(WriteFailure::Cancelled)
        } else {
            let written = match &job {
                RowJob::Update(id, row) => repo.update_by_id(*id, &row.payload).await,
                RowJob::Insert(row) => repo.insert(&row.payload).await,
            };
            written.map_err(|err| {
                warn!(
                    row_number = row.row_number,
                    natural_key = %row.natural_key,
                    action = ?action,
                    error = %err,
                    "行写入失败"
                );
                WriteFailure::from(err)
            })
        };

        if let Ok(id) = &result {
            debug!(row_number = row.row_number, id, action = ?action, "行写入成功");
        }

        RowExecution {
            row_number: row.row_number,
            natural_key: row.natural_key.clone(),
            action,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::ExistingRecord;
    use crate::importer::reconciliation::ReconciliationPlanner;
    use crate::repository::error::RepositoryResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 记录写入顺序；指定键的插入失败；写入 N 行后触发取消
    struct RecordingRepo {
        writes: Mutex<Vec<String>>,
        fail_keys: Vec<&'static str>,
        cancel_after: Option<(usize, CancelHandle)>,
    }

    impl RecordingRepo {
        fn new(fail_keys: Vec<&'static str>) -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                fail_keys,
                cancel_after: None,
            }
        }

        fn record(&self, key: &str) -> RepositoryResult<i64> {
            let mut writes = self.writes.lock().unwrap();
            if self.fail_keys.iter().any(|k| *k == key) {
                return Err(RepositoryError::UniqueConstraintViolation(key.to_string()));
            }
            writes.push(key.to_string());
            if let Some((n, handle)) = &self.cancel_after {
                if writes.len() >= *n {
                    handle.cancel();
                }
            }
            Ok(writes.len() as i64 + 100)
        }
    }

    #[async_trait]
    impl ImportRepository<String> for RecordingRepo {
        async fn find_existing(&self, _keys: &[String]) -> RepositoryResult<Vec<ExistingRecord>> {
            Ok(Vec::new())
        }

        async fn update_by_id(&self, id: i64, payload: &String) -> RepositoryResult<i64> {
            self.record(payload)?;
            Ok(id)
        }

        async fn insert(&self, payload: &String) -> RepositoryResult<i64> {
            self.record(payload)
        }
    }

    fn plan(keys: &[&str], existing: &[(i64, &str)]) -> ReconciliationPlan<String> {
        let rows = keys
            .iter()
            .enumerate()
            .map(|(i, k)| ValidatedRow {
                row_number: i + 2,
                natural_key: k.to_string(),
                payload: k.to_string(),
            })
            .collect();
        let existing: Vec<ExistingRecord> = existing
            .iter()
            .map(|(id, k)| ExistingRecord {
                id: *id,
                natural_key: k.to_string(),
            })
            .collect();
        ReconciliationPlanner::plan(rows, &existing)
    }

    #[tokio::test]
    async fn test_failed_row_does_not_stop_batch() {
        let repo = RecordingRepo::new(vec!["B"]);
        let executor = BatchExecutor::new(ExecutionMode::Sequential, CancelHandle::new());

        let results = executor.execute(&plan(&["A", "B", "C"], &[(7, "A")]), &repo).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].result, Ok(7));
        assert_eq!(results[0].action, WriteAction::Update);
        assert_eq!(results[1].result, Err(WriteFailure::UniqueViolation));
        assert!(results[2].result.is_ok());
        assert_eq!(*repo.writes.lock().unwrap(), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_cancel_midway_keeps_written_rows() {
        let cancel = CancelHandle::new();
        let mut repo = RecordingRepo::new(vec![]);
        repo.cancel_after = Some((2, cancel.clone()));
        let executor = BatchExecutor::new(ExecutionMode::Sequential, cancel);

        let results = executor
            .execute(&plan(&["A", "B", "C", "D"], &[]), &repo)
            .await;

        let outcome: Vec<_> = results.iter().map(|r| r.result.clone()).collect();
        assert!(outcome[0].is_ok());
        assert!(outcome[1].is_ok());
        assert_eq!(outcome[2], Err(WriteFailure::Cancelled));
        assert_eq!(outcome[3], Err(WriteFailure::Cancelled));
        assert_eq!(repo.writes.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_mode_writes_every_row_once() {
        let repo = RecordingRepo::new(vec![]);
        let executor = BatchExecutor::new(
            ExecutionMode::Concurrent { max_in_flight: 3 },
            CancelHandle::new(),
        );
        let keys: Vec<String> = (0..20).map(|i| format!("K{}", i)).collect();
        let key_refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();

        let results = executor.execute(&plan(&key_refs, &[]), &repo).await;

        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|r| r.result.is_ok()));
        let rows: Vec<usize> = results.iter().map(|r| r.row_number).collect();
        assert_eq!(rows, (2..22).collect::<Vec<_>>());
        let mut writes = repo.writes.lock().unwrap().clone();
        writes.sort();
        writes.dedup();
        assert_eq!(writes.len(), 20);
    }

    #[test]
    fn test_repository_errors_map_to_reason_codes() {
        let cases = vec![
            (RepositoryError::UniqueConstraintViolation("x".into()), "unique_violation"),
            (RepositoryError::not_found("materials", 1), "record_not_found"),
            (RepositoryError::ForeignKeyViolation("x".into()), "foreign_key_violation"),
            (RepositoryError::LockError("x".into()), "storage_error"),
        ];
        for (err, code) in cases {
            assert_eq!(WriteFailure::from(err).reason_code(), code);
        }
    }
}
