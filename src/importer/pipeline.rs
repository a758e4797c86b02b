// ==========================================
// 表格批量导入引擎 - 导入管道
// ==========================================
// 流程: 解码 → 批次校验 → 策略判定 → 既有记录查询 → 对账规划 → 执行 → 汇总
// 数据单向流动，任何阶段不回退到前一阶段
// 致命错误（解码 / 查询）返回 Err 且不产生任何写入
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{BatchError, FieldError, ImportOutcome};
use crate::importer::batch_executor::{BatchExecutor, CancelHandle, ExecutionMode};
use crate::importer::batch_validator::{BatchValidation, BatchValidator, DEFAULT_MAX_ROWS};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{DecodeOptions, DecodedSheet, UniversalDecoder};
use crate::importer::flows::ImportFlow;
use crate::importer::reconciliation::{distinct_keys, ReconciliationPlan, ReconciliationPlanner, SupersededRow};
use crate::importer::reporter::{ImportReport, ImportReporter};
use crate::repository::import_repo::ImportRepository;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 导入选项
// ==========================================

/// 存在字段错误时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationPolicy {
    /// 任一字段错误 → 整批不执行
    BlockOnErrors,
    /// 仅执行有效行
    #[default]
    ExecuteValidSubset,
}

/// 行数超过上限时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchLimitPolicy {
    /// 截断后继续处理前 max_rows 行
    #[default]
    Advisory,
    /// 超限即阻断整批
    Block,
}

impl ValidationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationPolicy::BlockOnErrors => "BLOCK_ON_ERRORS",
            ValidationPolicy::ExecuteValidSubset => "EXECUTE_VALID_SUBSET",
        }
    }
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BLOCK_ON_ERRORS" => Ok(ValidationPolicy::BlockOnErrors),
            "EXECUTE_VALID_SUBSET" => Ok(ValidationPolicy::ExecuteValidSubset),
            other => Err(other.to_string()),
        }
    }
}

impl BatchLimitPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchLimitPolicy::Advisory => "ADVISORY",
            BatchLimitPolicy::Block => "BLOCK",
        }
    }
}

impl fmt::Display for BatchLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchLimitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADVISORY" => Ok(BatchLimitPolicy::Advisory),
            "BLOCK" => Ok(BatchLimitPolicy::Block),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub max_rows: usize,
    pub validation_policy: ValidationPolicy,
    pub batch_limit_policy: BatchLimitPolicy,
    pub execution_mode: ExecutionMode,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            validation_policy: ValidationPolicy::default(),
            batch_limit_policy: BatchLimitPolicy::default(),
            execution_mode: ExecutionMode::default(),
        }
    }
}

impl ImportOptions {
    /// 从配置读取器加载（缺省项取默认值）
    pub async fn load<C: ImportConfigReader + ?Sized>(reader: &C) -> ImportResult<Self> {
        Ok(Self {
            max_rows: reader.get_max_rows().await?,
            validation_policy: reader.get_validation_policy().await?,
            batch_limit_policy: reader.get_batch_limit_policy().await?,
            execution_mode: reader.get_execution_mode().await?,
        })
    }
}

// ==========================================
// ImportPreview - 预览结果（不写入）
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ImportPreview {
    pub flow: String,
    pub rows_seen: usize,
    pub valid_rows: usize,
    pub field_errors: Vec<FieldError>,
    pub batch_errors: Vec<BatchError>,
    pub unmatched_headers: Vec<String>,
    pub to_update: usize,
    pub to_insert: usize,
    pub superseded: Vec<SupersededRow>,
}

// ==========================================
// ImportPipeline
// ==========================================
pub struct ImportPipeline<F, R>
where
    F: ImportFlow,
    R: ImportRepository<F::Payload> + ?Sized,
{
    flow: F,
    repo: Arc<R>,
    options: ImportOptions,
    decoder: UniversalDecoder,
}

impl<F, R> ImportPipeline<F, R>
where
    F: ImportFlow,
    R: ImportRepository<F::Payload> + ?Sized,
{
    pub fn new(flow: F, repo: Arc<R>, options: ImportOptions) -> Self {
        Self {
            flow,
            repo,
            options,
            decoder: UniversalDecoder,
        }
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// 解码（致命错误直接返回）
    pub fn decode(&self, bytes: &[u8], decode: &DecodeOptions) -> ImportResult<DecodedSheet> {
        self.decoder.decode(bytes, decode).map_err(|e| {
            error!(flow = %self.flow.kind(), error = %e, "文件解码失败");
            e
        })
    }

    /// 纯校验（同步，无 I/O）
    pub fn validate(&self, sheet: &DecodedSheet) -> BatchValidation<F::Payload> {
        BatchValidator::new(self.options.max_rows).validate(&self.flow, &sheet.headers, &sheet.rows)
    }

    /// 预览：解码 + 校验 + 对账规划，不写入
    #[instrument(skip(self, bytes, decode), fields(flow = %self.flow.kind()))]
    pub async fn preview(&self, bytes: &[u8], decode: &DecodeOptions) -> ImportResult<ImportPreview> {
        let sheet = self.decode(bytes, decode)?;
        let validation = self.validate(&sheet);
        let plan = self.plan(&validation).await?;

        Ok(ImportPreview {
            flow: self.flow.kind().to_string(),
            rows_seen: validation.rows_seen,
            valid_rows: validation.valid_rows.len(),
            field_errors: validation.errors,
            batch_errors: validation.batch_errors,
            unmatched_headers: validation.resolution.unmatched_headers,
            to_update: plan.to_update.len(),
            to_insert: plan.to_insert.len(),
            superseded: plan.superseded,
        })
    }

    /// 完整导入
    pub async fn run(
        &self,
        bytes: &[u8],
        decode: &DecodeOptions,
        file_name: Option<&str>,
        cancel: &CancelHandle,
    ) -> ImportResult<ImportReport> {
        let sheet = self.decode(bytes, decode)?;
        self.run_sheet(&sheet, file_name, cancel).await
    }

    /// 对已解码的工作表执行导入
    #[instrument(skip(self, sheet, cancel), fields(flow = %self.flow.kind(), batch_id))]
    pub async fn run_sheet(
        &self,
        sheet: &DecodedSheet,
        file_name: Option<&str>,
        cancel: &CancelHandle,
    ) -> ImportResult<ImportReport> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        info!(
            batch_id = %batch_id,
            file_name = file_name.unwrap_or("-"),
            rows = sheet.rows.len(),
            "开始导入"
        );

        // === 步骤 1: 批次校验 ===
        let validation = self.validate(sheet);

        let mut report = ImportReport {
            batch_id: batch_id.clone(),
            flow: self.flow.kind(),
            file_name: file_name.map(str::to_string),
            rows_seen: validation.rows_seen,
            valid_rows: validation.valid_rows.len(),
            blocked: false,
            discarded: false,
            outcome: ImportOutcome::default(),
            field_errors: validation.errors.clone(),
            batch_errors: validation.batch_errors.clone(),
            superseded: Vec::new(),
            unmatched_headers: validation.resolution.unmatched_headers.clone(),
            elapsed_ms: 0,
        };

        // === 步骤 2: 策略判定 ===
        if self.options.batch_limit_policy == BatchLimitPolicy::Block && validation.is_truncated() {
            warn!(batch_id = %batch_id, "行数超限且策略为 BLOCK，整批阻断");
            report.blocked = true;
        } else if self.options.validation_policy == ValidationPolicy::BlockOnErrors
            && !validation.errors.is_empty()
        {
            warn!(
                batch_id = %batch_id,
                errors = validation.errors.len(),
                "存在字段错误且策略为 BLOCK_ON_ERRORS，整批阻断"
            );
            report.blocked = true;
        }
        if report.blocked {
            report.elapsed_ms = start_time.elapsed().as_millis() as i64;
            return Ok(report);
        }

        // === 步骤 3: 既有记录查询 + 对账规划 ===
        let plan = self.plan(&validation).await?;
        report.superseded = plan.superseded.clone();

        if cancel.is_cancelled() {
            info!(batch_id = %batch_id, "执行前已取消，丢弃计划");
            report.discarded = true;
            report.elapsed_ms = start_time.elapsed().as_millis() as i64;
            return Ok(report);
        }

        // === 步骤 4: 执行 ===
        let executor = BatchExecutor::new(self.options.execution_mode, cancel.clone());
        let executions = executor.execute(&plan, self.repo.as_ref()).await;

        // === 步骤 5: 汇总 ===
        report.outcome = ImportReporter::outcome(plan.total_planned(), &executions);
        report.elapsed_ms = start_time.elapsed().as_millis() as i64;

        info!(
            batch_id = %batch_id,
            created = report.outcome.created_count,
            updated = report.outcome.updated_count,
            failed = report.outcome.failed_count,
            rejected = report.rejected_rows(),
            partial = report.outcome.partial,
            elapsed_ms = report.elapsed_ms,
            "导入完成"
        );

        Ok(report)
    }

    /// 一次批量查询既有记录，失败即中止（不产生任何写入）
    async fn plan(
        &self,
        validation: &BatchValidation<F::Payload>,
    ) -> ImportResult<ReconciliationPlan<F::Payload>> {
        let keys = distinct_keys(&validation.valid_rows);
        let existing = if keys.is_empty() {
            Vec::new()
        } else {
            self.repo.find_existing(&keys).await.map_err(|e| {
                error!(error = %e, keys = keys.len(), "既有记录查询失败");
                ImportError::Lookup(e)
            })?
        };
        debug!(keys = keys.len(), existing = existing.len(), "既有记录查询完成");

        Ok(ReconciliationPlanner::plan(
            validation.valid_rows.clone(),
            &existing,
        ))
    }
}
