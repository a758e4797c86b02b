// ==========================================
// 表格批量导入引擎 - 导入层
// ==========================================
// 流程: 解码 → 表头解析 → 字段转换/行校验 → 批次校验 → 对账规划 → 批次执行 → 结果汇总
// 支持: xlsx / xls / ods，CSV（显式指定）
// ==========================================

// 模块声明
pub mod batch_executor;
pub mod batch_validator;
pub mod coercers;
pub mod error;
pub mod file_parser;
pub mod flows;
pub mod header_resolver;
pub mod pipeline;
pub mod reconciliation;
pub mod reporter;
pub mod row_validator;
pub mod template;

// 重导出核心类型
pub use batch_executor::{BatchExecutor, CancelHandle, ExecutionMode, RowExecution, WriteAction, WriteFailure};
pub use batch_validator::{BatchValidation, BatchValidator, DEFAULT_MAX_ROWS};
pub use error::{ImportError, ImportResult};
pub use file_parser::{DecodeOptions, DecodedSheet, SheetFormat, SheetSelector, UniversalDecoder};
pub use flows::{FlowKind, ImportFlow, MaterialsFlow, SimCardsFlow, SubscriptionsFlow};
pub use header_resolver::{FieldDef, HeaderMap, HeaderResolution, MatchMode};
pub use pipeline::{BatchLimitPolicy, ImportOptions, ImportPipeline, ImportPreview, ValidationPolicy};
pub use reconciliation::{ReconciliationPlan, ReconciliationPlanner, SupersededRow};
pub use reporter::{ImportReport, ImportReporter};
pub use row_validator::{FieldCollector, RowOutcome, RowValidator};
pub use template::export_template;
