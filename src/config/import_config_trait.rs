// ==========================================
// 表格批量导入引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::importer::batch_executor::ExecutionMode;
use crate::importer::error::ImportResult;
use crate::importer::pipeline::{BatchLimitPolicy, ValidationPolicy};
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 单次导入最大行数
    ///
    /// # 默认值
    /// - 500
    async fn get_max_rows(&self) -> ImportResult<usize>;

    /// 存在字段错误时的处理策略
    ///
    /// # 默认值
    /// - EXECUTE_VALID_SUBSET
    async fn get_validation_policy(&self) -> ImportResult<ValidationPolicy>;

    /// 行数超限时的处理策略
    ///
    /// # 默认值
    /// - ADVISORY
    async fn get_batch_limit_policy(&self) -> ImportResult<BatchLimitPolicy>;

    /// 执行模式（SEQUENTIAL / CONCURRENT，并发度取 import.max_in_flight）
    ///
    /// # 默认值
    /// - SEQUENTIAL
    async fn get_execution_mode(&self) -> ImportResult<ExecutionMode>;
}
