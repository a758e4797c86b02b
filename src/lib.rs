// ==========================================
// 表格批量导入引擎 - 核心库
// ==========================================
// 导入流: 物料目录 / SIM 库存 / 客户订阅
// 管道: 解码 → 表头解析 → 行校验 → 对账规划 → 执行 → 汇总
// 存储: SQLite（rusqlite）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 数据结构与写入载荷
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 导入管道
pub mod importer;

// 配置层 - 导入选项
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 调用入口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

pub use api::{ApiError, ApiResult, ImportApi};
pub use domain::{
    FieldError, FieldErrorCode, ImportOutcome, MaterialRecord, SimCardRecord, SubscriptionRecord,
};
pub use importer::{
    CancelHandle, FlowKind, ImportError, ImportOptions, ImportPipeline, ImportReport,
};

// ==========================================
// 常量定义
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
