// ==========================================
// 表格批量导入引擎 - API 层
// ==========================================
// 职责: 面向命令行与宿主应用的导入接口
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
