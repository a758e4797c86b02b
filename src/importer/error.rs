// ==========================================
// 表格批量导入引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 仅包含致命错误（中止整个导入）；行级错误以 FieldError / WriteFailure 收集
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 解码错误（致命，行处理之前中止）=====
    #[error("文件解码失败: {0}")]
    Decode(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.ods/.csv）")]
    UnsupportedFormat(String),

    #[error("工作表不存在: {0}")]
    SheetNotFound(String),

    #[error("工作表无任何行")]
    EmptySheet,

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    // ===== 导入流 =====
    #[error("未知导入流: {0}")]
    UnknownFlow(String),

    // ===== 执行前中止 =====
    #[error("既有记录查询失败，导入已中止（未写入任何行）: {0}")]
    Lookup(#[source] RepositoryError),

    // ===== 模板导出 =====
    #[error("模板导出失败: {0}")]
    TemplateExport(String),

    // ===== 配置 / 存储 =====
    #[error("配置值格式错误 (key: {key}, value: {value})")]
    ConfigValueError { key: String, value: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Decode(format!("CSV: {}", err))
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::Decode(err.to_string())
    }
}

// 实现 From<rust_xlsxwriter::XlsxError>
impl From<rust_xlsxwriter::XlsxError> for ImportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ImportError::TemplateExport(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
