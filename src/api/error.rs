// ==========================================
// 表格批量导入引擎 - API 层错误类型
// ==========================================
// 职责: 将 Repository / Importer 错误转换为面向调用方的错误消息
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 导入错误
    // ==========================================
    /// 文件无法解码（格式/工作表/空表）
    #[error("文件无法读取: {0}")]
    FileUnreadable(String),

    /// 执行前中止，未写入任何行
    #[error("导入已中止: {0}")]
    ImportAborted(String),

    #[error("模板导出失败: {0}")]
    TemplateError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("锁获取失败: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Decode(_)
            | ImportError::UnsupportedFormat(_)
            | ImportError::SheetNotFound(_)
            | ImportError::EmptySheet
            | ImportError::FileReadError(_) => ApiError::FileUnreadable(err.to_string()),
            ImportError::UnknownFlow(flow) => ApiError::InvalidInput(format!("未知导入流: {}", flow)),
            ImportError::Lookup(source) => ApiError::ImportAborted(source.to_string()),
            ImportError::TemplateExport(msg) => ApiError::TemplateError(msg),
            ImportError::ConfigValueError { key, value } => {
                ApiError::ConfigError(format!("{} = {:?}", key, value))
            }
            ImportError::Repository(source) => source.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_errors_are_classified() {
        assert!(matches!(
            ApiError::from(ImportError::EmptySheet),
            ApiError::FileUnreadable(_)
        ));
        assert!(matches!(
            ApiError::from(ImportError::Lookup(RepositoryError::LockError("x".into()))),
            ApiError::ImportAborted(_)
        ));
        assert!(matches!(
            ApiError::from(ImportError::Repository(RepositoryError::not_found("materials", 7))),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_repository_errors_are_classified() {
        assert!(matches!(
            ApiError::from(RepositoryError::LockError("poisoned".into())),
            ApiError::DatabaseConnectionError(_)
        ));
        assert!(matches!(
            ApiError::from(RepositoryError::UniqueConstraintViolation("materials.code".into())),
            ApiError::DatabaseError(_)
        ));
        assert!(matches!(
            ApiError::from(ImportError::ConfigValueError {
                key: "import.max_rows".into(),
                value: "x".into()
            }),
            ApiError::ConfigError(_)
        ));
        assert!(matches!(
            ApiError::from(ImportError::UnknownFlow("orders".into())),
            ApiError::InvalidInput(_)
        ));
    }
}
