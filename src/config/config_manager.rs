// ==========================================
// 表格批量导入引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (scope_id + key → value)
// 说明: 缺省项返回文档化默认值；值格式错误返回 ConfigValueError（不静默回退）
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::importer::batch_executor::ExecutionMode;
use crate::importer::batch_validator::DEFAULT_MAX_ROWS;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::pipeline::{BatchLimitPolicy, ValidationPolicy};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::info;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        info!(key, value, "配置已更新");
        Ok(())
    }

    /// 所有 global 配置（按键排序）
    pub fn list_global_config(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config.insert(key, value);
        }
        Ok(config)
    }

    /// 读取并解析配置值；缺省时返回 default
    fn get_parsed_or<T: FromStr>(&self, key: &str, default: T) -> ImportResult<T> {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|_| ImportError::ConfigValueError {
                key: key.to_string(),
                value: raw,
            }),
        }
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_max_rows(&self) -> ImportResult<usize> {
        let value = self.get_parsed_or(config_keys::MAX_ROWS, DEFAULT_MAX_ROWS)?;
        if value == 0 {
            return Err(ImportError::ConfigValueError {
                key: config_keys::MAX_ROWS.to_string(),
                value: value.to_string(),
            });
        }
        Ok(value)
    }

    async fn get_validation_policy(&self) -> ImportResult<ValidationPolicy> {
        self.get_parsed_or(config_keys::VALIDATION_POLICY, ValidationPolicy::default())
    }

    async fn get_batch_limit_policy(&self) -> ImportResult<BatchLimitPolicy> {
        self.get_parsed_or(config_keys::BATCH_LIMIT_POLICY, BatchLimitPolicy::default())
    }

    async fn get_execution_mode(&self) -> ImportResult<ExecutionMode> {
        let mode = self
            .get_global_config_value(config_keys::EXECUTION_MODE)?
            .unwrap_or_else(|| "SEQUENTIAL".to_string());

        match mode.trim().to_ascii_uppercase().as_str() {
            "SEQUENTIAL" => Ok(ExecutionMode::Sequential),
            "CONCURRENT" => {
                let max_in_flight = self.get_parsed_or(config_keys::MAX_IN_FLIGHT, 4usize)?;
                Ok(ExecutionMode::Concurrent {
                    max_in_flight: max_in_flight.max(1),
                })
            }
            _ => Err(ImportError::ConfigValueError {
                key: config_keys::EXECUTION_MODE.to_string(),
                value: mode,
            }),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const MAX_ROWS: &str = "import.max_rows";
    pub const VALIDATION_POLICY: &str = "import.validation_policy";
    pub const BATCH_LIMIT_POLICY: &str = "import.batch_limit_policy";
    pub const EXECUTION_MODE: &str = "import.execution_mode";
    pub const MAX_IN_FLIGHT: &str = "import.max_in_flight";
}
