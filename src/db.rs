// ==========================================
// 表格批量导入引擎 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 / busy_timeout）
// - 建表幂等；自然键唯一性通过部分唯一索引（WHERE deleted_at IS NULL）实现，
//   软删除的记录不占用自然键
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "SHEET_IMPORT_DB_PATH";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER NOT NULL,
    applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS materials (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    code        TEXT NOT NULL,
    name        TEXT NOT NULL,
    unit        TEXT NOT NULL,
    base_price  REAL NOT NULL DEFAULT 0,
    vat_rate    INTEGER NOT NULL DEFAULT 20,
    category    TEXT,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at  TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS ux_materials_code_live
    ON materials(code) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS sim_cards (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    phone_number     TEXT NOT NULL,
    iccid            TEXT,
    operator         TEXT NOT NULL,
    status           TEXT NOT NULL,
    monthly_fee      REAL NOT NULL DEFAULT 0,
    activation_date  TEXT,
    notes            TEXT,
    created_at       TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at       TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at       TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS ux_sim_cards_phone_live
    ON sim_cards(phone_number) WHERE deleted_at IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS ux_sim_cards_iccid_live
    ON sim_cards(iccid) WHERE deleted_at IS NULL AND iccid IS NOT NULL;

CREATE TABLE IF NOT EXISTS subscriptions (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_code      TEXT NOT NULL,
    subscription_type  TEXT NOT NULL,
    amount             REAL NOT NULL,
    billing_day        INTEGER NOT NULL DEFAULT 1,
    start_date         TEXT NOT NULL,
    end_date           TEXT,
    card_bank_name     TEXT,
    card_last4         TEXT,
    cash_collector     TEXT,
    auto_renew         INTEGER NOT NULL DEFAULT 1,
    created_at         TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at         TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at         TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS ux_subscriptions_customer_live
    ON subscriptions(customer_code) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id    TEXT NOT NULL,
    key         TEXT NOT NULL,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS import_batch (
    batch_id       TEXT PRIMARY KEY,
    flow           TEXT NOT NULL,
    file_name      TEXT,
    rows_seen      INTEGER NOT NULL,
    rejected_rows  INTEGER NOT NULL,
    created_count  INTEGER NOT NULL,
    updated_count  INTEGER NOT NULL,
    failed_count   INTEGER NOT NULL,
    blocked        INTEGER NOT NULL DEFAULT 0,
    partial        INTEGER NOT NULL DEFAULT 0,
    elapsed_ms     INTEGER NOT NULL,
    report_json    TEXT NOT NULL,
    imported_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_import_batch_imported_at ON import_batch(imported_at);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// foreign_keys 与 busy_timeout 需要每个连接单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等），并登记 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    match read_schema_version(conn)? {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [CURRENT_SCHEMA_VERSION],
            )?;
            info!(version = CURRENT_SCHEMA_VERSION, "数据库结构已初始化");
        }
        Some(v) if v != CURRENT_SCHEMA_VERSION => {
            warn!(found = v, expected = CURRENT_SCHEMA_VERSION, "schema_version 与当前代码不一致");
        }
        Some(_) => {}
    }
    Ok(())
}

/// 打开连接 + 建表
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在或为空则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 默认数据库路径
///
/// 优先级: 环境变量 SHEET_IMPORT_DB_PATH > 用户数据目录 > 当前目录
pub fn default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./sheet_import.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("sheet-import");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("sheet_import.db");
        }
    }
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_partial_unique_index_ignores_deleted_rows() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO materials (code, name, unit, deleted_at) VALUES ('DK230', 'eski', 'piece', datetime('now'))",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO materials (code, name, unit) VALUES ('DK230', 'yeni', 'piece')",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO materials (code, name, unit) VALUES ('DK230', 'kopya', 'piece')",
            [],
        );
        assert!(dup.is_err());
    }
}
