// ==========================================
// 表格批量导入引擎 - 导入存储边界 Trait
// ==========================================
// 职责: 既有记录批量查询 + 按 id 更新 + 插入
// 红线: Repository 不含业务规则；自然键唯一性由存储层部分唯一索引保证
// ==========================================

use crate::domain::import::ExistingRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection};
use std::sync::{Mutex, MutexGuard};

// ==========================================
// ImportRepository Trait
// ==========================================
// 实现者: MaterialRepositoryImpl / SimCardRepositoryImpl / SubscriptionRepositoryImpl（rusqlite）
#[async_trait]
pub trait ImportRepository<P>: Send + Sync
where
    P: Send + Sync,
{
    /// 一次批量查询：返回自然键命中的未删除记录
    async fn find_existing(&self, natural_keys: &[String]) -> RepositoryResult<Vec<ExistingRecord>>;

    /// 按代理 id 更新，返回 id
    async fn update_by_id(&self, id: i64, payload: &P) -> RepositoryResult<i64>;

    /// 插入新记录，返回新 id
    async fn insert(&self, payload: &P) -> RepositoryResult<i64>;
}

// ==========================================
// SQLite 公共实现（各流仓储复用）
// ==========================================

/// IN 列表分块大小（低于 SQLite 绑定参数上限）
const LOOKUP_CHUNK: usize = 500;

pub(crate) fn lock_conn(conn: &Mutex<Connection>) -> RepositoryResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
}

/// 按自然键批量查询未删除记录
///
/// 对调用方仍是一次边界调用；键过多时内部分块执行
pub(crate) fn find_live_by_keys(
    conn: &Connection,
    table: &'static str,
    key_column: &'static str,
    natural_keys: &[String],
) -> RepositoryResult<Vec<ExistingRecord>> {
    let mut found = Vec::new();
    for chunk in natural_keys.chunks(LOOKUP_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT id, {key} FROM {table} WHERE deleted_at IS NULL AND {key} IN ({placeholders})",
            key = key_column,
            table = table,
            placeholders = placeholders,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
            Ok(ExistingRecord {
                id: row.get(0)?,
                natural_key: row.get(1)?,
            })
        })?;
        for row in rows {
            found.push(row?);
        }
    }
    Ok(found)
}

/// 软删除：置 deleted_at，自然键随即释放
pub(crate) fn soft_delete_row(conn: &Connection, table: &'static str, id: i64) -> RepositoryResult<()> {
    let sql = format!(
        "UPDATE {} SET deleted_at = datetime('now') WHERE id = ?1 AND deleted_at IS NULL",
        table
    );
    let affected = conn.execute(&sql, [id])?;
    if affected == 0 {
        return Err(RepositoryError::not_found(table, id));
    }
    Ok(())
}
