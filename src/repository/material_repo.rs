// ==========================================
// 表格批量导入引擎 - 物料目录仓储
// ==========================================
// 表: materials（自然键 code，部分唯一索引 WHERE deleted_at IS NULL）
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::open_and_init;
use crate::domain::import::ExistingRecord;
use crate::domain::material::MaterialRecord;
use crate::domain::types::MaterialUnit;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_repo::{find_live_by_keys, lock_conn, soft_delete_row, ImportRepository};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const TABLE: &str = "materials";

pub struct MaterialRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl MaterialRepositoryImpl {
    /// 打开数据库（必要时建表）
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_and_init(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 按自然键查询未删除记录
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<(i64, MaterialRecord)>> {
        let conn = lock_conn(&self.conn)?;
        let found = conn
            .query_row(
                "SELECT id, code, name, unit, base_price, vat_rate, category, is_active
                 FROM materials WHERE code = ?1 AND deleted_at IS NULL",
                params![code],
                map_row,
            )
            .optional()?;
        found.map(|(id, record)| Ok((id, record?))).transpose()
    }

    /// 未删除记录数
    pub fn count_live(&self) -> RepositoryResult<i64> {
        let conn = lock_conn(&self.conn)?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM materials WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn soft_delete(&self, id: i64) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        soft_delete_row(&conn, TABLE, id)
    }
}

type MaterialRow = (i64, RepositoryResult<MaterialRecord>);

fn map_row(row: &Row<'_>) -> rusqlite::Result<MaterialRow> {
    let id: i64 = row.get(0)?;
    let unit_raw: String = row.get(3)?;
    let record = MaterialUnit::from_str(&unit_raw)
        .ok_or_else(|| RepositoryError::FieldValueError {
            field: "unit".to_string(),
            message: format!("未知单位: {}", unit_raw),
        })
        .and_then(|unit| {
            Ok(MaterialRecord {
                code: row.get(1)?,
                name: row.get(2)?,
                unit,
                base_price: row.get(4)?,
                vat_rate: row.get(5)?,
                category: row.get(6)?,
                is_active: row.get(7)?,
            })
        });
    Ok((id, record))
}

#[async_trait]
impl ImportRepository<MaterialRecord> for MaterialRepositoryImpl {
    async fn find_existing(&self, natural_keys: &[String]) -> RepositoryResult<Vec<ExistingRecord>> {
        let conn = lock_conn(&self.conn)?;
        find_live_by_keys(&conn, TABLE, "code", natural_keys)
    }

    async fn update_by_id(&self, id: i64, payload: &MaterialRecord) -> RepositoryResult<i64> {
        let conn = lock_conn(&self.conn)?;
        let affected = conn.execute(
            "UPDATE materials
             SET code = ?1, name = ?2, unit = ?3, base_price = ?4, vat_rate = ?5,
                 category = ?6, is_active = ?7, updated_at = datetime('now')
             WHERE id = ?8 AND deleted_at IS NULL",
            params![
                payload.code,
                payload.name,
                payload.unit.as_str(),
                payload.base_price,
                payload.vat_rate,
                payload.category,
                payload.is_active,
                id,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found(TABLE, id));
        }
        Ok(id)
    }

    async fn insert(&self, payload: &MaterialRecord) -> RepositoryResult<i64> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO materials (code, name, unit, base_price, vat_rate, category, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                payload.code,
                payload.name,
                payload.unit.as_str(),
                payload.base_price,
                payload.vat_rate,
                payload.category,
                payload.is_active,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn repo() -> MaterialRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        MaterialRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn record(code: &str) -> MaterialRecord {
        MaterialRecord {
            code: code.to_string(),
            name: "Vida".to_string(),
            unit: MaterialUnit::Box,
            base_price: 12.5,
            vat_rate: 20,
            category: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_insert_update_and_lookup() {
        let repo = repo();
        let id = repo.insert(&record("DK230")).await.unwrap();

        let mut changed = record("DK230");
        changed.base_price = 99.0;
        assert_eq!(repo.update_by_id(id, &changed).await.unwrap(), id);

        let (found_id, stored) = repo.find_by_code("DK230").unwrap().unwrap();
        assert_eq!(found_id, id);
        assert_eq!(stored, changed);

        let existing = repo
            .find_existing(&["DK230".to_string(), "DK999".to_string()])
            .await
            .unwrap();
        assert_eq!(existing, vec![ExistingRecord { id, natural_key: "DK230".to_string() }]);
    }

    #[tokio::test]
    async fn test_soft_deleted_rows_release_natural_key() {
        let repo = repo();
        let old = repo.insert(&record("DK230")).await.unwrap();
        assert!(matches!(
            repo.insert(&record("DK230")).await,
            Err(RepositoryError::UniqueConstraintViolation(_))
        ));

        repo.soft_delete(old).unwrap();
        assert!(repo.find_existing(&["DK230".to_string()]).await.unwrap().is_empty());

        let new = repo.insert(&record("DK230")).await.unwrap();
        assert_ne!(new, old);
        assert_eq!(repo.count_live().unwrap(), 1);

        // 已删除记录不可再更新
        assert!(matches!(
            repo.update_by_id(old, &record("DK230")).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
