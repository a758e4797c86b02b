// ==========================================
// 表格批量导入引擎 - SIM 卡库存仓储
// ==========================================
// 表: sim_cards（自然键 phone_number；iccid 非空时亦唯一，均为部分唯一索引）
// ==========================================

use crate::db::open_and_init;
use crate::domain::import::ExistingRecord;
use crate::domain::sim_card::SimCardRecord;
use crate::domain::types::{SimOperator, SimStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_repo::{find_live_by_keys, lock_conn, soft_delete_row, ImportRepository};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const TABLE: &str = "sim_cards";

pub struct SimCardRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl SimCardRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_and_init(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn find_by_phone(&self, phone_number: &str) -> RepositoryResult<Option<(i64, SimCardRecord)>> {
        let conn = lock_conn(&self.conn)?;
        let row = conn
            .query_row(
                "SELECT id, phone_number, iccid, operator, status, monthly_fee, activation_date, notes
                 FROM sim_cards WHERE phone_number = ?1 AND deleted_at IS NULL",
                params![phone_number],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, Option<chrono::NaiveDate>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                },
            )
            .optional()?;

        let (id, phone_number, iccid, operator, status, monthly_fee, activation_date, notes) = match row {
            None => return Ok(None),
            Some(r) => r,
        };

        let operator = SimOperator::from_str(&operator).ok_or_else(|| RepositoryError::FieldValueError {
            field: "operator".to_string(),
            message: format!("未知运营商: {}", operator),
        })?;
        let status = SimStatus::from_str(&status).ok_or_else(|| RepositoryError::FieldValueError {
            field: "status".to_string(),
            message: format!("未知状态: {}", status),
        })?;

        Ok(Some((
            id,
            SimCardRecord {
                phone_number,
                iccid,
                operator,
                status,
                monthly_fee,
                activation_date,
                notes,
            },
        )))
    }

    pub fn soft_delete(&self, id: i64) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        soft_delete_row(&conn, TABLE, id)
    }
}

#[async_trait]
impl ImportRepository<SimCardRecord> for SimCardRepositoryImpl {
    async fn find_existing(&self, natural_keys: &[String]) -> RepositoryResult<Vec<ExistingRecord>> {
        let conn = lock_conn(&self.conn)?;
        find_live_by_keys(&conn, TABLE, "phone_number", natural_keys)
    }

    async fn update_by_id(&self, id: i64, payload: &SimCardRecord) -> RepositoryResult<i64> {
        let conn = lock_conn(&self.conn)?;
        let affected = conn.execute(
            "UPDATE sim_cards
             SET phone_number = ?1, iccid = ?2, operator = ?3, status = ?4, monthly_fee = ?5,
                 activation_date = ?6, notes = ?7, updated_at = datetime('now')
             WHERE id = ?8 AND deleted_at IS NULL",
            params![
                payload.phone_number,
                payload.iccid,
                payload.operator.as_str(),
                payload.status.as_str(),
                payload.monthly_fee,
                payload.activation_date,
                payload.notes,
                id,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found(TABLE, id));
        }
        Ok(id)
    }

    async fn insert(&self, payload: &SimCardRecord) -> RepositoryResult<i64> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO sim_cards (phone_number, iccid, operator, status, monthly_fee, activation_date, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                payload.phone_number,
                payload.iccid,
                payload.operator.as_str(),
                payload.status.as_str(),
                payload.monthly_fee,
                payload.activation_date,
                payload.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
