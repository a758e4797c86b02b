// ==========================================
// 表格批量导入引擎 - 客户订阅仓储
// ==========================================
// 表: subscriptions（自然键 customer_code，部分唯一索引）
// 说明: PaymentDetails 展开为 subscription_type + 三个可空列
// ==========================================

use crate::db::open_and_init;
use crate::domain::import::ExistingRecord;
use crate::domain::subscription::{PaymentDetails, SubscriptionRecord};
use crate::domain::types::SubscriptionType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_repo::{find_live_by_keys, lock_conn, soft_delete_row, ImportRepository};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const TABLE: &str = "subscriptions";

pub struct SubscriptionRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

struct SubscriptionRow {
    id: i64,
    customer_code: String,
    subscription_type: String,
    amount: f64,
    billing_day: i64,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    card_bank_name: Option<String>,
    card_last4: Option<String>,
    cash_collector: Option<String>,
    auto_renew: bool,
}

impl SubscriptionRow {
    fn into_record(self) -> RepositoryResult<(i64, SubscriptionRecord)> {
        let missing = |field: &str| RepositoryError::FieldValueError {
            field: field.to_string(),
            message: format!("{} 付款方式缺少必要字段", self.subscription_type),
        };

        let payment = match SubscriptionType::from_str(&self.subscription_type) {
            Some(SubscriptionType::RecurringCard) => PaymentDetails::RecurringCard {
                card_bank_name: self.card_bank_name.clone().ok_or_else(|| missing("card_bank_name"))?,
                card_last4: self.card_last4.clone().ok_or_else(|| missing("card_last4"))?,
            },
            Some(SubscriptionType::ManualCash) => PaymentDetails::ManualCash {
                cash_collector: self.cash_collector.clone().ok_or_else(|| missing("cash_collector"))?,
            },
            Some(SubscriptionType::BankTransfer) => PaymentDetails::BankTransfer,
            None => {
                return Err(RepositoryError::FieldValueError {
                    field: "subscription_type".to_string(),
                    message: format!("未知付款方式: {}", self.subscription_type),
                })
            }
        };

        Ok((
            self.id,
            SubscriptionRecord {
                customer_code: self.customer_code,
                payment,
                amount: self.amount,
                billing_day: self.billing_day,
                start_date: self.start_date,
                end_date: self.end_date,
                auto_renew: self.auto_renew,
            },
        ))
    }
}

impl SubscriptionRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_and_init(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn find_by_customer_code(
        &self,
        customer_code: &str,
    ) -> RepositoryResult<Option<(i64, SubscriptionRecord)>> {
        let conn = lock_conn(&self.conn)?;
        let row = conn
            .query_row(
                "SELECT id, customer_code, subscription_type, amount, billing_day, start_date, end_date,
                        card_bank_name, card_last4, cash_collector, auto_renew
                 FROM subscriptions WHERE customer_code = ?1 AND deleted_at IS NULL",
                params![customer_code],
                |row| {
                    Ok(SubscriptionRow {
                        id: row.get(0)?,
                        customer_code: row.get(1)?,
                        subscription_type: row.get(2)?,
                        amount: row.get(3)?,
                        billing_day: row.get(4)?,
                        start_date: row.get(5)?,
                        end_date: row.get(6)?,
                        card_bank_name: row.get(7)?,
                        card_last4: row.get(8)?,
                        cash_collector: row.get(9)?,
                        auto_renew: row.get(10)?,
                    })
                },
            )
            .optional()?;

        row.map(SubscriptionRow::into_record).transpose()
    }

    pub fn soft_delete(&self, id: i64) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        soft_delete_row(&conn, TABLE, id)
    }
}

#[async_trait]
impl ImportRepository<SubscriptionRecord> for SubscriptionRepositoryImpl {
    async fn find_existing(&self, natural_keys: &[String]) -> RepositoryResult<Vec<ExistingRecord>> {
        let conn = lock_conn(&self.conn)?;
        find_live_by_keys(&conn, TABLE, "customer_code", natural_keys)
    }

    async fn update_by_id(&self, id: i64, payload: &SubscriptionRecord) -> RepositoryResult<i64> {
        let conn = lock_conn(&self.conn)?;
        let affected = conn.execute(
            "UPDATE subscriptions
             SET customer_code = ?1, subscription_type = ?2, amount = ?3, billing_day = ?4,
                 start_date = ?5, end_date = ?6, card_bank_name = ?7, card_last4 = ?8,
                 cash_collector = ?9, auto_renew = ?10, updated_at = datetime('now')
             WHERE id = ?11 AND deleted_at IS NULL",
            params![
                payload.customer_code,
                payload.payment.subscription_type().as_str(),
                payload.amount,
                payload.billing_day,
                payload.start_date,
                payload.end_date,
                payload.card_bank_name(),
                payload.card_last4(),
                payload.cash_collector(),
                payload.auto_renew,
                id,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found(TABLE, id));
        }
        Ok(id)
    }

    async fn insert(&self, payload: &SubscriptionRecord) -> RepositoryResult<i64> {
        let conn = lock_conn(&self.conn)?;
        conn.execute(
            "INSERT INTO subscriptions (customer_code, subscription_type, amount, billing_day,
                                        start_date, end_date, card_bank_name, card_last4,
                                        cash_collector, auto_renew)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                payload.customer_code,
                payload.payment.subscription_type().as_str(),
                payload.amount,
                payload.billing_day,
                payload.start_date,
                payload.end_date,
                payload.card_bank_name(),
                payload.card_last4(),
                payload.cash_collector(),
                payload.auto_renew,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
