// ==========================================
// 表格批量导入引擎 - SIM 库存模型
// ==========================================
// 对齐: sim_cards 表（自然键 phone_number，软删除 deleted_at）
// ==========================================

use crate::domain::types::{SimOperator, SimStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimCardRecord {
    pub phone_number: String, // 10 位国内号码（去除 0 / 90 前缀）
    pub iccid: Option<String>,
    pub operator: SimOperator,
    pub status: SimStatus,
    pub monthly_fee: f64,
    pub activation_date: Option<NaiveDate>,
    pub notes: Option<String>,
}
