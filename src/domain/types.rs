// ==========================================
// 表格批量导入引擎 - 领域枚举定义
// ==========================================
// 序列化格式: snake_case（与数据库存储值一致）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 计量单位 (Material Unit)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialUnit {
    Piece,    // 件 / adet
    Meter,    // 米 / metre
    Kilogram, // 千克 / kg
    Liter,    // 升 / litre
    Box,      // 箱 / koli
}

impl MaterialUnit {
    /// 从存储值解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "piece" => Some(MaterialUnit::Piece),
            "meter" => Some(MaterialUnit::Meter),
            "kilogram" => Some(MaterialUnit::Kilogram),
            "liter" => Some(MaterialUnit::Liter),
            "box" => Some(MaterialUnit::Box),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialUnit::Piece => "piece",
            MaterialUnit::Meter => "meter",
            MaterialUnit::Kilogram => "kilogram",
            MaterialUnit::Liter => "liter",
            MaterialUnit::Box => "box",
        }
    }
}

impl fmt::Display for MaterialUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 运营商 (SIM Operator)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimOperator {
    Turkcell,
    Vodafone,
    TurkTelekom,
}

impl SimOperator {
    /// 从存储值解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "turkcell" => Some(SimOperator::Turkcell),
            "vodafone" => Some(SimOperator::Vodafone),
            "turk_telekom" => Some(SimOperator::TurkTelekom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimOperator::Turkcell => "turkcell",
            SimOperator::Vodafone => "vodafone",
            SimOperator::TurkTelekom => "turk_telekom",
        }
    }
}

impl fmt::Display for SimOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// SIM 状态 (SIM Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimStatus {
    Active,
    Passive,
    Suspended,
}

impl SimStatus {
    /// 从存储值解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SimStatus::Active),
            "passive" => Some(SimStatus::Passive),
            "suspended" => Some(SimStatus::Suspended),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimStatus::Active => "active",
            SimStatus::Passive => "passive",
            SimStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for SimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 订阅付款类型 (Subscription Type)
// ==========================================
// recurring_card: 需要 card_bank_name + card_last4
// manual_cash: 需要 cash_collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    RecurringCard,
    ManualCash,
    BankTransfer,
}

impl SubscriptionType {
    /// 从存储值解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "recurring_card" => Some(SubscriptionType::RecurringCard),
            "manual_cash" => Some(SubscriptionType::ManualCash),
            "bank_transfer" => Some(SubscriptionType::BankTransfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionType::RecurringCard => "recurring_card",
            SubscriptionType::ManualCash => "manual_cash",
            SubscriptionType::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
