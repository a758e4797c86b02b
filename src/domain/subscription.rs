// ==========================================
// 表格批量导入引擎 - 客户订阅模型
// ==========================================
// 对齐: subscriptions 表（自然键 customer_code，软删除 deleted_at）
// ==========================================

use crate::domain::types::SubscriptionType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// PaymentDetails - 按付款类型区分的子字段组
// ==========================================
// 交叉字段规则校验通过后才会构造，非法组合无法表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentDetails {
    RecurringCard {
        card_bank_name: String,
        card_last4: String,
    },
    ManualCash {
        cash_collector: String,
    },
    BankTransfer,
}

impl PaymentDetails {
    pub fn subscription_type(&self) -> SubscriptionType {
        match self {
            PaymentDetails::RecurringCard { .. } => SubscriptionType::RecurringCard,
            PaymentDetails::ManualCash { .. } => SubscriptionType::ManualCash,
            PaymentDetails::BankTransfer => SubscriptionType::BankTransfer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub customer_code: String,
    pub payment: PaymentDetails,
    pub amount: f64,
    pub billing_day: i64, // 1..=28
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub auto_renew: bool,
}

impl SubscriptionRecord {
    pub fn card_bank_name(&self) -> Option<&str> {
        match &self.payment {
            PaymentDetails::RecurringCard { card_bank_name, .. } => Some(card_bank_name),
            _ => None,
        }
    }

    pub fn card_last4(&self) -> Option<&str> {
        match &self.payment {
            PaymentDetails::RecurringCard { card_last4, .. } => Some(card_last4),
            _ => None,
        }
    }

    pub fn cash_collector(&self) -> Option<&str> {
        match &self.payment {
            PaymentDetails::ManualCash { cash_collector } => Some(cash_collector),
            _ => None,
        }
    }
}
