// ==========================================
// 表格批量导入引擎 - 导入流定义
// ==========================================
// 每个导入流 = 表头配置 + 自然键 + 行规则 + 模板示例行
// 引擎其余部分对具体流无感知
// ==========================================

pub mod materials;
pub mod sim_cards;
pub mod subscriptions;

use crate::importer::error::ImportError;
use crate::importer::header_resolver::HeaderMap;
use crate::importer::row_validator::FieldCollector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use materials::MaterialsFlow;
pub use sim_cards::SimCardsFlow;
pub use subscriptions::SubscriptionsFlow;

// ==========================================
// ImportFlow Trait
// ==========================================
pub trait ImportFlow: Send + Sync {
    type Payload: Clone + fmt::Debug + Serialize + Send + Sync + 'static;

    fn kind(&self) -> FlowKind;

    fn header_map(&self) -> &'static HeaderMap;

    /// 自然键对应的标准字段名
    fn natural_key_field(&self) -> &'static str;

    fn natural_key<'p>(&self, payload: &'p Self::Payload) -> &'p str;

    /// 字段转换 + 跨字段规则
    ///
    /// 仅当已通过 `fields` 记录至少一条错误时才返回 None。
    fn coerce_row(&self, fields: &mut FieldCollector<'_>) -> Option<Self::Payload>;

    /// 模板示例行（字段名 → 示例文本）
    fn example_row(&self) -> &'static [(&'static str, &'static str)];
}

// ==========================================
// FlowKind - 导入流标识（CLI / 批次日志使用）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Materials,
    SimCards,
    Subscriptions,
}

impl FlowKind {
    pub const ALL: [FlowKind; 3] = [FlowKind::Materials, FlowKind::SimCards, FlowKind::Subscriptions];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Materials => "materials",
            FlowKind::SimCards => "sim_cards",
            FlowKind::Subscriptions => "subscriptions",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "materials" | "material" => Ok(FlowKind::Materials),
            "sim_cards" | "sim_card" | "sims" => Ok(FlowKind::SimCards),
            "subscriptions" | "subscription" => Ok(FlowKind::Subscriptions),
            _ => Err(ImportError::UnknownFlow(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_kind_parse() {
        assert_eq!("sim-cards".parse::<FlowKind>().unwrap(), FlowKind::SimCards);
        assert_eq!(" Materials ".parse::<FlowKind>().unwrap(), FlowKind::Materials);
        assert!(matches!(
            "invoices".parse::<FlowKind>(),
            Err(ImportError::UnknownFlow(_))
        ));
    }

    #[test]
    fn test_every_flow_declares_its_natural_key_field() {
        fn check<F: ImportFlow>(flow: &F) {
            let map = flow.header_map();
            let key = map
                .field(flow.natural_key_field())
                .expect("natural key field must be declared");
            assert!(key.required);
            for (field, _) in flow.example_row() {
                assert!(map.field(field).is_some(), "unknown example field {}", field);
            }
        }
        check(&MaterialsFlow);
        check(&SimCardsFlow);
        check(&SubscriptionsFlow);
    }
}
