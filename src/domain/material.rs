// ==========================================
// 表格批量导入引擎 - 材料目录模型
// ==========================================
// 对齐: materials 表（自然键 code，软删除 deleted_at）
// ==========================================

use crate::domain::types::MaterialUnit;
use serde::{Deserialize, Serialize};

// ==========================================
// MaterialRecord - 材料写入载荷
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub code: String,             // 材料编码（自然键，区分大小写）
    pub name: String,             // 材料名称
    pub unit: MaterialUnit,       // 计量单位
    pub base_price: f64,          // 基础价格
    pub vat_rate: i64,            // 增值税率（%）
    pub category: Option<String>, // 分类
    pub is_active: bool,          // 是否在售
}
