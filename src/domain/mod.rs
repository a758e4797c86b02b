// ==========================================
// 表格批量导入引擎 - 领域模型层
// ==========================================
// 职责: 定义导入管道数据结构与各导入流的写入载荷
// 红线: 不含数据访问逻辑,不含解析逻辑
// ==========================================

pub mod import;
pub mod material;
pub mod sim_card;
pub mod subscription;
pub mod types;

// 重导出核心类型
pub use import::{
    BatchError, CellValue, ExistingRecord, FieldError, FieldErrorCode, ImportOutcome, RawRow,
    RowError, ValidatedRow,
};
pub use material::MaterialRecord;
pub use sim_card::SimCardRecord;
pub use subscription::{PaymentDetails, SubscriptionRecord};
pub use types::{MaterialUnit, SimOperator, SimStatus, SubscriptionType};
