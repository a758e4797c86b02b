// ==========================================
// 表格批量导入引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,表名/列名仅来自模块内常量
// ==========================================

pub mod error;
pub mod import_batch_repo;
pub mod import_repo;
pub mod material_repo;
pub mod sim_card_repo;
pub mod subscription_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use import_batch_repo::{ImportBatchRepository, ImportBatchSummary};
pub use import_repo::ImportRepository;
pub use material_repo::MaterialRepositoryImpl;
pub use sim_card_repo::SimCardRepositoryImpl;
pub use subscription_repo::SubscriptionRepositoryImpl;
