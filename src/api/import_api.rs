// ==========================================
// 表格批量导入引擎 - 导入 API
// ==========================================
// 职责: 按导入流分派管道 + 批次日志 + 模板导出 + 导入配置
// 连接: 所有仓储共享同一 SQLite 连接
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager};
use crate::db::open_and_init;
use crate::importer::{
    export_template, BatchLimitPolicy, CancelHandle, DecodeOptions, FlowKind, ImportFlow,
    ImportOptions, ImportPipeline, ImportPreview, ImportReport, MaterialsFlow, SimCardsFlow,
    SubscriptionsFlow, ValidationPolicy,
};
use crate::repository::{
    ImportBatchRepository, ImportBatchSummary, ImportRepository, MaterialRepositoryImpl,
    SimCardRepositoryImpl, SubscriptionRepositoryImpl,
};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
    config: ConfigManager,
    batches: ImportBatchRepository,
}

impl ImportApi {
    /// 打开数据库（必要时建表）
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_and_init(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("{}: {}", db_path, e)))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 使用已初始化 schema 的连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(conn.clone())?;
        let batches = ImportBatchRepository::new(conn.clone());
        Ok(Self {
            conn,
            config,
            batches,
        })
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    // ==========================================
    // 导入
    // ==========================================

    /// 导入文件（格式按扩展名判定）
    pub async fn import_file(
        &self,
        flow: FlowKind,
        file_path: &Path,
        decode: Option<DecodeOptions>,
        cancel: &CancelHandle,
    ) -> ApiResult<ImportReport> {
        let (bytes, decode) = read_input(file_path, decode)?;
        let file_name = file_path.file_name().map(|n| n.to_string_lossy().into_owned());
        self.import_bytes(flow, &bytes, &decode, file_name.as_deref(), cancel)
            .await
    }

    /// 导入内存中的文件内容；每个返回的报告都会记入批次日志
    #[instrument(skip(self, flow, bytes, decode, cancel), fields(flow = %flow))]
    pub async fn import_bytes(
        &self,
        flow: FlowKind,
        bytes: &[u8],
        decode: &DecodeOptions,
        file_name: Option<&str>,
        cancel: &CancelHandle,
    ) -> ApiResult<ImportReport> {
        let options = ImportOptions::load(&self.config).await?;
        info!(?options, "导入选项已加载");

        let report = match flow {
            FlowKind::Materials => {
                let repo = Arc::new(MaterialRepositoryImpl::from_connection(self.conn.clone()));
                ImportPipeline::new(MaterialsFlow, repo, options)
                    .run(bytes, decode, file_name, cancel)
                    .await?
            }
            FlowKind::SimCards => {
                let repo = Arc::new(SimCardRepositoryImpl::from_connection(self.conn.clone()));
                ImportPipeline::new(SimCardsFlow, repo, options)
                    .run(bytes, decode, file_name, cancel)
                    .await?
            }
            FlowKind::Subscriptions => {
                let repo = Arc::new(SubscriptionRepositoryImpl::from_connection(self.conn.clone()));
                ImportPipeline::new(SubscriptionsFlow, repo, options)
                    .run(bytes, decode, file_name, cancel)
                    .await?
            }
        };

        if let Err(e) = self.batches.record(&report) {
            // 数据已写入，批次日志失败不回滚
            warn!(batch_id = %report.batch_id, error = %e, "批次日志写入失败");
        }
        Ok(report)
    }

    /// 预览：校验 + 对账规划，不写入
    pub async fn preview_file(
        &self,
        flow: FlowKind,
        file_path: &Path,
        decode: Option<DecodeOptions>,
    ) -> ApiResult<ImportPreview> {
        let (bytes, decode) = read_input(file_path, decode)?;
        let options = ImportOptions::load(&self.config).await?;

        let preview = match flow {
            FlowKind::Materials => {
                let repo = Arc::new(MaterialRepositoryImpl::from_connection(self.conn.clone()));
                preview_with(MaterialsFlow, repo, options, &bytes, &decode).await?
            }
            FlowKind::SimCards => {
                let repo = Arc::new(SimCardRepositoryImpl::from_connection(self.conn.clone()));
                preview_with(SimCardsFlow, repo, options, &bytes, &decode).await?
            }
            FlowKind::Subscriptions => {
                let repo = Arc::new(SubscriptionRepositoryImpl::from_connection(self.conn.clone()));
                preview_with(SubscriptionsFlow, repo, options, &bytes, &decode).await?
            }
        };
        Ok(preview)
    }

    // ==========================================
    // 模板
    // ==========================================

    pub fn template(&self, flow: FlowKind, with_example: bool) -> ApiResult<Vec<u8>> {
        let bytes = match flow {
            FlowKind::Materials => export_template(&MaterialsFlow, with_example)?,
            FlowKind::SimCards => export_template(&SimCardsFlow, with_example)?,
            FlowKind::Subscriptions => export_template(&SubscriptionsFlow, with_example)?,
        };
        Ok(bytes)
    }

    // ==========================================
    // 批次日志
    // ==========================================

    pub fn recent_batches(&self, limit: usize) -> ApiResult<Vec<ImportBatchSummary>> {
        Ok(self.batches.recent(limit)?)
    }

    pub fn batch_report(&self, batch_id: &str) -> ApiResult<serde_json::Value> {
        self.batches
            .report_json(batch_id)?
            .ok_or_else(|| ApiError::NotFound(format!("import_batch(batch_id={})", batch_id)))
    }

    // ==========================================
    // 配置
    // ==========================================

    pub async fn current_options(&self) -> ApiResult<ImportOptions> {
        Ok(ImportOptions::load(&self.config).await?)
    }

    pub fn list_config(&self) -> ApiResult<BTreeMap<String, String>> {
        Ok(self.config.list_global_config()?)
    }

    /// 写入导入配置；仅接受已知键，值在写入前校验
    pub fn set_config(&self, key: &str, value: &str) -> ApiResult<()> {
        validate_config_value(key, value)?;
        self.config.set_config_value(key, value.trim())?;
        Ok(())
    }
}

async fn preview_with<F, R>(
    flow: F,
    repo: Arc<R>,
    options: ImportOptions,
    bytes: &[u8],
    decode: &DecodeOptions,
) -> ApiResult<ImportPreview>
where
    F: ImportFlow,
    R: ImportRepository<F::Payload>,
{
    Ok(ImportPipeline::new(flow, repo, options)
        .preview(bytes, decode)
        .await?)
}

fn read_input(file_path: &Path, decode: Option<DecodeOptions>) -> ApiResult<(Vec<u8>, DecodeOptions)> {
    let decode = match decode {
        Some(decode) => decode,
        None => DecodeOptions::for_path(file_path)?,
    };
    let bytes = std::fs::read(file_path)
        .map_err(|e| ApiError::FileUnreadable(format!("{}: {}", file_path.display(), e)))?;
    Ok((bytes, decode))
}

fn validate_config_value(key: &str, value: &str) -> ApiResult<()> {
    let value = value.trim();
    let invalid = || ApiError::InvalidInput(format!("{} 的值无效: {:?}", key, value));

    match key {
        config_keys::MAX_ROWS => match value.parse::<usize>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err(invalid()),
        },
        config_keys::MAX_IN_FLIGHT => match value.parse::<usize>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err(invalid()),
        },
        config_keys::VALIDATION_POLICY => value
            .parse::<ValidationPolicy>()
            .map(|_| ())
            .map_err(|_| invalid()),
        config_keys::BATCH_LIMIT_POLICY => value
            .parse::<BatchLimitPolicy>()
            .map(|_| ())
            .map_err(|_| invalid()),
        config_keys::EXECUTION_MODE => match value.to_ascii_uppercase().as_str() {
            "SEQUENTIAL" | "CONCURRENT" => Ok(()),
            _ => Err(invalid()),
        },
        other => Err(ApiError::InvalidInput(format!("未知配置项: {}", other))),
    }
}
