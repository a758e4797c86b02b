// ==========================================
// 表格批量导入引擎 - 命令行入口
// ==========================================
// 子命令: import / preview / template / batches / report / config
// 数据库: --db 或环境变量 SHEET_IMPORT_DB_PATH，缺省为用户数据目录
// ==========================================

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sheet_import::api::ImportApi;
use sheet_import::db::{default_db_path, DB_PATH_ENV};
use sheet_import::importer::{CancelHandle, DecodeOptions, FlowKind, SheetFormat, SheetSelector};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "sheet-import", version, about = "表格批量导入与对账")]
struct Cli {
    /// SQLite 数据库路径
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<PathBuf>,

    /// JSON 格式日志与输出
    #[arg(long, global = true, default_value = "false")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct SheetArgs {
    /// 导入流: materials / sim_cards / subscriptions
    flow: FlowKind,

    /// 输入文件（.xlsx/.xls/.ods/.csv）
    file: PathBuf,

    /// 工作表名（缺省为第一个工作表）
    #[arg(long)]
    sheet: Option<String>,

    /// 强制按 CSV 解析（忽略扩展名）
    #[arg(long, default_value = "false")]
    csv: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 校验并写入
    Import(SheetArgs),
    /// 仅校验与对账规划，不写入
    Preview(SheetArgs),
    /// 导出空白模板
    Template {
        flow: FlowKind,
        /// 输出路径（缺省为 <flow>_template.xlsx）
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// 附带示例行
        #[arg(long, default_value = "false")]
        example: bool,
    },
    /// 最近的导入批次
    Batches {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// 某批次的完整报告
    Report { batch_id: String },
    /// 查看或修改导入配置
    Config {
        key: Option<String>,
        value: Option<String>,
    },
}

impl SheetArgs {
    fn decode_options(&self) -> Result<DecodeOptions> {
        let format = if self.csv {
            SheetFormat::Csv
        } else {
            SheetFormat::from_extension(&self.file)?
        };
        let sheet = match &self.sheet {
            Some(name) => SheetSelector::Named(name.clone()),
            None => SheetSelector::First,
        };
        Ok(DecodeOptions { format, sheet })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.json {
        sheet_import::logging::init_json();
    } else {
        sheet_import::logging::init();
    }

    let db_path = cli
        .db
        .clone()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(default_db_path);
    tracing::info!(version = sheet_import::VERSION, db = %db_path, "sheet-import 启动");

    let api = ImportApi::new(&db_path).with_context(|| format!("无法打开数据库 {}", db_path))?;

    match cli.command {
        Command::Import(args) => {
            let cancel = CancelHandle::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("收到中断信号，停止派发剩余行");
                    on_interrupt.cancel();
                }
            });

            let report = api
                .import_file(args.flow, &args.file, Some(args.decode_options()?), &cancel)
                .await
                .with_context(|| format!("导入失败: {}", args.file.display()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
        }
        Command::Preview(args) => {
            let preview = api
                .preview_file(args.flow, &args.file, Some(args.decode_options()?))
                .await
                .with_context(|| format!("预览失败: {}", args.file.display()))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&preview)?);
            } else {
                println!(
                    "[{}] 校验 {} 行, 有效 {}, 待更新 {}, 待新增 {}, 被覆盖 {}",
                    preview.flow,
                    preview.rows_seen,
                    preview.valid_rows,
                    preview.to_update,
                    preview.to_insert,
                    preview.superseded.len()
                );
                for err in &preview.batch_errors {
                    println!("  ! {}", err);
                }
                for err in &preview.field_errors {
                    println!("  行 {}: {} {}", err.row_number, err.field, err.code);
                }
                if !preview.unmatched_headers.is_empty() {
                    println!("  未识别的列: {}", preview.unmatched_headers.join(", "));
                }
            }
        }
        Command::Template {
            flow,
            output,
            example,
        } => {
            let bytes = api.template(flow, example)?;
            let output =
                output.unwrap_or_else(|| PathBuf::from(format!("{}_template.xlsx", flow.as_str())));
            write_file(&output, &bytes)?;
            println!("{}", output.display());
        }
        Command::Batches { limit } => {
            let batches = api.recent_batches(limit)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&batches)?);
            } else {
                for b in batches {
                    println!(
                        "{}  {}  {:<13}  新增 {:>4}  更新 {:>4}  失败 {:>4}  拒绝 {:>4}{}{}",
                        b.imported_at,
                        b.batch_id,
                        b.flow,
                        b.created_count,
                        b.updated_count,
                        b.failed_count,
                        b.rejected_rows,
                        if b.blocked { "  [阻断]" } else { "" },
                        if b.partial { "  [部分]" } else { "" },
                    );
                }
            }
        }
        Command::Report { batch_id } => {
            let report = api.batch_report(&batch_id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Config { key, value } => match (key, value) {
            (Some(key), Some(value)) => {
                api.set_config(&key, &value)?;
                println!("{} = {}", key, value.trim());
            }
            (Some(key), None) => {
                let value = api.config().get_global_config_value(&key)?;
                println!("{} = {}", key, value.as_deref().unwrap_or("(默认)"));
            }
            _ => {
                let options = api.current_options().await?;
                println!("{}", serde_json::to_string_pretty(&options)?);
                for (key, value) in api.list_config()? {
                    println!("{} = {}", key, value);
                }
            }
        },
    }

    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("无法写入 {}", path.display()))
}
