// ==========================================
// CSV 数据导入系统 - 命令行入口
// ==========================================
// 子命令:
// - init-db: 建库
// - stage:   上传文件并暂存，输出预览与冲突检测时间戳
// - commit:  按字段映射提交暂存作业，输出导入结果
// ==========================================

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use csv_record_importer::db::{ensure_schema, get_default_db_path, open_sqlite_connection};
use csv_record_importer::{
    i18n, logging, CommitRequest, DeclaredEncoding, ImportApi, ImportType, IssueImportOptions,
    StageRequest,
};
use serde::Serialize;
use std::path::PathBuf;

/// 问题 / 工时记录批量导入工具
#[derive(Parser)]
#[command(name = "csv-record-importer", version, about)]
struct Cli {
    /// 数据库文件路径（默认: 用户数据目录下的 importer.db）
    #[arg(long, global = true, env = "CSV_IMPORTER_DB_PATH")]
    db: Option<String>,

    /// 以 JSON 格式输出日志
    #[arg(long, global = true)]
    log_json: bool,

    /// 消息语言（en / zh-CN）
    #[arg(long, global = true, default_value = "en")]
    locale: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 建库（幂等）
    InitDb,

    /// 上传文件并暂存
    Stage {
        /// 待导入文件
        file: PathBuf,

        #[arg(long)]
        user: i64,

        /// 问题导入的目标项目
        #[arg(long)]
        project: Option<i64>,

        /// 导入类型: issue / time_entry
        #[arg(long = "type", value_parser = parse_import_type, default_value = "issue")]
        import_type: ImportType,

        /// 声明编码: U / L1 / L9
        #[arg(long, value_parser = parse_encoding, default_value = "U")]
        encoding: DeclaredEncoding,

        #[arg(long, default_value_t = ',')]
        separator: char,

        #[arg(long, default_value_t = '"')]
        quote: char,
    },

    /// 提交暂存作业
    Commit {
        #[arg(long)]
        user: i64,

        #[arg(long)]
        project: Option<i64>,

        /// 上传时返回的时间戳
        #[arg(long)]
        timestamp: String,

        /// 字段映射，形如 外部列名=内部字段键（可重复）
        #[arg(long = "map", value_parser = parse_mapping)]
        mappings: Vec<(String, String)>,

        #[command(flatten)]
        options: IssueOptionArgs,
    },
}

/// 问题导入选项
#[derive(Args)]
struct IssueOptionArgs {
    /// 按唯一字段更新已有问题
    #[arg(long)]
    update_issue: bool,

    /// 唯一字段所在的外部列名
    #[arg(long)]
    unique_field: Option<String>,

    /// 变更说明所在的外部列名
    #[arg(long)]
    journal_field: Option<String>,

    /// 允许更新其他项目的问题
    #[arg(long)]
    update_other_project: bool,

    /// 未匹配的行跳过而不是新建
    #[arg(long)]
    ignore_non_exist: bool,

    /// 未指定跟踪时使用的跟踪 id
    #[arg(long)]
    default_tracker: Option<i64>,
}

impl From<IssueOptionArgs> for IssueImportOptions {
    fn from(args: IssueOptionArgs) -> Self {
        Self {
            update_issue: args.update_issue,
            unique_field: args.unique_field,
            journal_field: args.journal_field,
            update_other_project: args.update_other_project,
            ignore_non_exist: args.ignore_non_exist,
            default_tracker: args.default_tracker,
        }
    }
}

fn parse_import_type(s: &str) -> Result<ImportType, String> {
    ImportType::from_str(s).ok_or_else(|| format!("unknown import type: {}", s))
}

fn parse_encoding(s: &str) -> Result<DeclaredEncoding, String> {
    DeclaredEncoding::from_str(s).ok_or_else(|| format!("unknown encoding: {}", s))
}

fn parse_mapping(s: &str) -> Result<(String, String), String> {
    let (external, internal) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected COLUMN=FIELD, got: {}", s))?;
    Ok((external.to_string(), internal.trim().to_string()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.log_json {
        logging::init_json();
    } else {
        logging::init();
    }
    i18n::set_locale(&cli.locale);

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    tracing::debug!(db_path = %db_path, version = csv_record_importer::VERSION, "使用数据库");

    match cli.command {
        Commands::InitDb => {
            let conn = open_sqlite_connection(&db_path)
                .with_context(|| format!("无法打开数据库: {}", db_path))?;
            ensure_schema(&conn)?;
            println!("{}", db_path);
        }
        Commands::Stage {
            file,
            user,
            project,
            import_type,
            encoding,
            separator,
            quote,
        } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("无法读取文件: {}", file.display()))?;
            let api = ImportApi::open(&db_path)?;
            let response = api.stage(StageRequest {
                user_id: user,
                project_id: project,
                import_type,
                data,
                encoding,
                quote_char: quote,
                column_separator: separator,
            })?;
            print_json(&response)?;
        }
        Commands::Commit {
            user,
            project,
            timestamp,
            mappings,
            options,
        } => {
            let api = ImportApi::open(&db_path)?;
            let response = api.commit(&CommitRequest {
                user_id: user,
                project_id: project,
                timestamp,
                options: options.into(),
                fields_map: mappings,
            })?;
            print_json(&response)?;
            if !response.is_committed() {
                return Err(anyhow!(response.errors.join("; ")));
            }
        }
    }

    Ok(())
}
