//! ECGLINK管道运行器
//!
//! 由外部调度器（cron或systemd timer）每1-5分钟调用一次，每次调用
//! 执行一个阶段（或run-all顺序执行全部三个阶段）后退出。环境性故障
//! （共享或数据库不可达）不是程序缺陷，以退出码0结束，等待下次调度
//! 重试；只有配置错误等确定性故障返回非零退出码。

use clap::{Parser, Subcommand};
use ecglink_core::{EcgLinkConfig, Result};
use ecglink_database::{DatabasePool, DatabaseQueries};
use ecglink_importer::MetadataImporter;
use ecglink_logger::{DatabaseSink, SyncLogger, SystemClock};
use ecglink_matcher::ReportMatcher;
use ecglink_sync::{CopiedFileCache, MirrorSync};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// ECGLINK命令行参数
#[derive(Parser, Debug)]
#[command(name = "ecglink")]
#[command(about = "Pipeline de ingestao de exames de ECG")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 镜像远程共享上的新文件到本地暂存目录
    Sync,
    /// 导入暂存目录中的结构化元数据文件
    Import,
    /// 匹配并附加暂存目录中的报告文件
    #[command(name = "match")]
    MatchReports,
    /// 顺序执行 sync、import、match 三个阶段
    RunAll,
    /// 打印管道状态统计
    Status,
    /// 列出远程共享上匹配模式的文件（诊断）
    ListRemote,
    /// 清空已复制文件缓存（诊断）
    ClearCache,
    /// 测试数据库连通性（诊断）
    TestConnection,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(&args.log_level)
        .init();

    let config = EcgLinkConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Sync => with_pipeline(&config, |ctx| async move {
            run_sync(&ctx).await;
            Ok(())
        })
        .await,
        Command::Import => with_pipeline(&config, |ctx| async move {
            run_import(&ctx).await;
            Ok(())
        })
        .await,
        Command::MatchReports => with_pipeline(&config, |ctx| async move {
            run_match(&ctx).await;
            Ok(())
        })
        .await,
        Command::RunAll => with_pipeline(&config, |ctx| async move {
            run_sync(&ctx).await;
            run_import(&ctx).await;
            run_match(&ctx).await;
            Ok(())
        })
        .await,
        Command::Status => with_pipeline(&config, |ctx| async move {
            print_status(&ctx).await
        })
        .await,
        Command::ListRemote => list_remote(&config).await,
        Command::ClearCache => clear_cache(&config),
        Command::TestConnection => test_connection(&config).await,
    }
}

/// 一次管道调用共享的上下文
struct PipelineContext {
    config: EcgLinkConfig,
    pool: Arc<DatabasePool>,
    logger: Arc<SyncLogger>,
}

/// 建立数据库连接与日志器后执行阶段
///
/// 数据库不可达按环境性故障处理：警告后以成功退出，下次调度重试。
async fn with_pipeline<F, Fut>(config: &EcgLinkConfig, stage: F) -> Result<()>
where
    F: FnOnce(PipelineContext) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let pool = match DatabasePool::connect(&config.database).await {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            warn!("Banco de dados inacessivel, ciclo abortado: {}", e);
            return Ok(());
        }
    };

    // 建表是幂等的，每次调用执行
    DatabaseQueries::new(&pool).create_tables().await?;

    let sink = Arc::new(DatabaseSink::new(pool.clone(), &config.logger.log_dir));
    let logger = Arc::new(SyncLogger::new(
        sink,
        Arc::new(SystemClock),
        config.logger.clone(),
    ));

    stage(PipelineContext {
        config: config.clone(),
        pool,
        logger,
    })
    .await
}

/// 阶段一：镜像同步，元数据与报告两个共享目录
async fn run_sync(ctx: &PipelineContext) {
    let mirror = MirrorSync::new(ctx.logger.clone());
    let mut cache = CopiedFileCache::load(&ctx.config.staging.cache_file);

    let metadata = mirror
        .run(
            Path::new(&ctx.config.share.metadata_dir),
            Path::new(&ctx.config.staging.metadata_dir),
            &ctx.config.share.metadata_pattern,
            &mut cache,
        )
        .await;
    info!(
        "Sync de metadados: {} copiados, {} ignorados, {} falhas",
        metadata.copied, metadata.skipped, metadata.failed
    );

    let reports = mirror
        .run(
            Path::new(&ctx.config.share.report_dir),
            Path::new(&ctx.config.staging.report_dir),
            &ctx.config.share.report_pattern,
            &mut cache,
        )
        .await;
    info!(
        "Sync de laudos: {} copiados, {} ignorados, {} falhas",
        reports.copied, reports.skipped, reports.failed
    );
}

/// 阶段二：结构化元数据导入
async fn run_import(ctx: &PipelineContext) {
    let importer = MetadataImporter::new(ctx.logger.clone());
    let stats = importer
        .run(
            &ctx.pool,
            Path::new(&ctx.config.staging.metadata_dir),
            &ctx.config.share.metadata_pattern,
            &ctx.config.staging.processed_subdir,
        )
        .await;
    info!(
        "Importacao: {} importados, {} ignorados, {} falhas",
        stats.imported, stats.skipped, stats.failed
    );
}

/// 阶段三：报告附加匹配
async fn run_match(ctx: &PipelineContext) {
    let matcher = ReportMatcher::new(
        ctx.logger.clone(),
        ctx.config.matcher.clone(),
        &ctx.config.storage.reports_dir,
    );
    let stats = matcher
        .run(
            &ctx.pool,
            Path::new(&ctx.config.staging.report_dir),
            &ctx.config.share.report_pattern,
            &ctx.config.staging.processed_subdir,
        )
        .await;
    info!(
        "Correspondencia: {} anexados, {} ja processados, {} falhas",
        stats.attached, stats.already_attached, stats.failed
    );
}

/// status诊断命令
async fn print_status(ctx: &PipelineContext) -> Result<()> {
    let status = DatabaseQueries::new(&ctx.pool).pipeline_status().await?;

    println!("Pacientes:            {}", status.patients);
    println!("Medicos:              {}", status.doctors);
    println!("Exames ativos:        {}", status.exams);
    println!("Exames sem laudo:     {}", status.exams_awaiting_report);
    println!("Laudos:               {}", status.reports);
    println!("Erros de log hoje:    {}", status.log_errors_today);

    Ok(())
}

/// list-remote诊断命令，两个共享目录都列出
async fn list_remote(config: &EcgLinkConfig) -> Result<()> {
    for (label, dir, pattern) in [
        ("metadados", &config.share.metadata_dir, &config.share.metadata_pattern),
        ("laudos", &config.share.report_dir, &config.share.report_pattern),
    ] {
        println!("== {} ({}) ==", label, dir);
        match MirrorSync::list_remote_files(Path::new(dir), pattern).await {
            Ok(files) => {
                for f in &files {
                    println!("{:>12}  {}", f.size, f.name);
                }
                println!("{} arquivo(s)", files.len());
            }
            Err(e) => println!("inacessivel: {}", e),
        }
    }
    Ok(())
}

/// clear-cache诊断命令
fn clear_cache(config: &EcgLinkConfig) -> Result<()> {
    let mut cache = CopiedFileCache::load(&config.staging.cache_file);
    let before = cache.len();
    cache.clear()?;
    println!("Cache limpo ({} entrada(s) removida(s))", before);
    Ok(())
}

/// test-connection诊断命令
async fn test_connection(config: &EcgLinkConfig) -> Result<()> {
    let pool = DatabasePool::connect(&config.database).await?;
    pool.ping().await?;
    println!("Conexao com o banco de dados OK");
    Ok(())
}
