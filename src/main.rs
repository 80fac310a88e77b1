//! Plain Routes 命令行入口
//!
//! 加载配置、查看宿主收集到的重写规则和查询参数，以及按路径驱动一次请求，用于调试路由。
//!
//! # 命令概览
//!
//! - `version` - 显示版本信息
//! - `check-config` - 验证配置文件
//! - `rules` - 查看重写规则表
//! - `query-vars` - 查看可识别的查询参数
//! - `dispatch` - 按路径处理一次请求
//!
//! # 使用示例
//!
//! ```bash
//! # 检查配置文件
//! plain-routes -c routes.yaml check-config
//!
//! # 查看重写规则
//! plain-routes -c routes.yaml rules
//!
//! # 处理一次请求并输出 JSON
//! plain-routes -c routes.yaml dispatch /stripe/ --json
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use plain_routes::{HostResponse, LogGuard, Logger, LoggerConfig, PlainRoutes, RouterSettings};

/// Plain Routes - 路由注册与分发适配器
#[derive(Parser)]
#[command(name = "plain-routes")]
#[command(version, about = "路由注册与分发适配器", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "plain-routes.yaml", global = true)]
    config: PathBuf,

    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 开发模式（显示文件名和行号）
    #[arg(long, global = true)]
    dev: bool,

    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 查看版本信息
    Version,

    /// 验证配置文件
    ///
    /// 解析并校验配置，显示声明的路由。
    CheckConfig,

    /// 查看重写规则表
    ///
    /// 按匹配顺序显示宿主收集到的全部规则。
    Rules,

    /// 查看可识别的查询参数
    QueryVars,

    /// 按路径处理一次请求
    Dispatch {
        /// 请求路径
        path: String,

        /// 以 JSON 输出完整响应
        #[arg(long)]
        json: bool,
    },
}

/// 加载配置文件，不存在时使用默认配置
async fn load_settings(path: &Path, dev_mode: bool) -> anyhow::Result<RouterSettings> {
    let mut settings = if path.exists() {
        RouterSettings::from_file(path)
            .await
            .with_context(|| format!("加载配置文件失败: {}", path.display()))?
    } else {
        RouterSettings::default()
    };

    if dev_mode {
        settings.dev_mode = true;
    }
    Ok(settings)
}

/// 初始化日志系统
fn init_logging(settings: &RouterSettings, level: Option<&str>) -> LogGuard {
    let mut config = LoggerConfig::from_log_config(&settings.logging);
    if let Some(level) = level {
        config.level = level.to_string();
    }
    if settings.dev_mode {
        config.show_file_line = true;
    }
    Logger::try_init(config)
}

/// 打印版本信息
fn print_version() {
    println!();
    println!("Plain Routes - 路由注册与分发适配器");
    println!("═══════════════════════════════════════");
    println!("  版本:     {}", plain_routes::VERSION);
    println!("  目标平台: {}", std::env::consts::ARCH);
    println!("  操作系统: {}", std::env::consts::OS);
    println!("═══════════════════════════════════════");
    println!();
}

/// 检查配置文件
fn check_config(path: &Path, settings: &RouterSettings) -> anyhow::Result<()> {
    println!("检查配置文件: {}", path.display());
    println!();

    if settings.config_path.is_none() {
        println!("⚠️  警告: 配置文件不存在，将使用默认配置");
        println!();
    }

    if let Err(e) = settings.validate() {
        println!("❌ 配置文件无效: {}", e);
        return Err(e.into());
    }

    println!("✅ 配置文件有效！");
    println!();
    println!("────────────────────────────────────────");
    println!("  [宿主配置]");
    println!("    重写前缀:   {}", settings.host.rewrite_prefix);
    println!("    基础规则数: {}", settings.host.base_rules.len());
    println!("    模板目录:   {:?}", settings.host.template_dirs);
    println!("    默认模板:   {}", settings.host.default_template);
    println!();
    println!("  [日志配置]");
    println!("    日志级别:   {}", settings.logging.level);
    println!("    文件输出:   {}", if settings.logging.file_output { "是" } else { "否" });
    println!("    JSON 格式:  {}", if settings.logging.json_format { "是" } else { "否" });
    println!();
    println!("  [路由] {} 条", settings.routes.len());
    for route in &settings.routes {
        println!(
            "    {}  rewrite={}  template={}  query_vars={:?}",
            route.pattern,
            route.rewrite.as_deref().unwrap_or("-"),
            route.template.as_deref().unwrap_or("-"),
            route.query_vars
        );
    }
    println!("────────────────────────────────────────");
    Ok(())
}

/// 显示重写规则表
async fn show_rules(routes: &PlainRoutes) -> anyhow::Result<()> {
    let rules = routes.rewrite_table().await?;

    println!();
    println!("重写规则 ({} 条，按匹配顺序)", rules.len());
    println!("═══════════════════════════════════════");
    for (index, rule) in rules.iter().enumerate() {
        println!("  {:>3}. {}  =>  {}", index + 1, rule.pattern, rule.target);
    }
    println!("═══════════════════════════════════════");
    Ok(())
}

/// 显示可识别的查询参数
async fn show_query_vars(routes: &PlainRoutes) -> anyhow::Result<()> {
    let vars = routes.query_vars().await?;
    println!("{}", vars.join(", "));
    Ok(())
}

/// 打印请求结果
fn print_response(response: &HostResponse) {
    println!();
    println!("请求结果");
    println!("────────────────────────────────────────");
    println!("  请求 ID:  {}", response.request_id);
    println!("  路径:     {}", response.path);
    println!("  状态码:   {}", response.status);
    println!("  匹配规则: {}", response.matched_rule.as_deref().unwrap_or("-"));
    println!("  查询参数: {}", response.query);
    println!("  标题:     {}", response.title.as_deref().unwrap_or("-"));
    println!("  模板:     {}", response.template.as_deref().unwrap_or("-"));
    println!("  终止于:   {}", response.halted_at.as_deref().unwrap_or("-"));
    println!("  接入路由: {:?}", response.engaged_routes);
    println!("  耗时:     {} µs", response.elapsed_us);
    println!("────────────────────────────────────────");
    if let Some(ref body) = response.body {
        println!("{}", body);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    let settings = load_settings(&cli.config, cli.dev).await?;

    if let Commands::CheckConfig = cli.command {
        return check_config(&cli.config, &settings);
    }

    let _guard = init_logging(&settings, cli.log_level.as_deref());
    info!(config = %cli.config.display(), routes = settings.routes.len(), "配置已加载");

    let routes = PlainRoutes::new(settings).await?;

    match cli.command {
        Commands::Rules => show_rules(&routes).await?,
        Commands::QueryVars => show_query_vars(&routes).await?,
        Commands::Dispatch { path, json } => {
            let response = routes.handle(&path).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
        }
        Commands::Version | Commands::CheckConfig => {}
    }

    Ok(())
}
