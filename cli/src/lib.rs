use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use utils::app_config::{find_config_file, AppConfig, CONFIG_FILE_NAME};

mod commands;

#[derive(Parser)]
#[command(name = "dirsync", version)]
#[command(about = "Keeps destination directories mirrored from their sources", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML, JSON or YAML), merged over the defaults.
    /// Without it, config.json is looked up in the current directory, then its parent
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Set the logging level (debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start every configured sync task and serve the HTTP control API
    Run {
        /// Listen port, e.g. ":8080" or "127.0.0.1:8080"
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Sync every configured pair once and exit
    Once,
}

pub async fn cli_match() -> utils::error::Result<()> {
    let cli = Cli::parse();

    // 配置优先级: 默认配置 < 配置文件 < 环境变量 < 命令行参数
    let config_file = cli
        .config
        .clone()
        .or_else(|| find_config_file(Path::new(".")));
    AppConfig::merge_config(config_file.as_deref())?;
    if let Some(level) = &cli.log_level {
        AppConfig::set("log.level", level)?;
    }
    if let Commands::Run { port: Some(port) } = &cli.command {
        AppConfig::set("port", port)?;
    }

    // Setup logging once the configuration layers are final
    let _guard = utils::logger::setup_logging()?;

    match &config_file {
        Some(path) => log::info!("Loaded configuration from {}", path.display()),
        None => log::warn!("No {} found in . or .., using defaults", CONFIG_FILE_NAME),
    }

    // 相对的同步路径以配置文件所在目录为基准
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default();

    match &cli.command {
        Commands::Run { .. } => commands::run_cmd(&base_dir).await?,
        Commands::Once => commands::once_cmd(&base_dir).await?,
    }

    Ok(())
}
