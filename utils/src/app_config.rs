use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::error::Result;

/// 未通过 `--config` 指定时查找的配置文件名
pub const CONFIG_FILE_NAME: &str = "config.json";

// 配置构建器在进程内共享，每次读取时重新构建，保证 set() 的覆盖立即可见
lazy_static! {
    static ref BUILDER: RwLock<ConfigBuilder<DefaultState>> = RwLock::new(Config::builder());
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别: debug, info, warn, error
    pub level: String,
    /// 日志目录，为空时使用可执行文件所在目录下的 logs/
    #[serde(default)]
    pub dir: String,
    /// 日志文件名
    pub file: String,
}

/// 应用配置
///
/// 顶层键与旧版 `config.json` 保持一致 (`sync_interval`, `sync_pairs`, `port`)，
/// 因此旧的 JSON 配置文件可以直接通过 `--config` 加载。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 同步间隔（秒）
    pub sync_interval: u64,
    /// 同步对，格式为 "source:dest"
    #[serde(default)]
    pub sync_pairs: Vec<String>,
    /// HTTP 监听端口，例如 ":8080"
    pub port: String,
    /// 外部镜像工具名称或路径
    pub mirror_tool: String,
    /// 镜像工具的基础参数
    pub mirror_args: Vec<String>,
    /// 每个任务保留的输出日志上限（字节），0 表示不限制
    pub output_limit: usize,
    pub log: LogConfig,
}

impl AppConfig {
    /// Initialize AppConfig from the embedded default configuration plus
    /// `DIRSYNC_` prefixed environment variables.
    pub fn init(default_config: Option<&str>) -> Result<()> {
        let mut builder = Config::builder();

        if let Some(contents) = default_config {
            builder = builder.add_source(File::from_str(contents, FileFormat::Toml));
        }

        *BUILDER.write()? = builder.add_source(environment());
        Ok(())
    }

    /// Merge a user supplied configuration file. The format is inferred from the extension.
    ///
    /// 环境变量在文件之后再次加入，优先级始终高于配置文件
    pub fn merge_config(config_file: Option<&Path>) -> Result<()> {
        if let Some(path) = config_file {
            let mut builder = BUILDER.write()?;
            *builder = builder
                .clone()
                .add_source(File::from(path))
                .add_source(environment());
        }
        Ok(())
    }

    /// Override a single key, e.g. `AppConfig::set("log.level", "debug")`.
    pub fn set(key: &str, value: &str) -> Result<()> {
        let mut builder = BUILDER.write()?;
        *builder = builder.clone().set_override(key, value)?;
        Ok(())
    }

    /// Get a single value by key.
    pub fn get<T>(key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let config = BUILDER.read()?.clone().build()?;
        Ok(config.get::<T>(key)?)
    }

    /// Fetch the whole configuration as an `AppConfig`.
    pub fn fetch() -> Result<AppConfig> {
        let config = BUILDER.read()?.clone().build()?;
        Ok(config.try_deserialize()?)
    }
}

/// Look for `config.json` in `dir`, then in its parent directory.
///
/// The directory holding the file found is the base directory for relative
/// `sync_pairs` paths.
pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
    [
        dir.join(CONFIG_FILE_NAME),
        dir.join("..").join(CONFIG_FILE_NAME),
    ]
    .into_iter()
    .find(|candidate| candidate.is_file())
}

// DIRSYNC_SYNC_INTERVAL=60, DIRSYNC_LOG__LEVEL=debug
fn environment() -> Environment {
    Environment::with_prefix("DIRSYNC")
        .prefix_separator("_")
        .separator("__")
}
