use slog::o;
use slog::Drain;
use slog::Level;
use slog::LevelFilter;
#[cfg(all(target_os = "linux", feature = "journald"))]
use slog_journald::JournaldDrain;
#[cfg(feature = "syslog")]
use slog_syslog::Facility;

use std::fs::OpenOptions;
use std::path::PathBuf;

use super::error::Result;
use crate::app_config::{AppConfig, LogConfig};

const DEFAULT_LOG_FILE: &str = "dirsync.log";

/// Install the slog backend and route the `log` facade into it.
///
/// Keep the returned guard alive for the lifetime of the process.
pub fn setup_logging() -> Result<slog_scope::GlobalLoggerGuard> {
    let log_config = AppConfig::get::<LogConfig>("log").ok();

    let guard = slog_scope::set_global_logger(default_root_logger(log_config.as_ref())?);
    slog_stdlog::init_with_level(to_log_level(slog_level(log_config.as_ref())))?;

    Ok(guard)
}

pub fn default_root_logger(log_config: Option<&LogConfig>) -> Result<slog::Logger> {
    let level = slog_level(log_config);

    // Terminal and file output; a drain that cannot be built degrades to discard
    let term_drain = default_term_drain().unwrap_or(default_discard()?);
    let file_drain = default_file_drain(log_config).unwrap_or(default_discard()?);
    let drain = slog::Duplicate(term_drain, file_drain).fuse();

    #[cfg(feature = "syslog")]
    let drain = slog::Duplicate(default_syslog_drain().unwrap_or(default_discard()?), drain).fuse();
    #[cfg(feature = "journald")]
    #[cfg(target_os = "linux")]
    let drain = slog::Duplicate(
        default_journald_drain().unwrap_or(default_discard()?),
        drain,
    )
    .fuse();

    let drain = LevelFilter::new(drain, level).fuse();

    Ok(slog::Logger::root(drain, o!("app" => "dirsync")))
}

/// 将配置中的日志级别字符串映射为 slog 级别，未知值回退到 info
pub fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "info" => Level::Info,
        "warn" | "warning" => Level::Warning,
        "error" => Level::Error,
        _ => Level::Info,
    }
}

fn slog_level(log_config: Option<&LogConfig>) -> Level {
    log_config
        .map(|c| parse_level(&c.level))
        .unwrap_or(Level::Info)
}

// slog 与 log 的级别枚举不同，这里做一次转换
fn to_log_level(level: Level) -> log::Level {
    match level {
        Level::Critical | Level::Error => log::Level::Error,
        Level::Warning => log::Level::Warn,
        Level::Info => log::Level::Info,
        Level::Debug => log::Level::Debug,
        Level::Trace => log::Level::Trace,
    }
}

fn default_discard() -> Result<slog_async::Async> {
    let drain = slog_async::Async::new(slog::Discard).chan_size(1024).build();

    Ok(drain)
}

// term drain: Log to Terminal
#[cfg(not(feature = "termlog"))]
fn default_term_drain() -> Result<slog_async::Async> {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stdout());
    let term = slog_term::FullFormat::new(plain)
        .use_file_location()
        .use_custom_timestamp(slog_term::timestamp_local);

    let drain = slog_async::Async::new(term.build().fuse())
        .chan_size(1024)
        .build();

    Ok(drain)
}

// term drain: colored output on the controlling terminal (stderr)
#[cfg(feature = "termlog")]
fn default_term_drain() -> Result<slog_async::Async> {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let term = slog_term::FullFormat::new(decorator)
        .use_file_location()
        .use_custom_timestamp(slog_term::timestamp_local);

    let drain = slog_async::Async::new(term.build().fuse())
        .chan_size(1024)
        .build();

    Ok(drain)
}

/// 解析日志目录：配置了 `log.dir` 时使用它，否则使用可执行文件旁的 logs/
pub fn resolve_log_dir(log_config: Option<&LogConfig>) -> Result<PathBuf> {
    if let Some(dir) = log_config.map(|c| c.dir.trim()).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let mut exe_dir = std::env::current_exe()?;
    exe_dir.pop();

    if !exe_dir.exists() {
        exe_dir = std::env::current_dir()?;
    }

    Ok(exe_dir.join("logs"))
}

// file drain: Log to file
fn default_file_drain(log_config: Option<&LogConfig>) -> Result<slog_async::Async> {
    let log_dir = resolve_log_dir(log_config)?;
    std::fs::create_dir_all(&log_dir)?;

    let file_name = log_config
        .map(|c| c.file.trim())
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_LOG_FILE);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(file_name))?;

    let decorator = slog_term::PlainSyncDecorator::new(file);
    let formatter = slog_term::FullFormat::new(decorator)
        .use_file_location()
        .use_custom_timestamp(slog_term::timestamp_local)
        .build()
        .fuse();

    let drain = slog_async::Async::new(formatter).chan_size(1024).build();

    Ok(drain)
}

// syslog drain: Log to syslog
#[cfg(feature = "syslog")]
fn default_syslog_drain() -> Result<slog_async::Async> {
    let syslog = slog_syslog::unix_3164(Facility::LOG_USER)?;

    let drain = slog_async::Async::new(syslog.fuse()).chan_size(1024).build();

    Ok(drain)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn default_journald_drain() -> Result<slog_async::Async> {
    let journald = JournaldDrain.ignore_res();
    let drain = slog_async::Async::new(journald).chan_size(1024).build();

    Ok(drain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_config(level: &str, dir: &str) -> LogConfig {
        LogConfig {
            level: level.to_string(),
            dir: dir.to_string(),
            file: "test.log".to_string(),
        }
    }

    #[test]
    fn test_term_drain_builds() {
        let logger = slog::Logger::root(default_term_drain().unwrap().fuse(), o!());
        slog::info!(logger, "term drain ready");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::Debug);
        assert_eq!(parse_level("WARN"), Level::Warning);
        assert_eq!(parse_level("error"), Level::Error);
        assert_eq!(parse_level("nonsense"), Level::Info);
    }

    #[test]
    fn test_level_conversion() {
        let config = log_config("warn", "");
        assert_eq!(to_log_level(slog_level(Some(&config))), log::Level::Warn);
        assert_eq!(to_log_level(slog_level(None)), log::Level::Info);
    }

    #[test]
    fn test_resolve_log_dir_prefers_config() {
        let config = log_config("info", "/var/log/dirsync");
        assert_eq!(
            resolve_log_dir(Some(&config)).unwrap(),
            PathBuf::from("/var/log/dirsync")
        );

        let default_dir = resolve_log_dir(Some(&log_config("info", "  "))).unwrap();
        assert!(default_dir.ends_with("logs"));
    }

    #[test]
    fn test_file_drain_creates_log_dir() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("nested/logs");
        let config = log_config("debug", &dir.to_string_lossy());

        let logger = default_root_logger(Some(&config)).unwrap();
        slog::info!(logger, "hello");

        assert!(dir.exists());
    }
}
