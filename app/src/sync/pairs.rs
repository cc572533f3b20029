use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::registry::TaskRegistry;
use super::task::{SyncTask, TaskOptions};

/// 一个同步对：源目录与目标目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPair {
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// 解析 "source:dest" 格式的同步对，必须恰好是两个非空段
///
/// 两段按原样使用（不去除空白），任务ID与配置中的字符串保持一致；
/// 只包含空白的段视为空段。
pub fn parse_pair(pair: &str) -> Option<SyncPair> {
    let parts: Vec<&str> = pair.split(':').collect();

    match parts.as_slice() {
        [source, dest] if !source.trim().is_empty() && !dest.trim().is_empty() => Some(SyncPair {
            source: PathBuf::from(source),
            dest: PathBuf::from(dest),
        }),
        _ => None,
    }
}

/// 把同步对中的相对路径改写为相对于 `base`（配置文件所在目录）
///
/// `base` 为空或为当前目录时原样返回；格式错误的同步对保持不变，由
/// [`register_pairs`] 报告。
pub fn rebase_pairs(pairs: &[String], base: &Path) -> Vec<String> {
    if base.as_os_str().is_empty() || base == Path::new(".") {
        return pairs.to_vec();
    }

    let rebase = |path: PathBuf| {
        if path.is_relative() {
            base.join(path)
        } else {
            path
        }
    };

    pairs
        .iter()
        .map(|pair| match parse_pair(pair) {
            Some(SyncPair { source, dest }) => {
                let rebased = format!("{}:{}", rebase(source).display(), rebase(dest).display());
                log::debug!("Resolved sync pair {} as {}", pair, rebased);
                rebased
            }
            None => pair.clone(),
        })
        .collect()
}

/// 根据配置的同步对填充注册表，格式错误或重复的同步对记录警告后跳过
pub fn register_pairs(
    registry: &TaskRegistry, pairs: &[String], interval: Duration, options: &TaskOptions,
) -> Vec<Arc<SyncTask>> {
    let mut tasks = Vec::with_capacity(pairs.len());

    for pair in pairs {
        let Some(SyncPair { source, dest }) = parse_pair(pair) else {
            log::warn!("Invalid sync pair format: {}", pair);
            continue;
        };

        match registry.add_task(source, dest, interval, options.clone()) {
            Ok(task) => tasks.push(task),
            Err(e) => log::warn!("Skipping sync pair {}: {}", pair, e),
        }
    }

    tasks
}
