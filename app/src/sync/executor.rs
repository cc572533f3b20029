use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::copier::copy_tree;
use super::error::{Result, SyncError};
use super::streamer::{mirror_args, ProcessStreamer, StreamOutcome};
use super::task::{SyncTask, TaskOptions};

/// 一次同步尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// 调用时任务处于暂停状态，未做任何操作
    Paused,
    /// 源目录为空，无需同步
    EmptySource,
    /// 镜像工具成功完成
    Mirrored,
    /// 文件复制方式完成
    Copied { files: usize },
    /// 同步过程中被暂停，镜像工具已被终止
    Cancelled,
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOutcome::Paused => write!(f, "paused, skipped"),
            SyncOutcome::EmptySource => write!(f, "source is empty, nothing to sync"),
            SyncOutcome::Mirrored => write!(f, "mirrored"),
            SyncOutcome::Copied { files } => write!(f, "copied {} files", files),
            SyncOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// 执行策略 - 镜像工具或文件复制
#[async_trait]
pub trait SyncStrategy: Send + Sync {
    /// 策略名称，用于日志
    fn name(&self) -> String;

    /// 在源和目标都已就绪后执行实际的同步
    async fn run(&self, task: &Arc<SyncTask>, cancel: CancellationToken) -> Result<SyncOutcome>;
}

/// 外部镜像工具策略，输出以流的方式写入任务日志
pub struct MirrorToolStrategy {
    program: PathBuf,
    base_args: Vec<String>,
}

impl MirrorToolStrategy {
    pub fn new(program: impl Into<PathBuf>, base_args: &[String]) -> Self {
        Self {
            program: program.into(),
            base_args: base_args.to_vec(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl SyncStrategy for MirrorToolStrategy {
    fn name(&self) -> String {
        self.program.display().to_string()
    }

    async fn run(&self, task: &Arc<SyncTask>, cancel: CancellationToken) -> Result<SyncOutcome> {
        let args = mirror_args(&self.base_args, task.source_path(), task.dest_path());
        let streamer = ProcessStreamer::new(&self.program, args);

        log::info!(
            "[{}] Running {} {:?}",
            task.id(),
            streamer.program().display(),
            streamer.args()
        );

        let sink = Arc::clone(task);
        let on_line = move |line: &str| {
            log::debug!("[{}] {}", sink.id(), line);
            sink.append_output(line);
        };

        match streamer.run(on_line, cancel).await? {
            StreamOutcome::Cancelled => {
                log::info!("[{}] Sync paused, mirror tool stopped", task.id());
                task.finish_cancelled("Sync paused, mirror tool stopped");
                Ok(SyncOutcome::Cancelled)
            }
            StreamOutcome::Exited { status, output } if !status.success() => {
                Err(SyncError::ExecutionFailed {
                    message: format!("{} error: {}", self.name(), status),
                    output,
                })
            }
            StreamOutcome::Exited { .. } => {
                log::info!("[{}] {} completed successfully", task.id(), self.name());
                task.finish_success("Sync completed successfully");
                Ok(SyncOutcome::Mirrored)
            }
        }
    }
}

/// 文件复制策略，在阻塞线程池中遍历目录树，不响应中途取消
pub struct FallbackCopyStrategy;

#[async_trait]
impl SyncStrategy for FallbackCopyStrategy {
    fn name(&self) -> String {
        "file copy".to_string()
    }

    async fn run(&self, task: &Arc<SyncTask>, _cancel: CancellationToken) -> Result<SyncOutcome> {
        let source = task.source_path().to_path_buf();
        let dest = task.dest_path().to_path_buf();
        let sink = Arc::clone(task);

        let note = format!(
            "{} command not found, falling back to file copy method",
            task.options().mirror_tool
        );
        log::warn!("[{}] {}", task.id(), note);
        task.append_output(&note);
        task.append_output(&format!(
            "Using file copy method for {} to {}",
            source.display(),
            dest.display()
        ));

        let report = tokio::task::spawn_blocking(move || {
            copy_tree(&source, &dest, |line| {
                log::debug!("[{}] {}", sink.id(), line);
                sink.append_output(line);
            })
        })
        .await
        .map_err(|e| SyncError::execution(format!("File copy task failed: {}", e)))??;

        log::info!(
            "[{}] Sync completed successfully. Copied {} files.",
            task.id(),
            report.files
        );
        task.finish_success(&format!("Completed: {} files copied", report.files));

        Ok(SyncOutcome::Copied {
            files: report.files,
        })
    }
}

/// 选择执行策略：在 PATH 中查找镜像工具（不缓存），找不到时回退到文件复制
pub fn select_strategy(options: &TaskOptions) -> Box<dyn SyncStrategy> {
    match which::which(&options.mirror_tool) {
        Ok(program) => Box::new(MirrorToolStrategy::new(program, &options.mirror_args)),
        Err(_) => Box::new(FallbackCopyStrategy),
    }
}

/// 执行一次同步尝试
///
/// 暂停状态下直接成功返回；否则依次检查源目录、空目录、目标目录，
/// 然后选择执行策略。任何失败都通过 `set_error` 记录到任务状态中。
pub async fn execute(task: &Arc<SyncTask>) -> Result<SyncOutcome> {
    let Some(cancel) = task.begin_attempt() else {
        log::debug!("[{}] Paused, skipping sync", task.id());
        return Ok(SyncOutcome::Paused);
    };

    log::info!(
        "[{}] Starting sync from {} to {}",
        task.id(),
        task.source_path().display(),
        task.dest_path().display()
    );

    match run_attempt(task, cancel).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            log::error!("[{}] {}", task.id(), e);
            if let Some(output) = e.output() {
                log::debug!("[{}] Tool output:\n{}", task.id(), output);
            }
            task.set_error(&e.to_string());
            Err(e)
        }
    }
}

async fn run_attempt(task: &Arc<SyncTask>, cancel: CancellationToken) -> Result<SyncOutcome> {
    let source = task.source_path();
    let dest = task.dest_path();

    // 其它 stat 错误交给空目录检查报告
    if let Ok(false) = tokio::fs::try_exists(source).await {
        return Err(SyncError::SourceMissing(source.to_path_buf()));
    }

    let empty = is_dir_empty(source)
        .await
        .map_err(|e| SyncError::EmptyCheckFailed {
            path: source.to_path_buf(),
            source: e,
        })?;

    if empty {
        log::info!(
            "[{}] Source directory {} is empty, nothing to sync",
            task.id(),
            source.display()
        );
        task.finish_success(&format!(
            "Source directory {} is empty, nothing to sync",
            source.display()
        ));
        return Ok(SyncOutcome::EmptySource);
    }

    if !tokio::fs::try_exists(dest).await.unwrap_or(false) {
        log::info!("[{}] Creating destination directory: {}", task.id(), dest.display());
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| SyncError::DestinationCreateFailed {
                path: dest.to_path_buf(),
                source: e,
            })?;
        task.append_output(&format!("Created destination directory: {}", dest.display()));
    }

    select_strategy(task.options()).run(task, cancel).await
}

async fn is_dir_empty(path: &Path) -> std::io::Result<bool> {
    let mut entries = tokio::fs::read_dir(path).await?;
    Ok(entries.next_entry().await?.is_none())
}
