use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 单次同步尝试的错误分类
///
/// 所有错误都在任务边界被完全恢复：写入 `last_error` 与输出日志后，
/// 任务回到空闲、可重试的状态。
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Source path does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Error checking if source directory {} is empty: {source}", path.display())]
    EmptyCheckFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create destination directory {}: {source}", path.display())]
    DestinationCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to start {tool}: {source}")]
    ToolInvocationFailed {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// 工具非零退出或复制过程中的 I/O 错误，`output` 为诊断用的累计输出
    #[error("{message}")]
    ExecutionFailed { message: String, output: String },

    #[error("Sync task already registered: {0}")]
    DuplicateTask(String),
}

impl SyncError {
    pub(crate) fn execution(message: impl Into<String>) -> Self {
        SyncError::ExecutionFailed {
            message: message.into(),
            output: String::new(),
        }
    }

    /// Diagnostic output attached to an execution failure, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            SyncError::ExecutionFailed { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }
}

impl From<SyncError> for utils::error::Error {
    fn from(err: SyncError) -> Self {
        utils::error::Error::with_source("Sync failed", Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
