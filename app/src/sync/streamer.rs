//! Process streamer: runs the external mirroring tool, drains stdout and
//! stderr concurrently into the task output and stops the tool when the
//! attempt is cancelled.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::{Result, SyncError};

/// stderr 行在输出日志中的前缀
pub const STDERR_PREFIX: &str = "ERROR: ";

/// 镜像工具进程的结束方式
#[derive(Debug)]
pub enum StreamOutcome {
    /// 两个输出流都已读完且进程已退出，`output` 为本次累计的输出
    Exited { status: ExitStatus, output: String },
    /// 收到取消信号，进程已被强制终止
    Cancelled,
}

/// Build the tool arguments for one mirror run.
///
/// Any configured `--delete*` flag is dropped: files that exist only at the
/// destination must never be removed. The source gets a trailing slash so the
/// tool copies the directory contents rather than the directory itself.
pub fn mirror_args(base_args: &[String], source: &Path, dest: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = base_args
        .iter()
        .filter(|arg| {
            let deletes = arg.starts_with("--delete") || arg.as_str() == "--del";
            if deletes {
                log::warn!("Ignoring mirror tool argument {}: destination files are never deleted", arg);
            }
            !deletes
        })
        .map(OsString::from)
        .collect();

    let mut source_arg = source.as_os_str().to_owned();
    if !source_arg.to_string_lossy().ends_with('/') {
        source_arg.push("/");
    }

    args.push(source_arg);
    args.push(dest.as_os_str().to_owned());
    args
}

/// A spawned-and-streamed invocation of the mirroring tool.
pub struct ProcessStreamer {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessStreamer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Spawn the tool and stream its output until it exits or `cancel` fires.
    ///
    /// `on_line` is called for every stdout line and for every stderr line
    /// (prefixed with [`STDERR_PREFIX`]), from the reader tasks, as the lines
    /// arrive.
    pub async fn run<F>(&self, on_line: F, cancel: CancellationToken) -> Result<StreamOutcome>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let tool = self.program.display().to_string();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SyncError::ToolInvocationFailed {
                tool: tool.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| pipe_missing(&tool, "stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| pipe_missing(&tool, "stderr"))?;

        let on_line: Arc<dyn Fn(&str) + Send + Sync> = Arc::new(on_line);
        let stdout_reader = spawn_reader(stdout, "", on_line.clone());
        let stderr_reader = spawn_reader(stderr, STDERR_PREFIX, on_line);

        let readers = async move {
            let (out, err) = tokio::join!(stdout_reader, stderr_reader);
            (out.unwrap_or_default(), err.unwrap_or_default())
        };

        let (out, err) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::info!("Stopping {} (pid {:?}) on cancellation", tool, child.id());
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill {}: {}", tool, e);
                }
                return Ok(StreamOutcome::Cancelled);
            }
            transcripts = readers => transcripts,
        };

        let output = out + &err;
        let status = child.wait().await.map_err(|e| SyncError::ExecutionFailed {
            message: format!("Failed waiting for {}: {}", tool, e),
            output: output.clone(),
        })?;

        Ok(StreamOutcome::Exited { status, output })
    }
}

fn pipe_missing(tool: &str, stream: &str) -> SyncError {
    SyncError::ToolInvocationFailed {
        tool: tool.to_string(),
        source: std::io::Error::other(format!("{} pipe was not captured", stream)),
    }
}

// 按字节读取到换行，非 UTF-8 输出按有损方式转换，避免读取中断导致子进程阻塞在满管道上
fn spawn_reader<R>(
    reader: R, prefix: &'static str, on_line: Arc<dyn Fn(&str) + Send + Sync>,
) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut transcript = String::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let raw = String::from_utf8_lossy(&buf);
                    let line = format!("{}{}", prefix, raw.trim_end_matches(['\n', '\r']));
                    on_line(&line);
                    transcript.push_str(&line);
                    transcript.push('\n');
                }
                Err(e) => {
                    log::warn!("Failed reading tool output: {}", e);
                    break;
                }
            }
        }

        transcript
    })
}
