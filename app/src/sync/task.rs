use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use utils::app_config::AppConfig;

use super::error::Result;
use super::executor::{self, SyncOutcome};
use super::status::SyncStatus;

/// 每个任务输出日志的默认上限（字节）
pub const DEFAULT_OUTPUT_LIMIT: usize = 64 * 1024;

/// 执行策略相关的任务选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOptions {
    /// 镜像工具名称或路径，每次同步时在 PATH 中重新查找
    pub mirror_tool: String,
    /// 镜像工具的基础参数（源和目标路径会追加在最后）
    pub mirror_args: Vec<String>,
    /// 输出日志保留上限（字节），0 表示不限制
    pub output_limit: usize,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            mirror_tool: "rsync".to_string(),
            mirror_args: vec!["-avzP".to_string()],
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

impl From<&AppConfig> for TaskOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            mirror_tool: config.mirror_tool.clone(),
            mirror_args: config.mirror_args.clone(),
            output_limit: config.output_limit,
        }
    }
}

/// 任务的可变状态，由任务自己的读写锁保护
#[derive(Debug)]
struct TaskState {
    is_syncing: bool,
    paused: bool,
    last_sync: Option<DateTime<Utc>>,
    next_sync_time: DateTime<Utc>,
    output: String,
    last_error: String,
    /// 当前同步尝试的取消令牌，暂停时被取消
    cancel: CancellationToken,
}

/// 同步任务 - 一个 (源目录, 目标目录) 对的身份、状态与调度循环
///
/// 每个任务最多只有一个调度循环，因此同一时刻最多只有一次同步尝试。
pub struct SyncTask {
    id: String,
    source: PathBuf,
    dest: PathBuf,
    interval: Duration,
    options: TaskOptions,
    state: RwLock<TaskState>,
    /// 触发、暂停、恢复时唤醒调度循环
    wake: Notify,
    started: AtomicBool,
}

impl SyncTask {
    /// 创建任务，首次同步时间为当前时间（启动后立即执行）
    pub fn new(
        source: impl Into<PathBuf>, dest: impl Into<PathBuf>, interval: Duration, options: TaskOptions,
    ) -> Self {
        let source = source.into();
        let dest = dest.into();

        Self {
            id: Self::task_id(&source, &dest),
            source,
            dest,
            interval,
            options,
            state: RwLock::new(TaskState {
                is_syncing: false,
                paused: false,
                last_sync: None,
                next_sync_time: Utc::now(),
                output: String::new(),
                last_error: String::new(),
                cancel: CancellationToken::new(),
            }),
            wake: Notify::new(),
            started: AtomicBool::new(false),
        }
    }

    /// 任务ID: "source:dest"
    pub fn task_id(source: &Path, dest: &Path) -> String {
        format!("{}:{}", source.display(), dest.display())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source
    }

    pub fn dest_path(&self) -> &Path {
        &self.dest
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }

    /// 启动调度循环。重复调用不会创建第二个循环，返回 `None`。
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            log::warn!("[{}] Scheduling loop already running", self.id);
            return None;
        }

        log::info!(
            "[{}] Starting scheduling loop, interval {:?}",
            self.id,
            self.interval
        );
        let task = Arc::clone(self);
        Some(tokio::spawn(async move { task.run_loop().await }))
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            let (next_sync, paused) = {
                let state = self.state.read();
                (state.next_sync_time, state.paused)
            };

            if paused {
                log::debug!("[{}] Paused, waiting for resume or trigger", self.id);
                self.wake.notified().await;
                continue;
            }

            let wait = (next_sync - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            log::info!("[{}] Next sync in {:?}", self.id, wait);

            tokio::select! {
                biased;
                // 触发/暂停/恢复会改变调度，重新读取状态
                _ = self.wake.notified() => continue,
                _ = tokio::time::sleep(wait) => {}
            }

            if self.is_paused() {
                continue;
            }

            // 错误已记录在任务状态中，循环继续
            let _ = self.sync_now().await;

            self.reschedule(next_sync);
        }
    }

    /// 同步结束后推进下一次同步时间；同步期间收到的触发保持有效
    fn reschedule(&self, scheduled: DateTime<Utc>) {
        let mut state = self.state.write();
        if state.next_sync_time == scheduled {
            state.next_sync_time = time_after(self.interval);
        } else {
            log::info!("[{}] Sync was triggered while running, scheduling again", self.id);
        }
    }

    /// 执行一次同步尝试
    pub async fn sync_now(self: &Arc<Self>) -> Result<SyncOutcome> {
        executor::execute(self).await
    }

    /// 立即触发同步：下一次同步时间设为当前时间，并清除暂停标志
    pub fn trigger_sync(&self) {
        {
            let mut state = self.state.write();
            state.next_sync_time = Utc::now();
            state.paused = false;
        }
        log::info!("[{}] Sync triggered", self.id);
        self.wake.notify_one();
    }

    /// 暂停任务。正在运行的镜像工具会被取消，文件复制方式会运行到结束。
    pub fn pause_sync(&self) {
        {
            let mut state = self.state.write();
            state.paused = true;
            state.cancel.cancel();
            append_line(&mut state.output, "Sync paused", self.options.output_limit);
        }
        log::info!("[{}] Sync paused", self.id);
        self.wake.notify_one();
    }

    /// 恢复任务
    pub fn resume_sync(&self) {
        {
            let mut state = self.state.write();
            state.paused = false;
            append_line(&mut state.output, "Sync resumed", self.options.output_limit);
        }
        log::info!("[{}] Sync resumed", self.id);
        self.wake.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.state.read().paused
    }

    pub fn is_syncing(&self) -> bool {
        self.state.read().is_syncing
    }

    /// 在一次读锁内获取完整的状态快照
    pub fn get_status(&self) -> SyncStatus {
        let state = self.state.read();

        SyncStatus {
            id: self.id.clone(),
            source_path: self.source.to_string_lossy().into_owned(),
            destination_path: self.dest.to_string_lossy().into_owned(),
            is_syncing: state.is_syncing,
            paused: state.paused,
            last_sync: state.last_sync,
            next_sync_time: state.next_sync_time,
            output: state.output.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// 开始一次同步尝试。任务处于暂停状态时返回 `None` 且不修改任何状态，
    /// 否则标记为同步中、以本次的开始行替换旧的输出日志，并返回本次尝试的取消令牌。
    pub(crate) fn begin_attempt(&self) -> Option<CancellationToken> {
        let mut state = self.state.write();
        if state.paused {
            return None;
        }

        state.is_syncing = true;
        state.last_error.clear();
        state.cancel = CancellationToken::new();
        // 输出日志只保留最近一次尝试
        state.output.clear();
        let header = format!(
            "Starting sync from {} to {}",
            self.source.display(),
            self.dest.display()
        );
        append_line(&mut state.output, &header, self.options.output_limit);

        Some(state.cancel.clone())
    }

    pub(crate) fn append_output(&self, line: &str) {
        let mut state = self.state.write();
        append_line(&mut state.output, line, self.options.output_limit);
    }

    /// 成功结束：清除同步标志、记录同步时间
    pub(crate) fn finish_success(&self, note: &str) {
        let mut state = self.state.write();
        state.is_syncing = false;
        state.last_sync = Some(Utc::now());
        append_line(&mut state.output, note, self.options.output_limit);
    }

    /// 因暂停而中止：不算失败，也不记录同步时间
    pub(crate) fn finish_cancelled(&self, note: &str) {
        let mut state = self.state.write();
        state.is_syncing = false;
        append_line(&mut state.output, note, self.options.output_limit);
    }

    /// 统一的失败出口，任务回到可重试的空闲状态
    pub(crate) fn set_error(&self, message: &str) {
        let mut state = self.state.write();
        state.is_syncing = false;
        state.last_error = message.to_string();
        append_line(
            &mut state.output,
            &format!("Error: {}", message),
            self.options.output_limit,
        );
    }
}

impl std::fmt::Debug for SyncTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncTask")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("started", &self.is_started())
            .finish()
    }
}

fn time_after(interval: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(interval)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// 追加一行输出；设置了上限时从头部按整行丢弃旧内容
fn append_line(output: &mut String, line: &str, limit: usize) {
    output.push_str(line);
    output.push('\n');

    if limit == 0 || output.len() <= limit {
        return;
    }

    let mut cut = output.len() - limit;
    while !output.is_char_boundary(cut) {
        cut += 1;
    }
    // 截断点不在行首时推进到下一行开头，但至少保留最新的一行
    if output.as_bytes()[cut - 1] != b'\n' {
        if let Some(pos) = output[cut..].find('\n') {
            if cut + pos + 1 < output.len() {
                cut += pos + 1;
            }
        }
    }
    output.drain(..cut);
}
