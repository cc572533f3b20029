use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::error::{Result, SyncError};
use super::status::SyncStatus;
use super::task::{SyncTask, TaskOptions};

/// 任务注册表 - 按插入顺序保存所有同步任务
///
/// 启动后只追加不删除。注册表的锁只在定位任务时持有，
/// 调用任务自身的加锁方法之前已经释放，两把锁从不嵌套。
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<Vec<Arc<SyncTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加任务（不会启动调度循环），重复的 "source:dest" 会被拒绝
    pub fn add_task(
        &self, source: impl Into<PathBuf>, dest: impl Into<PathBuf>, interval: Duration,
        options: TaskOptions,
    ) -> Result<Arc<SyncTask>> {
        let task = Arc::new(SyncTask::new(source, dest, interval, options));

        let mut tasks = self.tasks.write();
        if tasks.iter().any(|t| t.id() == task.id()) {
            return Err(SyncError::DuplicateTask(task.id().to_string()));
        }
        tasks.push(Arc::clone(&task));

        log::info!("[{}] Registered sync task", task.id());
        Ok(task)
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// 当前所有任务的句柄（插入顺序）
    pub fn tasks(&self) -> Vec<Arc<SyncTask>> {
        self.tasks.read().clone()
    }

    /// 为每个任务启动一次调度循环，返回本次新启动的数量
    pub fn start_all(&self) -> usize {
        self.tasks()
            .iter()
            .filter_map(|task| task.start())
            .count()
    }

    /// 所有任务的状态快照，按插入顺序
    pub fn get_all_status(&self) -> Vec<SyncStatus> {
        self.tasks().iter().map(|task| task.get_status()).collect()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<SyncTask>> {
        self.tasks.read().iter().find(|task| task.id() == id).cloned()
    }

    pub fn status_by_id(&self, id: &str) -> Option<SyncStatus> {
        self.get_by_id(id).map(|task| task.get_status())
    }

    pub fn trigger_all(&self) {
        log::info!("Manual sync triggered for all tasks");
        for task in self.tasks() {
            task.trigger_sync();
        }
    }

    pub fn trigger_by_id(&self, id: &str) -> bool {
        self.with_task(id, |task| task.trigger_sync())
    }

    pub fn pause_by_id(&self, id: &str) -> bool {
        self.with_task(id, |task| task.pause_sync())
    }

    pub fn resume_by_id(&self, id: &str) -> bool {
        self.with_task(id, |task| task.resume_sync())
    }

    fn with_task<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&SyncTask),
    {
        match self.get_by_id(id) {
            Some(task) => {
                f(&task);
                true
            }
            None => {
                log::warn!("Sync task not found: {}", id);
                false
            }
        }
    }
}
