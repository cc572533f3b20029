use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 任务状态快照，字段名是 HTTP 层的线上契约
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub id: String,
    pub source_path: String,
    pub destination_path: String,
    pub is_syncing: bool,
    pub paused: bool,
    /// 首次同步之前为 `None`（序列化为 `null`）
    pub last_sync: Option<DateTime<Utc>>,
    pub next_sync_time: DateTime<Utc>,
    pub output: String,
    pub last_error: String,
}
