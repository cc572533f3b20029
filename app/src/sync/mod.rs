//! 同步模块 - 周期性地把源目录镜像到目标目录，从不删除只存在于目标端的文件

mod copier;
mod error;
mod executor;
mod pairs;
mod registry;
mod status;
mod streamer;
mod task;

pub use copier::{copy_tree, CopyReport};
pub use error::{Result, SyncError};
pub use executor::{execute, select_strategy, FallbackCopyStrategy, MirrorToolStrategy, SyncOutcome, SyncStrategy};
pub use pairs::{parse_pair, rebase_pairs, register_pairs, SyncPair};
pub use registry::TaskRegistry;
pub use status::SyncStatus;
pub use streamer::{mirror_args, ProcessStreamer, StreamOutcome};
pub use task::{SyncTask, TaskOptions, DEFAULT_OUTPUT_LIMIT};
