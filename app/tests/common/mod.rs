#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use app::sync::TaskOptions;

/// 一个 PATH 中不存在的工具名，用于强制使用文件复制方式
pub const MISSING_TOOL: &str = "dirsync-test-no-such-mirror-tool";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 源目录: file1.txt="A", file2.txt="B", subdir/file3.txt="C"
pub fn create_source_tree(root: &Path) {
    fs::create_dir_all(root.join("subdir")).unwrap();
    fs::write(root.join("file1.txt"), "A").unwrap();
    fs::write(root.join("file2.txt"), "B").unwrap();
    fs::write(root.join("subdir/file3.txt"), "C").unwrap();
}

pub fn assert_mirrored(dest: &Path) {
    assert_eq!(fs::read_to_string(dest.join("file1.txt")).unwrap(), "A");
    assert_eq!(fs::read_to_string(dest.join("file2.txt")).unwrap(), "B");
    assert_eq!(fs::read_to_string(dest.join("subdir/file3.txt")).unwrap(), "C");
}

pub fn fallback_options() -> TaskOptions {
    TaskOptions {
        mirror_tool: MISSING_TOOL.to_string(),
        ..Default::default()
    }
}

/// 用 sh 模拟镜像工具，源和目标路径作为 $1 $2 传入
pub fn shell_tool_options(script: &str) -> TaskOptions {
    TaskOptions {
        mirror_tool: "sh".to_string(),
        mirror_args: vec!["-c".to_string(), script.to_string(), "mirror".to_string()],
        output_limit: 0,
    }
}

/// 轮询直到条件成立或超时
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}
