//! HTTP control surface over the task registry.

mod handlers;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

use app::sync::TaskRegistry;
use utils::error::Result;

pub use handlers::{ActionResponse, ErrorResponse};

/// 构建路由，所有处理器共享同一个注册表
pub fn router(registry: Arc<TaskRegistry>) -> Router {
    Router::new()
        .route("/status", get(handlers::all_status))
        .route("/api/status", get(handlers::task_status))
        .route("/api/sync/now", post(handlers::sync_now))
        .route("/api/sync/trigger", post(handlers::trigger))
        .route("/api/sync/pause", post(handlers::pause))
        .route("/api/sync/resume", post(handlers::resume))
        .with_state(registry)
}

/// 将 ":8080" 或 "8080" 形式的端口补全为监听地址，完整地址保持不变
pub fn bind_addr(port: &str) -> String {
    let port = port.trim();
    if let Some(rest) = port.strip_prefix(':') {
        format!("0.0.0.0:{}", rest)
    } else if port.contains(':') {
        port.to_string()
    } else {
        format!("0.0.0.0:{}", port)
    }
}

/// 监听并处理请求，直到进程退出或监听失败
pub async fn serve(registry: Arc<TaskRegistry>, port: &str) -> Result<()> {
    let addr = bind_addr(port);
    let listener = TcpListener::bind(&addr).await?;

    log::info!("Starting server on {}", addr);
    axum::serve(listener, router(registry)).await?;

    Ok(())
}
