use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use app::sync::{SyncStatus, TaskRegistry};

type SharedRegistry = State<Arc<TaskRegistry>>;

#[derive(Debug, Deserialize)]
pub(crate) struct TaskQuery {
    id: String,
}

/// 操作类接口的响应体
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

fn not_found(id: &str) -> Response {
    log::warn!("Unknown sync task requested: {}", id);
    let body = ErrorResponse {
        success: false,
        error: format!("No sync task with id {}", id),
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

pub(crate) async fn all_status(State(registry): SharedRegistry) -> Json<Vec<SyncStatus>> {
    Json(registry.get_all_status())
}

pub(crate) async fn task_status(
    State(registry): SharedRegistry, Query(query): Query<TaskQuery>,
) -> Response {
    match registry.status_by_id(&query.id) {
        Some(status) => Json(status).into_response(),
        None => not_found(&query.id),
    }
}

pub(crate) async fn sync_now(State(registry): SharedRegistry) -> Json<ActionResponse> {
    log::info!("Manual sync requested for all tasks");
    registry.trigger_all();
    ActionResponse::ok("Sync triggered")
}

pub(crate) async fn trigger(
    State(registry): SharedRegistry, Query(query): Query<TaskQuery>,
) -> Response {
    if registry.trigger_by_id(&query.id) {
        ActionResponse::ok("Sync triggered").into_response()
    } else {
        not_found(&query.id)
    }
}

pub(crate) async fn pause(
    State(registry): SharedRegistry, Query(query): Query<TaskQuery>,
) -> Response {
    if registry.pause_by_id(&query.id) {
        ActionResponse::ok("Sync paused").into_response()
    } else {
        not_found(&query.id)
    }
}

pub(crate) async fn resume(
    State(registry): SharedRegistry, Query(query): Query<TaskQuery>,
) -> Response {
    if registry.resume_by_id(&query.id) {
        ActionResponse::ok("Sync resumed").into_response()
    } else {
        not_found(&query.id)
    }
}
