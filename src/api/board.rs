//! Board endpoints: fetch, move, toggle, and the movement-stats export.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::auth::AuthUser;
use super::routes::AppState;
use super::types::{MoveTaskRequest, ToggleResponse};
use crate::error::ApiError;
use crate::model::{BoardView, Role, Task, TaskEvent};

/// GET /api/board/default - the caller's board with columns, tasks, and
/// sub-tasks.
pub async fn get_board(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BoardView>, ApiError> {
    let board = if state.config.dev_mode {
        state.store.any_board().await
    } else {
        state.store.board_for_user(user.id).await
    };
    board
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Board".to_string()))
}

/// POST /api/tasks/move - move a task into a target column.
///
/// Any authenticated role may move a task; there is no role gate on this
/// operation. The response is the updated task snapshot.
pub async fn move_task(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
    Json(req): Json<MoveTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .transitions
        .move_task(req.task_id, req.target_column_id)
        .await?;
    Ok(Json(task))
}

/// POST /api/subtasks/:id/toggle - flip a sub-task's completion flag.
pub async fn toggle_subtask(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ToggleResponse>, ApiError> {
    state.transitions.toggle_subtask(id).await?;
    Ok(Json(ToggleResponse { success: true }))
}

/// GET /api/stats/export - movement history as CSV, newest first.
/// Admin only.
pub async fn export_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    if user.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Admin role required for stats export".to_string(),
        ));
    }

    let events = state.store.events_newest_first().await;
    let csv = render_events_csv(&events);
    Ok(([(header::CONTENT_TYPE, "text/csv")], csv))
}

fn render_events_csv(events: &[TaskEvent]) -> String {
    let mut out = String::from("Date,Task,TaskId,FromColumn,ToColumn\n");
    for event in events {
        let from = event
            .from_column_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "CREATION".to_string());
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            event.timestamp.to_rfc3339(),
            csv_escape(&event.task_content),
            event.task_id,
            from,
            event.to_column_id,
        ));
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
