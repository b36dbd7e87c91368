//! Request/response types for the HTTP API.
//!
//! Field names stay camelCase on the wire for compatibility with existing
//! board clients.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Role;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Expiration unix seconds.
    pub exp: i64,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub dev_mode: bool,
    pub auth_required: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskRequest {
    pub task_id: Uuid,
    pub target_column_id: Uuid,
    /// Accepted for client convenience but not required; the store's
    /// current column reference is authoritative.
    #[serde(default)]
    pub from_column_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub success: bool,
}
