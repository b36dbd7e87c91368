//! Board entities and the wire shapes assembled from them.
//!
//! A task belongs to exactly one column at any instant; moving it is a
//! reassignment of `column_id`, never a copy. Sub-tasks live in their own
//! table keyed by id so the toggle path can address them directly;
//! attachment metadata and comments are carried inline on the task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// User role within a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// A registered user with notification preferences.
///
/// At most one channel is used per notification event: the chat webhook
/// wins over email when both are enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// SHA-256 hex digest of the password.
    pub password_digest: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub notify_slack: bool,
    #[serde(default)]
    pub slack_webhook: Option<String>,
    #[serde(default)]
    pub notify_email: bool,
}

impl User {
    /// Hex SHA-256 digest used for password storage and comparison.
    pub fn password_digest(password: &str) -> String {
        format!("{:x}", Sha256::digest(password.as_bytes()))
    }
}

/// A workspace groups boards and members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Membership link between a user and a workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMember {
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    pub title: String,
    pub workspace_id: Uuid,
}

/// An ordered column on a board. The title doubles as a semantic trigger:
/// titles containing "review" (case-insensitive) activate validator
/// notification on task entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub id: Uuid,
    pub title: String,
    pub order: u32,
    pub board_id: Uuid,
}

/// A work item. Color is stored verbatim; automation rules may write any
/// string into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub content: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub column_id: Uuid,
    #[serde(default)]
    pub validator_group_id: Option<Uuid>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

fn default_color() -> String {
    "default".to_string()
}

/// A checklist item under a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub id: Uuid,
    pub task_id: Uuid,
    pub content: String,
    pub completed: bool,
}

/// Attachment metadata. The upload pipeline that produces these is
/// external; the board only stores and serves the metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub filename: String,
    pub mimetype: String,
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Automation action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleAction {
    #[serde(rename = "CHANGE_COLOR")]
    ChangeColor,
    #[serde(rename = "SEND_WEBHOOK")]
    SendWebhook,
}

/// An automation rule: when a task enters `trigger_column_id`, apply
/// `action` with `value` (a color name or a destination URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: Uuid,
    pub trigger_column_id: Uuid,
    pub action: RuleAction,
    pub value: String,
}

/// A named set of users whose attention a task requires on reaching a
/// review stage. `member_ids` keeps the legacy encoding: a JSON array of
/// user ids serialized into a string field. It is parsed once per
/// dispatch into a fixed snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorGroup {
    pub id: Uuid,
    pub name: String,
    pub workspace_id: Uuid,
    pub member_ids: String,
}

impl ValidatorGroup {
    /// Parse the serialized member list. Malformed data yields an empty
    /// snapshot rather than an error; membership is advisory.
    pub fn member_snapshot(&self) -> Vec<Uuid> {
        serde_json::from_str(&self.member_ids).unwrap_or_default()
    }
}

/// Audit record of one task movement, kept for the stats export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub task_id: Uuid,
    pub task_content: String,
    pub from_column_id: Option<Uuid>,
    pub to_column_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Assembled views
// ─────────────────────────────────────────────────────────────────────────────

/// A full board as served to clients: columns in display order, each with
/// its tasks and their sub-tasks.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub id: Uuid,
    pub title: String,
    pub columns: Vec<ColumnView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnView {
    pub id: Uuid,
    pub title: String,
    pub order: u32,
    pub tasks: Vec<TaskView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub subtasks: Vec<SubTask>,
}
