//! Board store: in-memory state with JSON-file persistence.
//!
//! All entities live in one `BoardData` document guarded by a `RwLock`.
//! Every mutating operation holds the write lock for the duration of its
//! change, which gives the single-row atomicity the transition pipeline
//! relies on (a column reassignment or a completion flip is one critical
//! section). Concurrent moves of the same task race here and the last
//! write wins.
//!
//! The file is written back after each mutation; a write failure is
//! logged, not surfaced, since the in-memory state is authoritative for
//! the running process.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{
    Board, BoardView, Column, ColumnView, Role, Rule, RuleAction, SubTask, Task, TaskEvent,
    TaskView, User, ValidatorGroup, Workspace, WorkspaceMember,
};

/// Everything the board server persists.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BoardData {
    #[serde(default)]
    pub users: HashMap<Uuid, User>,
    #[serde(default)]
    pub workspaces: HashMap<Uuid, Workspace>,
    #[serde(default)]
    pub members: Vec<WorkspaceMember>,
    #[serde(default)]
    pub boards: HashMap<Uuid, Board>,
    #[serde(default)]
    pub columns: HashMap<Uuid, Column>,
    #[serde(default)]
    pub tasks: HashMap<Uuid, Task>,
    #[serde(default)]
    pub subtasks: HashMap<Uuid, SubTask>,
    /// Rules keep their authored listing order; matching preserves it.
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub groups: HashMap<Uuid, ValidatorGroup>,
    #[serde(default)]
    pub events: Vec<TaskEvent>,
}

/// Shared store handle.
#[derive(Debug)]
pub struct BoardStore {
    data: RwLock<BoardData>,
    storage_path: PathBuf,
}

impl BoardStore {
    /// Open the store at `storage_path`, seeding a default workspace and
    /// board when no data file exists yet.
    pub fn open(storage_path: PathBuf) -> Result<Self, std::io::Error> {
        let data = if storage_path.exists() {
            let contents = std::fs::read_to_string(&storage_path)?;
            serde_json::from_str(&contents)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
        } else {
            tracing::info!(
                "No data file at {}, seeding default board",
                storage_path.display()
            );
            seed_data()
        };

        Ok(Self {
            data: RwLock::new(data),
            storage_path,
        })
    }

    async fn save_to_disk(&self) {
        let data = self.data.read().await;
        let result = serde_json::to_string_pretty(&*data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            .and_then(|contents| {
                if let Some(parent) = self.storage_path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                std::fs::write(&self.storage_path, contents)
            });
        if let Err(e) = result {
            tracing::error!("Failed to save board data to disk: {}", e);
        }
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub async fn task(&self, id: Uuid) -> Option<Task> {
        self.data.read().await.tasks.get(&id).cloned()
    }

    pub async fn column(&self, id: Uuid) -> Option<Column> {
        self.data.read().await.columns.get(&id).cloned()
    }

    pub async fn subtask(&self, id: Uuid) -> Option<SubTask> {
        self.data.read().await.subtasks.get(&id).cloned()
    }

    pub async fn group(&self, id: Uuid) -> Option<ValidatorGroup> {
        self.data.read().await.groups.get(&id).cloned()
    }

    pub async fn user(&self, id: Uuid) -> Option<User> {
        self.data.read().await.users.get(&id).cloned()
    }

    pub async fn user_by_email(&self, email: &str) -> Option<User> {
        let data = self.data.read().await;
        data.users.values().find(|u| u.email == email).cloned()
    }

    /// Resolve users in the given order, silently skipping ids no longer
    /// present in the store.
    pub async fn users_in_order(&self, ids: &[Uuid]) -> Vec<User> {
        let data = self.data.read().await;
        ids.iter()
            .filter_map(|id| data.users.get(id).cloned())
            .collect()
    }

    /// All rules triggered by the given column, in authored listing order.
    pub async fn rules_for_trigger(&self, column_id: Uuid) -> Vec<Rule> {
        let data = self.data.read().await;
        data.rules
            .iter()
            .filter(|r| r.trigger_column_id == column_id)
            .cloned()
            .collect()
    }

    /// Movement events, newest first.
    pub async fn events_newest_first(&self) -> Vec<TaskEvent> {
        let mut events = self.data.read().await.events.clone();
        events.reverse();
        events
    }

    /// Assemble the caller's board: first workspace membership, first
    /// board in that workspace, columns in display order with tasks and
    /// sub-tasks attached.
    pub async fn board_for_user(&self, user_id: Uuid) -> Option<BoardView> {
        let data = self.data.read().await;
        let membership = data.members.iter().find(|m| m.user_id == user_id)?;
        let board = data
            .boards
            .values()
            .find(|b| b.workspace_id == membership.workspace_id)?;
        Some(assemble_board(&data, board))
    }

    /// First board in the store, regardless of membership. Serves the
    /// synthetic identity when auth is disabled.
    pub async fn any_board(&self) -> Option<BoardView> {
        let data = self.data.read().await;
        let board = data.boards.values().next()?;
        Some(assemble_board(&data, board))
    }

    // ── Writes ──────────────────────────────────────────────────────────

    /// Reassign a task's column reference and record the movement event.
    /// Returns the updated task snapshot, or `None` if the task is absent.
    /// The caller is responsible for checking the target column exists.
    pub async fn reassign_task_column(&self, task_id: Uuid, target: Uuid) -> Option<Task> {
        let snapshot = {
            let mut data = self.data.write().await;
            let task = data.tasks.get_mut(&task_id)?;
            let from = task.column_id;
            task.column_id = target;
            let snapshot = task.clone();
            data.events.push(TaskEvent {
                task_id,
                task_content: snapshot.content.clone(),
                from_column_id: Some(from),
                to_column_id: target,
                timestamp: Utc::now(),
            });
            snapshot
        };
        self.save_to_disk().await;
        Some(snapshot)
    }

    /// Overwrite a task's color. Any string is accepted and stored
    /// verbatim. Returns false if the task is absent.
    pub async fn set_task_color(&self, task_id: Uuid, color: &str) -> bool {
        let applied = {
            let mut data = self.data.write().await;
            match data.tasks.get_mut(&task_id) {
                Some(task) => {
                    task.color = color.to_string();
                    true
                }
                None => false,
            }
        };
        if applied {
            self.save_to_disk().await;
        }
        applied
    }

    /// Flip a sub-task's completion flag, returning the updated record.
    pub async fn toggle_subtask(&self, id: Uuid) -> Option<SubTask> {
        let updated = {
            let mut data = self.data.write().await;
            let subtask = data.subtasks.get_mut(&id)?;
            subtask.completed = !subtask.completed;
            subtask.clone()
        };
        self.save_to_disk().await;
        Some(updated)
    }

    // ── Test / seed plumbing ────────────────────────────────────────────

    /// Insert entities directly. Used by seeding and tests; authoring
    /// endpoints for boards and rules live outside this service.
    pub async fn insert(&self, f: impl FnOnce(&mut BoardData)) {
        {
            let mut data = self.data.write().await;
            f(&mut data);
        }
        self.save_to_disk().await;
    }
}

fn assemble_board(data: &BoardData, board: &Board) -> BoardView {
    let mut columns: Vec<&Column> = data
        .columns
        .values()
        .filter(|c| c.board_id == board.id)
        .collect();
    columns.sort_by_key(|c| c.order);

    let column_views = columns
        .into_iter()
        .map(|col| {
            let tasks = data
                .tasks
                .values()
                .filter(|t| t.column_id == col.id)
                .map(|t| TaskView {
                    task: t.clone(),
                    subtasks: data
                        .subtasks
                        .values()
                        .filter(|s| s.task_id == t.id)
                        .cloned()
                        .collect(),
                })
                .collect();
            ColumnView {
                id: col.id,
                title: col.title.clone(),
                order: col.order,
                tasks,
            }
        })
        .collect();

    BoardView {
        id: board.id,
        title: board.title.clone(),
        columns: column_views,
    }
}

/// Default dataset for a fresh install: an admin with a chat webhook, a
/// manager notified by email, one workspace with a three-column board,
/// a validation committee and one task bound to it.
fn seed_data() -> BoardData {
    let mut data = BoardData::default();

    let admin = User {
        id: Uuid::new_v4(),
        name: "Admin System".to_string(),
        email: "admin@taskdeck.io".to_string(),
        password_digest: User::password_digest("password123"),
        role: Role::Admin,
        notify_slack: true,
        slack_webhook: Some("https://hooks.slack.com/services/XXX".to_string()),
        notify_email: false,
    };
    let manager = User {
        id: Uuid::new_v4(),
        name: "Project Manager".to_string(),
        email: "manager@taskdeck.io".to_string(),
        password_digest: User::password_digest("password123"),
        role: Role::User,
        notify_slack: false,
        slack_webhook: None,
        notify_email: true,
    };

    let workspace = Workspace {
        id: Uuid::new_v4(),
        name: "Taskdeck HQ".to_string(),
        slug: "taskdeck-hq".to_string(),
    };
    data.members.push(WorkspaceMember {
        user_id: admin.id,
        workspace_id: workspace.id,
        role: Role::Admin,
    });
    data.members.push(WorkspaceMember {
        user_id: manager.id,
        workspace_id: workspace.id,
        role: Role::User,
    });

    let group = ValidatorGroup {
        id: Uuid::new_v4(),
        name: "Validation Committee".to_string(),
        workspace_id: workspace.id,
        member_ids: serde_json::to_string(&vec![admin.id, manager.id])
            .unwrap_or_else(|_| "[]".to_string()),
    };

    let board = Board {
        id: Uuid::new_v4(),
        title: "Q1 Roadmap".to_string(),
        workspace_id: workspace.id,
    };
    let col_todo = Column {
        id: Uuid::new_v4(),
        title: "To Do".to_string(),
        order: 0,
        board_id: board.id,
    };
    let col_doing = Column {
        id: Uuid::new_v4(),
        title: "In Progress".to_string(),
        order: 1,
        board_id: board.id,
    };
    let col_review = Column {
        id: Uuid::new_v4(),
        title: "Review".to_string(),
        order: 2,
        board_id: board.id,
    };

    let task = Task {
        id: Uuid::new_v4(),
        content: "Validate the 2026 budget".to_string(),
        color: "red".to_string(),
        due_date: None,
        column_id: col_todo.id,
        validator_group_id: Some(group.id),
        attachments: Vec::new(),
        comments: Vec::new(),
    };
    let subtask = SubTask {
        id: Uuid::new_v4(),
        task_id: task.id,
        content: "Collect department estimates".to_string(),
        completed: false,
    };

    data.rules.push(Rule {
        id: Uuid::new_v4(),
        trigger_column_id: col_review.id,
        action: RuleAction::ChangeColor,
        value: "yellow".to_string(),
    });

    data.users.insert(admin.id, admin);
    data.users.insert(manager.id, manager);
    data.workspaces.insert(workspace.id, workspace);
    data.groups.insert(group.id, group);
    data.boards.insert(board.id, board);
    data.columns.insert(col_todo.id, col_todo);
    data.columns.insert(col_doing.id, col_doing);
    data.columns.insert(col_review.id, col_review);
    data.tasks.insert(task.id, task);
    data.subtasks.insert(subtask.id, subtask);

    data
}
