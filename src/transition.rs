//! Task transition pipeline.
//!
//! The sequence behind a move: persist the column reassignment, decide
//! whether validator notification applies, run automations, then fan out
//! one "board changed" signal. The transition is considered successful
//! once the column reference is persisted; side-effect failures after
//! that point are logged per unit and never surfaced to the caller.

use std::sync::Arc;

use uuid::Uuid;

use crate::automation::AutomationEngine;
use crate::error::ApiError;
use crate::model::{SubTask, Task};
use crate::notify::ValidatorNotifier;
use crate::realtime::BoardEvents;
use crate::store::BoardStore;

/// Whether a column title marks a review stage.
///
/// Deliberately a substring match on the human-editable title, kept for
/// behavioral compatibility with existing boards. Swap the policy here
/// (an explicit column flag, say) without touching the pipeline.
pub fn is_review_column(title: &str) -> bool {
    title.to_lowercase().contains("review")
}

/// Coordinates store writes, automations, notifications, and fan-out.
pub struct TransitionService {
    store: Arc<BoardStore>,
    automations: AutomationEngine,
    notifier: ValidatorNotifier,
    events: BoardEvents,
}

impl TransitionService {
    pub fn new(
        store: Arc<BoardStore>,
        automations: AutomationEngine,
        notifier: ValidatorNotifier,
        events: BoardEvents,
    ) -> Self {
        Self {
            store,
            automations,
            notifier,
            events,
        }
    }

    /// Move a task into the target column.
    ///
    /// Any authenticated role may move a task. `NotFound` on the task or
    /// column aborts before any side effect; after the write, review
    /// notification and automations each run to completion or fail in
    /// isolation, and the fan-out signal goes out exactly once either
    /// way.
    pub async fn move_task(&self, task_id: Uuid, target_column_id: Uuid) -> Result<Task, ApiError> {
        let column = self
            .store
            .column(target_column_id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Column {}", target_column_id)))?;

        let task = self
            .store
            .reassign_task_column(task_id, target_column_id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Task {}", task_id)))?;

        // Re-checked on every move, including re-entries into the same
        // column; validators are re-notified unconditionally.
        if is_review_column(&column.title) && task.validator_group_id.is_some() {
            let outcomes = self.notifier.notify_validators(&task).await;
            let failed = outcomes.iter().filter(|o| o.outcome.is_err()).count();
            if failed > 0 {
                tracing::warn!(
                    "{}/{} validator notifications failed for task {}",
                    failed,
                    outcomes.len(),
                    task_id
                );
            }
        }

        let outcomes = self
            .automations
            .run_automations(task_id, target_column_id)
            .await;
        let failed = outcomes.iter().filter(|o| o.outcome.is_err()).count();
        if failed > 0 {
            tracing::warn!(
                "{}/{} automation rules failed for task {}",
                failed,
                outcomes.len(),
                task_id
            );
        }

        self.events.broadcast_changed();
        Ok(task)
    }

    /// Flip a sub-task's completion flag and fan out. No automations or
    /// notifications on this path.
    pub async fn toggle_subtask(&self, subtask_id: Uuid) -> Result<SubTask, ApiError> {
        let subtask = self
            .store
            .toggle_subtask(subtask_id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Sub-task {}", subtask_id)))?;

        self.events.broadcast_changed();
        Ok(subtask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, Rule, RuleAction};
    use crate::notify::{ChatSink, EmailSink};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingChat {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatSink for RecordingChat {
        async fn send(&self, _url: &str, message: &str) -> anyhow::Result<()> {
            self.sent.lock().await.push(message.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingEmail {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmailSink for RecordingEmail {
        async fn send(&self, to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
            self.sent.lock().await.push(to.to_string());
            Ok(())
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        store: Arc<BoardStore>,
        service: TransitionService,
        events: BoardEvents,
        chat: Arc<RecordingChat>,
        email: Arc<RecordingEmail>,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BoardStore::open(dir.path().join("board.json")).unwrap());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let chat = Arc::new(RecordingChat::default());
        let email = Arc::new(RecordingEmail::default());
        let events = BoardEvents::new(8);
        let service = TransitionService::new(
            Arc::clone(&store),
            AutomationEngine::new(Arc::clone(&store), http),
            ValidatorNotifier::new(
                Arc::clone(&store),
                Arc::clone(&chat) as _,
                Arc::clone(&email) as _,
            ),
            events.clone(),
        );
        Harness {
            _dir: dir,
            store,
            service,
            events,
            chat,
            email,
        }
    }

    async fn seeded_board(h: &Harness) -> (Uuid, Vec<Uuid>) {
        let admin = h.store.user_by_email("admin@taskdeck.io").await.unwrap();
        let board = h.store.board_for_user(admin.id).await.unwrap();
        let task_id = board.columns[0].tasks[0].task.id;
        let column_ids = board.columns.iter().map(|c| c.id).collect();
        (task_id, column_ids)
    }

    #[test]
    fn test_review_predicate_is_case_insensitive_substring() {
        assert!(is_review_column("Review"));
        assert!(is_review_column("Client Review Stage"));
        assert!(is_review_column("PEER REVIEWS"));
        assert!(!is_review_column("Done"));
        assert!(!is_review_column("Rework"));
    }

    #[tokio::test]
    async fn test_move_persists_and_broadcasts_once() {
        let h = harness();
        let (task_id, columns) = seeded_board(&h).await;
        let mut rx = h.events.subscribe();

        let moved = h.service.move_task(task_id, columns[1]).await.unwrap();
        assert_eq!(moved.column_id, columns[1]);
        assert_eq!(h.store.task(task_id).await.unwrap().column_id, columns[1]);

        rx.try_recv().unwrap();
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn test_move_into_review_notifies_bound_group() {
        let h = harness();
        let (task_id, columns) = seeded_board(&h).await;

        // Seed board: "Review" is the third column; the task is bound to
        // a group with a slack admin and an email manager.
        h.service.move_task(task_id, columns[2]).await.unwrap();

        assert_eq!(h.chat.sent.lock().await.len(), 1);
        assert_eq!(h.email.sent.lock().await.len(), 1);
        assert!(h.chat.sent.lock().await[0].contains("Validate the 2026 budget"));
    }

    #[tokio::test]
    async fn test_substring_titled_column_also_triggers() {
        let h = harness();
        let (task_id, _) = seeded_board(&h).await;

        let task = h.store.task(task_id).await.unwrap();
        let board_id = {
            let col = h.store.column(task.column_id).await.unwrap();
            col.board_id
        };
        let staged = Column {
            id: Uuid::new_v4(),
            title: "Client Review Stage".to_string(),
            order: 9,
            board_id,
        };
        let staged_id = staged.id;
        h.store
            .insert(move |data| {
                data.columns.insert(staged_id, staged);
            })
            .await;

        h.service.move_task(task_id, staged_id).await.unwrap();
        assert_eq!(h.chat.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_review_without_group_sends_nothing() {
        let h = harness();
        let (task_id, columns) = seeded_board(&h).await;
        h.store
            .insert(move |data| {
                data.tasks.get_mut(&task_id).unwrap().validator_group_id = None;
            })
            .await;

        h.service.move_task(task_id, columns[2]).await.unwrap();
        assert!(h.chat.sent.lock().await.is_empty());
        assert!(h.email.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_reentry_into_review_renotifies() {
        let h = harness();
        let (task_id, columns) = seeded_board(&h).await;

        h.service.move_task(task_id, columns[2]).await.unwrap();
        h.service.move_task(task_id, columns[2]).await.unwrap();

        assert_eq!(h.chat.sent.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_column_aborts_before_side_effects() {
        let h = harness();
        let (task_id, _columns) = seeded_board(&h).await;
        let mut rx = h.events.subscribe();
        let before = h.store.task(task_id).await.unwrap().column_id;

        let err = h.service.move_task(task_id, Uuid::new_v4()).await;
        assert!(matches!(err, Err(ApiError::NotFound(_))));

        assert_eq!(h.store.task(task_id).await.unwrap().column_id, before);
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
        assert!(h.chat.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_task_is_not_found() {
        let h = harness();
        let (_, columns) = seeded_board(&h).await;
        let err = h.service.move_task(Uuid::new_v4(), columns[0]).await;
        assert!(matches!(err, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_automation_failure_does_not_fail_the_move() {
        let h = harness();
        let (task_id, columns) = seeded_board(&h).await;
        let target = columns[1];
        h.store
            .insert(move |data| {
                data.rules.push(Rule {
                    id: Uuid::new_v4(),
                    trigger_column_id: target,
                    action: RuleAction::SendWebhook,
                    value: "http://127.0.0.1:9/hook".to_string(),
                });
            })
            .await;
        let mut rx = h.events.subscribe();

        let moved = h.service.move_task(task_id, target).await.unwrap();
        assert_eq!(moved.column_id, target);
        // Broadcast still goes out despite the failed rule.
        rx.try_recv().unwrap();
    }

    #[tokio::test]
    async fn test_vanished_group_does_not_fail_the_move() {
        let h = harness();
        let (task_id, columns) = seeded_board(&h).await;
        // A group id with no backing record.
        let orphan_id = Uuid::new_v4();
        h.store
            .insert(move |data| {
                data.tasks.get_mut(&task_id).unwrap().validator_group_id = Some(orphan_id);
            })
            .await;

        h.service.move_task(task_id, columns[2]).await.unwrap();
        assert!(h.chat.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_subtask_flips_and_broadcasts() {
        let h = harness();
        let admin = h.store.user_by_email("admin@taskdeck.io").await.unwrap();
        let board = h.store.board_for_user(admin.id).await.unwrap();
        let subtask_id = board.columns[0].tasks[0].subtasks[0].id;
        let mut rx = h.events.subscribe();

        let toggled = h.service.toggle_subtask(subtask_id).await.unwrap();
        assert!(toggled.completed);
        rx.try_recv().unwrap();

        let again = h.service.toggle_subtask(subtask_id).await.unwrap();
        assert!(!again.completed);
    }

    #[tokio::test]
    async fn test_toggle_missing_subtask_is_not_found() {
        let h = harness();
        let err = h.service.toggle_subtask(Uuid::new_v4()).await;
        assert!(matches!(err, Err(ApiError::NotFound(_))));
    }
}
