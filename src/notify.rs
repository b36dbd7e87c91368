//! Validator notification dispatch.
//!
//! When a task reaches a review column, each member of its bound
//! validator group receives exactly one notification through their
//! preferred channel: chat webhook if enabled and configured, else email
//! if enabled, else nothing. The preference order is fixed. Per-user
//! failures are captured and never block dispatch to remaining members.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::Task;
use crate::store::BoardStore;

/// Chat-style webhook sink (Slack-compatible message POST).
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, webhook_url: &str, message: &str) -> anyhow::Result<()>;
}

/// Email sink (subject + body).
#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Posts `{"text": message}` to the member's chat webhook URL.
pub struct WebhookChatSink {
    http: reqwest::Client,
}

impl WebhookChatSink {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatSink for WebhookChatSink {
    async fn send(&self, webhook_url: &str, message: &str) -> anyhow::Result<()> {
        let response = self
            .http
            .post(webhook_url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("chat webhook returned status {}", status);
        }
        Ok(())
    }
}

/// Email delivery stub: records the send in the log. Swap in a real
/// transport by implementing `EmailSink`.
pub struct LogEmailSink;

#[async_trait]
impl EmailSink for LogEmailSink {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        tracing::info!("[EMAIL] to={} subject={:?}", to, subject);
        Ok(())
    }
}

/// Channel chosen for one member, or the reason nothing was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Chat,
    Email,
    None,
}

/// Per-member result of one dispatch.
#[derive(Debug)]
pub struct NotifyOutcome {
    pub user_id: Uuid,
    pub channel: Channel,
    pub outcome: Result<(), anyhow::Error>,
}

/// Resolves a task's validator group and dispatches one notification per
/// member.
pub struct ValidatorNotifier {
    store: Arc<BoardStore>,
    chat: Arc<dyn ChatSink>,
    email: Arc<dyn EmailSink>,
}

impl ValidatorNotifier {
    pub fn new(store: Arc<BoardStore>, chat: Arc<dyn ChatSink>, email: Arc<dyn EmailSink>) -> Self {
        Self { store, chat, email }
    }

    /// Notify every member of the task's bound validator group. A task
    /// without a group, or a group no longer in the store, is a no-op.
    pub async fn notify_validators(&self, task: &Task) -> Vec<NotifyOutcome> {
        let Some(group_id) = task.validator_group_id else {
            return Vec::new();
        };
        let Some(group) = self.store.group(group_id).await else {
            tracing::warn!("Validator group {} not found for task {}", group_id, task.id);
            return Vec::new();
        };

        // Fixed snapshot: membership changes mid-dispatch do not alter
        // this dispatch's recipients.
        let member_ids = group.member_snapshot();
        let validators = self.store.users_in_order(&member_ids).await;

        let message = format!("Validation required for task: \"{}\"", task.content);

        let mut outcomes = Vec::with_capacity(validators.len());
        for user in validators {
            let chat_url = user
                .slack_webhook
                .as_deref()
                .filter(|_| user.notify_slack);
            let (channel, outcome) = if let Some(url) = chat_url {
                (Channel::Chat, self.chat.send(url, &message).await)
            } else if user.notify_email {
                (
                    Channel::Email,
                    self.email
                        .send(&user.email, "Action required: validation", &message)
                        .await,
                )
            } else {
                (Channel::None, Ok(()))
            };

            if let Err(e) = &outcome {
                tracing::warn!("Notification to user {} failed: {}", user.id, e);
            }
            outcomes.push(NotifyOutcome {
                user_id: user.id,
                channel,
                outcome,
            });
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Role, User};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingChat {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatSink for RecordingChat {
        async fn send(&self, webhook_url: &str, message: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("chat endpoint unreachable");
            }
            self.sent
                .lock()
                .await
                .push((webhook_url.to_string(), message.to_string()));
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

    fn member(name: &str, slack: bool, email: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@taskdeck.io", name),
            password_digest: User::password_digest("pw"),
            role: Role::User,
            notify_slack: slack,
            slack_webhook: slack.then(|| format!("https://hooks.example/{}", name)),
            notify_email: email,
        }
    }

    async fn store_with_group(
        members: Vec<User>,
    ) -> (tempfile::TempDir, Arc<BoardStore>, Task) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BoardStore::open(dir.path().join("board.json")).unwrap());

        let member_ids: Vec<Uuid> = members.iter().map(|u| u.id).collect();
        let group = crate::model::ValidatorGroup {
            id: Uuid::new_v4(),
            name: "reviewers".to_string(),
            workspace_id: Uuid::new_v4(),
            member_ids: serde_json::to_string(&member_ids).unwrap(),
        };
        let group_id = group.id;
        store
            .insert(move |data| {
                for user in members {
                    data.users.insert(user.id, user);
                }
                data.groups.insert(group_id, group);
            })
            .await;

        let task = Task {
            id: Uuid::new_v4(),
            content: "Ship the release".to_string(),
            color: "default".to_string(),
            due_date: None,
            column_id: Uuid::new_v4(),
            validator_group_id: Some(group_id),
            attachments: Vec::new(),
            comments: Vec::new(),
        };
        (dir, store, task)
    }

    #[tokio::test]
    async fn test_fanout_completeness_one_message_per_enabled_member() {
        let a = member("a", true, false);
        let b = member("b", false, true);
        let c = member("c", false, false);
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        let (_dir, store, task) = store_with_group(vec![a, b, c]).await;

        let chat = Arc::new(RecordingChat::default());
        let email = Arc::new(RecordingEmail::default());
        let notifier =
            ValidatorNotifier::new(store, Arc::clone(&chat) as _, Arc::clone(&email) as _);

        let outcomes = notifier.notify_validators(&task).await;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].user_id, a_id);
        assert_eq!(outcomes[0].channel, Channel::Chat);
        assert_eq!(outcomes[1].user_id, b_id);
        assert_eq!(outcomes[1].channel, Channel::Email);
        assert_eq!(outcomes[2].user_id, c_id);
        assert_eq!(outcomes[2].channel, Channel::None);

        assert_eq!(chat.sent.lock().await.len(), 1);
        assert_eq!(email.sent.lock().await.len(), 1);
        assert_eq!(email.sent.lock().await[0], "b@taskdeck.io");
    }

    #[tokio::test]
    async fn test_chat_preferred_over_email_when_both_enabled() {
        let both = member("both", true, true);
        let (_dir, store, task) = store_with_group(vec![both]).await;

        let chat = Arc::new(RecordingChat::default());
        let email = Arc::new(RecordingEmail::default());
        let notifier =
            ValidatorNotifier::new(store, Arc::clone(&chat) as _, Arc::clone(&email) as _);

        let outcomes = notifier.notify_validators(&task).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].channel, Channel::Chat);
        assert_eq!(chat.sent.lock().await.len(), 1);
        assert!(email.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_chat_falls_through_to_email() {
        let mut user = member("u", true, true);
        user.slack_webhook = None;
        let (_dir, store, task) = store_with_group(vec![user]).await;

        let chat = Arc::new(RecordingChat::default());
        let email = Arc::new(RecordingEmail::default());
        let notifier =
            ValidatorNotifier::new(store, Arc::clone(&chat) as _, Arc::clone(&email) as _);

        let outcomes = notifier.notify_validators(&task).await;
        assert_eq!(outcomes[0].channel, Channel::Email);
        assert!(chat.sent.lock().await.is_empty());
        assert_eq!(email.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_chat_failure_does_not_block_remaining_members() {
        let a = member("a", true, false);
        let b = member("b", false, true);
        let (_dir, store, task) = store_with_group(vec![a, b]).await;

        let chat = Arc::new(RecordingChat {
            fail: true,
            ..Default::default()
        });
        let email = Arc::new(RecordingEmail::default());
        let notifier =
            ValidatorNotifier::new(store, Arc::clone(&chat) as _, Arc::clone(&email) as _);

        let outcomes = notifier.notify_validators(&task).await;
        assert!(outcomes[0].outcome.is_err());
        assert!(outcomes[1].outcome.is_ok());
        assert_eq!(email.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_task_without_group_is_a_noop() {
        let (_dir, store, mut task) = store_with_group(vec![member("a", true, false)]).await;
        task.validator_group_id = None;

        let chat = Arc::new(RecordingChat::default());
        let email = Arc::new(RecordingEmail::default());
        let notifier =
            ValidatorNotifier::new(store, Arc::clone(&chat) as _, Arc::clone(&email) as _);

        assert!(notifier.notify_validators(&task).await.is_empty());
        assert!(chat.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_group_is_a_noop() {
        let (_dir, store, mut task) = store_with_group(vec![member("a", true, false)]).await;
        task.validator_group_id = Some(Uuid::new_v4());

        let chat = Arc::new(RecordingChat::default());
        let email = Arc::new(RecordingEmail::default());
        let notifier =
            ValidatorNotifier::new(store, Arc::clone(&chat) as _, Arc::clone(&email) as _);

        assert!(notifier.notify_validators(&task).await.is_empty());
    }

    #[tokio::test]
    async fn test_vanished_members_are_silently_skipped() {
        let a = member("a", false, true);
        let a_id = a.id;
        let (_dir, store, task) = store_with_group(vec![a]).await;

        // Rewrite the group to reference one live and one deleted user.
        let group_id = task.validator_group_id.unwrap();
        store
            .insert(move |data| {
                let group = data.groups.get_mut(&group_id).unwrap();
                group.member_ids =
                    serde_json::to_string(&vec![Uuid::new_v4(), a_id]).unwrap();
            })
            .await;

        let chat = Arc::new(RecordingChat::default());
        let email = Arc::new(RecordingEmail::default());
        let notifier =
            ValidatorNotifier::new(store, Arc::clone(&chat) as _, Arc::clone(&email) as _);

        let outcomes = notifier.notify_validators(&task).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].user_id, a_id);
        assert_eq!(email.sent.lock().await.len(), 1);
    }
}
