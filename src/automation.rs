//! Rule matching and automation execution.
//!
//! When a task enters a column, every rule triggered by that column runs
//! independently and in authored order. Rules model isolated external
//! effects, so one rule's failure never blocks its siblings, nothing is
//! rolled back, and nothing is retried. Each rule's outcome is captured
//! into a result list for the caller to log.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::model::RuleAction;
use crate::store::BoardStore;

/// Per-rule result of one automation pass.
#[derive(Debug)]
pub struct RuleOutcome {
    pub rule_id: Uuid,
    pub outcome: Result<(), AutomationError>,
}

#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("task vanished before the rule applied")]
    TaskGone,
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned status {0}")]
    WebhookStatus(reqwest::StatusCode),
}

/// Executes automation rules against the store and outbound webhooks.
pub struct AutomationEngine {
    store: Arc<BoardStore>,
    http: reqwest::Client,
}

impl AutomationEngine {
    pub fn new(store: Arc<BoardStore>, http: reqwest::Client) -> Self {
        Self { store, http }
    }

    /// Run every rule triggered by `target_column_id` against the task.
    ///
    /// A missing task or an empty rule set is a no-op: the transition
    /// already succeeded, or the task was deleted concurrently. Neither
    /// is an error.
    pub async fn run_automations(&self, task_id: Uuid, target_column_id: Uuid) -> Vec<RuleOutcome> {
        let Some(task) = self.store.task(task_id).await else {
            return Vec::new();
        };
        let rules = self.store.rules_for_trigger(target_column_id).await;
        if rules.is_empty() {
            return Vec::new();
        }

        tracing::debug!(
            "Running {} automation rule(s) for task {}",
            rules.len(),
            task_id
        );

        let mut outcomes = Vec::with_capacity(rules.len());
        for rule in rules {
            let outcome = match rule.action {
                RuleAction::ChangeColor => self.change_color(task_id, &rule.value).await,
                RuleAction::SendWebhook => {
                    self.send_webhook(&rule.value, task_id, &task.content, target_column_id)
                        .await
                }
            };
            if let Err(e) = &outcome {
                tracing::warn!("Automation rule {} failed: {}", rule.id, e);
            }
            outcomes.push(RuleOutcome {
                rule_id: rule.id,
                outcome,
            });
        }
        outcomes
    }

    /// Overwrite the task's color with the rule value, verbatim. Color
    /// strings are not validated.
    async fn change_color(&self, task_id: Uuid, color: &str) -> Result<(), AutomationError> {
        if self.store.set_task_color(task_id, color).await {
            Ok(())
        } else {
            Err(AutomationError::TaskGone)
        }
    }

    /// POST the task-moved payload to the rule's URL. Non-2xx responses
    /// count as a failure for this rule only.
    async fn send_webhook(
        &self,
        url: &str,
        task_id: Uuid,
        content: &str,
        target_column_id: Uuid,
    ) -> Result<(), AutomationError> {
        let payload = json!({
            "event": "TASK_MOVED",
            "task": {
                "id": task_id,
                "content": content,
                "movedAt": chrono::Utc::now().to_rfc3339(),
            },
            "targetColumn": target_column_id,
        });

        let response = self.http.post(url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AutomationError::WebhookStatus(status));
        }
        Ok(())
    }
}
