use crate::db::Store;
use crate::domain::events::NotificationEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::error;

/// Persists every event on the bus as an activity log row.
pub struct LogService {
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl LogService {
    #[must_use]
    pub const fn new(store: Store, event_bus: broadcast::Sender<NotificationEvent>) -> Self {
        Self { store, event_bus }
    }

    pub fn start_listener(self: Arc<Self>) {
        let mut rx = self.event_bus.subscribe();
        let service = self;

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = service.handle_event(event).await {
                            error!(error = %e, "Failed to save log");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        error!(count, "Log listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Log listener event bus closed");
                        break;
                    }
                }
            }
        });
    }

    async fn handle_event(&self, event: NotificationEvent) -> anyhow::Result<()> {
        let (event_type, level, message) = describe(&event);
        let details = match &event {
            NotificationEvent::Info { .. } | NotificationEvent::Error { .. } => None,
            _ => Some(serde_json::to_string(&event)?),
        };

        self.store
            .add_log(event_type, level, &message, details)
            .await?;

        Ok(())
    }
}

/// Maps an event to `(event_type, level, message)`.
fn describe(event: &NotificationEvent) -> (&'static str, &'static str, String) {
    match event {
        NotificationEvent::ModuleSubmitted {
            name, submitted_by, ..
        } => (
            "ModuleSubmitted",
            "info",
            format!("{submitted_by} submitted {name}"),
        ),
        NotificationEvent::ModuleResubmitted { name, .. } => (
            "ModuleResubmitted",
            "info",
            format!("{name} was resubmitted for review"),
        ),
        NotificationEvent::ModuleApproved {
            name, reviewed_by, ..
        } => (
            "ModuleApproved",
            "success",
            format!("{reviewed_by} approved {name}"),
        ),
        NotificationEvent::ModuleDeclined {
            name,
            reviewed_by,
            reason,
            ..
        } => (
            "ModuleDeclined",
            "warn",
            format!("{reviewed_by} declined {name}: {reason}"),
        ),
        NotificationEvent::ModuleUpdated { name, .. } => {
            ("ModuleUpdated", "info", format!("{name} was updated"))
        }
        NotificationEvent::ModuleDeleted { name, .. } => {
            ("ModuleDeleted", "warn", format!("{name} was deleted"))
        }
        NotificationEvent::ReleaseAdded {
            version, source, ..
        } => (
            "ReleaseAdded",
            "info",
            format!("Release {version} added ({source})"),
        ),
        NotificationEvent::UserRegistered { username } => (
            "UserRegistered",
            "info",
            format!("New account: {username}"),
        ),
        NotificationEvent::UserRoleChanged { username, role } => (
            "UserRoleChanged",
            "warn",
            format!("{username} is now {role}"),
        ),
        NotificationEvent::ApiKeyCreated { username, prefix } => (
            "ApiKeyCreated",
            "info",
            format!("{username} created API key {prefix}"),
        ),
        NotificationEvent::ApiKeyRevoked {
            prefix, revoked_by, ..
        } => (
            "ApiKeyRevoked",
            "warn",
            format!("{revoked_by} revoked API key {prefix}"),
        ),
        NotificationEvent::JobStarted { kind, .. } => {
            ("JobStarted", "info", format!("Job {kind} started"))
        }
        NotificationEvent::JobFinished { kind, summary, .. } => (
            "JobFinished",
            "success",
            format!("Job {kind} finished: {summary}"),
        ),
        NotificationEvent::JobFailed { kind, error, .. } => {
            ("JobFailed", "error", format!("Job {kind} failed: {error}"))
        }
        NotificationEvent::SyncFailed {
            repository,
            message,
            ..
        } => (
            "SyncFailed",
            "error",
            format!("Sync of {repository} failed: {message}"),
        ),
        NotificationEvent::Info { message } => ("Info", "info", message.clone()),
        NotificationEvent::Error { message } => ("Error", "error", message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobKind;

    #[test]
    fn test_describe_levels() {
        let (kind, level, message) = describe(&NotificationEvent::JobFailed {
            job_id: 3,
            kind: JobKind::GithubSync,
            error: "boom".to_string(),
        });
        assert_eq!(kind, "JobFailed");
        assert_eq!(level, "error");
        assert_eq!(message, "Job github_sync failed: boom");

        let (_, level, _) = describe(&NotificationEvent::ModuleDeclined {
            module_id: 1,
            name: "Zygisk Next".to_string(),
            reviewed_by: "admin".to_string(),
            reason: "No source".to_string(),
        });
        assert_eq!(level, "warn");
    }

    #[tokio::test]
    async fn test_listener_persists_events() {
        let store = Store::with_pool_options("sqlite::memory:", 1, 1)
            .await
            .unwrap();
        let (tx, _rx) = broadcast::channel(16);
        let service = Arc::new(LogService::new(store.clone(), tx.clone()));
        service.start_listener();

        tx.send(NotificationEvent::Info {
            message: "hello".to_string(),
        })
        .unwrap();

        let mut found = false;
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let (logs, _) = store.get_logs(1, 10, None, None).await.unwrap();
            if logs.iter().any(|l| l.message == "hello") {
                found = true;
                break;
            }
        }
        assert!(found);
    }
}
