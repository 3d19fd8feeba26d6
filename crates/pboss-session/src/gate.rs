use std::sync::Arc;

use pboss_notify::{Notifier, NotifyEvent, Permission};

/// Delivers notifications only with permission, asking for it at most once
/// per run.
pub struct NotificationGate {
    notifier: Arc<dyn Notifier>,
    permission: Permission,
    asked: bool,
}

impl NotificationGate {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            permission: Permission::Default,
            asked: false,
        }
    }

    pub async fn deliver(&mut self, event: NotifyEvent) {
        if self.permission == Permission::Default && !self.asked {
            self.asked = true;
            self.permission = self.notifier.request_permission().await;
            tracing::info!(permission = ?self.permission, "notification permission");
        }
        if self.permission == Permission::Granted {
            self.notifier.notify(&event).await;
        } else {
            tracing::debug!(event = event.event_name(), "notification suppressed");
        }
    }
}
