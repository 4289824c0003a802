//! Best-effort outbound messages.
//!
//! Delivery failures are logged and counted here and never returned, so a
//! notification cannot change the outcome of the operation that sent it.

use std::sync::Arc;

use gatekeeper_gateway::Gateway;
use gatekeeper_types::UserId;

use crate::metrics::AdmissionMetrics;

#[derive(Clone)]
pub struct Notifier {
    gateway: Arc<dyn Gateway>,
    admin: UserId,
    metrics: Arc<AdmissionMetrics>,
}

impl Notifier {
    pub fn new(gateway: Arc<dyn Gateway>, admin: UserId, metrics: Arc<AdmissionMetrics>) -> Self {
        Self {
            gateway,
            admin,
            metrics,
        }
    }

    pub fn admin(&self) -> UserId {
        self.admin
    }

    pub async fn notify_user(&self, user: UserId, text: &str) {
        if let Err(e) = self.gateway.send_direct_message(user, text).await {
            self.metrics.notification_failures.inc();
            tracing::warn!(user_id = %user, error = %e, "could not message user");
        }
    }

    /// Message carrying the share-contact keyboard.
    pub async fn prompt_contact(&self, user: UserId, text: &str) {
        if let Err(e) = self.gateway.prompt_contact(user, text).await {
            self.metrics.notification_failures.inc();
            tracing::warn!(user_id = %user, error = %e, "could not send contact prompt");
        }
    }

    pub async fn notify_admin(&self, text: &str) {
        if let Err(e) = self.gateway.send_direct_message(self.admin, text).await {
            self.metrics.notification_failures.inc();
            tracing::warn!(error = %e, "could not notify admin");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_gateway::GatewayError;
    use gatekeeper_nullables::NullGateway;

    #[tokio::test]
    async fn delivery_failure_is_counted_not_returned() {
        let gateway = Arc::new(NullGateway::new());
        let metrics = Arc::new(AdmissionMetrics::new().unwrap());
        let notifier = Notifier::new(gateway.clone(), UserId::new(1), metrics.clone());
        gateway.fail_messages_to(UserId::new(5), GatewayError::Forbidden("blocked".into()));

        notifier.notify_user(UserId::new(5), "hi").await;
        notifier.notify_admin("admin note").await;

        assert_eq!(metrics.notification_failures.get(), 1);
        assert_eq!(gateway.messages_to(UserId::new(1)), ["admin note"]);
    }
}
