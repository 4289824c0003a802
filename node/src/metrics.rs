//! Prometheus metrics for the admission bot.
//!
//! [`AdmissionMetrics`] owns a dedicated [`Registry`]; [`AdmissionMetrics::encode`]
//! renders it in the text exposition format.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use crate::AdmissionError;

/// Label values of `gatekeeper_reconciliations_total`.
pub const RECONCILE_UNMATCHED: &str = "unmatched";

pub struct AdmissionMetrics {
    pub registry: Registry,

    // ── Join requests ───────────────────────────────────────────────────
    pub join_requests: IntCounter,
    pub approvals: IntCounter,
    pub approval_failures: IntCounter,
    pub guidance_sent: IntCounter,
    pub declines: IntCounter,

    // ── Verification ────────────────────────────────────────────────────
    pub verifications_accepted: IntCounter,
    pub verifications_rejected: IntCounter,

    // ── Moderation ──────────────────────────────────────────────────────
    pub bans: IntCounter,
    pub ban_failures: IntCounter,

    // ── Side effects ────────────────────────────────────────────────────
    /// Best-effort messages that could not be delivered.
    pub notification_failures: IntCounter,

    // ── Groups ──────────────────────────────────────────────────────────
    /// Labelled by `method`: invite_link, public_handle, title, unmatched.
    pub reconciliations: IntCounterVec,
    pub registry_size: IntGauge,
}

impl AdmissionMetrics {
    pub fn new() -> Result<Self, AdmissionError> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            register_int_counter_with_registry!(Opts::new(name, help), registry)
        };

        let join_requests = counter(
            "gatekeeper_join_requests_total",
            "Join requests received",
        )?;
        let approvals = counter(
            "gatekeeper_approvals_total",
            "Join requests approved on the platform",
        )?;
        let approval_failures = counter(
            "gatekeeper_approval_failures_total",
            "Approve calls that failed and left the request in error",
        )?;
        let guidance_sent = counter(
            "gatekeeper_guidance_sent_total",
            "Requests left pending with verification guidance",
        )?;
        let declines = counter(
            "gatekeeper_declines_total",
            "Join requests declined by an administrator",
        )?;
        let verifications_accepted = counter(
            "gatekeeper_verifications_accepted_total",
            "Shared phone numbers accepted",
        )?;
        let verifications_rejected = counter(
            "gatekeeper_verifications_rejected_total",
            "Shared phone numbers rejected",
        )?;
        let bans = counter("gatekeeper_bans_total", "Users banned")?;
        let ban_failures = counter(
            "gatekeeper_ban_failures_total",
            "Per-chat ban calls that failed",
        )?;
        let notification_failures = counter(
            "gatekeeper_notification_failures_total",
            "Best-effort messages that could not be delivered",
        )?;

        let reconciliations = register_int_counter_vec_with_registry!(
            Opts::new(
                "gatekeeper_reconciliations_total",
                "Joined chats reconciled with managed groups, by match method"
            ),
            &["method"],
            registry
        )?;
        let registry_size = register_int_gauge_with_registry!(
            Opts::new(
                "gatekeeper_registry_groups",
                "Managed groups in the cached snapshot"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            join_requests,
            approvals,
            approval_failures,
            guidance_sent,
            declines,
            verifications_accepted,
            verifications_rejected,
            bans,
            ban_failures,
            notification_failures,
            reconciliations,
            registry_size,
        })
    }

    pub fn record_reconciliation(&self, method: &str) {
        self.reconciliations.with_label_values(&[method]).inc();
    }

    /// Prometheus text exposition of every metric.
    pub fn encode(&self) -> Result<String, AdmissionError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| AdmissionError::Config(e.to_string()))
    }

    /// One-line runtime summary for the `/stats` command.
    pub fn summary(&self) -> String {
        format!(
            "requests {} | approved {} | approval errors {} | verifications {}/{} | bans {} | undelivered {}",
            self.join_requests.get(),
            self.approvals.get(),
            self.approval_failures.get(),
            self.verifications_accepted.get(),
            self.verifications_accepted.get() + self.verifications_rejected.get(),
            self.bans.get(),
            self.notification_failures.get(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_appear_in_exposition() {
        let metrics = AdmissionMetrics::new().unwrap();
        metrics.approvals.inc();
        metrics.record_reconciliation("title");
        metrics.registry_size.set(3);

        let text = metrics.encode().unwrap();
        assert!(text.contains("gatekeeper_approvals_total 1"));
        assert!(text.contains("gatekeeper_reconciliations_total{method=\"title\"} 1"));
        assert!(text.contains("gatekeeper_registry_groups 3"));
    }

    #[test]
    fn registries_are_independent() {
        let a = AdmissionMetrics::new().unwrap();
        let b = AdmissionMetrics::new().unwrap();
        a.bans.inc();
        assert_eq!(b.bans.get(), 0);
    }
}
