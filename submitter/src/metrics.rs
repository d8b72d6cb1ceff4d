use std::fmt::{Debug, Formatter};

use prometheus::{HistogramVec, IntCounterVec, IntGauge};

use surge_base::CoreMetrics;
use surge_core::TransactionStatus;

/// Buckets of the confirmation latency histogram, in seconds
const LATENCY_BUCKETS: &[f64] = &[
    0.25, 0.5, 1.0, 2.0, 3.0, 5.0, 8.0, 12.0, 20.0, 30.0, 45.0, 60.0, 90.0,
];

/// Metrics of the submission and confirmation engines
#[derive(Clone)]
pub struct SubmitterMetrics {
    /// Submission attempts, labelled with the resulting status
    submissions: IntCounterVec,
    /// Accounts whose burst could not be prepared, labelled with the cause
    aborted_accounts: IntCounterVec,
    /// Terminal confirmation outcomes, labelled `success`, `reverted`,
    /// `timeout` or `endpoint_error`
    confirmations: IntCounterVec,
    /// Worker connection failures, the job is skipped
    connection_failures: IntCounterVec,
    /// Confirmations currently holding an endpoint connection
    confirmations_in_flight: IntGauge,
    /// Jobs waiting in the confirmation queue
    job_queue_length: IntGauge,
    /// Time from submission to terminal status
    confirmation_latency: HistogramVec,
    /// Episodes started
    episodes: IntCounterVec,
}

impl SubmitterMetrics {
    /// Register the submitter metrics on the agent's registry
    pub fn new(core: &CoreMetrics) -> eyre::Result<Self> {
        Ok(Self {
            submissions: core.new_int_counter(
                "submissions_total",
                "Number of transfers handed to the ledger endpoint",
                &["status"],
            )?,
            aborted_accounts: core.new_int_counter(
                "aborted_accounts_total",
                "Number of account bursts abandoned before submission",
                &["reason"],
            )?,
            confirmations: core.new_int_counter(
                "confirmations_total",
                "Number of confirmations that reached a terminal status",
                &["outcome"],
            )?,
            connection_failures: core.new_int_counter(
                "worker_connection_failures_total",
                "Number of confirmation jobs skipped because the worker could not connect",
                &[],
            )?,
            confirmations_in_flight: core
                .new_int_gauge(
                    "confirmations_in_flight",
                    "Number of confirmations waiting on the ledger endpoint",
                    &[],
                )?
                .with_label_values(&[]),
            job_queue_length: core
                .new_int_gauge(
                    "confirmation_queue_length",
                    "Number of confirmation jobs waiting for a worker",
                    &[],
                )?
                .with_label_values(&[]),
            confirmation_latency: core.new_histogram(
                "confirmation_latency_seconds",
                "Time from submission until a terminal status was observed",
                &["status"],
                LATENCY_BUCKETS.to_vec(),
            )?,
            episodes: core.new_int_counter(
                "episodes_total",
                "Number of execution batches started",
                &[],
            )?,
        })
    }

    /// Metrics bound to a throwaway registry
    #[cfg(test)]
    #[allow(clippy::unwrap_used)]
    pub fn dummy_instance() -> Self {
        let core = CoreMetrics::new("test", None, prometheus::Registry::new()).unwrap();
        Self::new(&core).unwrap()
    }

    pub(crate) fn update_submission_metric(&self, status: TransactionStatus) {
        self.submissions.with_label_values(&[status.as_ref()]).inc();
    }

    pub(crate) fn update_aborted_account_metric(&self, reason: &str) {
        self.aborted_accounts.with_label_values(&[reason]).inc();
    }

    pub(crate) fn update_confirmation_metric(
        &self,
        outcome: &str,
        status: TransactionStatus,
        latency_ms: f64,
    ) {
        self.confirmations.with_label_values(&[outcome]).inc();
        self.confirmation_latency
            .with_label_values(&[status.as_ref()])
            .observe(latency_ms / 1000.0);
    }

    pub(crate) fn update_connection_failure_metric(&self) {
        self.connection_failures.with_label_values(&[]).inc();
    }

    pub(crate) fn confirmations_in_flight(&self) -> &IntGauge {
        &self.confirmations_in_flight
    }

    pub(crate) fn update_queue_length_metric(&self, length: usize) {
        self.job_queue_length
            .set(i64::try_from(length).unwrap_or(i64::MAX));
    }

    pub(crate) fn update_episode_metric(&self) {
        self.episodes.with_label_values(&[]).inc();
    }
}

impl Debug for SubmitterMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitterMetrics")
            .field("confirmations_in_flight", &self.confirmations_in_flight.get())
            .field("job_queue_length", &self.job_queue_length.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use prometheus::Registry;

    use super::*;

    #[test]
    fn test_metrics_register_on_the_core_registry() {
        let core = CoreMetrics::new("tps_tester", None, Registry::new()).unwrap();
        let metrics = SubmitterMetrics::new(&core).unwrap();
        metrics.update_submission_metric(TransactionStatus::Pending);
        metrics.update_confirmation_metric("success", TransactionStatus::Success, 1500.0);

        let report = String::from_utf8(core.gather().unwrap()).unwrap();
        assert!(report.contains("surge_submissions_total"));
        assert!(report.contains(r#"status="pending""#));
        assert!(report.contains("surge_confirmation_latency_seconds_bucket"));
    }

    #[test]
    fn test_registering_twice_fails() {
        let core = CoreMetrics::new("tps_tester", None, Registry::new()).unwrap();
        SubmitterMetrics::new(&core).unwrap();
        assert!(SubmitterMetrics::new(&core).is_err());
    }
}
