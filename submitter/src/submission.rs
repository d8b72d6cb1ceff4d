use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use surge_core::{
    Account, Address, LedgerProvider, SubmissionOutcome, TransferRequest, TRANSFER_FEE_LIMIT,
    U256,
};

use crate::{SubmitterError, SubmitterMetrics};

/// Builds and submits the transfer burst of an account.
#[derive(Debug, Clone)]
pub struct SubmissionEngine {
    provider: Arc<dyn LedgerProvider>,
    metrics: SubmitterMetrics,
}

impl SubmissionEngine {
    /// Submit through `provider`
    pub fn new(provider: Arc<dyn LedgerProvider>, metrics: SubmitterMetrics) -> Self {
        Self { provider, metrics }
    }

    /// Prepare `count` transfers from `account` with consecutive sequence
    /// numbers.
    ///
    /// The starting sequence number and the fee price are each fetched once.
    /// Sequence numbers are assigned locally from there, so the burst is
    /// gapless no matter how fast the endpoint reflects earlier submissions.
    #[instrument(skip(self, account), fields(account = ?account.address()), err)]
    pub async fn prepare_batch(
        &self,
        account: Arc<Account>,
        destination: Address,
        value: U256,
        count: usize,
    ) -> Result<Vec<TransferRequest>, SubmitterError> {
        let address = account.address();
        let start = self
            .provider
            .get_sequence_number(address)
            .await
            .map_err(|source| SubmitterError::SequenceFetch {
                account: address,
                source,
            })?;
        let fee_price = self
            .provider
            .get_fee_price()
            .await
            .map_err(SubmitterError::FeePriceFetch)?;

        let end = u64::try_from(count)
            .ok()
            .and_then(|count| start.checked_add(count))
            .ok_or(SubmitterError::SequenceOverflow { start, count })?;

        debug!(start, end, %fee_price, "Prepared transfer burst");
        Ok((start..end)
            .map(|sequence_number| TransferRequest {
                account: account.clone(),
                destination,
                value,
                sequence_number,
                fee_price,
                fee_limit: TRANSFER_FEE_LIMIT,
            })
            .collect())
    }

    /// Sign and send one transfer. Makes exactly one write to the endpoint
    /// and never retries.
    ///
    /// Rejections are reported in the outcome. Only the send call is timed,
    /// signing is excluded from the latency.
    #[instrument(
        skip_all,
        fields(account = ?request.account.address(), sequence_number = request.sequence_number)
    )]
    pub async fn submit(&self, request: &TransferRequest) -> SubmissionOutcome {
        let outcome = match self.provider.sign_transfer(request) {
            Ok(signed) => {
                let submitted_at = Utc::now();
                let started = Instant::now();
                let result = self.provider.submit(&signed).await;
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                match result {
                    Ok(operation_hash) => {
                        if operation_hash != signed.hash {
                            debug!(
                                expected = ?signed.hash,
                                returned = ?operation_hash,
                                "Endpoint returned a different operation hash"
                            );
                        }
                        SubmissionOutcome::accepted(
                            operation_hash,
                            request.sequence_number,
                            submitted_at,
                            latency_ms,
                        )
                    }
                    Err(err) => {
                        warn!(error = %err, "Transfer rejected by the endpoint");
                        SubmissionOutcome::rejected(
                            request.sequence_number,
                            submitted_at,
                            latency_ms,
                            err,
                        )
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "Could not sign transfer");
                SubmissionOutcome::rejected(request.sequence_number, Utc::now(), 0.0, err)
            }
        };
        self.metrics.update_submission_metric(outcome.status);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use surge_core::{ChainCommunicationError, ChainResult, SignedTransfer, TransactionStatus, H256};

    use super::*;
    use crate::tests::MockLedger;

    fn engine(ledger: MockLedger) -> SubmissionEngine {
        SubmissionEngine::new(Arc::new(ledger), SubmitterMetrics::dummy_instance())
    }

    fn signed(request: &TransferRequest) -> ChainResult<SignedTransfer> {
        Ok(SignedTransfer {
            hash: H256::from_low_u64_be(request.sequence_number + 100),
            raw: Default::default(),
            sequence_number: request.sequence_number,
        })
    }

    #[tokio::test]
    async fn test_prepare_batch_assigns_consecutive_sequence_numbers() {
        let account = Arc::new(Account::random());
        let mut ledger = MockLedger::new();
        let address = account.address();
        ledger
            .expect_get_sequence_number()
            .withf(move |a| *a == address)
            .times(1)
            .returning(|_| Ok(7));
        ledger
            .expect_get_fee_price()
            .times(1)
            .returning(|| Ok(U256::from(3)));

        let destination = Address::from_low_u64_be(1);
        let requests = engine(ledger)
            .prepare_batch(account, destination, U256::exp10(15), 4)
            .await
            .unwrap();

        assert_eq!(
            requests.iter().map(|r| r.sequence_number).collect::<Vec<_>>(),
            vec![7, 8, 9, 10]
        );
        for request in &requests {
            assert_eq!(request.fee_price, U256::from(3));
            assert_eq!(request.fee_limit, TRANSFER_FEE_LIMIT);
            assert_eq!(request.destination, destination);
            assert_eq!(request.account.address(), address);
        }
    }

    #[tokio::test]
    async fn test_prepare_batch_fails_without_partial_results() {
        let mut ledger = MockLedger::new();
        ledger
            .expect_get_sequence_number()
            .returning(|_| Ok(0));
        ledger
            .expect_get_fee_price()
            .returning(|| Err(ChainCommunicationError::from_other_str("rate limited")));

        let err = engine(ledger)
            .prepare_batch(
                Arc::new(Account::random()),
                Address::zero(),
                U256::one(),
                3,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitterError::FeePriceFetch(_)));
    }

    #[tokio::test]
    async fn test_sequence_fetch_error_skips_the_fee_quote() {
        let mut ledger = MockLedger::new();
        ledger
            .expect_get_sequence_number()
            .returning(|_| Err(ChainCommunicationError::from_other_str("timeout")));
        ledger.expect_get_fee_price().never();

        let err = engine(ledger)
            .prepare_batch(
                Arc::new(Account::random()),
                Address::zero(),
                U256::one(),
                3,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitterError::SequenceFetch { .. }));
        assert_eq!(err.to_metrics_label(), "sequence_fetch");
    }

    #[tokio::test]
    async fn test_prepare_batch_rejects_sequence_overflow() {
        let mut ledger = MockLedger::new();
        ledger
            .expect_get_sequence_number()
            .returning(|_| Ok(u64::MAX - 1));
        ledger.expect_get_fee_price().returning(|| Ok(U256::one()));

        let err = engine(ledger)
            .prepare_batch(
                Arc::new(Account::random()),
                Address::zero(),
                U256::one(),
                2,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubmitterError::SequenceOverflow { count: 2, .. }
        ));
    }

    fn request(sequence_number: u64) -> TransferRequest {
        TransferRequest {
            account: Arc::new(Account::random()),
            destination: Address::from_low_u64_be(1),
            value: U256::one(),
            sequence_number,
            fee_price: U256::one(),
            fee_limit: TRANSFER_FEE_LIMIT,
        }
    }

    #[tokio::test]
    async fn test_submit_sends_once_and_reports_the_hash() {
        let mut ledger = MockLedger::new();
        ledger.expect_sign_transfer().times(1).returning(signed);
        ledger
            .expect_submit()
            .times(1)
            .returning(|transfer| Ok(transfer.hash));

        let outcome = engine(ledger).submit(&request(5)).await;
        assert!(outcome.is_accepted());
        assert_eq!(outcome.operation_hash, Some(H256::from_low_u64_be(105)));
        assert_eq!(outcome.sequence_number, 5);
        assert_eq!(outcome.status, TransactionStatus::Pending);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_submit_reports_rejection_without_retrying() {
        let mut ledger = MockLedger::new();
        ledger.expect_sign_transfer().returning(signed);
        ledger
            .expect_submit()
            .times(1)
            .returning(|_| Err(ChainCommunicationError::from_other_str("nonce too low")));

        let outcome = engine(ledger).submit(&request(5)).await;
        assert!(!outcome.is_accepted());
        assert_eq!(outcome.status, TransactionStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("nonce too low"));
    }

    #[tokio::test]
    async fn test_signing_failure_never_reaches_the_endpoint() {
        let mut ledger = MockLedger::new();
        ledger
            .expect_sign_transfer()
            .returning(|_| Err(ChainCommunicationError::from_other_str("bad key")));
        ledger.expect_submit().never();

        let outcome = engine(ledger).submit(&request(0)).await;
        assert_eq!(outcome.status, TransactionStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("bad key"));
        assert_eq!(outcome.latency_ms, 0.0);
    }
}
