/// Transaction confirmation pipeline
///
/// A submitted transaction moves through `mined`, `executed` and
/// `confirmed`. Each stage polls the node at a fixed schedule until its
/// condition holds; the stages of one wait share a single deadline.
use crate::api::types::{TransactionInfo, TransactionReceipt};
use crate::blockchain::{BlockHash, TransactionHash};
use crate::client::Client;
use crate::errors::{SdkError, SdkResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmOptions {
    /// Wait before the first query.
    pub delay: Duration,
    pub interval: Duration,
    pub timeout: Duration,
    /// Confirmed once the block's risk drops strictly below this.
    pub threshold: f64,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        ConfirmOptions {
            delay: Duration::ZERO,
            interval: Duration::from_millis(1_000),
            timeout: Duration::from_millis(30_000),
            threshold: 0.01,
        }
    }
}

impl ConfirmOptions {
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// The interval must be non-zero and the threshold strictly inside `(0, 1)`.
    pub fn validate(&self) -> SdkResult<()> {
        if self.interval.is_zero() {
            return Err(SdkError::FormatError(
                "Polling interval must be positive".to_string(),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(SdkError::format(
                &self.threshold,
                "risk threshold must lie strictly between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Handle on a submitted transaction.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    client: Client,
    hash: TransactionHash,
    options: ConfirmOptions,
}

impl PendingTransaction {
    pub fn new(client: Client, hash: TransactionHash) -> Self {
        PendingTransaction {
            client,
            hash,
            options: ConfirmOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConfirmOptions) -> Self {
        self.options = options;
        self
    }

    pub fn hash(&self) -> &TransactionHash {
        &self.hash
    }

    pub fn options(&self) -> &ConfirmOptions {
        &self.options
    }

    /// Single lookup, no waiting.
    pub async fn get(&self) -> SdkResult<Option<TransactionInfo>> {
        self.client.get_transaction_by_hash(&self.hash).await
    }

    /// Wait until the node reports a containing block.
    pub async fn mined(&self) -> SdkResult<TransactionInfo> {
        let mut poller = Poller::start(&self.hash, &self.options).await?;
        self.wait_mined(&mut poller).await
    }

    /// Wait for a successful receipt. A failed outcome is returned as
    /// `TransactionFailed` without further polling.
    pub async fn executed(&self) -> SdkResult<TransactionReceipt> {
        let mut poller = Poller::start(&self.hash, &self.options).await?;
        self.wait_executed(&mut poller).await
    }

    /// Wait until the containing block's risk is below the threshold.
    pub async fn confirmed(&self) -> SdkResult<TransactionReceipt> {
        let mut poller = Poller::start(&self.hash, &self.options).await?;
        self.wait_confirmed(&mut poller).await
    }

    /// Address of the contract created by this transaction, once confirmed.
    pub async fn deployed(&self) -> SdkResult<String> {
        let receipt = self.confirmed().await?;
        receipt.contract_created.ok_or_else(|| {
            SdkError::InvalidResponse(format!(
                "Transaction {} did not create a contract",
                self.hash
            ))
        })
    }

    async fn wait_mined(&self, poller: &mut Poller) -> SdkResult<TransactionInfo> {
        let info = poller
            .until("mined", move || async move {
                let info = self.client.get_transaction_by_hash(&self.hash).await?;
                Ok(info.filter(TransactionInfo::is_mined))
            })
            .await?;
        log::debug!("Transaction {} mined", self.hash);
        Ok(info)
    }

    async fn wait_executed(&self, poller: &mut Poller) -> SdkResult<TransactionReceipt> {
        self.wait_mined(poller).await?;
        let receipt = poller
            .until("executed", move || async move {
                let receipt = self.client.get_transaction_receipt(&self.hash).await?;
                match receipt {
                    Some(receipt) if !receipt.is_success() => Err(SdkError::TransactionFailed {
                        hash: self.hash.to_string(),
                        outcome_status: receipt.outcome_status,
                    }),
                    other => Ok(other),
                }
            })
            .await?;
        log::debug!("Transaction {} executed", self.hash);
        Ok(receipt)
    }

    async fn wait_confirmed(&self, poller: &mut Poller) -> SdkResult<TransactionReceipt> {
        let receipt = self.wait_executed(poller).await?;
        let block: BlockHash = match receipt.block_hash {
            Some(block) => block,
            None => self.wait_mined(poller).await?.block_hash.ok_or_else(|| {
                SdkError::InvalidResponse(format!(
                    "Mined transaction {} has no block hash",
                    self.hash
                ))
            })?,
        };

        let threshold = self.options.threshold;
        poller
            .until("confirmed", move || async move {
                let risk = self.client.get_confirmation_risk_by_hash(&block).await?;
                Ok(risk.filter(|risk| *risk < threshold).map(|_| ()))
            })
            .await?;
        log::debug!("Transaction {} confirmed in block {}", self.hash, block);
        Ok(receipt)
    }
}

/// Fixed-schedule poller with a deadline shared across stages.
struct Poller {
    hash: String,
    interval: Duration,
    timeout: Duration,
    deadline: Instant,
}

impl Poller {
    async fn start(hash: &TransactionHash, options: &ConfirmOptions) -> SdkResult<Self> {
        options.validate()?;
        if !options.delay.is_zero() {
            sleep(options.delay).await;
        }
        Ok(Poller {
            hash: hash.to_string(),
            interval: options.interval,
            timeout: options.timeout,
            deadline: Instant::now() + options.timeout,
        })
    }

    /// Query until `observe` yields a value. The deadline is checked before
    /// each query, and queries start `interval` apart regardless of how long
    /// each one takes.
    async fn until<T, F, Fut>(&mut self, stage: &str, mut observe: F) -> SdkResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SdkResult<Option<T>>>,
    {
        loop {
            let started = Instant::now();
            if started >= self.deadline {
                return Err(SdkError::Timeout(format!(
                    "Transaction {} not {} within {} ms",
                    self.hash,
                    stage,
                    self.timeout.as_millis()
                )));
            }
            if let Some(value) = observe().await? {
                return Ok(value);
            }
            sleep_until(started + self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::ClientConfig;
    use crate::format::HexString;
    use crate::transport::scripted::ScriptedTransport;
    use primitive_types::U256;
    use serde_json::{json, Value};
    use std::sync::Arc;

    const TX_BY_HASH: &str = "cfx_getTransactionByHash";
    const RECEIPT: &str = "cfx_getTransactionReceipt";
    const RISK: &str = "cfx_getConfirmationRiskByHash";

    fn tx_hash() -> TransactionHash {
        TransactionHash::new([0x11; 32])
    }

    fn block() -> String {
        format!("0x{}", "33".repeat(32))
    }

    fn pending_info() -> Value {
        json!({ "hash": tx_hash().to_string(), "blockHash": null, "status": null })
    }

    fn mined_info() -> Value {
        json!({ "hash": tx_hash().to_string(), "blockHash": block(), "status": "0x0" })
    }

    fn receipt(status: &str, contract: Option<&str>) -> Value {
        json!({
            "transactionHash": tx_hash().to_string(),
            "blockHash": block(),
            "index": "0x0",
            "epochNumber": "0x20",
            "outcomeStatus": status,
            "contractCreated": contract,
        })
    }

    fn risk(divisor: u64) -> Value {
        json!(HexString::from(U256::MAX / divisor).to_string())
    }

    fn final_node() -> ScriptedTransport {
        ScriptedTransport::new()
            .script(TX_BY_HASH, vec![mined_info()])
            .script(RECEIPT, vec![receipt("0x0", None)])
            .script(RISK, vec![risk(1000)])
    }

    fn pending(
        transport: ScriptedTransport,
        options: ConfirmOptions,
    ) -> (PendingTransaction, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        let client = Client::with_transport(transport.clone(), ClientConfig::default());
        (
            PendingTransaction::new(client, tx_hash()).with_options(options),
            transport,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn mined_after_block_is_reported() {
        let (tx, node) = pending(
            ScriptedTransport::new()
                .script(TX_BY_HASH, vec![Value::Null, pending_info(), mined_info()]),
            ConfirmOptions::default(),
        );

        let info = tx.mined().await.unwrap();
        assert!(info.is_mined());
        assert_eq!(node.count(TX_BY_HASH), 3);
        assert_eq!(node.count(RECEIPT), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_outcome_is_not_retried() {
        let (tx, node) = pending(
            ScriptedTransport::new()
                .script(TX_BY_HASH, vec![mined_info()])
                .script(RECEIPT, vec![Value::Null, receipt("0x1", None)]),
            ConfirmOptions::default(),
        );

        match tx.confirmed().await {
            Err(SdkError::TransactionFailed {
                hash,
                outcome_status,
            }) => {
                assert_eq!(hash, tx_hash().to_string());
                assert_eq!(outcome_status, 1);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(node.count(RECEIPT), 2);
        assert_eq!(node.count(RISK), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_waits_for_risk_below_threshold() {
        let (tx, node) = pending(
            ScriptedTransport::new()
                .script(TX_BY_HASH, vec![mined_info()])
                .script(RECEIPT, vec![receipt("0x0", None)])
                .script(RISK, vec![Value::Null, risk(50), risk(1000)]),
            ConfirmOptions::default(),
        );

        let receipt = tx.confirmed().await.unwrap();
        assert!(receipt.is_success());
        assert_eq!(node.count(RISK), 3);
        assert_eq!(node.params(RISK)[0], vec![json!(block())]);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_options_fail_before_any_query() {
        for options in [
            ConfirmOptions::default().interval(Duration::ZERO),
            ConfirmOptions::default().threshold(0.0),
            ConfirmOptions::default().threshold(1.0),
            ConfirmOptions::default().threshold(f64::NAN),
        ] {
            let (tx, node) = pending(final_node(), options);
            assert!(matches!(tx.mined().await, Err(SdkError::FormatError(_))));
            assert_eq!(node.total_calls(), 0);
        }
        assert!(ConfirmOptions::default().validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_fails_before_any_query() {
        let (tx, node) = pending(final_node(), ConfirmOptions::default().timeout(Duration::ZERO));

        let err = tx.confirmed().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(node.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_elapses_while_unmined() {
        let (tx, node) = pending(
            ScriptedTransport::new().script(TX_BY_HASH, vec![pending_info()]),
            ConfirmOptions::default().timeout(Duration::from_millis(3_500)),
        );

        let started = Instant::now();
        let err = tx.mined().await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("mined"));
        assert_eq!(node.count(TX_BY_HASH), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(4_000));
    }

    #[tokio::test(start_paused = true)]
    async fn stages_share_one_deadline() {
        let (tx, node) = pending(
            ScriptedTransport::new()
                .script(TX_BY_HASH, vec![pending_info(), mined_info()])
                .script(RECEIPT, vec![Value::Null]),
            ConfirmOptions::default().timeout(Duration::from_millis(2_500)),
        );

        let err = tx.executed().await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(node.count(TX_BY_HASH), 2);
        assert_eq!(node.count(RECEIPT), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_is_anchored_to_query_start() {
        let (tx, node) = pending(
            ScriptedTransport::new()
                .with_latency(Duration::from_millis(400))
                .script(TX_BY_HASH, vec![pending_info(), pending_info(), mined_info()]),
            ConfirmOptions::default(),
        );

        tx.mined().await.unwrap();
        let starts = node.started_at(TX_BY_HASH);
        assert_eq!(starts.len(), 3);
        assert_eq!(starts[1] - starts[0], Duration::from_millis(1_000));
        assert_eq!(starts[2] - starts[1], Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_applies_once_and_not_against_timeout() {
        let (tx, node) = pending(
            final_node(),
            ConfirmOptions::default()
                .delay(Duration::from_millis(5_000))
                .timeout(Duration::from_millis(2_000)),
        );

        let started = Instant::now();
        tx.confirmed().await.unwrap();
        assert_eq!(node.started_at(TX_BY_HASH)[0] - started, Duration::from_millis(5_000));
        assert_eq!(node.started_at(RISK)[0] - started, Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn deployed_returns_created_contract() {
        let contract = "0x8a6b4b9c8a9e7e0b0b4b8a6b4b9c8a9e7e0b0b4b";
        let (tx, _) = pending(
            ScriptedTransport::new()
                .script(TX_BY_HASH, vec![mined_info()])
                .script(RECEIPT, vec![receipt("0x0", Some(contract))])
                .script(RISK, vec![risk(1000)]),
            ConfirmOptions::default(),
        );
        assert_eq!(tx.deployed().await.unwrap(), contract);

        let (plain, _) = pending(final_node(), ConfirmOptions::default());
        assert!(matches!(
            plain.deployed().await,
            Err(SdkError::InvalidResponse(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn deployed_fails_on_failed_outcome() {
        let (tx, _) = pending(
            ScriptedTransport::new()
                .script(TX_BY_HASH, vec![mined_info()])
                .script(RECEIPT, vec![receipt("0x2", None)]),
            ConfirmOptions::default(),
        );
        assert!(matches!(
            tx.deployed().await,
            Err(SdkError::TransactionFailed { outcome_status: 2, .. })
        ));
    }
}
