/// RPC client for Conflux-style nodes
///
/// Wraps a `Transport` chosen from the endpoint scheme and decodes the
/// node's JSON payloads into typed values.
use crate::account::Account;
use crate::api::types::{TransactionInfo, TransactionReceipt};
use crate::blockchain::{Address, BlockHash, Drip, EpochNumber, TransactionHash};
use crate::config_store::ClientConfig;
use crate::errors::{SdkError, SdkResult};
use crate::format::HexString;
use crate::pending::PendingTransaction;
use crate::transaction::TransactionOptions;
use crate::transport::{self, Transport};
use primitive_types::U256;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
}

impl Client {
    /// Connect to `config.network.endpoint` with the transport its scheme selects.
    pub fn new(config: ClientConfig) -> SdkResult<Self> {
        config.validate()?;
        let transport = transport::connect(
            &config.network.endpoint,
            config.network.request_timeout(),
        )?;
        log::info!(
            "Client for {} ({})",
            config.network.endpoint,
            config.environment
        );
        Ok(Self::with_transport(transport, config))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Client {
            transport,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Invoke `method` and decode its result.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> SdkResult<T> {
        let result = self.transport.call(method, params).await?;
        serde_json::from_value(result).map_err(|e| {
            SdkError::InvalidResponse(format!("Unexpected result from {}: {}", method, e))
        })
    }

    pub async fn get_gas_price(&self) -> SdkResult<Drip> {
        self.call("cfx_gasPrice", vec![]).await
    }

    pub async fn get_epoch_number(&self, epoch: EpochNumber) -> SdkResult<u64> {
        let raw: HexString = self.call("cfx_epochNumber", vec![json!(epoch)]).await?;
        let value = raw.to_u256()?;
        if value > U256::from(u64::MAX) {
            return Err(SdkError::InvalidResponse(format!(
                "Epoch number {} exceeds 64 bits",
                raw
            )));
        }
        Ok(value.low_u64())
    }

    pub async fn get_balance(&self, address: &Address, epoch: EpochNumber) -> SdkResult<Drip> {
        self.call("cfx_getBalance", vec![json!(address), json!(epoch)])
            .await
    }

    pub async fn get_next_nonce(&self, address: &Address) -> SdkResult<U256> {
        let raw: HexString = self.call("cfx_getNextNonce", vec![json!(address)]).await?;
        raw.to_u256()
    }

    /// `None` when the node does not know the transaction.
    pub async fn get_transaction_by_hash(
        &self,
        hash: &TransactionHash,
    ) -> SdkResult<Option<TransactionInfo>> {
        self.call("cfx_getTransactionByHash", vec![json!(hash)])
            .await
    }

    /// `None` until the transaction has been executed.
    pub async fn get_transaction_receipt(
        &self,
        hash: &TransactionHash,
    ) -> SdkResult<Option<TransactionReceipt>> {
        self.call("cfx_getTransactionReceipt", vec![json!(hash)])
            .await
    }

    /// Confirmation risk of `block` as a fraction in `[0, 1]`, or `None` if
    /// the node has no estimate.
    pub async fn get_confirmation_risk_by_hash(&self, block: &BlockHash) -> SdkResult<Option<f64>> {
        let raw: Option<HexString> = self
            .call("cfx_getConfirmationRiskByHash", vec![json!(block)])
            .await?;
        match raw {
            Some(raw) => Ok(Some(risk_fraction(raw.to_u256()?))),
            None => Ok(None),
        }
    }

    pub async fn send_raw_transaction(&self, raw: &HexString) -> SdkResult<TransactionHash> {
        self.call("cfx_sendRawTransaction", vec![json!(raw)]).await
    }

    /// Fill missing nonce, gas price and gas, sign with `account` and submit.
    pub async fn send_transaction(
        &self,
        account: &Account,
        mut options: TransactionOptions,
    ) -> SdkResult<PendingTransaction> {
        if options.nonce.is_none() {
            options.nonce = Some(self.get_next_nonce(&account.address()).await?);
        }
        if options.gas_price.is_none() {
            options.gas_price = Some(self.get_gas_price().await?);
        }
        if options.gas.is_none() {
            options.gas = Some(U256::from(self.config.transaction.gas));
        }

        let tx = account.sign_transaction(options)?;
        let local = tx.hash();
        let hash = self.send_raw_transaction(&tx.serialize()?).await?;
        if hash != local {
            log::warn!(
                "Node reported transaction hash {} but the signing digest is {}",
                hash,
                local
            );
        }
        log::debug!("Submitted transaction {} from {}", hash, account.address());

        Ok(PendingTransaction::new(self.clone(), hash)
            .with_options(self.config.polling.confirm_options()))
    }

    pub async fn close(&self) -> SdkResult<()> {
        self.transport.close().await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.config.network.endpoint)
            .finish()
    }
}

/// `value / (2^256 - 1)`.
fn risk_fraction(value: U256) -> f64 {
    fn approximate(value: U256) -> f64 {
        value
            .0
            .iter()
            .enumerate()
            .map(|(i, limb)| *limb as f64 * 2f64.powi(64 * i as i32))
            .sum()
    }
    approximate(value) / approximate(U256::MAX)
}
