use crate::blockchain::{BlockHash, Drip, TransactionHash};
use crate::format::{quantity, HexString};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Outcome status reported for a successfully executed transaction.
pub const OUTCOME_SUCCESS: u64 = 0;

/// Node addresses are kept as text; nodes may report hex or base32 forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub hash: TransactionHash,
    #[serde(default, with = "quantity::option")]
    pub nonce: Option<U256>,
    #[serde(default)]
    pub block_hash: Option<BlockHash>,
    #[serde(default, with = "quantity::option")]
    pub transaction_index: Option<U256>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<Drip>,
    #[serde(default)]
    pub gas_price: Option<Drip>,
    #[serde(default, with = "quantity::option")]
    pub gas: Option<U256>,
    #[serde(default)]
    pub contract_created: Option<String>,
    #[serde(default)]
    pub data: Option<HexString>,
    #[serde(default, with = "quantity::option")]
    pub status: Option<U256>,
}

impl TransactionInfo {
    /// Mined once the node reports a containing block.
    pub fn is_mined(&self) -> bool {
        self.block_hash.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TransactionHash,
    #[serde(default)]
    pub block_hash: Option<BlockHash>,
    #[serde(default, with = "quantity::option")]
    pub index: Option<U256>,
    #[serde(default, with = "quantity::option")]
    pub epoch_number: Option<U256>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default, with = "quantity::option")]
    pub gas_used: Option<U256>,
    #[serde(default)]
    pub contract_created: Option<String>,
    #[serde(default)]
    pub state_root: Option<HexString>,
    #[serde(deserialize_with = "quantity::deserialize_u64")]
    pub outcome_status: u64,
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.outcome_status == OUTCOME_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_transaction_has_no_block() {
        let info: TransactionInfo = serde_json::from_value(serde_json::json!({
            "hash": format!("0x{}", "11".repeat(32)),
            "nonce": "0x0",
            "blockHash": null,
            "from": "0x14791697260e4c9a71f18484c9f997b308e59325",
            "to": null,
            "value": "0x0",
            "gasPrice": "0x1",
            "gas": "0x5208",
            "status": null,
            "v": "0x1"
        }))
        .unwrap();
        assert!(!info.is_mined());
        assert_eq!(info.gas, Some(U256::from(21000u64)));
    }

    #[test]
    fn receipt_outcome_status() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": format!("0x{}", "22".repeat(32)),
            "blockHash": format!("0x{}", "33".repeat(32)),
            "index": "0x0",
            "epochNumber": "0x10",
            "gasUsed": "0x5208",
            "contractCreated": "0x8a6b4b9c8a9e7e0b0b4b8a6b4b9c8a9e7e0b0b4b",
            "outcomeStatus": "0x1"
        }))
        .unwrap();
        assert_eq!(receipt.outcome_status, 1);
        assert!(!receipt.is_success());
        assert_eq!(receipt.epoch_number, Some(U256::from(16u64)));

        let numeric: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": format!("0x{}", "22".repeat(32)),
            "outcomeStatus": 0
        }))
        .unwrap();
        assert!(numeric.is_success());
    }
}
