// lib.rs - Core library structure for the client

pub mod account;
pub mod api;
pub mod blockchain;
pub mod client;
pub mod config_store;
pub mod crypto;
pub mod errors;
pub mod format;
pub mod pending;
pub mod rlp;
pub mod storage;
pub mod transaction;
pub mod transport;

// Re-export common types
pub use account::Account;
pub use api::types::{TransactionInfo, TransactionReceipt, OUTCOME_SUCCESS};
pub use blockchain::{
    Address, BlockHash, Drip, EpochNumber, PrivateKey, PublicKey, TransactionHash,
};
pub use client::Client;
pub use config_store::{ClientConfig, ConfigStore, NetworkConfig, PollingConfig, TransactionDefaults};
pub use crypto::Signature;
pub use errors::{SdkError, SdkResult};
pub use format::{to_bytes, to_canonical, HexString, Null, ToHex};
pub use pending::{ConfirmOptions, PendingTransaction};
pub use storage::{KeystoreFile, KeystoreRecord, KEYSTORE_VERSION};
pub use transaction::{Transaction, TransactionOptions};
pub use transport::{HttpTransport, JsonRpcRequest, JsonRpcResponse, Transport, WebSocketTransport};
