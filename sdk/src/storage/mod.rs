pub mod keystore;

pub use keystore::{decrypt, encrypt, KeystoreFile, KeystoreRecord, KEYSTORE_VERSION};
