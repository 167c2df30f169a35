/// A signing account: a private key with its derived public key and address.
use crate::blockchain::{Address, PrivateKey, PublicKey};
use crate::errors::SdkResult;
use crate::storage::keystore::{self, KeystoreRecord};
use crate::transaction::{Transaction, TransactionOptions};
use secrecy::SecretString;

#[derive(Clone)]
pub struct Account {
    private_key: PrivateKey,
    public_key: PublicKey,
    address: Address,
}

impl Account {
    pub fn from_private_key(private_key: PrivateKey) -> SdkResult<Self> {
        let public_key = private_key.public_key()?;
        let address = public_key.to_address();
        Ok(Account {
            private_key,
            public_key,
            address,
        })
    }

    /// Generate an account with a fresh random key.
    pub fn random() -> SdkResult<Self> {
        Self::from_private_key(PrivateKey::random())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Sign `tx` in place with this account's key.
    pub fn sign(&self, tx: &mut Transaction) -> SdkResult<()> {
        tx.sign(&self.private_key)
    }

    /// Build a transaction from `options` and sign it.
    pub fn sign_transaction(&self, options: TransactionOptions) -> SdkResult<Transaction> {
        let mut tx = Transaction::new(options)?;
        self.sign(&mut tx)?;
        Ok(tx)
    }

    pub fn encrypt(&self, password: &SecretString) -> SdkResult<KeystoreRecord> {
        keystore::encrypt(&self.private_key, password)
    }

    pub fn decrypt(record: &KeystoreRecord, password: &SecretString) -> SdkResult<Self> {
        Self::from_private_key(keystore::decrypt(record, password)?)
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
