use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes128;
use ctr::Ctr128BE;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::blockchain::PrivateKey;
use crate::crypto::keccak256;
use crate::errors::{SdkError, SdkResult};
use crate::format::HexString;

pub const KEYSTORE_VERSION: u32 = 3;
const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;
const DK_LEN: usize = 32;
const MAC_LEN: usize = 32;

// scrypt work factor: N = 2^13, r = 8, p = 1.
const SCRYPT_LOG_N: u8 = 13;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

type Aes128Ctr = Ctr128BE<Aes128>;

/// An encrypted private key. Every field except `version` is canonical hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreRecord {
    pub version: u32,
    pub salt: HexString,
    pub iv: HexString,
    pub cipher: HexString,
    pub mac: HexString,
}

/// Encrypt a private key under `password` with a fresh random salt and IV.
pub fn encrypt(private_key: &PrivateKey, password: &SecretString) -> SdkResult<KeystoreRecord> {
    let mut rng = OsRng;
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    encrypt_with(private_key, password, &salt, &iv)
}

fn encrypt_with(
    private_key: &PrivateKey,
    password: &SecretString,
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
) -> SdkResult<KeystoreRecord> {
    let derived = derive_key(password, salt)?;

    let mut ciphertext = private_key.as_bytes().to_vec();
    apply_ctr(&derived[..16], iv, &mut ciphertext)?;
    let mac = compute_mac(&derived, &ciphertext);

    Ok(KeystoreRecord {
        version: KEYSTORE_VERSION,
        salt: HexString::from_bytes(salt),
        iv: HexString::from_bytes(iv),
        cipher: HexString::from_bytes(&ciphertext),
        mac: HexString::from_bytes(&mac),
    })
}

/// Decrypt a keystore record. The MAC is checked before any decryption.
pub fn decrypt(record: &KeystoreRecord, password: &SecretString) -> SdkResult<PrivateKey> {
    if record.version != KEYSTORE_VERSION {
        return Err(SdkError::VersionError {
            expected: KEYSTORE_VERSION,
            found: record.version,
        });
    }

    let iv = record.iv.bytes_exact();
    if iv.len() != IV_LEN {
        return Err(SdkError::format(record.iv.as_str(), "keystore iv must be 16 bytes"));
    }
    let expected_mac = record.mac.bytes_exact();
    if expected_mac.len() != MAC_LEN {
        return Err(SdkError::format(record.mac.as_str(), "keystore mac must be 32 bytes"));
    }

    let derived = derive_key(password, &record.salt.bytes_exact())?;
    let ciphertext = record.cipher.bytes_exact();
    if compute_mac(&derived, &ciphertext).as_slice() != expected_mac.as_slice() {
        return Err(SdkError::AuthenticationError(
            "Keystore MAC mismatch: wrong password or corrupted data".to_string(),
        ));
    }

    let mut plaintext = Zeroizing::new(ciphertext);
    apply_ctr(&derived[..16], &iv, &mut plaintext)?;
    PrivateKey::from_slice(&plaintext)
}

fn derive_key(password: &SecretString, salt: &[u8]) -> SdkResult<Zeroizing<[u8; DK_LEN]>> {
    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, DK_LEN)
        .map_err(|e| SdkError::CryptoError(format!("Invalid scrypt params: {e}")))?;

    let mut key = Zeroizing::new([0u8; DK_LEN]);
    scrypt::scrypt(
        password.expose_secret().as_bytes(),
        salt,
        &params,
        key.as_mut(),
    )
    .map_err(|e| SdkError::CryptoError(format!("KDF failed: {e}")))?;
    Ok(key)
}

fn apply_ctr(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> SdkResult<()> {
    let mut cipher = Aes128Ctr::new_from_slices(key, iv)
        .map_err(|e| SdkError::CryptoError(format!("Invalid cipher key or iv: {e}")))?;
    cipher.apply_keystream(buffer);
    Ok(())
}

fn compute_mac(derived: &[u8; DK_LEN], ciphertext: &[u8]) -> [u8; MAC_LEN] {
    let mut input = Zeroizing::new(Vec::with_capacity(16 + ciphertext.len()));
    input.extend_from_slice(&derived[16..]);
    input.extend_from_slice(ciphertext);
    keccak256(input.as_slice())
}

/// A keystore record persisted as JSON at a fixed path.
pub struct KeystoreFile {
    path: PathBuf,
}

impl KeystoreFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write a new keystore file. Fails if one already exists.
    pub fn create(&self, record: &KeystoreRecord) -> SdkResult<()> {
        if self.exists() {
            return Err(SdkError::AlreadyExists(self.path.display().to_string()));
        }
        self.save(record)
    }

    /// Write the record, replacing any existing file atomically.
    pub fn save(&self, record: &KeystoreRecord) -> SdkResult<()> {
        let mut file = create_atomic_file(&self.path)?;
        let serialized = serde_json::to_vec_pretty(record)?;
        file.write_all(&serialized)?;
        file.sync_all()?;
        finalize_atomic_file(file, &self.path)?;
        log::debug!("Keystore written to {}", self.path.display());
        Ok(())
    }

    pub fn load(&self) -> SdkResult<KeystoreRecord> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load and decrypt in one step.
    pub fn unlock(&self, password: &SecretString) -> SdkResult<PrivateKey> {
        decrypt(&self.load()?, password)
    }
}

pub(crate) fn create_atomic_file(path: &Path) -> SdkResult<File> {
    let dir = path
        .parent()
        .ok_or_else(|| SdkError::StorageError(format!("Invalid path: {}", path.display())))?;
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }
    let tmp_path = path.with_extension("new");
    Ok(File::create(&tmp_path)?)
}

pub(crate) fn finalize_atomic_file(mut file: File, final_path: &Path) -> SdkResult<()> {
    file.flush()?;
    drop(file);
    let tmp_path = final_path.with_extension("new");
    fs::rename(tmp_path, final_path)?;
    Ok(())
}
