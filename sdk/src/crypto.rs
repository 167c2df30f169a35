/// Hashing and secp256k1 signing primitives
///
/// Keys are plain byte wrappers from `blockchain`; this module is the only
/// place that turns them into curve points or signatures.
use crate::blockchain::{Address, PrivateKey, PublicKey};
use crate::errors::{SdkError, SdkResult};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

/// Keccak-256 digest of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Keccak256::digest(data.as_ref()).into()
}

/// A recoverable ECDSA signature: 32-byte scalars `r`, `s` and the recovery id `v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl Signature {
    /// Build from minimal big-endian scalars as they appear on the wire.
    pub fn from_parts(r: &[u8], s: &[u8], v: u8) -> SdkResult<Self> {
        Ok(Signature {
            r: left_pad_32(r, "r")?,
            s: left_pad_32(s, "s")?,
            v,
        })
    }
}

fn left_pad_32(bytes: &[u8], name: &str) -> SdkResult<[u8; 32]> {
    if bytes.len() > 32 {
        return Err(SdkError::FormatError(format!(
            "Signature {} is {} bytes, expected at most 32: 0x{}",
            name,
            bytes.len(),
            hex::encode(bytes)
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

fn signing_key(private_key: &PrivateKey) -> SdkResult<SigningKey> {
    SigningKey::from_slice(private_key.as_bytes())
        .map_err(|_| SdkError::CryptoError("Private key is not a valid secp256k1 scalar".to_string()))
}

fn to_public_key(verifying_key: &VerifyingKey) -> SdkResult<PublicKey> {
    let point = verifying_key.to_encoded_point(false);
    // Uncompressed SEC1 form is 0x04 || x || y.
    PublicKey::from_slice(&point.as_bytes()[1..])
}

pub fn private_to_public(private_key: &PrivateKey) -> SdkResult<PublicKey> {
    let key = signing_key(private_key)?;
    to_public_key(key.verifying_key())
}

pub fn public_to_address(public_key: &PublicKey) -> Address {
    let hash = keccak256(public_key.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::new(bytes)
}

/// Sign a 32-byte digest. Nonces follow RFC 6979 and `s` is normalized low.
pub fn sign(digest: &[u8; 32], private_key: &PrivateKey) -> SdkResult<Signature> {
    let key = signing_key(private_key)?;
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| SdkError::CryptoError(format!("Signing failed: {}", e)))?;

    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);

    Ok(Signature {
        r,
        s,
        v: recovery_id.to_byte(),
    })
}

/// Recover the signer's public key. `None` for any malformed or
/// unrecoverable signature.
pub fn recover(digest: &[u8; 32], signature: &Signature) -> Option<PublicKey> {
    let recovery_id = RecoveryId::from_byte(signature.v)?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);
    let sig = K256Signature::from_slice(&rs).ok()?;

    let verifying_key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id).ok()?;
    to_public_key(&verifying_key).ok()
}
