/// Domain value types for the Conflux client
///
/// Each type here is a canonical hex value with an extra post-condition:
/// a fixed payload length for addresses, keys and hashes, an enumerated
/// sentinel set for epoch tags, and integral scaling for amounts.
use crate::errors::{SdkError, SdkResult};
use crate::format::{parse_scaled_decimal, HexString, ToHex};
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr, $label:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            pub const SIZE: usize = $len;

            pub fn new(bytes: [u8; $len]) -> Self {
                $name(bytes)
            }

            /// Build from raw bytes; the length must be exact.
            pub fn from_slice(bytes: &[u8]) -> SdkResult<Self> {
                let array: [u8; $len] = bytes.try_into().map_err(|_| {
                    SdkError::FormatError(format!(
                        "Invalid {} length: expected {} bytes, got {}: 0x{}",
                        $label,
                        $len,
                        bytes.len(),
                        hex::encode(bytes)
                    ))
                })?;
                Ok($name(array))
            }

            /// Coerce any canonical-codec input, then check the length.
            pub fn parse<T: ToHex + ?Sized>(value: &T) -> SdkResult<Self> {
                let canonical = value.to_hex()?;
                Self::from_slice(&canonical.bytes_exact())
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex_string(&self) -> HexString {
                HexString::from_bytes(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = SdkError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl ToHex for $name {
            fn to_hex(&self) -> SdkResult<HexString> {
                Ok(self.to_hex_string())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                Self::parse(text.as_str()).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// A 20-byte account or contract address.
    Address,
    20,
    "address"
);

fixed_bytes!(
    /// Hash identifying a block.
    BlockHash,
    32,
    "block hash"
);

fixed_bytes!(
    /// Hash identifying a transaction.
    TransactionHash,
    32,
    "transaction hash"
);

/// An uncompressed secp256k1 public key without its format prefix byte.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; 64]);

impl PublicKey {
    pub const SIZE: usize = 64;

    pub fn from_slice(bytes: &[u8]) -> SdkResult<Self> {
        let array: [u8; 64] = bytes.try_into().map_err(|_| {
            SdkError::FormatError(format!(
                "Invalid public key length: expected 64 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(PublicKey(array))
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Low 20 bytes of the keccak digest of the key.
    pub fn to_address(&self) -> Address {
        crate::crypto::public_to_address(self)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

/// A 32-byte secp256k1 private key. Cleared from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    pub const SIZE: usize = 32;

    /// Generate a new random private key
    pub fn random() -> Self {
        use k256::ecdsa::SigningKey;
        use rand::rngs::OsRng;

        let signing_key = SigningKey::random(&mut OsRng);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&signing_key.to_bytes());
        PrivateKey(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> SdkResult<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            SdkError::FormatError(format!(
                "Invalid private key length: expected 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(PrivateKey(array))
    }

    /// Coerce any canonical-codec input, then check the length.
    pub fn parse<T: ToHex + ?Sized>(value: &T) -> SdkResult<Self> {
        let canonical = value.to_hex()?;
        let mut bytes = canonical.bytes_exact();
        let key = Self::from_slice(&bytes);
        bytes.zeroize();
        key
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Get hex representation (be careful with this - sensitive data!)
    pub fn to_hex_string(&self) -> HexString {
        HexString::from_bytes(&self.0)
    }

    pub fn public_key(&self) -> SdkResult<PublicKey> {
        crate::crypto::private_to_public(self)
    }

    pub fn address(&self) -> SdkResult<Address> {
        Ok(self.public_key()?.to_address())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for PrivateKey {}

impl FromStr for PrivateKey {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A point-in-time reference: a numeric epoch or one of the named sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpochNumber {
    Earliest,
    LatestState,
    LatestMined,
    Number(u64),
}

impl EpochNumber {
    pub fn parse(text: &str) -> SdkResult<Self> {
        match text.to_ascii_lowercase().as_str() {
            "earliest" => Ok(EpochNumber::Earliest),
            "latest_state" => Ok(EpochNumber::LatestState),
            "latest_mined" => Ok(EpochNumber::LatestMined),
            _ => {
                let hex = HexString::parse(text)
                    .map_err(|_| SdkError::format(text, "invalid epoch number"))?;
                if hex.is_empty() {
                    return Err(SdkError::format(text, "epoch number cannot be empty"));
                }
                let value = hex
                    .to_u256()
                    .map_err(|_| SdkError::format(text, "invalid epoch number"))?;
                if value > U256::from(u64::MAX) {
                    return Err(SdkError::format(text, "epoch number exceeds 64 bits"));
                }
                Ok(EpochNumber::Number(value.low_u64()))
            }
        }
    }

    pub fn as_rpc_string(&self) -> String {
        match self {
            EpochNumber::Earliest => "earliest".to_string(),
            EpochNumber::LatestState => "latest_state".to_string(),
            EpochNumber::LatestMined => "latest_mined".to_string(),
            EpochNumber::Number(n) => format!("0x{:x}", n),
        }
    }
}

impl Default for EpochNumber {
    fn default() -> Self {
        EpochNumber::LatestState
    }
}

impl From<u64> for EpochNumber {
    fn from(value: u64) -> Self {
        EpochNumber::Number(value)
    }
}

impl fmt::Display for EpochNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_rpc_string())
    }
}

impl FromStr for EpochNumber {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EpochNumber::parse(s)
    }
}

impl Serialize for EpochNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_rpc_string())
    }
}

impl<'de> Deserialize<'de> for EpochNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        EpochNumber::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// An amount in drip, the smallest unit (1 CFX = 10^18 drip, 1 GDrip = 10^9 drip).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Drip(U256);

impl Drip {
    pub const GDRIP_DECIMALS: u32 = 9;
    pub const CFX_DECIMALS: u32 = 18;

    pub fn new(value: U256) -> Self {
        Drip(value)
    }

    pub fn zero() -> Self {
        Drip(U256::zero())
    }

    /// Parse a drip amount: `0x`-prefixed hex, or a decimal that must be integral.
    pub fn parse(text: &str) -> SdkResult<Self> {
        let trimmed = text.trim();
        if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
            return Ok(Drip(HexString::parse(trimmed)?.to_u256()?));
        }
        Ok(Drip(parse_scaled_decimal(trimmed, 0)?))
    }

    /// Scale a GDrip amount by 10^9. The result must be an exact integer.
    pub fn from_gdrip(amount: &str) -> SdkResult<Self> {
        Ok(Drip(parse_scaled_decimal(amount, Self::GDRIP_DECIMALS)?))
    }

    /// Scale a CFX amount by 10^18. The result must be an exact integer.
    pub fn from_cfx(amount: &str) -> SdkResult<Self> {
        Ok(Drip(parse_scaled_decimal(amount, Self::CFX_DECIMALS)?))
    }

    pub fn value(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_gdrip_string(&self) -> String {
        scaled_string(self.0, Self::GDRIP_DECIMALS)
    }

    pub fn to_cfx_string(&self) -> String {
        scaled_string(self.0, Self::CFX_DECIMALS)
    }

    pub fn checked_add(&self, other: &Drip) -> SdkResult<Drip> {
        self.0
            .checked_add(other.0)
            .map(Drip)
            .ok_or_else(|| SdkError::format(&(self.0, other.0), "amount overflow in addition"))
    }

    pub fn checked_mul(&self, factor: u64) -> SdkResult<Drip> {
        self.0
            .checked_mul(U256::from(factor))
            .map(Drip)
            .ok_or_else(|| SdkError::format(&(self.0, factor), "amount overflow in multiplication"))
    }
}

fn scaled_string(value: U256, decimals: u32) -> String {
    let unit = U256::exp10(decimals as usize);
    let whole = value / unit;
    let fractional = value % unit;

    if fractional.is_zero() {
        whole.to_string()
    } else {
        let frac_str = format!("{:0>width$}", fractional.to_string(), width = decimals as usize);
        format!("{}.{}", whole, frac_str.trim_end_matches('0'))
    }
}

impl From<U256> for Drip {
    fn from(value: U256) -> Self {
        Drip(value)
    }
}

impl From<u64> for Drip {
    fn from(value: u64) -> Self {
        Drip(U256::from(value))
    }
}

impl fmt::Display for Drip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} drip", self.0)
    }
}

impl FromStr for Drip {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Drip::parse(s)
    }
}

impl ToHex for Drip {
    fn to_hex(&self) -> SdkResult<HexString> {
        Ok(HexString::from(self.0))
    }
}

impl Serialize for Drip {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        crate::format::quantity::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Drip {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        crate::format::quantity::deserialize(deserializer).map(Drip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_creation() {
        let bytes: Vec<u8> = (1..=20).collect();
        let addr = Address::from_slice(&bytes).unwrap();
        assert_eq!(addr.as_bytes().as_slice(), bytes.as_slice());
        assert_eq!(addr.to_string(), "0x0102030405060708090a0b0c0d0e0f1011121314");
    }

    #[test]
    fn test_address_parsing() {
        let addr: Address = "0x0102030405060708090A0B0C0D0E0F1011121314".parse().unwrap();
        assert_eq!(addr.to_string(), "0x0102030405060708090a0b0c0d0e0f1011121314");

        // Missing prefix is accepted by the canonical codec.
        let bare = Address::parse("0102030405060708090a0b0c0d0e0f1011121314").unwrap();
        assert_eq!(bare, addr);
    }

    #[test]
    fn test_fixed_length_enforced() {
        assert!(matches!(
            Address::parse("0x0102"),
            Err(SdkError::FormatError(_))
        ));
        assert!(TransactionHash::parse(&[0u8; 31]).is_err());
        assert!(BlockHash::parse(&[7u8; 32]).is_ok());
        assert!(PrivateKey::parse("0x00").is_err());

        // The zero collapse must not shorten a fixed-width value.
        let zero = Address::parse(&[0u8; 20]).unwrap();
        assert_eq!(zero.as_bytes(), &[0u8; 20]);
    }

    #[test]
    fn test_hash_serde() {
        let text = format!("\"0x{}\"", "ab".repeat(32));
        let hash: TransactionHash = serde_json::from_str(&text).unwrap();
        assert_eq!(serde_json::to_string(&hash).unwrap(), text);
        assert!(serde_json::from_str::<TransactionHash>("\"0xabcd\"").is_err());
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let key = PrivateKey::parse(&[0x11u8; 32]).unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("1111"));
    }

    #[test]
    fn test_random_private_keys_differ() {
        let a = PrivateKey::random();
        let b = PrivateKey::random();
        assert_ne!(a, b);
        assert!(a.public_key().is_ok());
    }

    #[test]
    fn test_epoch_tags() {
        assert_eq!(EpochNumber::parse("LATEST_STATE").unwrap(), EpochNumber::LatestState);
        assert_eq!(EpochNumber::parse("earliest").unwrap(), EpochNumber::Earliest);
        assert_eq!(EpochNumber::parse("Latest_Mined").unwrap(), EpochNumber::LatestMined);
        assert_eq!(EpochNumber::parse("0x10").unwrap(), EpochNumber::Number(16));
        assert_eq!(EpochNumber::Number(255).to_string(), "0xff");

        assert!(EpochNumber::parse("latest").is_err());
        assert!(EpochNumber::parse("pending").is_err());
        assert!(matches!(EpochNumber::parse(""), Err(SdkError::FormatError(_))));
        assert!(matches!(EpochNumber::parse("0x"), Err(SdkError::FormatError(_))));
        assert_eq!(EpochNumber::parse("0x0").unwrap(), EpochNumber::Number(0));
    }

    #[test]
    fn test_amount_scaling() {
        let one_cfx = Drip::from_cfx("1").unwrap();
        assert_eq!(one_cfx.value(), U256::exp10(18));
        assert_eq!(one_cfx.to_cfx_string(), "1");

        let gas_price = Drip::from_gdrip("1.5").unwrap();
        assert_eq!(gas_price.value(), U256::from(1_500_000_000u64));
        assert_eq!(gas_price.to_gdrip_string(), "1.5");

        assert_eq!(Drip::parse("0x10").unwrap(), Drip::from(16u64));
        assert_eq!(Drip::parse("1000").unwrap(), Drip::from(1000u64));
        assert!(Drip::from_cfx("1e9223372036854775807").is_err());
        assert!("1e-9223372036854775808".parse::<Drip>().is_err());
    }

    #[test]
    fn test_amount_rejects_non_integral() {
        assert!(Drip::from_gdrip("0.0000000001").is_err());
        assert!(Drip::parse("1.5").is_err());
        assert!(Drip::parse("-3").is_err());
        assert!(Drip::from_cfx("abc").is_err());
    }

    #[test]
    fn test_amount_arithmetic() {
        let a = Drip::from(3u64);
        let b = Drip::from(2u64);
        assert_eq!(a.checked_add(&b).unwrap(), Drip::from(5u64));
        assert_eq!(a.checked_mul(21000).unwrap(), Drip::from(63000u64));
        assert!(Drip::new(U256::MAX).checked_add(&b).is_err());
    }
}
