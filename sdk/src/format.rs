//! Canonical value codec.
//!
//! Every value entering the client is reduced to a canonical hex string:
//! `0x` followed by an even number of lowercase hex digits (`0x` alone is the
//! empty value). Conversion back to bytes collapses the single zero byte
//! `0x00` into the empty byte sequence, which is how zero scalars end up as
//! empty strings in the transaction encoding.
use crate::errors::{SdkError, SdkResult};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use primitive_types::U256;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

static HEX_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(0x)?[0-9a-f]*$").expect("hex text pattern is valid"));

/// A canonical `0x`-prefixed, lowercase, even-length hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexString(String);

/// The explicit null sentinel. Maps to the empty canonical value `0x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Null;

impl HexString {
    /// The empty canonical value `0x`.
    pub fn empty() -> Self {
        HexString("0x".to_string())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        HexString(format!("0x{}", hex::encode(bytes)))
    }

    /// Parse text as hex: case-insensitive, optional `0x` prefix, odd
    /// lengths are left-padded with a single `0`.
    pub fn parse(text: &str) -> SdkResult<Self> {
        if !HEX_TEXT.is_match(text) {
            return Err(SdkError::format(text, "invalid hex text"));
        }

        let digits = match text.get(..2) {
            Some("0x") | Some("0X") => &text[2..],
            _ => text,
        };
        let digits = digits.to_ascii_lowercase();

        if digits.len() % 2 == 1 {
            Ok(HexString(format!("0x0{}", digits)))
        } else {
            Ok(HexString(format!("0x{}", digits)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digits without the `0x` prefix.
    pub fn digits(&self) -> &str {
        &self.0[2..]
    }

    /// Number of payload bytes, before any zero collapse.
    pub fn byte_len(&self) -> usize {
        self.digits().len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.digits().is_empty()
    }

    /// Convert to raw bytes. `0x00` yields the empty byte sequence.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.digits() == "00" {
            return Vec::new();
        }
        self.bytes_exact()
    }

    /// Convert to raw bytes without collapsing `0x00`.
    pub fn bytes_exact(&self) -> Vec<u8> {
        // Construction guarantees an even run of hex digits.
        hex::decode(self.digits()).unwrap_or_default()
    }

    /// Interpret the payload as an unsigned big-endian integer.
    pub fn to_u256(&self) -> SdkResult<U256> {
        let bytes = self.bytes_exact();
        let significant = strip_leading_zeros(&bytes);
        if significant.len() > 32 {
            return Err(SdkError::format(self.as_str(), "value exceeds 256 bits"));
        }
        Ok(U256::from_big_endian(significant))
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for HexString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HexString {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HexString::parse(s)
    }
}

impl AsRef<str> for HexString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for HexString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for HexString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        HexString::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Reduce a value to its canonical hex form.
pub trait ToHex {
    fn to_hex(&self) -> SdkResult<HexString>;
}

/// Reduce any supported value to its canonical hex form.
pub fn to_canonical<T: ToHex + ?Sized>(value: &T) -> SdkResult<HexString> {
    value.to_hex()
}

/// Convert a canonical hex value into raw bytes (with the `0x00` collapse).
pub fn to_bytes(value: &HexString) -> Vec<u8> {
    value.to_bytes()
}

/// Minimal big-endian byte form of an unsigned integer; zero is empty.
pub fn uint_bytes(value: U256) -> Vec<u8> {
    HexString::from(value).to_bytes()
}

pub(crate) fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

fn pad_even(digits: String) -> HexString {
    if digits.len() % 2 == 1 {
        HexString(format!("0x0{}", digits))
    } else {
        HexString(format!("0x{}", digits))
    }
}

impl From<U256> for HexString {
    fn from(value: U256) -> Self {
        pad_even(format!("{:x}", value))
    }
}

impl ToHex for HexString {
    fn to_hex(&self) -> SdkResult<HexString> {
        Ok(self.clone())
    }
}

impl ToHex for str {
    fn to_hex(&self) -> SdkResult<HexString> {
        HexString::parse(self)
    }
}

impl ToHex for String {
    fn to_hex(&self) -> SdkResult<HexString> {
        HexString::parse(self)
    }
}

impl ToHex for [u8] {
    fn to_hex(&self) -> SdkResult<HexString> {
        Ok(HexString::from_bytes(self))
    }
}

impl ToHex for Vec<u8> {
    fn to_hex(&self) -> SdkResult<HexString> {
        Ok(HexString::from_bytes(self))
    }
}

impl<const N: usize> ToHex for [u8; N] {
    fn to_hex(&self) -> SdkResult<HexString> {
        Ok(HexString::from_bytes(self))
    }
}

impl ToHex for U256 {
    fn to_hex(&self) -> SdkResult<HexString> {
        Ok(HexString::from(*self))
    }
}

impl ToHex for bool {
    fn to_hex(&self) -> SdkResult<HexString> {
        Ok(HexString::from(U256::from(u8::from(*self))))
    }
}

impl ToHex for Null {
    fn to_hex(&self) -> SdkResult<HexString> {
        Ok(HexString::empty())
    }
}

impl<T: ToHex> ToHex for Option<T> {
    fn to_hex(&self) -> SdkResult<HexString> {
        match self {
            Some(value) => value.to_hex(),
            None => Null.to_hex(),
        }
    }
}

impl<T: ToHex + ?Sized> ToHex for &T {
    fn to_hex(&self) -> SdkResult<HexString> {
        (**self).to_hex()
    }
}

macro_rules! unsigned_to_hex {
    ($($ty:ty),*) => {
        $(
            impl ToHex for $ty {
                fn to_hex(&self) -> SdkResult<HexString> {
                    Ok(pad_even(format!("{:x}", self)))
                }
            }
        )*
    };
}

macro_rules! signed_to_hex {
    ($($ty:ty),*) => {
        $(
            impl ToHex for $ty {
                fn to_hex(&self) -> SdkResult<HexString> {
                    if *self < 0 {
                        return Err(SdkError::format(self, "negative integer"));
                    }
                    Ok(pad_even(format!("{:x}", self)))
                }
            }
        )*
    };
}

unsigned_to_hex!(u8, u16, u32, u64, u128, usize);
signed_to_hex!(i8, i16, i32, i64, i128, isize);

impl ToHex for f64 {
    fn to_hex(&self) -> SdkResult<HexString> {
        if !self.is_finite() || *self < 0.0 || self.fract() != 0.0 {
            return Err(SdkError::format(self, "expected a non-negative integer"));
        }
        // f64 Display never uses exponent notation.
        let value = U256::from_dec_str(&format!("{}", self))
            .map_err(|_| SdkError::format(self, "integer exceeds 256 bits"))?;
        Ok(HexString::from(value))
    }
}

impl ToHex for DateTime<Utc> {
    fn to_hex(&self) -> SdkResult<HexString> {
        self.timestamp_millis().to_hex()
    }
}

impl ToHex for SystemTime {
    fn to_hex(&self) -> SdkResult<HexString> {
        let millis = self
            .duration_since(UNIX_EPOCH)
            .map_err(|_| SdkError::format(self, "timestamp before unix epoch"))?
            .as_millis();
        millis.to_hex()
    }
}

/// Parse a decimal amount (`"12"`, `"1.5"`, `"2e3"`) and scale it by
/// `10^decimals`. Fails unless the scaled magnitude is an exact integer.
pub fn parse_scaled_decimal(text: &str, decimals: u32) -> SdkResult<U256> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SdkError::format(text, "amount cannot be empty"));
    }
    if trimmed.starts_with('-') {
        return Err(SdkError::format(text, "amount cannot be negative"));
    }

    let (mantissa, exponent) = match trimmed.find(['e', 'E']) {
        Some(index) => {
            let exponent: i64 = trimmed[index + 1..]
                .parse()
                .map_err(|_| SdkError::format(text, "invalid exponent"))?;
            (&trimmed[..index], exponent)
        }
        None => (trimmed, 0),
    };

    let parts: Vec<&str> = mantissa.split('.').collect();
    if parts.len() > 2 {
        return Err(SdkError::format(text, "invalid decimal format"));
    }
    let whole = parts[0];
    let fraction = parts.get(1).copied().unwrap_or("");
    if whole.is_empty() && fraction.is_empty() {
        return Err(SdkError::format(text, "amount has no digits"));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(SdkError::format(text, "invalid number format"));
    }

    let mut digits = format!("{}{}", whole, fraction);
    let shift = i64::from(decimals)
        .checked_add(exponent)
        .and_then(|shift| shift.checked_sub(fraction.len() as i64))
        .ok_or_else(|| SdkError::format(text, "exponent out of range"))?;
    if shift < 0 {
        let drop = shift.unsigned_abs() as usize;
        let keep = digits.len().saturating_sub(drop);
        if digits[keep..].chars().any(|c| c != '0') {
            return Err(SdkError::format(text, "amount is not an integer after scaling"));
        }
        digits.truncate(keep);
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }

    let base = U256::from_dec_str(digits)
        .map_err(|_| SdkError::format(text, "amount exceeds 256 bits"))?;
    if shift <= 0 {
        return Ok(base);
    }
    if shift > 77 {
        return Err(SdkError::format(text, "amount exceeds 256 bits"));
    }
    base.checked_mul(U256::exp10(shift as usize))
        .ok_or_else(|| SdkError::format(text, "amount exceeds 256 bits"))
}

/// Serde helpers for quantities that arrive either as hex strings or JSON numbers.
pub mod quantity {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    fn from_raw(raw: Raw) -> SdkResult<U256> {
        match raw {
            Raw::Text(text) => HexString::parse(&text)?.to_u256(),
            Raw::Number(number) => Ok(U256::from(number)),
        }
    }

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        HexString::from(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        from_raw(Raw::deserialize(deserializer)?).map_err(serde::de::Error::custom)
    }

    pub fn deserialize_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = deserialize(deserializer)?;
        if value > U256::from(u64::MAX) {
            return Err(serde::de::Error::custom(format!(
                "quantity {} exceeds 64 bits",
                value
            )));
        }
        Ok(value.low_u64())
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<U256>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<U256>, D::Error> {
            Option::<Raw>::deserialize(deserializer)?
                .map(from_raw)
                .transpose()
                .map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn text_is_lowercased_and_prefixed() {
        assert_eq!(HexString::parse("0xABCD").unwrap().as_str(), "0xabcd");
        assert_eq!(HexString::parse("abcd").unwrap().as_str(), "0xabcd");
        assert_eq!(HexString::parse("0XaB").unwrap().as_str(), "0xab");
    }

    #[test]
    fn odd_length_text_is_left_padded() {
        assert_eq!(HexString::parse("0x1").unwrap().as_str(), "0x01");
        assert_eq!(HexString::parse("abc").unwrap().as_str(), "0x0abc");
    }

    #[test]
    fn empty_text_is_empty_value() {
        assert_eq!(HexString::parse("").unwrap(), HexString::empty());
        assert_eq!(HexString::parse("0x").unwrap(), HexString::empty());
    }

    #[test]
    fn non_hex_text_is_rejected() {
        for bad in ["0xzz", "hello", "0x12 34", "-0x1", "0x0x12"] {
            let err = HexString::parse(bad).unwrap_err();
            assert!(matches!(err, SdkError::FormatError(ref msg) if msg.contains(bad)));
        }
    }

    #[test]
    fn integers_use_minimal_even_length() {
        assert_eq!(to_canonical(&0u64).unwrap().as_str(), "0x00");
        assert_eq!(to_canonical(&1u8).unwrap().as_str(), "0x01");
        assert_eq!(to_canonical(&255u32).unwrap().as_str(), "0xff");
        assert_eq!(to_canonical(&256u64).unwrap().as_str(), "0x0100");
        assert_eq!(to_canonical(&21000i64).unwrap().as_str(), "0x5208");
    }

    #[test]
    fn negative_and_fractional_numbers_fail() {
        assert!(to_canonical(&-1i32).is_err());
        assert!(to_canonical(&1.5f64).is_err());
        assert!(to_canonical(&-2.0f64).is_err());
        assert!(to_canonical(&f64::NAN).is_err());
        assert_eq!(to_canonical(&1e21f64).unwrap(), HexString::from(U256::exp10(21)));
    }

    #[test]
    fn null_and_absent_map_to_empty() {
        assert_eq!(to_canonical(&Null).unwrap().as_str(), "0x");
        assert_eq!(to_canonical(&None::<u64>).unwrap().as_str(), "0x");
        assert_eq!(to_canonical(&Some(16u64)).unwrap().as_str(), "0x10");
    }

    #[test]
    fn bytes_and_booleans() {
        assert_eq!(to_canonical(&[0xdeu8, 0xad][..]).unwrap().as_str(), "0xdead");
        assert_eq!(to_canonical(&Vec::<u8>::new()).unwrap().as_str(), "0x");
        assert_eq!(to_canonical(&true).unwrap().as_str(), "0x01");
        assert_eq!(to_canonical(&false).unwrap().as_str(), "0x00");
    }

    #[test]
    fn timestamps_become_milliseconds() {
        let at = Utc.timestamp_millis_opt(1_500_000_000_123).unwrap();
        assert_eq!(
            to_canonical(&at).unwrap(),
            to_canonical(&1_500_000_000_123u64).unwrap()
        );

        let system = UNIX_EPOCH + std::time::Duration::from_millis(4096);
        assert_eq!(to_canonical(&system).unwrap().as_str(), "0x1000");
    }

    #[test]
    fn single_zero_byte_collapses_to_empty() {
        let zero = HexString::parse("0x00").unwrap();
        assert!(to_bytes(&zero).is_empty());
        assert_eq!(zero.bytes_exact(), vec![0u8]);

        // The reverse direction is not an inverse: empty bytes stay `0x`.
        assert_eq!(HexString::from_bytes(&[]).as_str(), "0x");
        assert_ne!(HexString::from_bytes(&to_bytes(&zero)), zero);

        // Only a single zero byte collapses.
        assert_eq!(to_bytes(&HexString::parse("0x0000").unwrap()), vec![0, 0]);
    }

    #[test]
    fn integers_survive_round_trip() {
        let values = [
            U256::one(),
            U256::from(0x7fu64),
            U256::from(0x80u64),
            U256::from(u64::MAX),
            U256::exp10(30),
            U256::MAX,
        ];
        for value in values {
            let bytes = to_bytes(&to_canonical(&value).unwrap());
            assert_eq!(bytes.first().copied().map(|b| b != 0), Some(true));
            assert_eq!(U256::from_big_endian(&bytes), value);
        }
        assert!(to_bytes(&to_canonical(&U256::zero()).unwrap()).is_empty());
    }

    #[test]
    fn decimal_scaling_requires_exact_integers() {
        assert_eq!(parse_scaled_decimal("1.5", 9).unwrap(), U256::from(1_500_000_000u64));
        assert_eq!(parse_scaled_decimal("2e3", 0).unwrap(), U256::from(2000u64));
        assert_eq!(parse_scaled_decimal("12.000", 0).unwrap(), U256::from(12u64));
        assert_eq!(parse_scaled_decimal("0.000", 18).unwrap(), U256::zero());
        assert_eq!(parse_scaled_decimal(".5", 1).unwrap(), U256::from(5u64));

        assert!(parse_scaled_decimal("1.5", 0).is_err());
        assert!(parse_scaled_decimal("0.0000000001", 9).is_err());
        assert!(parse_scaled_decimal("-1", 0).is_err());
        assert!(parse_scaled_decimal("1.2.3", 0).is_err());
        assert!(parse_scaled_decimal("1e80", 0).is_err());
        assert!(parse_scaled_decimal("", 0).is_err());
    }

    #[test]
    fn extreme_exponents_are_format_errors() {
        assert!(matches!(
            parse_scaled_decimal("1e9223372036854775807", 18),
            Err(SdkError::FormatError(_))
        ));
        assert!(matches!(
            parse_scaled_decimal("1.5e-9223372036854775808", 0),
            Err(SdkError::FormatError(_))
        ));
        assert!(matches!(
            parse_scaled_decimal("1e-9223372036854775807", 0),
            Err(SdkError::FormatError(_))
        ));
    }

    #[test]
    fn quantities_accept_hex_and_numbers() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(with = "quantity")]
            value: U256,
        }

        let hex: Wrapper = serde_json::from_str(r#"{"value":"0x5208"}"#).unwrap();
        assert_eq!(hex.value, U256::from(21000u64));
        let number: Wrapper = serde_json::from_str(r#"{"value":21000}"#).unwrap();
        assert_eq!(number.value, U256::from(21000u64));
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":"0xnope"}"#).is_err());
    }
}
