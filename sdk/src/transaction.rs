/// Transaction codec and signer
///
/// A transaction is the tuple `[nonce, gasPrice, gas, to, value, data]`,
/// optionally followed by the signature `[v, r, s]`. The signing digest is
/// the keccak hash of the unsigned encoding.
use crate::blockchain::{Address, Drip, PrivateKey, PublicKey, TransactionHash};
use crate::crypto::{self, Signature};
use crate::errors::{SdkError, SdkResult};
use crate::format::{quantity, strip_leading_zeros, uint_bytes, HexString};
use crate::rlp::{self, RlpItem};
use primitive_types::U256;
use serde::{Deserialize, Deserializer};

/// Caller-supplied transaction fields. Values are coerced while deserializing,
/// so malformed input fails before a `Transaction` exists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOptions {
    #[serde(default, with = "quantity::option")]
    pub nonce: Option<U256>,
    #[serde(default)]
    pub gas_price: Option<Drip>,
    #[serde(default, with = "quantity::option")]
    pub gas: Option<U256>,
    /// `None` (or the empty value `0x`) creates a contract.
    #[serde(default, deserialize_with = "deserialize_recipient")]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: Option<Drip>,
    #[serde(default)]
    pub data: Option<HexString>,
}

fn deserialize_recipient<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Address>, D::Error> {
    match Option::<HexString>::deserialize(deserializer)? {
        Some(hex) if !hex.is_empty() => Address::from_slice(&hex.bytes_exact())
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nonce(mut self, nonce: impl Into<U256>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn gas_price(mut self, gas_price: impl Into<Drip>) -> Self {
        self.gas_price = Some(gas_price.into());
        self
    }

    pub fn gas(mut self, gas: impl Into<U256>) -> Self {
        self.gas = Some(gas.into());
        self
    }

    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn value(mut self, value: impl Into<Drip>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn data(mut self, data: &[u8]) -> Self {
        self.data = Some(HexString::from_bytes(data));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: U256,
    pub gas_price: Drip,
    pub gas: U256,
    pub to: Option<Address>,
    pub value: Drip,
    pub data: Vec<u8>,
    signature: Option<Signature>,
}

impl Transaction {
    /// Build an unsigned transaction. Nonce, gas price and gas are required.
    pub fn new(options: TransactionOptions) -> SdkResult<Self> {
        let nonce = options
            .nonce
            .ok_or_else(|| SdkError::FormatError("Transaction nonce is required".to_string()))?;
        let gas_price = options.gas_price.ok_or_else(|| {
            SdkError::FormatError("Transaction gas price is required".to_string())
        })?;
        let gas = options
            .gas
            .ok_or_else(|| SdkError::FormatError("Transaction gas is required".to_string()))?;

        Ok(Transaction {
            nonce,
            gas_price,
            gas,
            to: options.to,
            value: options.value.unwrap_or_default(),
            data: options.data.map(|d| d.bytes_exact()).unwrap_or_default(),
            signature: None,
        })
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn set_signature(&mut self, signature: Signature) {
        self.signature = Some(signature);
    }

    pub fn clear_signature(&mut self) {
        self.signature = None;
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    fn unsigned_items(&self) -> Vec<RlpItem> {
        vec![
            RlpItem::Bytes(uint_bytes(self.nonce)),
            RlpItem::Bytes(uint_bytes(self.gas_price.value())),
            RlpItem::Bytes(uint_bytes(self.gas)),
            RlpItem::Bytes(self.to.map(|to| to.as_bytes().to_vec()).unwrap_or_default()),
            RlpItem::Bytes(uint_bytes(self.value.value())),
            RlpItem::Bytes(self.data.clone()),
        ]
    }

    /// Encode the field list, optionally followed by `v, r, s`.
    pub fn encode(&self, include_signature: bool) -> SdkResult<Vec<u8>> {
        let mut items = self.unsigned_items();
        if include_signature {
            let signature = self.signature.as_ref().ok_or_else(|| {
                SdkError::FormatError("Cannot encode signature of an unsigned transaction".into())
            })?;
            items.push(RlpItem::Bytes(uint_bytes(U256::from(signature.v))));
            items.push(RlpItem::bytes(strip_leading_zeros(&signature.r)));
            items.push(RlpItem::bytes(strip_leading_zeros(&signature.s)));
        }
        Ok(rlp::encode(&RlpItem::List(items)))
    }

    /// Keccak digest of the unsigned encoding; the message that gets signed.
    pub fn digest(&self) -> [u8; 32] {
        let encoded = rlp::encode(&RlpItem::List(self.unsigned_items()));
        crypto::keccak256(encoded)
    }

    /// The locally computed transaction identifier (equal to `digest`).
    pub fn hash(&self) -> TransactionHash {
        TransactionHash::new(self.digest())
    }

    pub fn sign(&mut self, private_key: &PrivateKey) -> SdkResult<()> {
        let signature = crypto::sign(&self.digest(), private_key)?;
        self.signature = Some(signature);
        Ok(())
    }

    pub fn recover_public_key(&self) -> Option<PublicKey> {
        let signature = self.signature.as_ref()?;
        crypto::recover(&self.digest(), signature)
    }

    /// The sender address, or `None` when unsigned or the signature does not recover.
    pub fn recover_sender(&self) -> Option<Address> {
        self.recover_public_key().map(|key| key.to_address())
    }

    /// Signed raw encoding as submitted to a node.
    pub fn serialize(&self) -> SdkResult<HexString> {
        Ok(HexString::from_bytes(&self.encode(true)?))
    }

    /// Parse an unsigned (6 items) or signed (9 items) encoding.
    pub fn decode(raw: &[u8]) -> SdkResult<Self> {
        let item = rlp::decode(raw)?;
        let fields = item
            .as_list()
            .ok_or_else(|| SdkError::format(&hex::encode(raw), "transaction must be a list"))?;
        if fields.len() != 6 && fields.len() != 9 {
            return Err(SdkError::FormatError(format!(
                "Transaction must have 6 or 9 fields, found {}",
                fields.len()
            )));
        }

        let to_bytes = field(fields, 3, "to")?;
        let to = match to_bytes.len() {
            0 => None,
            _ => Some(Address::from_slice(to_bytes)?),
        };

        let signature = if fields.len() == 9 {
            let v = scalar(field(fields, 6, "v")?, "v")?;
            if v > U256::from(u8::MAX) {
                return Err(SdkError::format(&v, "recovery id does not fit in a byte"));
            }
            Some(Signature::from_parts(
                minimal(field(fields, 7, "r")?, "r")?,
                minimal(field(fields, 8, "s")?, "s")?,
                v.low_u32() as u8,
            )?)
        } else {
            None
        };

        Ok(Transaction {
            nonce: scalar(field(fields, 0, "nonce")?, "nonce")?,
            gas_price: Drip::new(scalar(field(fields, 1, "gasPrice")?, "gasPrice")?),
            gas: scalar(field(fields, 2, "gas")?, "gas")?,
            to,
            value: Drip::new(scalar(field(fields, 4, "value")?, "value")?),
            data: field(fields, 5, "data")?.to_vec(),
            signature,
        })
    }
}

fn field<'a>(fields: &'a [RlpItem], index: usize, name: &str) -> SdkResult<&'a [u8]> {
    fields[index].as_bytes().ok_or_else(|| {
        SdkError::FormatError(format!("Transaction field {} must be a byte string", name))
    })
}

fn minimal<'a>(bytes: &'a [u8], name: &str) -> SdkResult<&'a [u8]> {
    if bytes.first() == Some(&0) {
        return Err(SdkError::FormatError(format!(
            "Transaction field {} has a leading zero byte: 0x{}",
            name,
            hex::encode(bytes)
        )));
    }
    Ok(bytes)
}

fn scalar(bytes: &[u8], name: &str) -> SdkResult<U256> {
    let bytes = minimal(bytes, name)?;
    if bytes.len() > 32 {
        return Err(SdkError::FormatError(format!(
            "Transaction field {} exceeds 256 bits",
            name
        )));
    }
    Ok(U256::from_big_endian(bytes))
}
