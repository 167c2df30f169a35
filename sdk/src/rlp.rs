//! Recursive length-prefixed list encoding.
//!
//! Headers and byte-string framing come from `alloy_rlp`; this module only
//! adds a dynamic item tree so transactions can be encoded and decoded
//! without a fixed schema.
use crate::errors::{SdkError, SdkResult};
use alloy_rlp::{Encodable, Header};
use bytes::BufMut;

/// A decoded item: a byte string or a list of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        RlpItem::Bytes(value.into())
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RlpItem::Bytes(bytes) => Some(bytes),
            RlpItem::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::List(items) => Some(items),
            RlpItem::Bytes(_) => None,
        }
    }

    fn payload_length(items: &[RlpItem]) -> usize {
        items.iter().map(Encodable::length).sum()
    }
}

impl Encodable for RlpItem {
    fn encode(&self, out: &mut dyn BufMut) {
        match self {
            RlpItem::Bytes(bytes) => bytes.as_slice().encode(out),
            RlpItem::List(items) => {
                Header {
                    list: true,
                    payload_length: Self::payload_length(items),
                }
                .encode(out);
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    fn length(&self) -> usize {
        match self {
            RlpItem::Bytes(bytes) => bytes.as_slice().length(),
            RlpItem::List(items) => {
                let payload = Self::payload_length(items);
                payload + alloy_rlp::length_of_length(payload)
            }
        }
    }
}

pub fn encode(item: &RlpItem) -> Vec<u8> {
    let mut out = Vec::with_capacity(item.length());
    item.encode(&mut out);
    out
}

/// Decode exactly one item; trailing bytes are an error.
pub fn decode(input: &[u8]) -> SdkResult<RlpItem> {
    let mut buf = input;
    let item = decode_item(&mut buf)?;
    if !buf.is_empty() {
        return Err(SdkError::FormatError(format!(
            "RLP input has {} trailing bytes: 0x{}",
            buf.len(),
            hex::encode(input)
        )));
    }
    Ok(item)
}

fn decode_item(buf: &mut &[u8]) -> SdkResult<RlpItem> {
    let header = Header::decode(buf)
        .map_err(|e| SdkError::FormatError(format!("Invalid RLP header: {}", e)))?;
    if buf.len() < header.payload_length {
        return Err(SdkError::FormatError(format!(
            "RLP payload truncated: need {} bytes, have {}",
            header.payload_length,
            buf.len()
        )));
    }

    let (payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;

    if !header.list {
        return Ok(RlpItem::Bytes(payload.to_vec()));
    }

    let mut inner = payload;
    let mut items = Vec::new();
    while !inner.is_empty() {
        items.push(decode_item(&mut inner)?);
    }
    Ok(RlpItem::List(items))
}
