//! Protobuf wire format for transactions.
//!
//! ```text
//! RawTx        { repeated RawAny msgs = 1; RawFee fee = 2;
//!                repeated RawSignature signatures = 3; string memo = 4; }
//! RawAny       { string type_url = 1; bytes value = 2; }
//! RawFee       { uint64 amount = 1; uint64 gas = 2; }
//! RawSignature { bytes pub_key = 1; bytes signature = 2; uint64 sequence = 3; }
//! ```
//!
//! Decoding is strict about fixed-size fields: a public key must be 32
//! bytes and a signature 64 bytes.

use bytes::Bytes;
use prost::Message;

use basalt_primitives::crypto::{PUBKEY_LEN, SIGNATURE_LEN};
use basalt_primitives::{ExecError, ExecResult};

use crate::tx::{Fee, Msg, Tx, TxSignature};

/// Pluggable decoder from raw bytes to a transaction.
pub type TxDecoder<M> = fn(&[u8]) -> ExecResult<Tx<M>>;

#[derive(Clone, PartialEq, Message)]
pub struct RawAny {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "bytes", tag = "2")]
    pub value: Bytes,
}

impl RawAny {
    pub fn new(type_url: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            type_url: type_url.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct RawFee {
    #[prost(uint64, tag = "1")]
    pub amount: u64,
    #[prost(uint64, tag = "2")]
    pub gas: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct RawSignature {
    #[prost(bytes = "vec", tag = "1")]
    pub pub_key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct RawTx {
    #[prost(message, repeated, tag = "1")]
    pub msgs: Vec<RawAny>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<RawFee>,
    #[prost(message, repeated, tag = "3")]
    pub signatures: Vec<RawSignature>,
    #[prost(string, tag = "4")]
    pub memo: String,
}

/// Default decoder: protobuf `RawTx`, messages decoded with `M::from_any`.
pub fn decode_tx<M: Msg>(raw: &[u8]) -> ExecResult<Tx<M>> {
    let raw_tx = RawTx::decode(raw).map_err(|e| ExecError::TxDecode(e.to_string()))?;

    let msgs = raw_tx
        .msgs
        .iter()
        .map(M::from_any)
        .collect::<ExecResult<Vec<_>>>()?;
    let fee = raw_tx
        .fee
        .map(|f| Fee {
            amount: f.amount,
            gas: f.gas,
        })
        .ok_or_else(|| ExecError::TxDecode("missing fee".into()))?;
    let signatures = raw_tx
        .signatures
        .into_iter()
        .map(decode_signature)
        .collect::<ExecResult<Vec<_>>>()?;

    Ok(Tx {
        msgs,
        fee,
        signatures,
        memo: raw_tx.memo,
    })
}

fn decode_signature(raw: RawSignature) -> ExecResult<TxSignature> {
    let pub_key: [u8; PUBKEY_LEN] = raw.pub_key.as_slice().try_into().map_err(|_| {
        ExecError::TxDecode(format!(
            "public key must be {PUBKEY_LEN} bytes, got {}",
            raw.pub_key.len()
        ))
    })?;
    let signature: [u8; SIGNATURE_LEN] = raw.signature.as_slice().try_into().map_err(|_| {
        ExecError::TxDecode(format!(
            "signature must be {SIGNATURE_LEN} bytes, got {}",
            raw.signature.len()
        ))
    })?;
    Ok(TxSignature {
        pub_key,
        signature,
        sequence: raw.sequence,
    })
}

/// Encode a transaction in the default wire format.
pub fn encode_tx<M: Msg>(tx: &Tx<M>) -> Vec<u8> {
    RawTx {
        msgs: tx.msgs.iter().map(Msg::to_any).collect(),
        fee: Some(RawFee {
            amount: tx.fee.amount,
            gas: tx.fee.gas,
        }),
        signatures: tx
            .signatures
            .iter()
            .map(|s| RawSignature {
                pub_key: s.pub_key.to_vec(),
                signature: s.signature.to_vec(),
                sequence: s.sequence,
            })
            .collect(),
        memo: tx.memo.clone(),
    }
    .encode_to_vec()
}
