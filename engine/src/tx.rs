//! Transaction and message model.
//!
//! A transaction carries an ordered list of messages, a fee, one signature
//! per distinct signer, and a memo. Messages are an application-defined enum
//! implementing [`Msg`]; dispatch is by [`Msg::route`] through the router.

use std::fmt;

use basalt_primitives::codec::Writer;
use basalt_primitives::crypto::{PUBKEY_LEN, SIGNATURE_LEN};
use basalt_primitives::{Address, ExecResult};

use crate::codec::RawAny;

/// A message carried by a transaction.
pub trait Msg: Clone + fmt::Debug + Send + Sync + 'static {
    /// Router key of the module that handles this message.
    fn route(&self) -> &str;

    /// Message type within the route, used in logs and events.
    fn msg_type(&self) -> &str;

    /// Stateless validation. Must not read state.
    fn validate_basic(&self) -> ExecResult<()>;

    /// Canonical bytes covered by signatures.
    fn sign_bytes(&self) -> Vec<u8>;

    /// Addresses that must sign the transaction, in order.
    fn signers(&self) -> Vec<Address>;

    /// Encode as a type URL plus payload.
    fn to_any(&self) -> RawAny;

    /// Decode from a type URL plus payload.
    fn from_any(any: &RawAny) -> ExecResult<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fee {
    /// Amount paid by the fee payer.
    pub amount: u64,
    /// Gas wanted; the transaction gas meter limit.
    pub gas: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSignature {
    pub pub_key: [u8; PUBKEY_LEN],
    pub signature: [u8; SIGNATURE_LEN],
    /// Account sequence the signature was made for.
    pub sequence: u64,
}

/// A decoded transaction. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx<M> {
    pub msgs: Vec<M>,
    pub fee: Fee,
    /// One signature per entry of [`Tx::signers`], in the same order.
    pub signatures: Vec<TxSignature>,
    pub memo: String,
}

impl<M: Msg> Tx<M> {
    /// Distinct signers across all messages, in order of first appearance.
    pub fn signers(&self) -> Vec<Address> {
        let mut out: Vec<Address> = Vec::new();
        for signer in self.msgs.iter().flat_map(|m| m.signers()) {
            if !out.contains(&signer) {
                out.push(signer);
            }
        }
        out
    }

    /// The first signer of the first message pays the fee.
    pub fn fee_payer(&self) -> Option<Address> {
        self.msgs.first().and_then(|m| m.signers().first().copied())
    }

    /// Bytes a signer with `sequence` signs on chain `chain_id`.
    pub fn sign_doc(&self, chain_id: &str, sequence: u64) -> Vec<u8> {
        let mut w = Writer::new();
        w.string(chain_id)
            .u64(sequence)
            .u64(self.fee.amount)
            .u64(self.fee.gas)
            .string(&self.memo)
            .u32(self.msgs.len() as u32);
        for msg in &self.msgs {
            w.var_bytes(&msg.sign_bytes());
        }
        w.finish()
    }

    /// Run every message's stateless validation and require at least one
    /// message.
    pub fn validate_basic(&self) -> ExecResult<()> {
        if self.msgs.is_empty() {
            return Err(basalt_primitives::ExecError::InvalidMessage(
                "transaction must contain at least one message".into(),
            ));
        }
        self.msgs.iter().try_for_each(|m| m.validate_basic())
    }
}
