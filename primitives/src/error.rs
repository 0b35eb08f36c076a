//! Result codes and the transaction-level error type.
//!
//! Every per-transaction failure is reported to the caller as a numeric
//! `ErrorCode` inside a result, never as a process failure. The repr values
//! are part of the external interface and must stay stable.

use core::fmt;

/// Result code attached to every transaction result. `0` = OK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    Ok = 0,
    Internal = 1,
    TxDecode = 2,
    InvalidSequence = 3,
    Unauthorized = 4,
    InsufficientFunds = 5,
    UnknownRequest = 6,
    InvalidAddress = 7,
    InvalidPubKey = 8,
    UnknownAddress = 9,
    InsufficientFee = 10,
    OutOfGas = 11,
    MemoTooLarge = 12,
    InvalidMessage = 13,
}

impl ErrorCode {
    /// Convert from a raw result code.
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Internal),
            2 => Some(Self::TxDecode),
            3 => Some(Self::InvalidSequence),
            4 => Some(Self::Unauthorized),
            5 => Some(Self::InsufficientFunds),
            6 => Some(Self::UnknownRequest),
            7 => Some(Self::InvalidAddress),
            8 => Some(Self::InvalidPubKey),
            9 => Some(Self::UnknownAddress),
            10 => Some(Self::InsufficientFee),
            11 => Some(Self::OutOfGas),
            12 => Some(Self::MemoTooLarge),
            13 => Some(Self::InvalidMessage),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Internal => "internal",
            Self::TxDecode => "tx_decode",
            Self::InvalidSequence => "invalid_sequence",
            Self::Unauthorized => "unauthorized",
            Self::InsufficientFunds => "insufficient_funds",
            Self::UnknownRequest => "unknown_request",
            Self::InvalidAddress => "invalid_address",
            Self::InvalidPubKey => "invalid_pubkey",
            Self::UnknownAddress => "unknown_address",
            Self::InsufficientFee => "insufficient_fee",
            Self::OutOfGas => "out_of_gas",
            Self::MemoTooLarge => "memo_too_large",
            Self::InvalidMessage => "invalid_message",
        };
        f.write_str(name)
    }
}

/// Error raised while executing a transaction.
///
/// Handlers, the ante stage, and gas-metered store access all return this
/// type. The pipeline converts it into a result code via [`ExecError::code`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    /// Transaction bytes could not be decoded.
    #[error("tx decode error: {0}")]
    TxDecode(String),

    /// A message failed its stateless self-check.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Signature missing, mismatched, or invalid.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Replay protection: signature sequence does not match the account.
    #[error("invalid sequence: expected {expected}, got {got}")]
    InvalidSequence { expected: u64, got: u64 },

    #[error("invalid public key: {0}")]
    InvalidPubKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unknown address: {0}")]
    UnknownAddress(String),

    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("insufficient fee: required {required}, offered {offered}")]
    InsufficientFee { required: u64, offered: u64 },

    #[error("memo too large: max {max} chars, got {got}")]
    MemoTooLarge { max: usize, got: usize },

    /// Gas limit exceeded.
    #[error("out of gas: limit={limit}, used={used}")]
    OutOfGas { limit: u64, used: u64 },

    /// No handler is registered for the message route.
    #[error("unknown request: {0}")]
    UnknownRequest(String),

    /// A store was requested with a token that was never mounted.
    #[error("capability violation: {0}")]
    CapabilityViolation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExecError {
    /// The result code reported to the caller for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TxDecode(_) => ErrorCode::TxDecode,
            Self::InvalidMessage(_) => ErrorCode::InvalidMessage,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
            Self::InvalidSequence { .. } => ErrorCode::InvalidSequence,
            Self::InvalidPubKey(_) => ErrorCode::InvalidPubKey,
            Self::InvalidAddress(_) => ErrorCode::InvalidAddress,
            Self::UnknownAddress(_) => ErrorCode::UnknownAddress,
            Self::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            Self::InsufficientFee { .. } => ErrorCode::InsufficientFee,
            Self::MemoTooLarge { .. } => ErrorCode::MemoTooLarge,
            Self::OutOfGas { .. } => ErrorCode::OutOfGas,
            Self::UnknownRequest(_) => ErrorCode::UnknownRequest,
            Self::CapabilityViolation(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn is_out_of_gas(&self) -> bool {
        matches!(self, Self::OutOfGas { .. })
    }
}

/// Convenience result type for transaction execution.
pub type ExecResult<T> = core::result::Result<T, ExecError>;
