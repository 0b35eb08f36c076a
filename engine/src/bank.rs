//! Token transfers between accounts.

use bytes::Bytes;
use prost::Message;

use basalt_primitives::codec::Writer;
use basalt_primitives::{Address, ExecError, ExecResult};

use crate::account::{Account, AccountKeeper};
use crate::codec::RawAny;
use crate::context::{Context, Event};
use crate::router::{Handler, MsgResult};

/// Router key of the bank module.
pub const ROUTE: &str = "bank";

/// Move `amount` from `from` to `to`. Signed by `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgSend {
    pub from: Address,
    pub to: Address,
    pub amount: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct RawMsgSend {
    #[prost(bytes = "vec", tag = "1")]
    pub from: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub to: Vec<u8>,
    #[prost(uint64, tag = "3")]
    pub amount: u64,
}

impl MsgSend {
    pub const TYPE_URL: &'static str = "/basalt.bank.MsgSend";

    pub fn validate_basic(&self) -> ExecResult<()> {
        if self.amount == 0 {
            return Err(ExecError::InvalidMessage("send amount must be positive".into()));
        }
        if self.from == self.to {
            return Err(ExecError::InvalidAddress(
                "sender and recipient must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn sign_bytes(&self) -> Vec<u8> {
        Writer::new()
            .string(Self::TYPE_URL)
            .fixed(&self.from)
            .fixed(&self.to)
            .u64(self.amount)
            .finish()
    }

    pub fn to_any(&self) -> RawAny {
        let raw = RawMsgSend {
            from: self.from.to_vec(),
            to: self.to.to_vec(),
            amount: self.amount,
        };
        RawAny::new(Self::TYPE_URL, Bytes::from(raw.encode_to_vec()))
    }

    pub fn from_any(any: &RawAny) -> ExecResult<Self> {
        if any.type_url != Self::TYPE_URL {
            return Err(ExecError::TxDecode(format!(
                "expected {}, got {}",
                Self::TYPE_URL,
                any.type_url
            )));
        }
        let raw = RawMsgSend::decode(any.value.clone())
            .map_err(|e| ExecError::TxDecode(e.to_string()))?;
        Ok(Self {
            from: decode_address("from", &raw.from)?,
            to: decode_address("to", &raw.to)?,
            amount: raw.amount,
        })
    }
}

fn decode_address(field: &str, bytes: &[u8]) -> ExecResult<Address> {
    bytes.try_into().map_err(|_| {
        ExecError::TxDecode(format!("{field}: address must be 20 bytes, got {}", bytes.len()))
    })
}

/// Messages the bank handler understands.
pub trait BankMsg {
    fn as_send(&self) -> Option<&MsgSend>;
}

/// Balance transfers on top of the account keeper.
#[derive(Debug, Clone)]
pub struct BankKeeper {
    accounts: AccountKeeper,
}

impl BankKeeper {
    pub fn new(accounts: AccountKeeper) -> Self {
        Self { accounts }
    }

    pub fn balance(&self, ctx: &mut Context<'_>, address: &Address) -> ExecResult<u64> {
        Ok(self
            .accounts
            .get(ctx, address)?
            .map_or(0, |a| a.balance))
    }

    /// Move `amount` between accounts. The sender must exist; the recipient
    /// is created on first receipt.
    pub fn send(
        &self,
        ctx: &mut Context<'_>,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> ExecResult<()> {
        let mut sender = self.accounts.must_get(ctx, from)?;
        if sender.balance < amount {
            return Err(ExecError::InsufficientFunds {
                have: sender.balance,
                need: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let mut recipient: Account = self.accounts.get_or_new(ctx, to)?;
        recipient.balance = recipient
            .balance
            .checked_add(amount)
            .ok_or_else(|| ExecError::Internal("recipient balance overflow".into()))?;
        sender.balance -= amount;

        self.accounts.set(ctx, &sender)?;
        self.accounts.set(ctx, &recipient)?;

        ctx.emit_event(
            Event::new("transfer")
                .attr("sender", hex::encode(from))
                .attr("recipient", hex::encode(to))
                .attr("amount", amount.to_string()),
        );
        Ok(())
    }
}

/// Handler for the `bank` route.
pub fn handler<M: BankMsg + 'static>(keeper: BankKeeper) -> Handler<M> {
    Box::new(move |ctx: &mut Context<'_>, msg: &M| {
        let send = msg
            .as_send()
            .ok_or_else(|| ExecError::UnknownRequest("unrecognized bank message".into()))?;
        keeper.send(ctx, &send.from, &send.to, send.amount)?;
        Ok(MsgResult {
            data: Vec::new(),
            log: format!("sent {} to {}", send.amount, hex::encode(send.to)),
        })
    })
}
