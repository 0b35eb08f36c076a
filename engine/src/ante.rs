//! Pre-execution checks run before any message.
//!
//! The ante stage runs on its own cache layer. Its writes (fee deduction,
//! sequence increments) persist even when a message later fails.

use basalt_primitives::crypto::{address_from_pubkey, verify_ed25519};
use basalt_primitives::{Address, ExecError, ExecResult};

use crate::account::{module_address, Account, AccountKeeper, FEE_COLLECTOR};
use crate::config::AppConfig;
use crate::context::Context;
use crate::tx::{Msg, Tx};

/// Authentication and fee stage of the pipeline.
pub trait AnteHandler<M>: Send + Sync {
    /// Check and charge `tx`. `tx_len` is the size of the raw transaction.
    fn ante(&self, ctx: &mut Context<'_>, tx: &Tx<M>, tx_len: usize) -> ExecResult<()>;
}

/// Reference ante stage: memo limit, size gas, minimum fee, fee deduction,
/// then per-signer public key, sequence and signature checks.
#[derive(Debug, Clone)]
pub struct AuthAnteHandler {
    accounts: AccountKeeper,
    fee_collector: Address,
    tx_size_cost_per_byte: u64,
    sig_verify_cost: u64,
    max_memo_chars: usize,
    min_gas_price: u64,
}

impl AuthAnteHandler {
    pub fn new(accounts: AccountKeeper, config: &AppConfig) -> Self {
        Self {
            accounts,
            fee_collector: module_address(FEE_COLLECTOR),
            tx_size_cost_per_byte: config.tx_size_cost_per_byte,
            sig_verify_cost: config.sig_verify_cost,
            max_memo_chars: config.max_memo_chars,
            min_gas_price: config.min_gas_price,
        }
    }

    pub fn fee_collector(&self) -> Address {
        self.fee_collector
    }

    fn deduct_fee(&self, ctx: &mut Context<'_>, payer: &Address, amount: u64) -> ExecResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let mut account = self.accounts.must_get(ctx, payer)?;
        if account.balance < amount {
            return Err(ExecError::InsufficientFunds {
                have: account.balance,
                need: amount,
            });
        }
        account.balance -= amount;
        self.accounts.set(ctx, &account)?;

        let mut collector = self.accounts.get_or_new(ctx, &self.fee_collector)?;
        collector.balance = collector
            .balance
            .checked_add(amount)
            .ok_or_else(|| ExecError::Internal("fee collector balance overflow".into()))?;
        self.accounts.set(ctx, &collector)
    }

    fn check_pub_key(account: &mut Account, pub_key: &[u8; 32]) -> ExecResult<()> {
        match &account.pub_key {
            Some(stored) if stored != pub_key => Err(ExecError::InvalidPubKey(format!(
                "public key does not match account {}",
                hex::encode(account.address)
            ))),
            Some(_) => Ok(()),
            None if address_from_pubkey(pub_key) != account.address => Err(ExecError::InvalidPubKey(
                format!("public key does not derive address {}", hex::encode(account.address)),
            )),
            None => {
                account.pub_key = Some(*pub_key);
                Ok(())
            }
        }
    }
}

impl<M: Msg> AnteHandler<M> for AuthAnteHandler {
    fn ante(&self, ctx: &mut Context<'_>, tx: &Tx<M>, tx_len: usize) -> ExecResult<()> {
        let memo_chars = tx.memo.chars().count();
        if memo_chars > self.max_memo_chars {
            return Err(ExecError::MemoTooLarge {
                max: self.max_memo_chars,
                got: memo_chars,
            });
        }

        ctx.consume_gas((tx_len as u64).saturating_mul(self.tx_size_cost_per_byte))?;

        if ctx.is_check() {
            let required = tx.fee.gas.saturating_mul(self.min_gas_price);
            if tx.fee.amount < required {
                return Err(ExecError::InsufficientFee {
                    required,
                    offered: tx.fee.amount,
                });
            }
        }

        let signers = tx.signers();
        if tx.signatures.len() != signers.len() {
            return Err(ExecError::Unauthorized(format!(
                "expected {} signatures, got {}",
                signers.len(),
                tx.signatures.len()
            )));
        }

        let payer = tx
            .fee_payer()
            .ok_or_else(|| ExecError::InvalidMessage("transaction has no signer".into()))?;
        self.deduct_fee(ctx, &payer, tx.fee.amount)?;

        let chain_id = ctx.chain_id().to_string();
        for (signer, sig) in signers.iter().zip(&tx.signatures) {
            let mut account = self.accounts.must_get(ctx, signer)?;
            Self::check_pub_key(&mut account, &sig.pub_key)?;
            if sig.sequence != account.sequence {
                return Err(ExecError::InvalidSequence {
                    expected: account.sequence,
                    got: sig.sequence,
                });
            }

            ctx.consume_gas(self.sig_verify_cost)?;
            if !ctx.is_simulate() {
                let doc = tx.sign_doc(&chain_id, account.sequence);
                if !verify_ed25519(&doc, &sig.signature, &sig.pub_key) {
                    return Err(ExecError::Unauthorized(format!(
                        "signature verification failed for {}",
                        hex::encode(signer)
                    )));
                }
            }

            account.sequence += 1;
            self.accounts.set(ctx, &account)?;
        }
        Ok(())
    }
}
