//! Accounts and their storage in the `acc` sub-store.
//!
//! Record layout (see `basalt_primitives::codec`):
//!
//! ```text
//! [address: 20] [pub_key: optional 32] [sequence: u64 LE] [balance: u64 LE]
//! ```
//!
//! Records are keyed by the raw 20-byte address.

use basalt_primitives::codec::{Reader, Writer};
use basalt_primitives::crypto::{hash_sha256, PUBKEY_LEN};
use basalt_primitives::{Address, ExecError, ExecResult};
use basalt_store::{KvStore, KvStoreMut, StoreKey};

use crate::context::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    /// Set by the first signed transaction.
    pub pub_key: Option<[u8; PUBKEY_LEN]>,
    /// Number of transactions signed so far; replay protection.
    pub sequence: u64,
    pub balance: u64,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            pub_key: None,
            sequence: 0,
            balance: 0,
        }
    }

    pub fn with_balance(address: Address, balance: u64) -> Self {
        Self {
            balance,
            ..Self::new(address)
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        Writer::new()
            .fixed(&self.address)
            .optional_hash(self.pub_key.as_ref())
            .u64(self.sequence)
            .u64(self.balance)
            .finish()
    }

    pub fn decode(bytes: &[u8]) -> ExecResult<Self> {
        let mut r = Reader::new(bytes);
        let account = Self {
            address: r.read_address()?,
            pub_key: r.read_optional_hash()?,
            sequence: r.read_u64()?,
            balance: r.read_u64()?,
        };
        r.finish()?;
        Ok(account)
    }
}

/// Address of a module-owned account, e.g. the fee collector.
pub fn module_address(name: &str) -> Address {
    let digest = hash_sha256(name.as_bytes());
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest[..20]);
    addr
}

/// Name of the module account that receives transaction fees.
pub const FEE_COLLECTOR: &str = "fee_collector";

/// Reads and writes accounts through a transaction context.
#[derive(Debug, Clone)]
pub struct AccountKeeper {
    key: StoreKey,
}

impl AccountKeeper {
    pub fn new(key: StoreKey) -> Self {
        Self { key }
    }

    pub fn store_key(&self) -> &StoreKey {
        &self.key
    }

    pub fn get(&self, ctx: &mut Context<'_>, address: &Address) -> ExecResult<Option<Account>> {
        let mut store = ctx.kv_store(&self.key)?;
        store
            .get(address)?
            .map(|bytes| Account::decode(&bytes))
            .transpose()
    }

    /// Load an account or fail with `UnknownAddress`.
    pub fn must_get(&self, ctx: &mut Context<'_>, address: &Address) -> ExecResult<Account> {
        self.get(ctx, address)?
            .ok_or_else(|| ExecError::UnknownAddress(hex::encode(address)))
    }

    /// Load an account, or a fresh empty one if it does not exist.
    pub fn get_or_new(&self, ctx: &mut Context<'_>, address: &Address) -> ExecResult<Account> {
        Ok(self
            .get(ctx, address)?
            .unwrap_or_else(|| Account::new(*address)))
    }

    pub fn set(&self, ctx: &mut Context<'_>, account: &Account) -> ExecResult<()> {
        let mut store = ctx.kv_store(&self.key)?;
        store.set(&account.address, &account.encode())
    }

    /// Write an account directly, bypassing gas. Used for genesis state.
    pub fn set_raw<S: KvStoreMut + ?Sized>(store: &mut S, account: &Account) {
        store.set(&account.address, &account.encode());
    }

    /// Read an account directly from a store view, bypassing gas.
    pub fn get_raw<S: KvStore + ?Sized>(
        store: &S,
        address: &Address,
    ) -> ExecResult<Option<Account>> {
        store
            .get(address)
            .map(|bytes| Account::decode(&bytes))
            .transpose()
    }
}
