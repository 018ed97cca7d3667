//! Ledger and settlement engine for shared trip expenses.
//!
//! The pure parts ([`normalize`], [`allocate`],
//! [`aggregate_balances`], [`simplify`], [`CodeCandidates`]) do no I/O. The
//! [`Engine`] facade runs every operation that touches the store inside one
//! database transaction and takes the caller as an explicit [`ActorContext`].

pub use code::{CodeCandidates, CodePolicy};
pub use commands::{
    ActorContext, Credentials, LifecycleCommand, NewAccount, RecordExpenseCmd, UpdateExpenseCmd,
};
pub use currency::Currency;
pub use error::EngineError;
pub use expenses::Expense;
pub use money::Money;
pub use normalizer::{ForeignAmount, NormalizedAmount, normalize};
pub use ops::{Engine, EngineBuilder};
pub use pending_operations::{PendingMarker, PendingOperation, ReconcileFailure, ReconcileReport};
pub use sessions::Session;
pub use settlement::{MemberBalance, Settlement, Transfer, aggregate_balances, simplify};
pub use split::{RemainderPolicy, Share, allocate};
pub use trip_members::{MemberRole, MemberView};
pub use trips::Trip;
pub use users::Account;
pub use util::{parse_decimal, parse_expense_date};

pub mod code;
mod commands;
mod currency;
mod error;
mod expense_splits;
mod expenses;
mod money;
mod normalizer;
mod ops;
mod password;
mod pending_operations;
mod sessions;
mod settlement;
mod split;
mod trip_members;
mod trips;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;

/// Username prefix reserved for virtual members.
pub(crate) const VIRTUAL_USERNAME_PREFIX: &str = "v-";
