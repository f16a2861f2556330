//! Bank account aggregate and related types.

mod aggregate;
mod events;
mod service;

pub use aggregate::BankAccount;
pub use events::AccountEvent;
pub use service::AccountService;

use thiserror::Error;

use crate::error::DomainError;
use crate::money::Money;

/// Stream holding every account's events.
pub const ACCOUNT_STREAM: &str = "account_events";

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{operation} amount must be positive")]
    NonPositiveAmount { operation: &'static str },

    #[error("{operation} would overflow the balance")]
    AmountOverflow { operation: &'static str },

    #[error("Initial balance cannot be negative")]
    NegativeInitialBalance,

    #[error("Account already opened")]
    AlreadyOpened,

    #[error("Account is not open")]
    NotOpened,

    #[error("Account is closed")]
    Closed,

    #[error("Account is already closed")]
    AlreadyClosed,

    #[error("Insufficient funds: balance={balance}, requested={requested}")]
    InsufficientFunds { balance: Money, requested: Money },

    #[error("Cannot close account with non-zero balance: {balance}")]
    NonZeroBalance { balance: Money },
}

impl From<AccountError> for DomainError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::NonPositiveAmount { .. }
            | AccountError::AmountOverflow { .. }
            | AccountError::NegativeInitialBalance => {
                DomainError::Validation(e.to_string())
            }
            _ => DomainError::BusinessRule(e.to_string()),
        }
    }
}
