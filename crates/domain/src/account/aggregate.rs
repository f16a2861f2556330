//! Bank account aggregate implementation.

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::money::Money;

use super::{ACCOUNT_STREAM, AccountError, AccountEvent};

/// Bank account state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    account_holder: String,
    balance: Money,
    currency: String,
    opened: bool,
    closed: bool,
}

impl Aggregate for BankAccount {
    type Event = AccountEvent;
    type Error = AccountError;

    fn aggregate_type() -> &'static str {
        "BankAccount"
    }

    fn stream() -> &'static str {
        ACCOUNT_STREAM
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::AccountOpened {
                account_holder,
                currency,
                ..
            } => {
                self.account_holder = account_holder.clone();
                self.currency = currency.clone();
                self.opened = true;
                self.closed = false;
            }
            AccountEvent::AccountClosed => self.closed = true,
            AccountEvent::FundsDeposited { .. }
            | AccountEvent::FundsWithdrawn { .. }
            | AccountEvent::FundsTransferredOut { .. }
            | AccountEvent::FundsTransferredIn { .. }
            | AccountEvent::InterestAccrued { .. } => {}
        }
        self.balance += event.balance_delta();
    }
}

// Query methods
impl BankAccount {
    pub fn account_holder(&self) -> &str {
        &self.account_holder
    }

    pub fn balance(&self) -> Money {
        self.balance
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

// Command methods (return events)
impl BankAccount {
    /// Opens the account. Factory command.
    pub fn open(
        &self,
        account_holder: impl Into<String>,
        initial_balance: Money,
        currency: impl Into<String>,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        if self.opened {
            return Err(AccountError::AlreadyOpened);
        }
        if initial_balance.is_negative() {
            return Err(AccountError::NegativeInitialBalance);
        }

        Ok(vec![AccountEvent::AccountOpened {
            account_holder: account_holder.into(),
            initial_balance,
            currency: currency.into(),
        }])
    }

    pub fn deposit(
        &self,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        require_positive(amount, "Deposit")?;
        self.ensure_active()?;
        self.ensure_headroom(amount, "Deposit")?;

        Ok(vec![AccountEvent::FundsDeposited {
            amount,
            description: description.into(),
        }])
    }

    pub fn withdraw(
        &self,
        amount: Money,
        description: impl Into<String>,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        require_positive(amount, "Withdrawal")?;
        self.ensure_active()?;
        self.ensure_funds(amount)?;

        Ok(vec![AccountEvent::FundsWithdrawn {
            amount,
            description: description.into(),
        }])
    }

    /// Debits the account as the first leg of a transfer.
    pub fn transfer_out(
        &self,
        amount: Money,
        target_account_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        require_positive(amount, "Transfer")?;
        self.ensure_active()?;
        self.ensure_funds(amount)?;

        Ok(vec![AccountEvent::FundsTransferredOut {
            amount,
            target_account_id: target_account_id.into(),
            description: description.into(),
        }])
    }

    /// Credits the account as the second leg of a transfer.
    pub fn receive_transfer(
        &self,
        amount: Money,
        source_account_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        require_positive(amount, "Transfer")?;
        self.ensure_active()?;
        self.ensure_headroom(amount, "Transfer")?;

        Ok(vec![AccountEvent::FundsTransferredIn {
            amount,
            source_account_id: source_account_id.into(),
            description: description.into(),
        }])
    }

    pub fn accrue_interest(&self, amount: Money) -> Result<Vec<AccountEvent>, AccountError> {
        require_positive(amount, "Interest")?;
        self.ensure_active()?;
        self.ensure_headroom(amount, "Interest")?;

        Ok(vec![AccountEvent::InterestAccrued { amount }])
    }

    pub fn close(&self) -> Result<Vec<AccountEvent>, AccountError> {
        if !self.opened {
            return Err(AccountError::NotOpened);
        }
        if self.closed {
            return Err(AccountError::AlreadyClosed);
        }
        if !self.balance.is_zero() {
            return Err(AccountError::NonZeroBalance {
                balance: self.balance,
            });
        }

        Ok(vec![AccountEvent::AccountClosed])
    }

    fn ensure_active(&self) -> Result<(), AccountError> {
        if !self.opened {
            return Err(AccountError::NotOpened);
        }
        if self.closed {
            return Err(AccountError::Closed);
        }
        Ok(())
    }

    /// Credits must leave the balance representable, so `apply` never
    /// overflows on replay.
    fn ensure_headroom(&self, amount: Money, operation: &'static str) -> Result<(), AccountError> {
        match self.balance.checked_add(amount) {
            Some(_) => Ok(()),
            None => Err(AccountError::AmountOverflow { operation }),
        }
    }

    fn ensure_funds(&self, requested: Money) -> Result<(), AccountError> {
        if self.balance < requested {
            return Err(AccountError::InsufficientFunds {
                balance: self.balance,
                requested,
            });
        }
        Ok(())
    }
}

fn require_positive(amount: Money, operation: &'static str) -> Result<(), AccountError> {
    if !amount.is_positive() {
        return Err(AccountError::NonPositiveAmount { operation });
    }
    Ok(())
}
