//! Command structs for engine operations.
//!
//! These types group parameters for write operations (record/update expense,
//! account creation, virtual member lifecycle), keeping call sites readable
//! and avoiding long argument lists.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use secrecy::SecretBox;
use serde::{Deserialize, Serialize};

use crate::{Currency, ForeignAmount};

/// The authenticated caller of an engine operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: i64,
}

impl ActorContext {
    #[must_use]
    pub const fn new(user_id: i64) -> Self {
        Self { user_id }
    }
}

/// Record a new expense split evenly among `participant_ids`.
#[derive(Clone, Debug)]
pub struct RecordExpenseCmd {
    pub payer_id: i64,
    pub amount: ForeignAmount,
    pub description: String,
    pub category: Option<String>,
    pub date: NaiveDate,
    pub participant_ids: Vec<i64>,
}

impl RecordExpenseCmd {
    #[must_use]
    pub fn new(
        payer_id: i64,
        original_amount: Decimal,
        currency: Currency,
        description: impl Into<String>,
        date: NaiveDate,
        participant_ids: Vec<i64>,
    ) -> Self {
        Self {
            payer_id,
            amount: ForeignAmount::new(original_amount, currency),
            description: description.into(),
            category: None,
            date,
            participant_ids,
        }
    }

    #[must_use]
    pub fn exchange_rate(mut self, rate: Decimal) -> Self {
        self.amount.exchange_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Partial update of an expense. `None` leaves a field unchanged.
///
/// The participant set is not editable; when an amount-affecting field
/// changes, the existing participants are re-split evenly.
#[derive(Clone, Debug, Default)]
pub struct UpdateExpenseCmd {
    pub payer_id: Option<i64>,
    pub original_amount: Option<Decimal>,
    pub currency: Option<Currency>,
    pub exchange_rate: Option<Decimal>,
    pub description: Option<String>,
    /// `Some(None)` clears the category.
    pub category: Option<Option<String>>,
    pub date: Option<NaiveDate>,
}

impl UpdateExpenseCmd {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.affects_amount()
            && self.payer_id.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.date.is_none()
    }

    #[must_use]
    pub fn affects_amount(&self) -> bool {
        self.original_amount.is_some() || self.currency.is_some() || self.exchange_rate.is_some()
    }

    #[must_use]
    pub fn payer_id(mut self, payer_id: i64) -> Self {
        self.payer_id = Some(payer_id);
        self
    }

    #[must_use]
    pub fn original_amount(mut self, amount: Decimal) -> Self {
        self.original_amount = Some(amount);
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    #[must_use]
    pub fn exchange_rate(mut self, rate: Decimal) -> Self {
        self.exchange_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Username + password of an existing real account.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretBox<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretBox::new(Box::new(password.into())),
        }
    }
}

/// Identity fields of an account being registered or promoted.
#[derive(Debug)]
pub struct NewAccount {
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub password: SecretBox<String>,
}

impl NewAccount {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        display_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.into(),
            email: None,
            password: SecretBox::new(Box::new(password.into())),
        }
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A virtual-member lifecycle change, journaled in `pending_operations` so an
/// interrupted run can be re-applied.
///
/// Applying a command twice has the same effect as applying it once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleCommand {
    /// Move every ledger reference of `virtual_id` in `trip_id` onto
    /// `real_id`, then drop the virtual row once orphaned.
    Link {
        trip_id: i64,
        virtual_id: i64,
        real_id: i64,
    },
    /// Overwrite the identity of `virtual_id` so it becomes a real account.
    Promote {
        trip_id: i64,
        virtual_id: i64,
        username: String,
        display_name: String,
        email: Option<String>,
        password_hash: String,
    },
}

impl LifecycleCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Link { .. } => "link",
            Self::Promote { .. } => "promote",
        }
    }

    pub fn trip_id(&self) -> i64 {
        match self {
            Self::Link { trip_id, .. } | Self::Promote { trip_id, .. } => *trip_id,
        }
    }

    pub fn virtual_id(&self) -> i64 {
        match self {
            Self::Link { virtual_id, .. } | Self::Promote { virtual_id, .. } => *virtual_id,
        }
    }
}
