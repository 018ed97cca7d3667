use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Currencies a trip or an expense can be expressed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
    Usd,
    Gbp,
    Chf,
    Jpy,
    Sek,
    Nok,
    Dkk,
    Pln,
    Czk,
}

impl Currency {
    /// ISO 4217 code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eur => "EUR",
            Self::Usd => "USD",
            Self::Gbp => "GBP",
            Self::Chf => "CHF",
            Self::Jpy => "JPY",
            Self::Sek => "SEK",
            Self::Nok => "NOK",
            Self::Dkk => "DKK",
            Self::Pln => "PLN",
            Self::Czk => "CZK",
        }
    }
}

pub mod auth {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Register {
        pub username: String,
        pub display_name: String,
        pub email: Option<String>,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Login {
        pub username: String,
        pub password: String,
    }

    /// Returned by register, login, link and promote. Send `token` back as
    /// `Authorization: Bearer <token>`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct SessionView {
        pub token: String,
        pub user_id: i64,
    }
}

pub mod trip {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TripNew {
        pub name: String,
        pub description: Option<String>,
        /// Defaults to EUR.
        pub base_currency: Option<Currency>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TripJoin {
        pub code: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TripView {
        pub id: i64,
        /// Public join code, 6 to 8 lowercase alphanumerics.
        pub code: String,
        pub name: String,
        pub description: Option<String>,
        pub base_currency: Currency,
        pub created_by: i64,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TripsResponse {
        pub trips: Vec<TripView>,
    }
}

pub mod member {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum MemberRole {
        Admin,
        Member,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub user_id: i64,
        pub username: String,
        pub display_name: String,
        pub is_virtual: bool,
        pub role: MemberRole,
        pub joined_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MembersResponse {
        pub members: Vec<MemberView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct VirtualMemberNew {
        pub display_name: String,
    }

    /// Credentials of the real account a virtual member is merged into.
    /// `code` is the trip's join code.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct VirtualMemberLink {
        pub code: String,
        pub username: String,
        pub password: String,
    }

    /// Identity the virtual member takes when promoted.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct VirtualMemberPromote {
        pub code: String,
        pub username: String,
        pub display_name: String,
        pub email: Option<String>,
        pub password: String,
    }
}

pub mod expense {
    use super::*;

    /// Amounts and rates travel as decimal strings (`"12.50"`), dates as
    /// `YYYY-MM-DD`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub payer_id: i64,
        pub original_amount: String,
        pub currency: Currency,
        /// Base-currency units per unit of `currency`. Required unless
        /// `currency` is the trip base.
        pub exchange_rate: Option<String>,
        pub description: String,
        pub category: Option<String>,
        pub date: String,
        pub participant_ids: Vec<i64>,
    }

    /// Partial update; absent fields stay as they are.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseUpdate {
        pub payer_id: Option<i64>,
        pub original_amount: Option<String>,
        pub currency: Option<Currency>,
        pub exchange_rate: Option<String>,
        pub description: Option<String>,
        pub category: Option<String>,
        /// Removes the category. Ignored when `category` is set.
        #[serde(default)]
        pub clear_category: bool,
        pub date: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ShareView {
        pub user_id: i64,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: i64,
        pub trip_id: i64,
        pub payer_id: i64,
        /// Canonical amount in minor units of the trip base currency.
        pub amount_minor: i64,
        pub original_amount: String,
        pub currency: Currency,
        pub exchange_rate: String,
        pub description: String,
        pub category: Option<String>,
        pub date: NaiveDate,
        pub created_at: DateTime<Utc>,
        pub splits: Vec<ShareView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpensesResponse {
        pub expenses: Vec<ExpenseView>,
    }
}

pub mod settlement {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceView {
        pub user_id: i64,
        pub display_name: String,
        pub paid_minor: i64,
        pub owed_minor: i64,
        pub balance_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransferView {
        pub from: i64,
        pub to: i64,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementView {
        /// Currency of every minor-unit amount below.
        pub currency: Currency,
        pub balances: Vec<BalanceView>,
        pub transfers: Vec<TransferView>,
        pub total_expenses_minor: i64,
    }
}
