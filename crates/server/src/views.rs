//! Mapping between engine values and the JSON types of `api_types`.

use engine::{Currency, Expense, MemberRole, MemberView, Session, Settlement, Trip};

use crate::types::{
    auth::SessionView,
    expense::{ExpenseView, ShareView},
    member,
    settlement::{BalanceView, SettlementView, TransferView},
    trip::TripView,
};

pub fn currency_to_api(currency: Currency) -> api_types::Currency {
    match currency {
        Currency::Eur => api_types::Currency::Eur,
        Currency::Usd => api_types::Currency::Usd,
        Currency::Gbp => api_types::Currency::Gbp,
        Currency::Chf => api_types::Currency::Chf,
        Currency::Jpy => api_types::Currency::Jpy,
        Currency::Sek => api_types::Currency::Sek,
        Currency::Nok => api_types::Currency::Nok,
        Currency::Dkk => api_types::Currency::Dkk,
        Currency::Pln => api_types::Currency::Pln,
        Currency::Czk => api_types::Currency::Czk,
    }
}

pub fn currency_from_api(currency: api_types::Currency) -> Currency {
    match currency {
        api_types::Currency::Eur => Currency::Eur,
        api_types::Currency::Usd => Currency::Usd,
        api_types::Currency::Gbp => Currency::Gbp,
        api_types::Currency::Chf => Currency::Chf,
        api_types::Currency::Jpy => Currency::Jpy,
        api_types::Currency::Sek => Currency::Sek,
        api_types::Currency::Nok => Currency::Nok,
        api_types::Currency::Dkk => Currency::Dkk,
        api_types::Currency::Pln => Currency::Pln,
        api_types::Currency::Czk => Currency::Czk,
    }
}

pub fn session_view(session: Session) -> SessionView {
    SessionView {
        token: session.token,
        user_id: session.user_id,
    }
}

pub fn trip_view(trip: Trip) -> TripView {
    TripView {
        id: trip.id,
        code: trip.code,
        name: trip.name,
        description: trip.description,
        base_currency: currency_to_api(trip.base_currency),
        created_by: trip.created_by,
        created_at: trip.created_at,
    }
}

pub fn member_view(view: MemberView) -> member::MemberView {
    member::MemberView {
        user_id: view.user_id,
        username: view.username,
        display_name: view.display_name,
        is_virtual: view.is_virtual,
        role: match view.role {
            MemberRole::Admin => member::MemberRole::Admin,
            MemberRole::Member => member::MemberRole::Member,
        },
        joined_at: view.joined_at,
    }
}

pub fn expense_view(expense: Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        trip_id: expense.trip_id,
        payer_id: expense.payer_id,
        amount_minor: expense.amount.minor(),
        original_amount: expense.original_amount.to_string(),
        currency: currency_to_api(expense.currency),
        exchange_rate: expense.exchange_rate.to_string(),
        description: expense.description,
        category: expense.category,
        date: expense.date,
        created_at: expense.created_at,
        splits: expense
            .splits
            .into_iter()
            .map(|share| ShareView {
                user_id: share.user_id,
                amount_minor: share.amount.minor(),
            })
            .collect(),
    }
}

pub fn settlement_view(settlement: Settlement) -> SettlementView {
    SettlementView {
        currency: currency_to_api(settlement.currency),
        balances: settlement
            .balances
            .into_iter()
            .map(|b| BalanceView {
                user_id: b.user_id,
                display_name: b.display_name,
                paid_minor: b.paid.minor(),
                owed_minor: b.owed.minor(),
                balance_minor: b.balance.minor(),
            })
            .collect(),
        transfers: settlement
            .transfers
            .into_iter()
            .map(|t| TransferView {
                from: t.from,
                to: t.to,
                amount_minor: t.amount.minor(),
            })
            .collect(),
        total_expenses_minor: settlement.total_expenses.minor(),
    }
}
