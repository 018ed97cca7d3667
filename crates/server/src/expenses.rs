//! Expense endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{ActorContext, RecordExpenseCmd, UpdateExpenseCmd, parse_decimal, parse_expense_date};

use crate::{
    ServerError,
    server::ServerState,
    types::expense::{ExpenseNew, ExpenseUpdate, ExpenseView, ExpensesResponse},
    views::{currency_from_api, expense_view},
};

pub async fn list(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(trip_id): Path<i64>,
) -> Result<Json<ExpensesResponse>, ServerError> {
    let expenses = state
        .engine
        .list_expenses(actor, trip_id)
        .await?
        .into_iter()
        .map(expense_view)
        .collect();
    Ok(Json(ExpensesResponse { expenses }))
}

pub async fn create(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(trip_id): Path<i64>,
    Json(payload): Json<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseView>), ServerError> {
    let amount = parse_decimal(&payload.original_amount, "original_amount")?;
    let date = parse_expense_date(&payload.date)?;

    let mut cmd = RecordExpenseCmd::new(
        payload.payer_id,
        amount,
        currency_from_api(payload.currency),
        payload.description,
        date,
        payload.participant_ids,
    );
    if let Some(rate) = payload.exchange_rate.as_deref() {
        cmd = cmd.exchange_rate(parse_decimal(rate, "exchange_rate")?);
    }
    if let Some(category) = payload.category {
        cmd = cmd.category(category);
    }

    let expense = state.engine.record_expense(actor, trip_id, cmd).await?;
    Ok((StatusCode::CREATED, Json(expense_view(expense))))
}

fn update_command(payload: ExpenseUpdate) -> Result<UpdateExpenseCmd, ServerError> {
    let mut cmd = UpdateExpenseCmd::default();
    if let Some(payer_id) = payload.payer_id {
        cmd = cmd.payer_id(payer_id);
    }
    if let Some(amount) = payload.original_amount.as_deref() {
        cmd = cmd.original_amount(parse_decimal(amount, "original_amount")?);
    }
    if let Some(currency) = payload.currency {
        cmd = cmd.currency(currency_from_api(currency));
    }
    if let Some(rate) = payload.exchange_rate.as_deref() {
        cmd = cmd.exchange_rate(parse_decimal(rate, "exchange_rate")?);
    }
    if let Some(description) = payload.description {
        cmd = cmd.description(description);
    }
    match payload.category {
        Some(category) => cmd = cmd.category(Some(category)),
        None if payload.clear_category => cmd = cmd.category(None),
        None => {}
    }
    if let Some(date) = payload.date.as_deref() {
        cmd = cmd.date(parse_expense_date(date)?);
    }
    Ok(cmd)
}

pub async fn update(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path((trip_id, expense_id)): Path<(i64, i64)>,
    Json(payload): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseView>, ServerError> {
    let cmd = update_command(payload)?;
    if cmd.is_empty() {
        return Err(ServerError::Generic("nothing to update".to_string()));
    }

    let expense = state
        .engine
        .update_expense(actor, trip_id, expense_id, cmd)
        .await?;
    Ok(Json(expense_view(expense)))
}

pub async fn remove(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path((trip_id, expense_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_expense(actor, trip_id, expense_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_builds_empty_command() {
        let cmd = update_command(ExpenseUpdate::default()).unwrap();
        assert!(cmd.is_empty());
    }

    #[test]
    fn clear_category_is_ignored_when_category_is_set() {
        let payload = ExpenseUpdate {
            category: Some("food".to_string()),
            clear_category: true,
            ..Default::default()
        };
        let cmd = update_command(payload).unwrap();
        assert_eq!(cmd.category, Some(Some("food".to_string())));
    }

    #[test]
    fn clear_category_sets_explicit_none() {
        let payload = ExpenseUpdate {
            clear_category: true,
            ..Default::default()
        };
        let cmd = update_command(payload).unwrap();
        assert_eq!(cmd.category, Some(None));
        assert!(!cmd.affects_amount());
    }

    #[test]
    fn malformed_amount_is_rejected() {
        let payload = ExpenseUpdate {
            original_amount: Some("12,50".to_string()),
            ..Default::default()
        };
        assert!(update_command(payload).is_err());
    }
}
