use std::collections::HashMap;

use sea_orm::{QueryFilter, QuerySelect, TransactionTrait, prelude::*, sea_query::Expr};

use crate::{
    ActorContext, EngineError, Money, ResultEngine, Settlement, aggregate_balances,
    expense_splits, expenses, simplify, util::model_currency,
};

use super::{Engine, with_tx};

impl Engine {
    /// Computes balances and the transfer plan of a trip from one read
    /// snapshot of its ledger.
    ///
    /// Balances follow membership join order. Transfers come from
    /// [`simplify`], which reports an invariant violation when the balances
    /// of the current members do not sum to zero.
    pub async fn compute_settlement(
        &self,
        actor: ActorContext,
        trip_id: i64,
    ) -> ResultEngine<Settlement> {
        with_tx!(self, |db_tx| {
            let access = self.require_member(&db_tx, trip_id, actor).await?;
            let currency = model_currency(&access.trip.base_currency)?;

            let members: Vec<(i64, String)> = self
                .members_in_join_order(&db_tx, trip_id)
                .await?
                .into_iter()
                .map(|m| (m.user_id, m.display_name))
                .collect();

            let paid: HashMap<i64, Money> = expenses::Entity::find()
                .select_only()
                .column(expenses::Column::PayerId)
                .column_as(Expr::col(expenses::Column::AmountMinor).sum(), "total")
                .filter(expenses::Column::TripId.eq(trip_id))
                .group_by(expenses::Column::PayerId)
                .into_tuple::<(i64, i64)>()
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|(user_id, total)| (user_id, Money::new(total)))
                .collect();

            let owed: HashMap<i64, Money> = expense_splits::Entity::find()
                .select_only()
                .column(expense_splits::Column::UserId)
                .column_as(
                    Expr::col((expense_splits::Entity, expense_splits::Column::ShareMinor)).sum(),
                    "total",
                )
                .inner_join(expenses::Entity)
                .filter(expenses::Column::TripId.eq(trip_id))
                .group_by(expense_splits::Column::UserId)
                .into_tuple::<(i64, i64)>()
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|(user_id, total)| (user_id, Money::new(total)))
                .collect();

            let balances = aggregate_balances(&members, &paid, &owed)?;
            let net: Vec<(i64, Money)> = balances.iter().map(|b| (b.user_id, b.balance)).collect();
            let transfers = simplify(&net)?;
            let total_expenses = Money::checked_sum(paid.values().copied()).ok_or_else(|| {
                EngineError::InvariantViolation(format!("expense total of trip {trip_id} overflows"))
            })?;

            tracing::debug!(
                trip_id,
                members = balances.len(),
                transfers = transfers.len(),
                "settlement computed"
            );
            Ok(Settlement {
                currency,
                balances,
                transfers,
                total_expenses,
            })
        })
    }
}
