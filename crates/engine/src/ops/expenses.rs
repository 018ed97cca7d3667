use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    ActorContext, EngineError, Expense, ForeignAmount, RecordExpenseCmd, ResultEngine, Share,
    UpdateExpenseCmd, expense_splits, expenses, normalize, split,
    util::{model_currency, model_decimal, normalize_optional_text, normalize_required_text},
};

use super::{Engine, with_tx};

impl Engine {
    /// Return the expense `expense_id` if it belongs to `trip_id`.
    async fn require_expense(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
        expense_id: i64,
    ) -> ResultEngine<expenses::Model> {
        expenses::Entity::find_by_id(expense_id)
            .filter(expenses::Column::TripId.eq(trip_id))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    async fn expense_splits(
        &self,
        db: &DatabaseTransaction,
        expense_id: i64,
    ) -> ResultEngine<Vec<expense_splits::Model>> {
        expense_splits::Entity::find()
            .filter(expense_splits::Column::ExpenseId.eq(expense_id))
            .order_by_asc(expense_splits::Column::UserId)
            .all(db)
            .await
            .map_err(Into::into)
    }

    async fn insert_splits(
        &self,
        db: &DatabaseTransaction,
        expense_id: i64,
        shares: &[Share],
    ) -> ResultEngine<()> {
        let rows = shares.iter().map(|share| expense_splits::ActiveModel {
            expense_id: ActiveValue::Set(expense_id),
            user_id: ActiveValue::Set(share.user_id),
            share_minor: ActiveValue::Set(share.amount.minor()),
            ..Default::default()
        });
        expense_splits::Entity::insert_many(rows).exec(db).await?;
        Ok(())
    }

    /// Records an expense and its even split.
    ///
    /// Validation is fail-fast: amount and rate, then description, then the
    /// payer, then the participants.
    pub async fn record_expense(
        &self,
        actor: ActorContext,
        trip_id: i64,
        cmd: RecordExpenseCmd,
    ) -> ResultEngine<Expense> {
        let expense = with_tx!(self, |db_tx| {
            let access = self.require_member(&db_tx, trip_id, actor).await?;
            let base = model_currency(&access.trip.base_currency)?;

            let normalized = normalize(cmd.amount, base)?;
            let description = normalize_required_text(&cmd.description, "description")?;
            let category = normalize_optional_text(cmd.category.as_deref());
            self.ensure_trip_members(&db_tx, trip_id, &[cmd.payer_id], "payer_id")
                .await?;
            self.ensure_trip_members(&db_tx, trip_id, &cmd.participant_ids, "participant_ids")
                .await?;
            let shares = split::allocate(
                normalized.amount,
                &cmd.participant_ids,
                self.remainder_policy,
            )?;

            let model = expenses::ActiveModel {
                trip_id: ActiveValue::Set(trip_id),
                payer_id: ActiveValue::Set(cmd.payer_id),
                amount_minor: ActiveValue::Set(normalized.amount.minor()),
                original_amount: ActiveValue::Set(normalized.original_amount.to_string()),
                currency: ActiveValue::Set(normalized.currency.code().to_string()),
                exchange_rate: ActiveValue::Set(normalized.exchange_rate.to_string()),
                description: ActiveValue::Set(description),
                category: ActiveValue::Set(category),
                date: ActiveValue::Set(cmd.date),
                created_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            }
            .insert(&db_tx)
            .await?;

            self.insert_splits(&db_tx, model.id, &shares).await?;
            let splits = self.expense_splits(&db_tx, model.id).await?;
            Expense::try_from((model, splits))
        })?;

        tracing::info!(
            trip_id,
            expense_id = expense.id,
            amount = %expense.amount,
            "expense recorded"
        );
        Ok(expense)
    }

    /// Applies a partial update.
    ///
    /// When the amount, currency or rate changes, the canonical amount is
    /// recomputed and the existing participants are re-split evenly. A
    /// currency change keeps the stored rate only if the currency stays the
    /// same; otherwise a new rate must be given unless the new currency is the
    /// trip's base.
    pub async fn update_expense(
        &self,
        actor: ActorContext,
        trip_id: i64,
        expense_id: i64,
        cmd: UpdateExpenseCmd,
    ) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            let access = self.require_member(&db_tx, trip_id, actor).await?;
            let base = model_currency(&access.trip.base_currency)?;
            let model = self.require_expense(&db_tx, trip_id, expense_id).await?;
            let mut active: expenses::ActiveModel = model.clone().into();

            if cmd.affects_amount() {
                let old_currency = model_currency(&model.currency)?;
                let currency = cmd.currency.unwrap_or(old_currency);
                let original_amount = match cmd.original_amount {
                    Some(amount) => amount,
                    None => model_decimal(&model.original_amount, "original_amount")?,
                };
                let exchange_rate = match cmd.exchange_rate {
                    Some(rate) => Some(rate),
                    None if currency == old_currency => {
                        Some(model_decimal(&model.exchange_rate, "exchange_rate")?)
                    }
                    None => None,
                };

                let mut input = ForeignAmount::new(original_amount, currency);
                input.exchange_rate = exchange_rate;
                let normalized = normalize(input, base)?;

                let participants: Vec<i64> = self
                    .expense_splits(&db_tx, expense_id)
                    .await?
                    .into_iter()
                    .map(|s| s.user_id)
                    .collect();
                let shares =
                    split::allocate(normalized.amount, &participants, self.remainder_policy)?;

                expense_splits::Entity::delete_many()
                    .filter(expense_splits::Column::ExpenseId.eq(expense_id))
                    .exec(&db_tx)
                    .await?;
                self.insert_splits(&db_tx, expense_id, &shares).await?;

                active.amount_minor = ActiveValue::Set(normalized.amount.minor());
                active.original_amount = ActiveValue::Set(normalized.original_amount.to_string());
                active.currency = ActiveValue::Set(normalized.currency.code().to_string());
                active.exchange_rate = ActiveValue::Set(normalized.exchange_rate.to_string());
            }

            if let Some(description) = &cmd.description {
                active.description =
                    ActiveValue::Set(normalize_required_text(description, "description")?);
            }
            if let Some(category) = &cmd.category {
                active.category = ActiveValue::Set(normalize_optional_text(category.as_deref()));
            }
            if let Some(date) = cmd.date {
                active.date = ActiveValue::Set(date);
            }
            if let Some(payer_id) = cmd.payer_id {
                self.ensure_trip_members(&db_tx, trip_id, &[payer_id], "payer_id")
                    .await?;
                active.payer_id = ActiveValue::Set(payer_id);
            }

            let updated = if active.is_changed() {
                active.update(&db_tx).await?
            } else {
                model
            };
            let splits = self.expense_splits(&db_tx, expense_id).await?;
            tracing::debug!(trip_id, expense_id, "expense updated");
            Expense::try_from((updated, splits))
        })
    }

    /// Deletes an expense; its splits go by cascade.
    pub async fn delete_expense(
        &self,
        actor: ActorContext,
        trip_id: i64,
        expense_id: i64,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, trip_id, actor).await?;
            let model = self.require_expense(&db_tx, trip_id, expense_id).await?;
            expenses::Entity::delete_by_id(model.id).exec(&db_tx).await?;
            tracing::info!(trip_id, expense_id, "expense deleted");
            Ok(())
        })
    }

    /// Lists the trip's expenses with their splits, newest date first.
    pub async fn list_expenses(
        &self,
        actor: ActorContext,
        trip_id: i64,
    ) -> ResultEngine<Vec<Expense>> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, trip_id, actor).await?;
            let models = expenses::Entity::find()
                .filter(expenses::Column::TripId.eq(trip_id))
                .order_by_desc(expenses::Column::Date)
                .order_by_desc(expenses::Column::CreatedAt)
                .order_by_desc(expenses::Column::Id)
                .all(&db_tx)
                .await?;

            let mut splits_by_expense: HashMap<i64, Vec<expense_splits::Model>> = HashMap::new();
            for split in expense_splits::Entity::find()
                .filter(expense_splits::Column::ExpenseId.is_in(models.iter().map(|m| m.id)))
                .all(&db_tx)
                .await?
            {
                splits_by_expense
                    .entry(split.expense_id)
                    .or_default()
                    .push(split);
            }

            models
                .into_iter()
                .map(|model| {
                    let splits = splits_by_expense.remove(&model.id).unwrap_or_default();
                    Expense::try_from((model, splits))
                })
                .collect()
        })
    }
}
