//! Expenses: one payment by a trip member, stored with its value-at-entry
//! (`original_amount`, `currency`, `exchange_rate`) and the canonical amount
//! in the trip's base currency.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, Money, split::Share};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub trip_id: i64,
    pub payer_id: i64,
    pub amount: Money,
    pub original_amount: Decimal,
    pub currency: Currency,
    pub exchange_rate: Decimal,
    pub description: String,
    pub category: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    /// Shares ordered by participant id.
    pub splits: Vec<Share>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub trip_id: i64,
    pub payer_id: i64,
    pub amount_minor: i64,
    pub original_amount: String,
    pub currency: String,
    pub exchange_rate: String,
    pub description: String,
    pub category: Option<String>,
    pub date: Date,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trips::Entity",
        from = "Column::TripId",
        to = "super::trips::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Trips,
    #[sea_orm(has_many = "super::expense_splits::Entity")]
    ExpenseSplits,
}

impl Related<super::trips::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trips.def()
    }
}

impl Related<super::expense_splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseSplits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<(Model, Vec<super::expense_splits::Model>)> for Expense {
    type Error = EngineError;

    fn try_from(
        (model, split_models): (Model, Vec<super::expense_splits::Model>),
    ) -> Result<Self, Self::Error> {
        let mut splits: Vec<Share> = split_models
            .into_iter()
            .map(|s| Share {
                user_id: s.user_id,
                amount: Money::new(s.share_minor),
            })
            .collect();
        splits.sort_by_key(|s| s.user_id);

        Ok(Self {
            id: model.id,
            trip_id: model.trip_id,
            payer_id: model.payer_id,
            amount: Money::new(model.amount_minor),
            original_amount: crate::util::model_decimal(&model.original_amount, "original_amount")?,
            currency: crate::util::model_currency(&model.currency)?,
            exchange_rate: crate::util::model_decimal(&model.exchange_rate, "exchange_rate")?,
            description: model.description,
            category: model.category,
            date: model.date,
            created_at: model.created_at,
            splits,
        })
    }
}
