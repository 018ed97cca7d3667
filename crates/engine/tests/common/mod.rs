#![allow(dead_code)]

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{ActorContext, Currency, Engine, NewAccount, RecordExpenseCmd, Trip};
use migration::MigratorTrait;

pub const PASSWORD: &str = "correct horse";

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub async fn register(engine: &Engine, username: &str) -> ActorContext {
    let session = engine
        .register(NewAccount::new(username, username.to_uppercase(), PASSWORD))
        .await
        .unwrap();
    ActorContext::new(session.user_id)
}

/// A EUR trip created by `admin` and joined by every actor in `others`.
pub async fn trip_with(engine: &Engine, admin: ActorContext, others: &[ActorContext]) -> Trip {
    let trip = engine
        .create_trip(admin, "Lisbon", None, Some(Currency::Eur))
        .await
        .unwrap();
    for member in others {
        engine.join_trip(*member, &trip.code).await.unwrap();
    }
    trip
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

pub fn eur_expense(payer: ActorContext, amount: &str, participants: &[ActorContext]) -> RecordExpenseCmd {
    RecordExpenseCmd::new(
        payer.user_id,
        dec(amount),
        Currency::Eur,
        "Dinner",
        day("2025-07-14"),
        participants.iter().map(|a| a.user_id).collect(),
    )
}

pub async fn count_rows(db: &DatabaseConnection, sql: &str) -> i64 {
    let row = db
        .query_one(Statement::from_string(db.get_database_backend(), sql))
        .await
        .unwrap()
        .unwrap();
    row.try_get_by_index::<i64>(0).unwrap()
}
