use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{
    ActorContext, Currency, EngineError, MemberRole, ResultEngine, Trip, code, trip_members, trips,
    util::{is_unique_violation, normalize_optional_text, normalize_required_text},
};

use super::{Engine, with_tx};

impl Engine {
    /// Creates a trip with a freshly allocated join code. The creator becomes
    /// its first admin.
    ///
    /// Each candidate code is inserted inside a savepoint; a unique violation
    /// rolls the savepoint back and the next candidate is tried.
    pub async fn create_trip(
        &self,
        actor: ActorContext,
        name: &str,
        description: Option<&str>,
        base_currency: Option<Currency>,
    ) -> ResultEngine<Trip> {
        let name = normalize_required_text(name, "name")?;
        let description = normalize_optional_text(description);
        let base_currency = base_currency.unwrap_or_default();

        let trip = with_tx!(self, |db_tx| {
            self.require_user(&db_tx, actor.user_id).await?;

            let policy = self.code_policy;
            let model = code::insert_with_unique_code(&db_tx, policy, "trip code", |candidate| {
                trips::ActiveModel {
                    code: ActiveValue::Set(candidate.to_string()),
                    name: ActiveValue::Set(name.clone()),
                    description: ActiveValue::Set(description.clone()),
                    base_currency: ActiveValue::Set(base_currency.code().to_string()),
                    created_by: ActiveValue::Set(actor.user_id),
                    created_at: ActiveValue::Set(Utc::now()),
                    ..Default::default()
                }
            })
            .await?;

            trip_members::ActiveModel {
                trip_id: ActiveValue::Set(model.id),
                user_id: ActiveValue::Set(actor.user_id),
                role: ActiveValue::Set(MemberRole::Admin.as_str().to_string()),
                joined_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            }
            .insert(&db_tx)
            .await?;

            Trip::try_from(model)
        })?;

        tracing::info!(trip_id = trip.id, code = %trip.code, "trip created");
        Ok(trip)
    }

    /// Joins the trip identified by its public code as a plain member.
    pub async fn join_trip(&self, actor: ActorContext, code: &str) -> ResultEngine<Trip> {
        let code = code.trim().to_ascii_lowercase();
        if !code::is_well_formed(&code) {
            return Err(EngineError::KeyNotFound("trip not exists".to_string()));
        }
        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, actor.user_id).await?;
            let model = trips::Entity::find()
                .filter(trips::Column::Code.eq(code.clone()))
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("trip not exists".to_string()))?;

            if self
                .find_membership(&db_tx, model.id, actor.user_id)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey("trip membership".to_string()));
            }

            trip_members::ActiveModel {
                trip_id: ActiveValue::Set(model.id),
                user_id: ActiveValue::Set(actor.user_id),
                role: ActiveValue::Set(MemberRole::Member.as_str().to_string()),
                joined_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            }
            .insert(&db_tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    EngineError::ExistingKey("trip membership".to_string())
                } else {
                    err.into()
                }
            })?;

            Trip::try_from(model)
        })
    }

    /// Return a trip the actor is a member of.
    pub async fn trip(&self, actor: ActorContext, trip_id: i64) -> ResultEngine<Trip> {
        with_tx!(self, |db_tx| {
            let access = self.require_member(&db_tx, trip_id, actor).await?;
            Trip::try_from(access.trip)
        })
    }

    /// Lists the trips the actor belongs to, oldest first.
    pub async fn list_trips(&self, actor: ActorContext) -> ResultEngine<Vec<Trip>> {
        with_tx!(self, |db_tx| {
            let models = trips::Entity::find()
                .inner_join(trip_members::Entity)
                .filter(trip_members::Column::UserId.eq(actor.user_id))
                .order_by_asc(trips::Column::CreatedAt)
                .order_by_asc(trips::Column::Id)
                .all(&db_tx)
                .await?;
            models.into_iter().map(Trip::try_from).collect()
        })
    }

    /// Deletes a trip (admin only). Memberships, expenses and splits go with
    /// it by cascade; virtual members left without references are removed.
    pub async fn delete_trip(&self, actor: ActorContext, trip_id: i64) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, trip_id, actor).await?;

            let member_ids: Vec<i64> = trip_members::Entity::find()
                .select_only()
                .column(trip_members::Column::UserId)
                .filter(trip_members::Column::TripId.eq(trip_id))
                .into_tuple()
                .all(&db_tx)
                .await?;

            trips::Entity::delete_by_id(trip_id).exec(&db_tx).await?;

            for user_id in member_ids {
                self.collect_orphaned_virtual(&db_tx, user_id).await?;
            }
            tracing::info!(trip_id, "trip deleted");
            Ok(())
        })
    }
}
