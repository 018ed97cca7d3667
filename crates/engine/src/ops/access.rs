use std::collections::HashSet;

use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};

use crate::{
    ActorContext, EngineError, MemberRole, ResultEngine, trip_members, trips, users,
};

use super::Engine;

/// A trip together with the actor's role in it.
pub(super) struct TripAccess {
    pub trip: trips::Model,
    pub role: MemberRole,
}

impl Engine {
    pub(super) async fn require_trip(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
    ) -> ResultEngine<trips::Model> {
        trips::Entity::find_by_id(trip_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("trip not exists".to_string()))
    }

    /// `KeyNotFound` if the trip is absent, `Forbidden` unless `code` is its
    /// join code.
    pub(super) async fn require_trip_code(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
        code: &str,
    ) -> ResultEngine<trips::Model> {
        let trip = self.require_trip(db, trip_id).await?;
        if code.trim().to_ascii_lowercase() != trip.code {
            return Err(EngineError::Forbidden("trip code mismatch".to_string()));
        }
        Ok(trip)
    }

    pub(super) async fn find_membership(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
        user_id: i64,
    ) -> ResultEngine<Option<trip_members::Model>> {
        trip_members::Entity::find()
            .filter(trip_members::Column::TripId.eq(trip_id))
            .filter(trip_members::Column::UserId.eq(user_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn member_role(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
        user_id: i64,
    ) -> ResultEngine<Option<MemberRole>> {
        self.find_membership(db, trip_id, user_id)
            .await?
            .map(|m| MemberRole::try_from(m.role.as_str()))
            .transpose()
    }

    /// `KeyNotFound` if the trip is absent, `Forbidden` if the actor is not a
    /// member.
    pub(super) async fn require_member(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
        actor: ActorContext,
    ) -> ResultEngine<TripAccess> {
        let trip = self.require_trip(db, trip_id).await?;
        let role = self
            .member_role(db, trip_id, actor.user_id)
            .await?
            .ok_or_else(|| EngineError::Forbidden("not a trip member".to_string()))?;
        Ok(TripAccess { trip, role })
    }

    pub(super) async fn require_admin(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
        actor: ActorContext,
    ) -> ResultEngine<TripAccess> {
        let access = self.require_member(db, trip_id, actor).await?;
        if !access.role.is_admin() {
            return Err(EngineError::Forbidden("trip admin required".to_string()));
        }
        Ok(access)
    }

    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: i64,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }

    /// Ensures every id in `user_ids` is a current member of the trip,
    /// reporting the first one that is not under `field`.
    pub(super) async fn ensure_trip_members(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
        user_ids: &[i64],
        field: &str,
    ) -> ResultEngine<()> {
        let members: HashSet<i64> = trip_members::Entity::find()
            .filter(trip_members::Column::TripId.eq(trip_id))
            .filter(trip_members::Column::UserId.is_in(user_ids.iter().copied()))
            .all(db)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();

        if let Some(missing) = user_ids.iter().find(|id| !members.contains(id)) {
            return Err(EngineError::Validation(format!(
                "{field}: user {missing} is not a trip member"
            )));
        }
        Ok(())
    }
}
