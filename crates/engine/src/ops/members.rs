use sea_orm::{
    DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    ActorContext, EngineError, MemberView, ResultEngine, expense_splits, expenses, trip_members,
    users,
};

use super::{Engine, with_tx};

impl Engine {
    /// Lists trip members in join order.
    pub async fn list_members(
        &self,
        actor: ActorContext,
        trip_id: i64,
    ) -> ResultEngine<Vec<MemberView>> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, trip_id, actor).await?;
            self.members_in_join_order(&db_tx, trip_id).await
        })
    }

    pub(super) async fn members_in_join_order(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
    ) -> ResultEngine<Vec<MemberView>> {
        let rows = trip_members::Entity::find()
            .find_also_related(users::Entity)
            .filter(trip_members::Column::TripId.eq(trip_id))
            .order_by_asc(trip_members::Column::JoinedAt)
            .order_by_asc(trip_members::Column::Id)
            .all(db)
            .await?;

        rows.into_iter()
            .map(|(membership, user)| {
                let user = user.ok_or_else(|| {
                    EngineError::InvariantViolation(format!(
                        "membership {} points at a missing user",
                        membership.id
                    ))
                })?;
                MemberView::try_from_join(membership, user)
            })
            .collect()
    }

    /// Removes `member_id` from the trip.
    ///
    /// Admins may remove anyone but themselves; other members may only remove
    /// themselves. A member still referenced by an expense of the trip (as
    /// payer or participant) cannot be removed.
    pub async fn remove_member(
        &self,
        actor: ActorContext,
        trip_id: i64,
        member_id: i64,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let access = self.require_member(&db_tx, trip_id, actor).await?;
            if member_id == actor.user_id {
                if access.role.is_admin() {
                    return Err(EngineError::Forbidden(
                        "an admin cannot remove themselves".to_string(),
                    ));
                }
            } else if !access.role.is_admin() {
                return Err(EngineError::Forbidden("trip admin required".to_string()));
            }

            let membership = self
                .find_membership(&db_tx, trip_id, member_id)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))?;

            if self.ledger_references(&db_tx, trip_id, member_id).await? > 0 {
                return Err(EngineError::ExistingKey(format!(
                    "member {member_id} is referenced by trip expenses"
                )));
            }

            trip_members::Entity::delete_by_id(membership.id)
                .exec(&db_tx)
                .await?;
            self.collect_orphaned_virtual(&db_tx, member_id).await?;

            tracing::info!(trip_id, member_id, "member removed");
            Ok(())
        })
    }

    /// Number of expenses paid by plus splits owed by `user_id` in one trip.
    pub(super) async fn ledger_references(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
        user_id: i64,
    ) -> ResultEngine<u64> {
        let paid = expenses::Entity::find()
            .filter(expenses::Column::TripId.eq(trip_id))
            .filter(expenses::Column::PayerId.eq(user_id))
            .count(db)
            .await?;
        let owed = expense_splits::Entity::find()
            .inner_join(expenses::Entity)
            .filter(expenses::Column::TripId.eq(trip_id))
            .filter(expense_splits::Column::UserId.eq(user_id))
            .count(db)
            .await?;
        Ok(paid + owed)
    }

    /// Deletes `user_id` if it is a virtual user that no membership, expense
    /// or split references anymore, in any trip. Returns whether a row was
    /// deleted.
    pub(super) async fn collect_orphaned_virtual(
        &self,
        db: &DatabaseTransaction,
        user_id: i64,
    ) -> ResultEngine<bool> {
        let Some(user) = users::Entity::find_by_id(user_id).one(db).await? else {
            return Ok(false);
        };
        if !user.is_virtual {
            return Ok(false);
        }

        let memberships = trip_members::Entity::find()
            .filter(trip_members::Column::UserId.eq(user_id))
            .count(db)
            .await?;
        let paid = expenses::Entity::find()
            .filter(expenses::Column::PayerId.eq(user_id))
            .count(db)
            .await?;
        let owed = expense_splits::Entity::find()
            .filter(expense_splits::Column::UserId.eq(user_id))
            .count(db)
            .await?;
        if memberships + paid + owed > 0 {
            return Ok(false);
        }

        users::Entity::delete_by_id(user_id).exec(db).await?;
        tracing::info!(user_id, "orphaned virtual member deleted");
        Ok(true)
    }
}
