//! Virtual member lifecycle: create, link into a real account, promote in
//! place.
//!
//! Link and promote are journaled: the serialized [`LifecycleCommand`] is
//! written to `pending_operations` before the store transaction that applies
//! it, and the marker is deleted inside that transaction. A marker therefore
//! survives only if the process stopped before commit, and
//! [`Engine::reconcile_pending_operations`] finishes the job.

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{
    ActorContext, Credentials, EngineError, LifecycleCommand, MemberRole, MemberView, Money,
    NewAccount, PendingMarker, PendingOperation, ReconcileFailure, ReconcileReport, ResultEngine,
    Session, VIRTUAL_USERNAME_PREFIX, code, expense_splits, expenses, password, pending_operations,
    trip_members, users,
    util::{is_unique_violation, normalize_required_text},
};

use super::{Engine, accounts::Identity, with_tx};

const VIRTUAL_HANDLE_LENGTH: usize = 8;

impl Engine {
    /// `KeyNotFound` unless `virtual_id` is a virtual user with a membership
    /// in `trip_id`.
    async fn require_virtual_member(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
        virtual_id: i64,
    ) -> ResultEngine<users::Model> {
        let not_found = || EngineError::KeyNotFound("virtual member not exists".to_string());
        let user = users::Entity::find_by_id(virtual_id)
            .one(db)
            .await?
            .filter(|u| u.is_virtual)
            .ok_or_else(not_found)?;
        self.find_membership(db, trip_id, virtual_id)
            .await?
            .ok_or_else(not_found)?;
        Ok(user)
    }

    /// Creates a placeholder member (admin only) with a generated `v-` handle
    /// and a password nobody knows.
    pub async fn create_virtual_member(
        &self,
        actor: ActorContext,
        trip_id: i64,
        display_name: &str,
    ) -> ResultEngine<MemberView> {
        let display_name = normalize_required_text(display_name, "display_name")?;
        let password_hash = password::unusable_password_hash()?;
        let policy = self.code_policy.fixed(VIRTUAL_HANDLE_LENGTH);

        let member = with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, trip_id, actor).await?;

            let user = code::insert_with_unique_code(&db_tx, policy, "virtual handle", |candidate| {
                users::ActiveModel {
                    username: ActiveValue::Set(format!("{VIRTUAL_USERNAME_PREFIX}{candidate}")),
                    display_name: ActiveValue::Set(display_name.clone()),
                    email: ActiveValue::Set(None),
                    password_hash: ActiveValue::Set(password_hash.clone()),
                    is_virtual: ActiveValue::Set(true),
                    created_at: ActiveValue::Set(Utc::now()),
                    ..Default::default()
                }
            })
            .await?;

            let membership = trip_members::ActiveModel {
                trip_id: ActiveValue::Set(trip_id),
                user_id: ActiveValue::Set(user.id),
                role: ActiveValue::Set(MemberRole::Member.as_str().to_string()),
                joined_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            }
            .insert(&db_tx)
            .await?;

            MemberView::try_from_join(membership, user)
        })?;

        tracing::info!(trip_id, user_id = member.user_id, "virtual member created");
        Ok(member)
    }

    /// Merges a virtual member into the real account identified by
    /// `credentials`, then opens a session for that account.
    ///
    /// `trip_code` must be the trip's join code; a caller who cannot show it
    /// gets `Forbidden`.
    ///
    /// Every expense paid and every split owed by the virtual member in this
    /// trip moves to the real account. Its membership is dropped if the real
    /// account is already a member, repointed otherwise. The virtual row is
    /// deleted once nothing references it.
    pub async fn link_virtual_member(
        &self,
        trip_id: i64,
        virtual_id: i64,
        trip_code: &str,
        credentials: Credentials,
    ) -> ResultEngine<Session> {
        let real = with_tx!(self, |db_tx| {
            self.require_trip_code(&db_tx, trip_id, trip_code).await?;
            self.require_virtual_member(&db_tx, trip_id, virtual_id)
                .await?;
            self.authenticate(&db_tx, &credentials).await
        })?;

        let command = LifecycleCommand::Link {
            trip_id,
            virtual_id,
            real_id: real.id,
        };
        let session = self.run_journaled(&command, real.id).await?;
        tracing::info!(trip_id, virtual_id, real_id = real.id, "virtual member linked");
        Ok(session)
    }

    /// Turns a virtual member into a real account in place, keeping its id,
    /// and opens a session for it. Like a link, it requires the trip's join
    /// code.
    pub async fn promote_virtual_member(
        &self,
        trip_id: i64,
        virtual_id: i64,
        trip_code: &str,
        account: NewAccount,
    ) -> ResultEngine<Session> {
        let identity = Identity::from_new_account(&account)?;
        with_tx!(self, |db_tx| {
            self.require_trip_code(&db_tx, trip_id, trip_code).await?;
            self.require_virtual_member(&db_tx, trip_id, virtual_id)
                .await?;
            self.ensure_identity_free(
                &db_tx,
                &identity.username,
                identity.email.as_deref(),
                Some(virtual_id),
            )
            .await
        })?;

        let command = LifecycleCommand::Promote {
            trip_id,
            virtual_id,
            username: identity.username,
            display_name: identity.display_name,
            email: identity.email,
            password_hash: identity.password_hash,
        };
        let session = self.run_journaled(&command, virtual_id).await?;
        tracing::info!(trip_id, virtual_id, "virtual member promoted");
        Ok(session)
    }

    /// Journals `command`, applies it and opens a session for `session_user`.
    ///
    /// When the apply step returns an error nothing was committed, so the
    /// marker is discarded before the error is returned.
    async fn run_journaled(
        &self,
        command: &LifecycleCommand,
        session_user: i64,
    ) -> ResultEngine<Session> {
        let payload = serde_json::to_string(command).map_err(|err| {
            EngineError::InvariantViolation(format!("lifecycle command encoding: {err}"))
        })?;
        let marker = pending_operations::ActiveModel {
            kind: ActiveValue::Set(command.kind().to_string()),
            trip_id: ActiveValue::Set(command.trip_id()),
            subject_id: ActiveValue::Set(command.virtual_id()),
            payload: ActiveValue::Set(payload),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.database)
        .await?;

        match self.apply_journaled(marker.id, command, session_user).await {
            Ok(session) => Ok(session),
            Err(err) => {
                if let Err(cleanup) = pending_operations::Entity::delete_by_id(marker.id)
                    .exec(&self.database)
                    .await
                {
                    tracing::warn!(
                        marker_id = marker.id,
                        "failed to discard pending operation: {cleanup}"
                    );
                }
                Err(err)
            }
        }
    }

    async fn apply_journaled(
        &self,
        marker_id: i64,
        command: &LifecycleCommand,
        session_user: i64,
    ) -> ResultEngine<Session> {
        with_tx!(self, |db_tx| {
            // The member may have been linked or promoted since the precheck.
            self.require_virtual_member(&db_tx, command.trip_id(), command.virtual_id())
                .await?;
            self.apply_lifecycle(&db_tx, command).await?;
            pending_operations::Entity::delete_by_id(marker_id)
                .exec(&db_tx)
                .await?;
            self.create_session(&db_tx, session_user).await
        })
    }

    /// Applies a lifecycle command. Applying an already applied command is a
    /// no-op; a command overtaken by a different lifecycle change fails.
    async fn apply_lifecycle(
        &self,
        db: &DatabaseTransaction,
        command: &LifecycleCommand,
    ) -> ResultEngine<()> {
        match command {
            LifecycleCommand::Link {
                trip_id,
                virtual_id,
                real_id,
            } => self.apply_link(db, *trip_id, *virtual_id, *real_id).await,
            LifecycleCommand::Promote {
                virtual_id,
                username,
                display_name,
                email,
                password_hash,
                ..
            } => {
                self.apply_promote(
                    db,
                    *virtual_id,
                    username,
                    display_name,
                    email.as_deref(),
                    password_hash,
                )
                .await
            }
        }
    }

    async fn apply_link(
        &self,
        db: &DatabaseTransaction,
        trip_id: i64,
        virtual_id: i64,
        real_id: i64,
    ) -> ResultEngine<()> {
        let Some(user) = users::Entity::find_by_id(virtual_id).one(db).await? else {
            return Ok(());
        };
        if !user.is_virtual {
            return Err(EngineError::InvariantViolation(format!(
                "member {virtual_id} is no longer virtual, link into {real_id} not applied"
            )));
        }
        if self.find_membership(db, trip_id, virtual_id).await?.is_none() {
            return Ok(());
        }
        self.require_user(db, real_id).await?;

        expenses::Entity::update_many()
            .col_expr(expenses::Column::PayerId, Expr::value(real_id))
            .filter(expenses::Column::TripId.eq(trip_id))
            .filter(expenses::Column::PayerId.eq(virtual_id))
            .exec(db)
            .await?;

        // A split of the real account on the same expense absorbs the virtual
        // share, so each expense keeps one split per participant.
        let virtual_splits = expense_splits::Entity::find()
            .inner_join(expenses::Entity)
            .filter(expenses::Column::TripId.eq(trip_id))
            .filter(expense_splits::Column::UserId.eq(virtual_id))
            .all(db)
            .await?;
        for split in virtual_splits {
            let real_split = expense_splits::Entity::find()
                .filter(expense_splits::Column::ExpenseId.eq(split.expense_id))
                .filter(expense_splits::Column::UserId.eq(real_id))
                .one(db)
                .await?;
            match real_split {
                Some(real_split) => {
                    let share = Money::new(real_split.share_minor)
                        .checked_add(Money::new(split.share_minor))
                        .ok_or_else(|| {
                            EngineError::InvariantViolation(format!(
                                "merged share on expense {} overflows",
                                split.expense_id
                            ))
                        })?
                        .minor();
                    let mut active: expense_splits::ActiveModel = real_split.into();
                    active.share_minor = ActiveValue::Set(share);
                    active.update(db).await?;
                    expense_splits::Entity::delete_by_id(split.id)
                        .exec(db)
                        .await?;
                }
                None => {
                    let mut active: expense_splits::ActiveModel = split.into();
                    active.user_id = ActiveValue::Set(real_id);
                    active.update(db).await?;
                }
            }
        }

        if let Some(membership) = self.find_membership(db, trip_id, virtual_id).await? {
            if self.find_membership(db, trip_id, real_id).await?.is_some() {
                trip_members::Entity::delete_by_id(membership.id)
                    .exec(db)
                    .await?;
            } else {
                let mut active: trip_members::ActiveModel = membership.into();
                active.user_id = ActiveValue::Set(real_id);
                active.update(db).await?;
            }
        }

        self.collect_orphaned_virtual(db, virtual_id).await?;
        Ok(())
    }

    async fn apply_promote(
        &self,
        db: &DatabaseTransaction,
        virtual_id: i64,
        username: &str,
        display_name: &str,
        email: Option<&str>,
        password_hash: &str,
    ) -> ResultEngine<()> {
        let user = users::Entity::find_by_id(virtual_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("virtual member not exists".to_string()))?;
        if !user.is_virtual {
            if user.username == username {
                return Ok(());
            }
            return Err(EngineError::ExistingKey(format!(
                "member {virtual_id} is already a real account"
            )));
        }

        self.ensure_identity_free(db, username, email, Some(virtual_id))
            .await?;

        let mut active: users::ActiveModel = user.into();
        active.username = ActiveValue::Set(username.to_string());
        active.display_name = ActiveValue::Set(display_name.to_string());
        active.email = ActiveValue::Set(email.map(ToString::to_string));
        active.password_hash = ActiveValue::Set(password_hash.to_string());
        active.is_virtual = ActiveValue::Set(false);
        active.update(db).await.map_err(|err| {
            if is_unique_violation(&err) {
                EngineError::ExistingKey(format!("username {username}"))
            } else {
                err.into()
            }
        })?;
        Ok(())
    }

    /// Journaled lifecycle commands that never committed, oldest first. A
    /// marker whose payload cannot be decoded is still listed, with its
    /// decoding error.
    pub async fn pending_operations(&self) -> ResultEngine<Vec<PendingMarker>> {
        Ok(pending_operations::Entity::find()
            .order_by_asc(pending_operations::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(PendingMarker::from)
            .collect())
    }

    /// Re-applies every journaled command, clearing each marker in the
    /// transaction that applies it. Markers that fail stay in place and are
    /// listed in the report.
    pub async fn reconcile_pending_operations(&self) -> ResultEngine<ReconcileReport> {
        let markers = pending_operations::Entity::find()
            .order_by_asc(pending_operations::Column::Id)
            .all(&self.database)
            .await?;

        let mut report = ReconcileReport::default();
        for marker in markers {
            let id = marker.id;
            let outcome = match PendingOperation::try_from(marker) {
                Ok(operation) => self.replay(&operation).await.map(|()| operation),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(operation) => {
                    tracing::info!(
                        marker_id = id,
                        kind = operation.command.kind(),
                        "pending operation applied"
                    );
                    report.applied.push(operation);
                }
                Err(err) => {
                    tracing::warn!(marker_id = id, "pending operation not applied: {err}");
                    report.failed.push(ReconcileFailure {
                        id,
                        error: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            applied = report.applied.len(),
            failed = report.failed.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn replay(&self, operation: &PendingOperation) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.apply_lifecycle(&db_tx, &operation.command).await?;
            pending_operations::Entity::delete_by_id(operation.id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}
