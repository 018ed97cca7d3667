use chrono::Utc;
use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Account, ActorContext, Credentials, EngineError, NewAccount, ResultEngine, Session, password,
    sessions, users,
    util::{is_unique_violation, normalize_email, normalize_required_text, normalize_username},
};

use super::{Engine, with_tx};

/// Validated identity fields, password already hashed.
pub(super) struct Identity {
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub password_hash: String,
}

impl Identity {
    /// Validates fields in order (username, display name, email, password) and
    /// hashes the password.
    pub(super) fn from_new_account(account: &NewAccount) -> ResultEngine<Self> {
        let username = normalize_username(&account.username)?;
        let display_name = normalize_required_text(&account.display_name, "display_name")?;
        let email = normalize_email(account.email.as_deref())?;
        password::validate_new_password(&account.password)?;
        Ok(Self {
            username,
            display_name,
            email,
            password_hash: password::hash_password(&account.password)?,
        })
    }
}

impl Engine {
    pub(super) async fn create_session<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: i64,
    ) -> ResultEngine<Session> {
        let model = sessions::ActiveModel {
            token: ActiveValue::Set(Uuid::new_v4().simple().to_string()),
            user_id: ActiveValue::Set(user_id),
            created_at: ActiveValue::Set(Utc::now()),
        }
        .insert(db)
        .await?;
        Ok(model.into())
    }

    /// Fails with `ExistingKey` if `username` or `email` is taken by a user
    /// other than `except_id`.
    pub(super) async fn ensure_identity_free<C: ConnectionTrait>(
        &self,
        db: &C,
        username: &str,
        email: Option<&str>,
        except_id: Option<i64>,
    ) -> ResultEngine<()> {
        let mut by_username = users::Entity::find().filter(users::Column::Username.eq(username));
        if let Some(id) = except_id {
            by_username = by_username.filter(users::Column::Id.ne(id));
        }
        if by_username.one(db).await?.is_some() {
            return Err(EngineError::ExistingKey(format!("username {username}")));
        }

        if let Some(email) = email {
            let mut by_email = users::Entity::find().filter(users::Column::Email.eq(email));
            if let Some(id) = except_id {
                by_email = by_email.filter(users::Column::Id.ne(id));
            }
            if by_email.one(db).await?.is_some() {
                return Err(EngineError::ExistingKey(format!("email {email}")));
            }
        }
        Ok(())
    }

    /// Checks credentials of a real account. Unknown users, virtual users and
    /// wrong passwords all fail the same way.
    pub(super) async fn authenticate<C: ConnectionTrait>(
        &self,
        db: &C,
        credentials: &Credentials,
    ) -> ResultEngine<users::Model> {
        let user = match normalize_username(&credentials.username) {
            Ok(username) => {
                users::Entity::find()
                    .filter(users::Column::Username.eq(username))
                    .one(db)
                    .await?
            }
            Err(_) => None,
        };

        match user {
            Some(user)
                if !user.is_virtual
                    && password::verify_password(&user.password_hash, &credentials.password) =>
            {
                Ok(user)
            }
            Some(_) => Err(EngineError::InvalidCredentials),
            None => {
                password::verify_against_fallback(&credentials.password);
                Err(EngineError::InvalidCredentials)
            }
        }
    }

    /// Creates a real account and opens a session for it.
    pub async fn register(&self, account: NewAccount) -> ResultEngine<Session> {
        let identity = Identity::from_new_account(&account)?;
        let session = with_tx!(self, |db_tx| {
            self.ensure_identity_free(&db_tx, &identity.username, identity.email.as_deref(), None)
                .await?;

            let inserted = users::ActiveModel {
                username: ActiveValue::Set(identity.username.clone()),
                display_name: ActiveValue::Set(identity.display_name.clone()),
                email: ActiveValue::Set(identity.email.clone()),
                password_hash: ActiveValue::Set(identity.password_hash.clone()),
                is_virtual: ActiveValue::Set(false),
                created_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            }
            .insert(&db_tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    EngineError::ExistingKey(format!("username {}", identity.username))
                } else {
                    err.into()
                }
            })?;

            self.create_session(&db_tx, inserted.id).await
        })?;
        tracing::info!(user_id = session.user_id, "account registered");
        Ok(session)
    }

    /// Opens a session for an existing real account.
    pub async fn login(&self, credentials: Credentials) -> ResultEngine<Session> {
        with_tx!(self, |db_tx| {
            let user = self.authenticate(&db_tx, &credentials).await?;
            self.create_session(&db_tx, user.id).await
        })
    }

    pub async fn logout(&self, token: &str) -> ResultEngine<()> {
        sessions::Entity::delete_by_id(token.to_string())
            .exec(&self.database)
            .await?;
        Ok(())
    }

    /// Resolves a bearer token to the actor it belongs to.
    pub async fn actor_for_session(&self, token: &str) -> ResultEngine<ActorContext> {
        let session = sessions::Entity::find_by_id(token.to_string())
            .one(&self.database)
            .await?
            .ok_or(EngineError::InvalidCredentials)?;
        Ok(ActorContext::new(session.user_id))
    }

    pub async fn account(&self, actor: ActorContext) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            let user = self.require_user(&db_tx, actor.user_id).await?;
            Ok(Account::from(user))
        })
    }
}
