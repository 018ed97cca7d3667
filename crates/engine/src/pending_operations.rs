//! Journal of virtual-member lifecycle commands.
//!
//! A row is written before a link/promote starts and deleted in the same
//! store transaction that performs the last write. A row that survives means
//! the command never committed; `Engine::reconcile_pending_operations`
//! re-applies it.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, LifecycleCommand};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pending_operations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub kind: String,
    pub trip_id: i64,
    pub subject_id: i64,
    pub payload: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: i64,
    pub command: LifecycleCommand,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<Model> for PendingOperation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let command: LifecycleCommand = serde_json::from_str(&model.payload).map_err(|err| {
            EngineError::InvariantViolation(format!(
                "pending operation {} has an unreadable payload: {err}",
                model.id
            ))
        })?;
        Ok(Self {
            id: model.id,
            command,
            created_at: model.created_at,
        })
    }
}

/// A journal row as shown to operators. `error` is set, and `command` is
/// `None`, when the payload cannot be decoded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingMarker {
    pub id: i64,
    pub kind: String,
    pub trip_id: i64,
    pub subject_id: i64,
    pub command: Option<LifecycleCommand>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Model> for PendingMarker {
    fn from(model: Model) -> Self {
        let (command, error) = match serde_json::from_str::<LifecycleCommand>(&model.payload) {
            Ok(command) => (Some(command), None),
            Err(err) => (None, Some(format!("unreadable payload: {err}"))),
        };
        Self {
            id: model.id,
            kind: model.kind,
            trip_id: model.trip_id,
            subject_id: model.subject_id,
            command,
            error,
            created_at: model.created_at,
        }
    }
}

/// A journaled command that could not be re-applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileFailure {
    pub id: i64,
    pub error: String,
}

/// Outcome of one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Markers whose command was applied and cleared.
    pub applied: Vec<PendingOperation>,
    /// Markers left in place.
    pub failed: Vec<ReconcileFailure>,
}
