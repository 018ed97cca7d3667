use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run, run_with_listener};

mod auth;
mod expenses;
mod members;
mod server;
mod settlement;
mod trips;
mod views;

pub mod types {
    pub mod auth {
        pub use api_types::auth::{Login, Register, SessionView};
    }

    pub mod trip {
        pub use api_types::trip::{TripJoin, TripNew, TripView, TripsResponse};
    }

    pub mod member {
        pub use api_types::member::{
            MemberRole, MemberView, MembersResponse, VirtualMemberLink, VirtualMemberNew,
            VirtualMemberPromote,
        };
    }

    pub mod expense {
        pub use api_types::expense::{
            ExpenseNew, ExpenseUpdate, ExpenseView, ExpensesResponse, ShareView,
        };
    }

    pub mod settlement {
        pub use api_types::settlement::{BalanceView, SettlementView, TransferView};
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::ExistingKey(_) => StatusCode::CONFLICT,
        EngineError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        EngineError::GenerationExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::InvariantViolation(_) | EngineError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::InvariantViolation(msg) => {
            tracing::error!("ledger invariant violated: {msg}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => {
                (status_for_engine_error(&err), message_for_engine_error(err))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
