use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use std::{net::SocketAddr, sync::Arc};

use crate::{ServerError, auth, expenses, members, settlement, trips};
use engine::{Engine, EngineError};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// Bearer token of the authenticated request, for handlers that act on the
/// session itself.
#[derive(Clone, Debug)]
pub struct SessionToken(pub String);

async fn auth(
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return Err(EngineError::InvalidCredentials.into());
    };

    let actor = state.engine.actor_for_session(bearer.token()).await?;
    request.extensions_mut().insert(actor);
    request
        .extensions_mut()
        .insert(SessionToken(bearer.token().to_string()));
    Ok(next.run(request).await)
}

/// Builds the HTTP surface. Account creation, login and the virtual member
/// link/promote endpoints authenticate through their request body, the
/// latter two with the trip's join code; every other route needs a bearer
/// session.
pub fn router(state: ServerState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route(
            "/trips/{trip_id}/virtual-members/{member_id}/link",
            post(members::link_virtual),
        )
        .route(
            "/trips/{trip_id}/virtual-members/{member_id}/promote",
            post(members::promote_virtual),
        );

    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/trips", post(trips::create).get(trips::list))
        .route("/trips/join", post(trips::join))
        .route("/trips/{trip_id}", get(trips::get).delete(trips::remove))
        .route("/trips/{trip_id}/members", get(members::list))
        .route(
            "/trips/{trip_id}/members/{member_id}",
            delete(members::remove),
        )
        .route(
            "/trips/{trip_id}/virtual-members",
            post(members::create_virtual),
        )
        .route(
            "/trips/{trip_id}/expenses",
            get(expenses::list).post(expenses::create),
        )
        .route(
            "/trips/{trip_id}/expenses/{expense_id}",
            patch(expenses::update).delete(expenses::remove),
        )
        .route("/trips/{trip_id}/settlement", get(settlement::get))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    public.merge(protected).with_state(state)
}

pub async fn run(engine: Engine, addr: SocketAddr) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
    };

    axum::serve(listener, router(state)).await
}
