//! Trip endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::ActorContext;

use crate::{
    ServerError,
    server::ServerState,
    types::trip::{TripJoin, TripNew, TripView, TripsResponse},
    views::{currency_from_api, trip_view},
};

pub async fn create(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Json(payload): Json<TripNew>,
) -> Result<(StatusCode, Json<TripView>), ServerError> {
    let trip = state
        .engine
        .create_trip(
            actor,
            &payload.name,
            payload.description.as_deref(),
            payload.base_currency.map(currency_from_api),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(trip_view(trip))))
}

pub async fn list(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
) -> Result<Json<TripsResponse>, ServerError> {
    let trips = state
        .engine
        .list_trips(actor)
        .await?
        .into_iter()
        .map(trip_view)
        .collect();
    Ok(Json(TripsResponse { trips }))
}

pub async fn join(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Json(payload): Json<TripJoin>,
) -> Result<Json<TripView>, ServerError> {
    let trip = state.engine.join_trip(actor, &payload.code).await?;
    Ok(Json(trip_view(trip)))
}

pub async fn get(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(trip_id): Path<i64>,
) -> Result<Json<TripView>, ServerError> {
    let trip = state.engine.trip(actor, trip_id).await?;
    Ok(Json(trip_view(trip)))
}

pub async fn remove(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(trip_id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_trip(actor, trip_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
