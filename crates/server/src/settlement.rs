use axum::{
    Extension, Json,
    extract::{Path, State},
};
use engine::ActorContext;

use crate::{
    ServerError, server::ServerState, types::settlement::SettlementView, views::settlement_view,
};

/// Balances and the transfer plan of a trip.
pub async fn get(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(trip_id): Path<i64>,
) -> Result<Json<SettlementView>, ServerError> {
    let settlement = state.engine.compute_settlement(actor, trip_id).await?;
    Ok(Json(settlement_view(settlement)))
}
