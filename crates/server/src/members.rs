//! Trip member endpoints, virtual members included.
//!
//! Link and promote are reachable without a session: the body carries the
//! credentials (link) or the new identity (promote) and the response opens a
//! session for the resulting real account.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{ActorContext, Credentials, NewAccount};

use crate::{
    ServerError,
    server::ServerState,
    types::{
        auth::SessionView,
        member::{
            MemberView, MembersResponse, VirtualMemberLink, VirtualMemberNew,
            VirtualMemberPromote,
        },
    },
    views::{member_view, session_view},
};

pub async fn list(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(trip_id): Path<i64>,
) -> Result<Json<MembersResponse>, ServerError> {
    let members = state
        .engine
        .list_members(actor, trip_id)
        .await?
        .into_iter()
        .map(member_view)
        .collect();
    Ok(Json(MembersResponse { members }))
}

pub async fn remove(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path((trip_id, member_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .remove_member(actor, trip_id, member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_virtual(
    Extension(actor): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(trip_id): Path<i64>,
    Json(payload): Json<VirtualMemberNew>,
) -> Result<(StatusCode, Json<MemberView>), ServerError> {
    let member = state
        .engine
        .create_virtual_member(actor, trip_id, &payload.display_name)
        .await?;
    Ok((StatusCode::CREATED, Json(member_view(member))))
}

pub async fn link_virtual(
    State(state): State<ServerState>,
    Path((trip_id, member_id)): Path<(i64, i64)>,
    Json(payload): Json<VirtualMemberLink>,
) -> Result<Json<SessionView>, ServerError> {
    let session = state
        .engine
        .link_virtual_member(
            trip_id,
            member_id,
            &payload.code,
            Credentials::new(payload.username, payload.password),
        )
        .await?;
    Ok(Json(session_view(session)))
}

pub async fn promote_virtual(
    State(state): State<ServerState>,
    Path((trip_id, member_id)): Path<(i64, i64)>,
    Json(payload): Json<VirtualMemberPromote>,
) -> Result<Json<SessionView>, ServerError> {
    let mut account = NewAccount::new(payload.username, payload.display_name, payload.password);
    if let Some(email) = payload.email {
        account = account.email(email);
    }
    let session = state
        .engine
        .promote_virtual_member(trip_id, member_id, &payload.code, account)
        .await?;
    Ok(Json(session_view(session)))
}
