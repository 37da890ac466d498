//! Server snapshot endpoints

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    api::{error::ApiResult, state::ApiState},
    registry::ServerSnapshot,
};

/// GET /api/v1/servers
///
/// Same shape as a broadcast frame, in registry order
pub async fn list_servers(State(state): State<ApiState>) -> Json<Vec<ServerSnapshot>> {
    Json(state.registry.snapshot().await)
}

/// GET /api/v1/servers/:name
pub async fn get_server(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServerSnapshot>> {
    let server = state.registry.lookup(&name)?;
    Ok(Json(server.snapshot().await))
}
