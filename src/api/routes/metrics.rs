//! Metric push endpoint used by agents

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::trace;

use crate::{
    actors::MetricEvent,
    api::{error::ApiResult, state::ApiState},
};

/// POST /api/v1/metrics/:name
///
/// The body is handed to the ingestor as is. Like any publish, the request is accepted
/// even when the channel is unknown or the payload turns out to be malformed; the
/// ingestor drops those.
pub async fn push_metrics(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    body: String,
) -> ApiResult<StatusCode> {
    trace!("metric push on channel {name}");
    state.ingestor.publish(MetricEvent::new(name, body)).await?;
    Ok(StatusCode::ACCEPTED)
}
