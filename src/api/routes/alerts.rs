//! Alert configuration endpoints

use axum::{Json, extract::State};
use tracing::info;

use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::AlertConfigResponse,
    },
    config::DebounceScope,
    store::{AlertSettings, AlertSettingsUpdate},
};

async fn current_config(state: &ApiState) -> ApiResult<AlertConfigResponse> {
    let settings = AlertSettings::load(state.store.as_ref(), DebounceScope::Global, "").await?;
    Ok(AlertConfigResponse::new(settings, &state.alert_policy))
}

/// GET /api/v1/alerts/config
pub async fn get_alert_config(State(state): State<ApiState>) -> ApiResult<Json<AlertConfigResponse>> {
    Ok(Json(current_config(&state).await?))
}

/// PUT /api/v1/alerts/config
///
/// Fields that are left out stay untouched, `null` clears them.
pub async fn update_alert_config(
    State(state): State<ApiState>,
    Json(update): Json<AlertSettingsUpdate>,
) -> ApiResult<Json<AlertConfigResponse>> {
    for (field, threshold) in [
        ("cpu_threshold", update.cpu_threshold),
        ("memory_threshold", update.memory_threshold),
    ] {
        if let Some(Some(value)) = threshold
            && (!value.is_finite() || value < 0.0)
        {
            return Err(ApiError::InvalidRequest(format!(
                "{field} must be a non-negative number"
            )));
        }
    }

    if let Some(Some(recipient)) = &update.recipient
        && recipient.trim().is_empty()
    {
        return Err(ApiError::InvalidRequest(
            "recipient must not be empty, use null to clear it".to_string(),
        ));
    }

    update.apply(state.store.as_ref()).await?;
    info!("alert configuration updated");

    Ok(Json(current_config(&state).await?))
}
