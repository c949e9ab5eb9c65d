use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::standards::models::StandardsConfig;
use crate::state::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// GET /api/v1/standards
pub async fn handle_get_standards(
    State(state): State<AppState>,
) -> Result<Json<StandardsConfig>, AppError> {
    let config = state.standards.load().await?;
    Ok(Json(config))
}

/// PUT /api/v1/standards
/// Replaces the whole configuration after validation.
pub async fn handle_put_standards(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<StandardsConfig>, JsonRejection>,
) -> Result<Json<StandardsConfig>, AppError> {
    authorize_admin(&state.config, &headers)?;
    let Json(config) = body.map_err(|e| AppError::UnprocessableEntity(e.body_text()))?;

    state.standards.save(&config).await?;
    info!(
        "Standards updated: {} targets, {} standards",
        config.targets.len(),
        config
            .targets
            .iter()
            .map(|t| t.standards.len())
            .sum::<usize>()
    );
    Ok(Json(config))
}

fn authorize_admin(config: &Config, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = config.admin_token.as_deref() else {
        return Ok(());
    };
    let given = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);
    if given == Some(expected) {
        Ok(())
    } else {
        warn!("Rejected standards update without valid admin token");
        Err(AppError::Unauthorized)
    }
}
