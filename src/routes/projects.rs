use std::sync::Arc;

use crate::{
    app::AppState,
    domain::{errors::ApiError, model::DbProject},
    repository::fetch_projects,
};
use axum::{extract::State, Json};

pub async fn get_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DbProject>>, ApiError> {
    Ok(Json(fetch_projects(&state.get_pool()).await?))
}
