use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{debug, instrument};

use super::{repo, repo_types::KIND_CODE};
use crate::{auth::CurrentUser, error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/history/code", get(code_history))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn code_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    let items = repo::list_for_user(&state.db, user.id, KIND_CODE).await?;
    if items.is_empty() {
        debug!("no scan history");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(items).into_response())
}
