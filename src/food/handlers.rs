use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, info, instrument, warn};

use super::{
    dto::{AddAllergensRequest, AllergensResponse, CodeQuery, FoodHit, NameQuery},
    repo,
    services::{detect_allergens, escape_like, merge_allergens},
};
use crate::{
    auth::{repo_types::User, CurrentUser},
    error::{AppError, JsonBody},
    history::{self, repo_types::KIND_CODE},
    state::AppState,
};

const SEARCH_LIMIT: i64 = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/food", get(search_by_name))
        .route("/food/code", get(find_by_code))
        .route("/food/addAllergen", post(add_allergens))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn search_by_name(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<NameQuery>,
) -> Result<Response, AppError> {
    let name = q
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::bad_request("The name of the product is missing"))?;

    let rows = repo::search_by_name(&state.db, &escape_like(name), SEARCH_LIMIT).await?;
    if rows.is_empty() {
        debug!(name, "no product found");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let hits: Vec<FoodHit> = rows
        .into_iter()
        .map(|r| FoodHit {
            allergens_detected: detect_allergens(&user.allergens, r.allergens.as_deref()),
            id: r.id,
            product_name: r.product_name,
            image_url: r.image_url,
        })
        .collect();
    Ok(Json(hits).into_response())
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn find_by_code(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<CodeQuery>,
) -> Result<Response, AppError> {
    let code = q
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("The code of the product is missing"))?;

    let Some(food) = repo::find_by_code(&state.db, code).await? else {
        debug!(code, "code matches no product");
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    if let Err(e) = history::repo::append(&state.db, KIND_CODE, food.id, user.id).await {
        warn!(error = %e, food_id = %food.id, "failed to record scan history");
    }

    Ok(Json(food).into_response())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn add_allergens(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<AddAllergensRequest>,
) -> Result<Json<AllergensResponse>, AppError> {
    if payload.allergens.iter().all(|a| a.trim().is_empty()) {
        return Err(AppError::bad_request("At least one allergen is required"));
    }

    let merged = merge_allergens(&user.allergens, &payload.allergens);
    User::set_allergens(&state.db, user.id, &merged).await?;

    info!(count = merged.len(), "allergens updated");
    Ok(Json(AllergensResponse { allergens: merged }))
}
