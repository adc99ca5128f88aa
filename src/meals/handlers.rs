use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{
    dto::{CreateMealEntryRequest, DeleteMealEntryRequest, StatsQuery},
    repo,
    repo_types::{MealEntry, MealWithFood, NewMealEntry},
    services::{compute_stats, parse_stats_date, MacroTotals},
};
use crate::{
    auth::CurrentUser,
    error::{parse_id, AppError, JsonBody},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/repas", get(list_entries).post(add_entry).delete(delete_entry))
        .route("/repas/stats", get(stats))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn add_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<CreateMealEntryRequest>,
) -> Result<(StatusCode, Json<MealEntry>), AppError> {
    let raw_food = body
        .food_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("foodId is required"))?;
    let food_id = parse_id(raw_food, "Invalid foodId")?;

    let meal_kind = body
        .meal_kind
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::bad_request("mealKind is required"))?;

    let quantity = match body.quantity {
        Some(q) if q.is_finite() && q >= 0.0 => q,
        _ => {
            warn!(quantity = ?body.quantity, "invalid quantity");
            return Err(AppError::bad_request("quantity must be a non-negative number"));
        }
    };

    let entry = repo::insert(
        &state.db,
        NewMealEntry {
            user_id: user.id,
            meal_kind,
            food_id,
            quantity,
            date: body.date.unwrap_or_else(OffsetDateTime::now_utc),
        },
    )
    .await?;

    info!(entry_id = %entry.id, %food_id, quantity, "meal entry logged");
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_entries(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<MealWithFood>>, AppError> {
    Ok(Json(repo::list_with_food(&state.db, user.id).await?))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn delete_entry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(body): JsonBody<DeleteMealEntryRequest>,
) -> Result<Json<Value>, AppError> {
    let raw = body
        .repas_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("No repasId has been sent"))?;
    let id = parse_id(raw, "Invalid repasId")?;

    if !repo::delete(&state.db, user.id, id).await? {
        return Err(AppError::not_found("Meal not found"));
    }
    info!(entry_id = %id, "meal entry deleted");
    Ok(Json(json!({ "message": "The meal has been deleted" })))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(q): Query<StatsQuery>,
) -> Result<Json<MacroTotals>, AppError> {
    let target = match q.date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(raw) => Some(
            parse_stats_date(raw).ok_or_else(|| AppError::bad_request("Invalid date"))?,
        ),
        None => None,
    };
    Ok(Json(compute_stats(&state.db, user.id, target).await?))
}
