use serde::Serialize;
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::food::repo_types::Food;

/// One logged consumption.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_kind: String,
    pub food_id: Uuid,
    pub quantity: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// Row shape of the entry/food left join.
#[derive(Debug, FromRow)]
pub struct MealEntryRow {
    #[sqlx(flatten)]
    pub entry: MealEntry,
    pub food: Option<Json<Food>>,
}

/// An entry with its food, `None` when the referenced food is gone.
#[derive(Debug, Clone, Serialize)]
pub struct MealWithFood {
    #[serde(flatten)]
    pub entry: MealEntry,
    pub food: Option<Food>,
}

impl From<MealEntryRow> for MealWithFood {
    fn from(r: MealEntryRow) -> Self {
        Self {
            entry: r.entry,
            food: r.food.map(|Json(f)| f),
        }
    }
}

/// Fields needed to log a new entry.
#[derive(Debug, Clone)]
pub struct NewMealEntry<'a> {
    pub user_id: Uuid,
    pub meal_kind: &'a str,
    pub food_id: Uuid,
    pub quantity: f64,
    pub date: OffsetDateTime,
}
