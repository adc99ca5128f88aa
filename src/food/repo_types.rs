use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A catalogue product, per-100g nutrients as published by Open Food Facts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Food {
    pub id: Uuid,
    pub code: String,
    pub product_name: String,
    pub brands: Option<String>,
    pub categories: Option<String>,
    pub ingredients_text: Option<String>,
    pub image_url: Option<String>,
    pub allergens: Option<String>,
    pub energy_kcal_100g: Option<f64>,
    pub fat_100g: Option<f64>,
    pub saturated_fat_100g: Option<f64>,
    pub carbohydrates_100g: Option<f64>,
    pub sugars_100g: Option<f64>,
    pub fiber_100g: Option<f64>,
    pub proteins_100g: Option<f64>,
    pub salt_100g: Option<f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FoodSearchRow {
    pub id: Uuid,
    pub product_name: String,
    pub image_url: Option<String>,
    pub allergens: Option<String>,
}
