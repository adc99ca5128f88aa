use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddAllergensRequest {
    #[serde(default)]
    pub allergens: Vec<String>,
}

/// One search hit.
#[derive(Debug, Serialize)]
pub struct FoodHit {
    pub id: Uuid,
    pub product_name: String,
    pub image_url: Option<String>,
    pub allergens_detected: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AllergensResponse {
    pub allergens: Vec<String>,
}
