use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Kind tag for barcode lookups.
pub const KIND_CODE: &str = "code";

/// A history entry with the name of the product it points at, if that
/// product still exists.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HistoryItem {
    pub id: Uuid,
    pub kind: String,
    pub value_id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub product_name: Option<String>,
}
