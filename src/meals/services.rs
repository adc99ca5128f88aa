use serde::Serialize;
use sqlx::PgPool;
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::{repo, repo_types::MealWithFood};
use crate::food::repo_types::Food;

/// Half-width of the window around a requested date.
pub const STATS_WINDOW: Duration = Duration::hours(24);

/// Quantity-scaled macronutrients, in grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MacroTotals {
    pub sugar: f64,
    pub fat: f64,
    pub saturated_fat: f64,
    pub carbohydrate: f64,
    pub fiber: f64,
    pub salt: f64,
    pub protein: f64,
}

impl MacroTotals {
    /// Adds `quantity` grams of `food`. Missing per-100g values count as zero.
    pub fn add(&mut self, food: &Food, quantity: f64) {
        let scale = quantity / 100.0;
        let per = |v: Option<f64>| v.unwrap_or(0.0) * scale;
        self.sugar += per(food.sugars_100g);
        self.fat += per(food.fat_100g);
        self.saturated_fat += per(food.saturated_fat_100g);
        self.carbohydrate += per(food.carbohydrates_100g);
        self.fiber += per(food.fiber_100g);
        self.salt += per(food.salt_100g);
        self.protein += per(food.proteins_100g);
    }
}

/// Whether `date` lies within 24 hours either side of `target`, bounds included.
pub fn within_window(date: OffsetDateTime, target: OffsetDateTime) -> bool {
    (date - target).abs() <= STATS_WINDOW
}

/// Sums the entries, keeping only those near `target` when one is given.
/// Entries whose food no longer exists contribute nothing.
pub fn aggregate(entries: &[MealWithFood], target: Option<OffsetDateTime>) -> MacroTotals {
    entries
        .iter()
        .filter(|m| target.map_or(true, |t| within_window(m.entry.date, t)))
        .filter_map(|m| m.food.as_ref().map(|f| (f, m.entry.quantity)))
        .fold(MacroTotals::default(), |mut acc, (food, qty)| {
            acc.add(food, qty);
            acc
        })
}

/// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD`, read as midnight UTC.
pub fn parse_stats_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|d| d.midnight().assume_utc())
}

/// Loads the user's entries and totals them.
pub async fn compute_stats(
    db: &PgPool,
    user_id: Uuid,
    target: Option<OffsetDateTime>,
) -> anyhow::Result<MacroTotals> {
    let entries = repo::list_with_food(db, user_id).await?;
    let totals = aggregate(&entries, target);
    debug!(%user_id, entries = entries.len(), "macro totals computed");
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::repo_types::MealEntry;
    use time::macros::datetime;

    fn food(sugar: Option<f64>, protein: Option<f64>) -> Food {
        Food {
            id: Uuid::new_v4(),
            code: "3017620422003".into(),
            product_name: "Nutella".into(),
            brands: None,
            categories: None,
            ingredients_text: None,
            image_url: None,
            allergens: None,
            energy_kcal_100g: Some(539.0),
            fat_100g: Some(30.9),
            saturated_fat_100g: Some(10.6),
            carbohydrates_100g: Some(57.5),
            sugars_100g: sugar,
            fiber_100g: None,
            proteins_100g: protein,
            salt_100g: Some(0.1),
        }
    }

    fn entry(food: Option<Food>, quantity: f64, date: OffsetDateTime) -> MealWithFood {
        MealWithFood {
            entry: MealEntry {
                id: Uuid::new_v4(),
                user_id: Uuid::nil(),
                meal_kind: "breakfast".into(),
                food_id: food.as_ref().map_or_else(Uuid::new_v4, |f| f.id),
                quantity,
                date,
            },
            food,
        }
    }

    const NOON: OffsetDateTime = datetime!(2024-03-10 12:00 UTC);

    #[test]
    fn empty_set_is_all_zero() {
        assert_eq!(aggregate(&[], None), MacroTotals::default());
        assert_eq!(aggregate(&[], Some(NOON)), MacroTotals::default());
    }

    #[test]
    fn scales_per_100g_by_quantity() {
        let totals = aggregate(&[entry(Some(food(Some(56.3), Some(6.3))), 50.0, NOON)], None);
        assert!((totals.sugar - 28.15).abs() < 1e-9);
        assert!((totals.protein - 3.15).abs() < 1e-9);
        assert!((totals.fat - 15.45).abs() < 1e-9);
        assert_eq!(totals.fiber, 0.0);
    }

    #[test]
    fn doubling_quantity_doubles_every_field() {
        let f = food(Some(56.3), Some(6.3));
        let one = aggregate(&[entry(Some(f.clone()), 40.0, NOON)], None);
        let two = aggregate(&[entry(Some(f), 80.0, NOON)], None);
        assert!((two.sugar - 2.0 * one.sugar).abs() < 1e-9);
        assert!((two.fat - 2.0 * one.fat).abs() < 1e-9);
        assert!((two.saturated_fat - 2.0 * one.saturated_fat).abs() < 1e-9);
        assert!((two.carbohydrate - 2.0 * one.carbohydrate).abs() < 1e-9);
        assert!((two.salt - 2.0 * one.salt).abs() < 1e-9);
        assert!((two.protein - 2.0 * one.protein).abs() < 1e-9);
    }

    #[test]
    fn window_boundaries() {
        let day = Duration::hours(24);
        let ms = Duration::milliseconds(1);
        assert!(within_window(NOON + day, NOON));
        assert!(within_window(NOON - day, NOON));
        assert!(within_window(NOON + day - ms, NOON));
        assert!(!within_window(NOON + day + ms, NOON));
        assert!(!within_window(NOON - day - ms, NOON));
    }

    #[test]
    fn target_filters_entries() {
        let f = food(Some(10.0), None);
        let entries = vec![
            entry(Some(f.clone()), 100.0, NOON + Duration::hours(23)),
            entry(Some(f), 100.0, NOON + Duration::hours(24) + Duration::milliseconds(1)),
        ];
        assert_eq!(aggregate(&entries, Some(NOON)).sugar, 10.0);
        assert_eq!(aggregate(&entries, None).sugar, 20.0);
    }

    #[test]
    fn dangling_food_contributes_nothing() {
        let entries = vec![
            entry(None, 500.0, NOON),
            entry(Some(food(Some(10.0), Some(5.0))), 100.0, NOON),
        ];
        let totals = aggregate(&entries, Some(NOON));
        assert_eq!(totals.sugar, 10.0);
        assert_eq!(totals.protein, 5.0);
    }

    #[test]
    fn parses_both_date_forms() {
        assert_eq!(parse_stats_date("2024-03-10"), Some(datetime!(2024-03-10 0:00 UTC)));
        assert_eq!(
            parse_stats_date("2024-03-10T12:00:00Z"),
            Some(NOON)
        );
        assert_eq!(parse_stats_date("10/03/2024"), None);
        assert_eq!(parse_stats_date(""), None);
    }
}
