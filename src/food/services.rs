/// Escapes `ILIKE` metacharacters so user input matches literally.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// The user's allergens that appear in a product's allergen tag string.
pub fn detect_allergens(user_allergens: &[String], food_allergens: Option<&str>) -> Vec<String> {
    let Some(tags) = food_allergens.map(str::to_lowercase) else {
        return Vec::new();
    };
    user_allergens
        .iter()
        .filter(|a| !a.is_empty() && tags.contains(a.to_lowercase().as_str()))
        .cloned()
        .collect()
}

/// Appends `incoming` to `current`: trimmed, lowercased, without duplicates,
/// first occurrence order kept.
pub fn merge_allergens(current: &[String], incoming: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(current.len() + incoming.len());
    for a in current.iter().chain(incoming) {
        let a = a.trim().to_lowercase();
        if !a.is_empty() && !merged.contains(&a) {
            merged.push(a);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("nut"), "nut");
        assert_eq!(escape_like("100%_pure\\"), "100\\%\\_pure\\\\");
    }

    #[test]
    fn detects_case_insensitively() {
        let found = detect_allergens(&v(&["milk", "peanuts", "soy"]), Some("en:Milk,en:Soybeans"));
        assert_eq!(found, v(&["milk", "soy"]));
    }

    #[test]
    fn no_tags_means_nothing_detected() {
        assert!(detect_allergens(&v(&["milk"]), None).is_empty());
        assert!(detect_allergens(&[], Some("en:milk")).is_empty());
    }

    #[test]
    fn merge_normalises_and_dedups_in_order() {
        let merged = merge_allergens(&v(&["milk"]), &v(&[" Gluten ", "MILK", "", "eggs", "gluten"]));
        assert_eq!(merged, v(&["milk", "gluten", "eggs"]));
    }
}
