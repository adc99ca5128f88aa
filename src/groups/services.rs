use uuid::Uuid;

/// The ids from `incoming` not yet in `existing`, first occurrence kept.
pub fn new_members(existing: &[Uuid], incoming: &[Uuid]) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::new();
    for id in incoming {
        if !existing.contains(id) && !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_existing_and_repeated() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert_eq!(new_members(&[a], &[a, b, c, b]), vec![b, c]);
    }

    #[test]
    fn all_present_yields_nothing() {
        let a = Uuid::new_v4();
        assert!(new_members(&[a], &[a, a]).is_empty());
        assert!(new_members(&[], &[]).is_empty());
    }
}
