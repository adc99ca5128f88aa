use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::UserSummary;

/// A coach-owned chat group.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Group {
    pub id: Uuid,
    #[serde(rename = "coach")]
    pub coach_id: Uuid,
    pub members: Vec<Uuid>,
    #[serde(rename = "groupName")]
    pub name: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Group {
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.members.contains(&user_id)
    }

    /// Members or the coach.
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.coach_id == user_id || self.is_member(user_id)
    }

    /// Everyone who should see group traffic: members then the coach, once each.
    pub fn recipients(&self) -> Vec<Uuid> {
        let mut out = Vec::with_capacity(self.members.len() + 1);
        for id in self.members.iter().copied().chain(std::iter::once(self.coach_id)) {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }
}

/// Group with coach and members expanded.
#[derive(Debug, Serialize)]
pub struct GroupInfo {
    pub id: Uuid,
    #[serde(rename = "groupName")]
    pub name: String,
    pub coach: Option<UserSummary>,
    pub members: Vec<UserSummary>,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(coach: Uuid, members: Vec<Uuid>) -> Group {
        Group {
            id: Uuid::new_v4(),
            coach_id: coach,
            members,
            name: "Cutting".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn recipients_are_deduplicated() {
        let coach = Uuid::new_v4();
        let m = Uuid::new_v4();
        let g = group(coach, vec![m, coach, m]);
        assert_eq!(g.recipients(), vec![m, coach]);
    }

    #[test]
    fn coach_is_participant_but_not_member() {
        let coach = Uuid::new_v4();
        let g = group(coach, vec![]);
        assert!(g.is_participant(coach));
        assert!(!g.is_member(coach));
        assert!(!g.is_participant(Uuid::new_v4()));
    }

    #[test]
    fn serialises_with_wire_names() {
        let json = serde_json::to_value(group(Uuid::nil(), vec![])).unwrap();
        assert_eq!(json["groupName"], "Cutting");
        assert!(json.get("coach").is_some());
        assert!(json.get("coach_id").is_none());
    }
}
