use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use utoipa::ToSchema;

pub type UserId = String;

/// Selection inside `Document::content`, always `start <= end`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
pub struct CursorRange {
    pub start: usize,
    pub end: usize,
}

impl CursorRange {
    pub fn new(start: usize, end: usize) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub fn caret(offset: usize) -> Self {
        Self { start: offset, end: offset }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub user_id: UserId,
    pub name: String,
    pub cursor: Option<CursorRange>,
    pub last_active: DateTime<Utc>,
}

impl Presence {
    pub fn new(user_id: impl Into<UserId>, name: impl Into<String>, cursor: Option<CursorRange>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            cursor,
            last_active: Utc::now(),
        }
    }

    /// True when the user was seen within `idle`.
    pub fn is_active(&self, idle: Duration) -> bool {
        match chrono::Duration::from_std(idle) {
            Ok(idle) => Utc::now().signed_duration_since(self.last_active) < idle,
            Err(_) => true,
        }
    }
}

/// All collaborators' presence on one document, keyed by user id.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(transparent)]
pub struct PresenceTable(pub HashMap<UserId, Presence>);

impl PresenceTable {
    pub fn get(&self, user_id: &str) -> Option<&Presence> {
        self.0.get(user_id)
    }

    pub fn insert(&mut self, presence: Presence) -> Option<Presence> {
        self.0.insert(presence.user_id.clone(), presence)
    }

    pub fn remove(&mut self, user_id: &str) -> Option<Presence> {
        self.0.remove(user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Presence> {
        self.0.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_range_is_normalised() {
        let range = CursorRange::new(9, 4);
        assert_eq!(range, CursorRange { start: 4, end: 9 });
        assert!(CursorRange::caret(3).is_collapsed());
    }

    #[test]
    fn table_serializes_as_plain_map() {
        let mut table = PresenceTable::default();
        table.insert(Presence::new("u1", "Ada", Some(CursorRange::caret(2))));
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["u1"]["name"], "Ada");
        assert_eq!(json["u1"]["cursor"]["start"], 2);
        assert!(json["u1"].get("lastActive").is_some());
    }

    #[test]
    fn stale_presence_is_inactive() {
        let mut presence = Presence::new("u1", "Ada", None);
        assert!(presence.is_active(Duration::from_secs(30)));
        presence.last_active = Utc::now() - chrono::Duration::seconds(120);
        assert!(!presence.is_active(Duration::from_secs(30)));
    }
}
