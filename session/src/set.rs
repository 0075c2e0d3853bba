use std::collections::BTreeSet;

use crate::model::{Session, SessionSection};

/// In-memory snapshot of a registry file.
///
/// Mutations here only touch memory; `SessionRegistry` wraps each one in a
/// locked load/mutate/persist cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSet {
    sessions: Vec<Session>,
}

impl SessionSet {
    pub fn new(sessions: Vec<Session>) -> Self {
        Self { sessions }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn as_slice(&self) -> &[Session] {
        &self.sessions
    }

    pub fn add(&mut self, session: Session) {
        self.sessions.push(session);
    }

    /// Removes the record keyed by `(id, user)` regardless of activity.
    pub fn remove_simple(&mut self, id: &str, user: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| !s.is_for(id, user));
        self.sessions.len() != before
    }

    /// Removes the record keyed by `(id, user, activity_id)`.
    pub fn remove_variant(&mut self, id: &str, user: &str, activity_id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions
            .retain(|s| !(s.is_for(id, user) && s.activity_id.as_deref() == Some(activity_id)));
        self.sessions.len() != before
    }

    /// Ids of every record, skipping ids that are not numeric.
    pub fn active_ids_as_integers(&self) -> BTreeSet<u32> {
        self.sessions
            .iter()
            .filter_map(Session::range_number)
            .collect()
    }

    pub fn has_session(&self, id: &str) -> bool {
        self.sessions.iter().any(|s| s.id == id)
    }

    pub fn has_session_for(&self, id: &str, user: &str) -> bool {
        self.sessions.iter().any(|s| s.is_for(id, user))
    }

    /// Activity of the first record keyed by `(id, user)`.
    pub fn activity_id_for(&self, id: &str, user: &str) -> Option<&str> {
        self.sessions
            .iter()
            .find(|s| s.is_for(id, user))
            .and_then(|s| s.activity_id.as_deref())
    }

    /// Activities of every record keyed by `(id, user)`, in file order.
    pub fn activity_ids_for(&self, id: &str, user: &str) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|s| s.is_for(id, user))
            .filter_map(|s| s.activity_id.clone())
            .collect()
    }

    pub fn sessions_for(&self, user: &str) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|s| s.user == user)
            .cloned()
            .collect()
    }

    /// Listing shape returned to clients: `[{"sessions": [...]}]`.
    pub fn document_for(&self, user: &str) -> Vec<SessionSection> {
        vec![SessionSection {
            sessions: self.sessions_for(user),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, user: &str, activity: Option<&str>) -> Session {
        Session {
            name: Session::display_name(id),
            id: id.to_string(),
            user: user.to_string(),
            time: "Mon Jan  1 00:00:00 2024".to_string(),
            kind: "Scenario-Based Training".to_string(),
            scenarios: vec!["Incident Response".to_string()],
            levels: vec!["Level 1 (Easy)".to_string()],
            language: "en".to_string(),
            count: "1".to_string(),
            activity_id: activity.map(str::to_string),
        }
    }

    #[test]
    fn remove_simple_is_noop_without_match() {
        let mut set = SessionSet::new(vec![record("1", "alice", Some("10"))]);

        assert!(!set.remove_simple("1", "bob"));
        assert!(!set.remove_simple("2", "alice"));
        assert_eq!(set.len(), 1);

        assert!(set.remove_simple("1", "alice"));
        assert!(set.is_empty());
    }

    #[test]
    fn remove_variant_is_selective() {
        let mut set = SessionSet::new(vec![
            record("5", "u", Some("a")),
            record("5", "u", Some("b")),
            record("5", "u", Some("c")),
        ]);

        assert!(set.remove_variant("5", "u", "b"));

        let left: Vec<_> = set.activity_ids_for("5", "u");
        assert_eq!(left, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn lookups_respect_user_ownership() {
        let set = SessionSet::new(vec![
            record("1", "alice", Some("10")),
            record("2", "bob", None),
            record("x", "bob", None),
        ]);

        assert!(set.has_session("2"));
        assert!(!set.has_session_for("2", "alice"));
        assert_eq!(set.activity_id_for("1", "alice"), Some("10"));
        assert_eq!(set.activity_id_for("2", "bob"), None);
        assert!(set.activity_ids_for("2", "bob").is_empty());
        assert_eq!(set.active_ids_as_integers(), BTreeSet::from([1, 2]));
        assert_eq!(set.document_for("bob")[0].sessions.len(), 2);
    }
}
