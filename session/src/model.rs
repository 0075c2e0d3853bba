use serde::{Deserialize, Deserializer, Serialize};

/// One persisted training session.
///
/// Field names and their order are the on-disk contract of the registry
/// file; external tooling reads it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Informational label, `Training Session #<id>`.
    pub name: String,

    /// Range identifier, a small positive integer carried as text.
    #[serde(deserialize_with = "scalar_string")]
    pub id: String,

    /// Owning user id.
    pub user: String,

    /// Creation time, informational.
    pub time: String,

    /// Training type label.
    #[serde(rename = "type")]
    pub kind: String,

    pub scenarios: Vec<String>,
    pub levels: Vec<String>,

    /// Two-letter code of the catalog the session was created from.
    pub language: String,

    /// Number of instances requested, carried as text.
    #[serde(deserialize_with = "scalar_string")]
    pub count: String,

    /// Content-service activity. Variation sessions share `id` + `user`
    /// and differ only here.
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub activity_id: Option<String>,
}

impl Session {
    pub fn display_name(range_id: &str) -> String {
        format!("Training Session #{range_id}")
    }

    pub fn is_for(&self, id: &str, user: &str) -> bool {
        self.id == id && self.user == user
    }

    /// Numeric form of `id`; `None` for records edited by hand into a
    /// non-numeric shape.
    pub fn range_number(&self) -> Option<u32> {
        self.id.trim().parse().ok()
    }
}

/// `{ "sessions": [...] }`, the single section of the registry file and the
/// payload shape of session listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sessions: Vec<Session>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
}

impl From<Scalar> for String {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Text(s) => s,
            Scalar::Int(n) => n.to_string(),
        }
    }
}

// Hand-edited files may carry `id: 3`, `count: 2` or `activity_id: 42`
// unquoted.
fn scalar_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(Scalar::deserialize(de)?.into())
}

fn optional_scalar_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(de)?.map(String::from))
}

fn null_as_empty<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<Session>, D::Error> {
    Ok(Option::<Vec<Session>>::deserialize(de)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_scalars_are_read_as_text() {
        let yaml = "name: Training Session #3\nid: 3\nuser: alice\ntime: now\ntype: Scenario-Based Training\nscenarios: [s]\nlevels: [l]\nlanguage: en\ncount: 2\nactivity_id: null\n";
        let s: Session = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(s.id, "3");
        assert_eq!(s.count, "2");
        assert_eq!(s.activity_id, None);
        assert_eq!(s.range_number(), Some(3));
    }

    #[test]
    fn numeric_activity_id_is_read_as_text() {
        let yaml = "name: Training Session #4\nid: '4'\nuser: alice\ntime: now\ntype: t\nscenarios: [s]\nlevels: [l]\nlanguage: en\ncount: '1'\nactivity_id: 42\n";
        let s: Session = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(s.activity_id.as_deref(), Some("42"));

        let quoted = yaml.replace("activity_id: 42", "activity_id: '42'");
        let s: Session = serde_yaml::from_str(&quoted).unwrap();
        assert_eq!(s.activity_id.as_deref(), Some("42"));

        let absent = yaml.replace("activity_id: 42\n", "");
        let s: Session = serde_yaml::from_str(&absent).unwrap();
        assert_eq!(s.activity_id, None);
    }

    #[test]
    fn empty_section_reads_as_no_sessions() {
        let section: SessionSection = serde_yaml::from_str("sessions:\n").unwrap();
        assert!(section.sessions.is_empty());
    }
}
