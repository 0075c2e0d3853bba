use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::catalog::CatalogError;

/// A registered user and the host their ranges are built on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(deserialize_with = "scalar")]
    pub id: String,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub host_mgmt_addr: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub host_virbr_addr: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar")]
    pub host_account: Option<String>,
}

impl User {
    /// Fills the `{{ var }}` placeholders of a range template.
    ///
    /// Host settings the user does not define leave their placeholder
    /// untouched.
    pub fn render_range(&self, template: &str, range_id: &str, instance_count: u32) -> String {
        let instances = instance_count.to_string();
        let vars = [
            ("host_mgmt_addr", self.host_mgmt_addr.as_deref()),
            ("host_virbr_addr", self.host_virbr_addr.as_deref()),
            ("host_account", self.host_account.as_deref()),
            ("clone_range_id", Some(range_id)),
            ("clone_instance_number", Some(instances.as_str())),
        ];

        vars.iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .fold(template.to_string(), |text, (key, value)| {
                text.replace(&format!("{{{{ {key} }}}}"), value)
            })
    }
}

#[derive(Deserialize)]
struct UsersSection {
    users: Vec<User>,
}

#[derive(Debug, Clone, Default)]
pub struct UserCatalog {
    users: Vec<User>,
}

impl UserCatalog {
    /// Parses `[{users: [...]}]`; the first section must be the user list.
    pub fn from_yaml(text: &str) -> Result<Self, CatalogError> {
        let mut sections: Vec<UsersSection> = serde_yaml::from_str(text)?;
        if sections.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            users: sections.swap_remove(0).users,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_yaml(&text)
    }

    pub fn get(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn scalar<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    let v = serde_yaml::Value::deserialize(de)?;
    scalar_text(&v).ok_or_else(|| serde::de::Error::custom("expected a scalar"))
}

fn optional_scalar<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let v = serde_yaml::Value::deserialize(de)?;
    if v.is_null() {
        return Ok(None);
    }
    scalar_text(&v)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom("expected a scalar"))
}

fn scalar_text(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = r#"
- users:
  - name: Training Admin
    id: trainee01
    password: $2b$12$hash
    host_mgmt_addr: 172.16.1.7
    host_virbr_addr: 10.1.0.1
    host_account: cyuser
  - name: Numeric
    id: 42
"#;

    #[test]
    fn users_are_found_by_id() {
        let users = UserCatalog::from_yaml(USERS).unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users.get("trainee01").unwrap().name, "Training Admin");
        assert!(users.get("42").is_some());
        assert!(users.get("nobody").is_none());
    }

    #[test]
    fn range_template_variables_are_filled() {
        let users = UserCatalog::from_yaml(USERS).unwrap();
        let user = users.get("trainee01").unwrap();

        let template = "host: {{ host_mgmt_addr }}\nbridge: {{ host_virbr_addr }}\n\
                        account: {{ host_account }}\nrange_id: {{ clone_range_id }}\n\
                        number: {{ clone_instance_number }}\nkeep: {{ unknown }}\n";
        let out = user.render_range(template, "7", 3);

        assert_eq!(
            out,
            "host: 172.16.1.7\nbridge: 10.1.0.1\naccount: cyuser\nrange_id: 7\nnumber: 3\nkeep: {{ unknown }}\n"
        );
    }

    #[test]
    fn undefined_host_settings_keep_their_placeholder() {
        let users = UserCatalog::from_yaml(USERS).unwrap();
        let out = users
            .get("42")
            .unwrap()
            .render_range("{{ host_account }}@{{ clone_range_id }}", "2", 1);

        assert_eq!(out, "{{ host_account }}@2");
    }
}
