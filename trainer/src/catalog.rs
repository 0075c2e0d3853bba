//! Training catalog: which training types exist, and for every
//! `(scenario, level)` pair, which content file, range template and optional
//! progression scenario to use.
//!
//! Loaded fresh for each request and treated as an immutable snapshot for the
//! rest of the workflow.
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    En,
    Ja,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ja => "ja",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Language::En),
            "ja" => Ok(Language::Ja),
            other => Err(anyhow::anyhow!("Invalid Language value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingType {
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawLevel")]
pub struct Level {
    pub name: String,
    pub content_file: Option<String>,
    pub range_file: Option<String>,
    pub progression: Option<String>,
}

#[derive(Deserialize)]
struct RawLevel {
    name: String,
    content: Option<String>,
    range: Option<String>,
    /// Obsolete synonym of `range`.
    specification: Option<String>,
    progression: Option<String>,
}

impl From<RawLevel> for Level {
    fn from(raw: RawLevel) -> Self {
        Self {
            name: raw.name,
            content_file: raw.content,
            range_file: raw.range.or(raw.specification),
            progression: raw.progression,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub levels: Vec<Level>,
}

#[derive(Deserialize)]
struct Section {
    types: Option<Vec<TrainingType>>,
    scenarios: Option<Vec<Scenario>>,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingCatalog {
    pub types: Vec<TrainingType>,
    pub scenarios: Vec<Scenario>,
}

/// Client view of the catalog; levels only expose their names.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SummarySection {
    Types { types: Vec<TrainingType> },
    Scenarios { scenarios: Vec<ScenarioSummary> },
}

#[derive(Debug, Serialize)]
pub struct ScenarioSummary {
    pub name: String,
    pub levels: Vec<LevelSummary>,
}

#[derive(Debug, Serialize)]
pub struct LevelSummary {
    pub name: String,
}

impl TrainingCatalog {
    /// Parses `[{types: [...]}, {scenarios: [...]}]`. The first section
    /// carrying each key wins; sections may come in any order.
    pub fn from_yaml(text: &str) -> Result<Self, CatalogError> {
        let sections: Vec<Section> = serde_yaml::from_str(text)?;

        let mut catalog = TrainingCatalog::default();
        let (mut seen_types, mut seen_scenarios) = (false, false);
        for section in sections {
            if let (false, Some(types)) = (seen_types, section.types) {
                catalog.types = types;
                seen_types = true;
            }
            if let (false, Some(scenarios)) = (seen_scenarios, section.scenarios) {
                catalog.scenarios = scenarios;
                seen_scenarios = true;
            }
        }

        Ok(catalog)
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

    pub fn level(&self, scenario: &str, level: &str) -> Option<&Level> {
        self.scenarios
            .iter()
            .find(|s| s.name == scenario)?
            .levels
            .iter()
            .find(|l| l.name == level)
    }

    pub fn content_file(&self, scenario: &str, level: &str) -> Option<&str> {
        self.level(scenario, level)?.content_file.as_deref()
    }

    pub fn range_file(&self, scenario: &str, level: &str) -> Option<&str> {
        self.level(scenario, level)?.range_file.as_deref()
    }

    pub fn progression(&self, scenario: &str, level: &str) -> Option<&str> {
        self.level(scenario, level)?.progression.as_deref()
    }

    pub fn summary(&self) -> Vec<SummarySection> {
        vec![
            SummarySection::Types {
                types: self.types.clone(),
            },
            SummarySection::Scenarios {
                scenarios: self
                    .scenarios
                    .iter()
                    .map(|s| ScenarioSummary {
                        name: s.name.clone(),
                        levels: s
                            .levels
                            .iter()
                            .map(|l| LevelSummary {
                                name: l.name.clone(),
                            })
                            .collect(),
                    })
                    .collect(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
- types:
  - name: Scenario-Based Training
    category: Attack
- scenarios:
  - name: Incident Response
    levels:
    - name: Level 1 (Easy)
      content: NIST-level1-en.yml
      range: NIST-level1-range.yml
    - name: Level 2 (Medium)
      content: NIST-level2-en.yml
      specification: NIST-level2-range.yml
      progression: Incident Response Level 3
"#;

    #[test]
    fn resolves_files_per_level() {
        let c = TrainingCatalog::from_yaml(CATALOG).unwrap();

        assert_eq!(c.types[0].category, "Attack");
        assert_eq!(
            c.content_file("Incident Response", "Level 1 (Easy)"),
            Some("NIST-level1-en.yml")
        );
        assert_eq!(c.progression("Incident Response", "Level 1 (Easy)"), None);
        assert!(c.level("Incident Response", "Level 9").is_none());
        assert!(c.level("Forensics", "Level 1 (Easy)").is_none());
    }

    #[test]
    fn legacy_specification_key_backs_range() {
        let c = TrainingCatalog::from_yaml(CATALOG).unwrap();

        assert_eq!(
            c.range_file("Incident Response", "Level 2 (Medium)"),
            Some("NIST-level2-range.yml")
        );
        assert_eq!(
            c.progression("Incident Response", "Level 2 (Medium)"),
            Some("Incident Response Level 3")
        );
    }

    #[test]
    fn summary_hides_level_files() {
        let c = TrainingCatalog::from_yaml(CATALOG).unwrap();
        let json = serde_json::to_value(c.summary()).unwrap();

        assert_eq!(json[0]["types"][0]["name"], "Scenario-Based Training");
        let level = &json[1]["scenarios"][0]["levels"][1];
        assert_eq!(level["name"], "Level 2 (Medium)");
        assert!(level.get("content").is_none());
    }

    #[test]
    fn language_parses_only_known_codes() {
        assert_eq!("ja".parse::<Language>().unwrap(), Language::Ja);
        assert!("fr".parse::<Language>().is_err());
        assert!("".parse::<Language>().is_err());
    }
}
