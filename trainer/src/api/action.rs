use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::msg;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", msg::ACTION_INVALID)]
pub struct ActionError {
    pub requested: String,
}

/// Every operation the front door accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    FetchContent,
    CreateTraining,
    CreateTrainingVariation,
    GetConfigurations,
    GetSessions,
    EndTraining,
    EndTrainingVariation,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::FetchContent,
        Action::CreateTraining,
        Action::CreateTrainingVariation,
        Action::GetConfigurations,
        Action::GetSessions,
        Action::EndTraining,
        Action::EndTrainingVariation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::FetchContent => "fetch_content",
            Action::CreateTraining => "create_training",
            Action::CreateTrainingVariation => "create_training_variation",
            Action::GetConfigurations => "get_configurations",
            Action::GetSessions => "get_sessions",
            Action::EndTraining => "end_training",
            Action::EndTrainingVariation => "end_training_variation",
        }
    }

    /// Whether the action needs a `range_id` parameter.
    pub fn targets_session(&self) -> bool {
        matches!(self, Action::EndTraining | Action::EndTrainingVariation)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ActionError {
                requested: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_parse_back() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn unknown_and_case_variants_are_rejected() {
        for name in ["", "FETCH_CONTENT", "create", "end_training ", "reset"] {
            let err = name.parse::<Action>().unwrap_err();
            assert_eq!(err.to_string(), msg::ACTION_INVALID);
            assert_eq!(err.requested, name);
        }
    }

    #[test]
    fn only_end_actions_target_a_session() {
        let targeted: Vec<_> = Action::ALL
            .into_iter()
            .filter(Action::targets_session)
            .collect();
        assert_eq!(targeted, vec![Action::EndTraining, Action::EndTrainingVariation]);
    }
}
