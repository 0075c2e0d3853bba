use std::collections::HashMap;

use crate::catalog::{Language, TrainingCatalog};
use crate::error::{TrainingError, msg};
use crate::users::User;

/// A validated `create_training` / `create_training_variation` request.
#[derive(Debug, Clone)]
pub struct TrainingRequest {
    pub user: User,
    pub language: Language,
    pub instance_count: u32,
    pub training_type: String,
    pub scenario: String,
    pub level: String,
}

impl TrainingRequest {
    /// Validates the creation fields in a fixed order: `count`, `type`,
    /// `scenario`, `level`. Empty values count as missing.
    pub fn from_params(
        user: User,
        language: Language,
        params: &HashMap<String, String>,
    ) -> Result<Self, TrainingError> {
        let field = |key: &str| params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let count = field("count").ok_or_else(|| TrainingError::validation(msg::INSTANCE_COUNT_MISSING))?;
        let instance_count = count
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| TrainingError::validation(msg::INSTANCE_COUNT_INVALID))?;

        let training_type =
            field("type").ok_or_else(|| TrainingError::validation(msg::TRAINING_TYPE_MISSING))?;
        let scenario =
            field("scenario").ok_or_else(|| TrainingError::validation(msg::SCENARIO_NAME_MISSING))?;
        let level = field("level").ok_or_else(|| TrainingError::validation(msg::LEVEL_NAME_MISSING))?;

        Ok(Self {
            user,
            language,
            instance_count,
            training_type: training_type.to_string(),
            scenario: scenario.to_string(),
            level: level.to_string(),
        })
    }
}

/// Catalog files a creation workflow will use, resolved before any external
/// call is made.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub content_file: String,
    pub range_file: String,
    pub progression: Option<String>,
}

impl Plan {
    pub fn resolve(catalog: &TrainingCatalog, req: &TrainingRequest) -> Result<Self, TrainingError> {
        let content_file = catalog
            .content_file(&req.scenario, &req.level)
            .ok_or_else(|| TrainingError::validation(msg::CONTENT_IDENTIFICATION))?;
        let range_file = catalog
            .range_file(&req.scenario, &req.level)
            .ok_or_else(|| TrainingError::validation(msg::TEMPLATE_IDENTIFICATION))?;

        Ok(Self {
            content_file: content_file.to_string(),
            range_file: range_file.to_string(),
            progression: catalog
                .progression(&req.scenario, &req.level)
                .map(str::to_string),
        })
    }
}
