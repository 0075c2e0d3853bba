//! Request dispatch.
//!
//! Turns one flat parameter set into one envelope. Validation runs in a
//! fixed order (user database, user, action, language, catalog) before any
//! workflow starts.
pub mod action;
pub mod envelope;
pub mod server;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{Instrument, debug, info, warn};

use crate::catalog::Language;
use crate::database::TrainingDatabase;
use crate::error::{TrainingError, msg};
use crate::logger::{TraceId, annotate_span, request_span};
use crate::orchestrator::{LifecycleOrchestrator, TrainingRequest};
use action::Action;

pub struct Dispatcher {
    db: TrainingDatabase,
    orchestrator: Arc<LifecycleOrchestrator>,
    log_params: bool,
}

impl Dispatcher {
    pub fn new(db: TrainingDatabase, orchestrator: Arc<LifecycleOrchestrator>, log_params: bool) -> Self {
        Self {
            db,
            orchestrator,
            log_params,
        }
    }

    /// Handles one request. Never fails; errors become an error envelope.
    pub async fn handle(&self, params: HashMap<String, String>) -> Value {
        let trace_id = TraceId::default();
        let span = request_span(param(&params, "action").unwrap_or("-"), &trace_id);

        async {
            if self.log_params {
                debug!(?params, "request parameters");
            }

            match self.dispatch(&params).await {
                Ok(payload) => envelope::success(payload),
                Err(err) => {
                    warn!(kind = ?err.kind(), error = ?err, "request failed");
                    envelope::error(err.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, params: &HashMap<String, String>) -> Result<Option<Value>, TrainingError> {
        let users = self.db.users().await?;
        let user = param(params, "user")
            .and_then(|id| users.get(id))
            .cloned()
            .ok_or_else(|| TrainingError::validation(msg::USER_ID_INVALID))?;
        annotate_span(&user.id, None);

        let action = param(params, "action")
            .unwrap_or_default()
            .parse::<Action>()
            .map_err(|e| {
                warn!(requested = %e.requested, "unknown action");
                TrainingError::validation(e.to_string())
            })?;

        let language = param(params, "lang")
            .and_then(|lang| lang.parse::<Language>().ok())
            .ok_or_else(|| TrainingError::validation(msg::LANGUAGE_INVALID))?;
        let catalog = self.db.catalog(language).await?;

        let target = action
            .targets_session()
            .then(|| {
                param(params, "range_id")
                    .ok_or_else(|| TrainingError::validation(msg::SESSION_ID_MISSING))
            })
            .transpose()?;
        if let Some(range_id) = target {
            annotate_span(&user.id, Some(range_id));
        }

        info!(%action, %language, "dispatching");
        let orchestrator = &self.orchestrator;

        match action {
            Action::FetchContent => Ok(Some(to_value(catalog.summary())?)),
            Action::CreateTraining | Action::CreateTrainingVariation => {
                let req = TrainingRequest::from_params(user, language, params)?;
                let created = if action == Action::CreateTraining {
                    orchestrator.create_training(&req, &catalog).await?
                } else {
                    orchestrator.create_training_variation(&req, &catalog).await?
                };
                Ok((!created.message.is_empty()).then(|| json!({ "message": created.message })))
            }
            Action::GetSessions => Ok(Some(to_value(orchestrator.get_sessions(&user.id).await?)?)),
            Action::GetConfigurations => Ok(Some(to_value(
                orchestrator.get_configurations(&user.id).await?,
            )?)),
            Action::EndTraining | Action::EndTrainingVariation => {
                let Some(range_id) = target else {
                    return Err(TrainingError::validation(msg::SESSION_ID_MISSING));
                };

                if action == Action::EndTraining {
                    orchestrator.end_training(range_id, &user.id).await?;
                } else {
                    orchestrator.end_training_variation(range_id, &user.id).await?;
                }
                Ok(None)
            }
        }
    }
}

/// Trimmed parameter; empty counts as absent.
fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn to_value<T: serde::Serialize>(payload: T) -> Result<Value, TrainingError> {
    serde_json::to_value(payload).map_err(|e| TrainingError::Registry(e.into()))
}
