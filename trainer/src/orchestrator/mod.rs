//! Session lifecycle orchestration.
//!
//! Drives the create / vary / end workflows across the session registry and
//! the two external services.
//!
//! Design principles:
//! - **Fixed order**: every workflow runs its steps in one documented order;
//!   nothing is retried.
//! - **Commit last**: a registry record is written only after the external
//!   steps it describes succeeded.
//! - **Short critical sections**: registry and pending-set locks are never
//!   held across a service call.
//! - **Reservation by guard**: the pending id is released when the workflow's
//!   `Reservation` drops, on every exit path, after the commit.
//!
//! This module NEVER:
//! - retracts content or destroys a range to undo a failed creation; such
//!   leftovers are logged with the ids an operator needs
//! - removes a registry record whose range could not be destroyed
mod request;

pub use request::TrainingRequest;

use std::sync::Arc;
use std::time::Duration;

use session::allocator::{PendingIds, Reservation};
use session::model::{Session, SessionSection};
use session::registry::SessionRegistry;
use tracing::{debug, error, field, info, instrument, warn};

use crate::catalog::TrainingCatalog;
use crate::content_patch;
use crate::creation_log;
use crate::database::TrainingDatabase;
use crate::error::{Stage, TrainingError, msg};
use crate::logger::{annotate_span, warn_if_slow};
use crate::services::{ContentService, InstantiationService};
use request::Plan;

const CONTENT_CALL_BUDGET: Duration = Duration::from_secs(30);
const RANGE_CALL_BUDGET: Duration = Duration::from_secs(300);

/// Slow-call threshold, by the service a stage talks to.
fn call_budget(stage: Stage) -> Duration {
    match stage {
        Stage::ContentUpload | Stage::ContentRemoval => CONTENT_CALL_BUDGET,
        Stage::Instantiation | Stage::Destruction | Stage::CreationLog => RANGE_CALL_BUDGET,
    }
}

/// Creation progress. Failure is possible from every state but `Committed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationState {
    Validated,
    IdAllocated,
    ContentPublished,
    RangeInstantiated,
    Committed,
}

/// Outcome of a successful creation workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTraining {
    pub range_id: String,
    /// One per committed record; several for a variation session.
    pub activity_ids: Vec<String>,
    /// Notification text from the instantiation service.
    pub message: String,
}

/// Tracks one creation workflow so a failure can report what it leaves
/// behind.
struct Progress {
    workflow: &'static str,
    range_id: String,
    state: CreationState,
    instantiated: bool,
    published: Vec<String>,
}

impl Progress {
    fn new(workflow: &'static str, reservation: &Reservation) -> Self {
        let mut progress = Self {
            workflow,
            range_id: reservation.range_id(),
            state: CreationState::Validated,
            instantiated: false,
            published: Vec::new(),
        };
        progress.advance(CreationState::IdAllocated);
        progress
    }

    fn advance(&mut self, next: CreationState) {
        debug!(
            workflow = self.workflow,
            range_id = %self.range_id,
            from = ?self.state,
            to = ?next,
            "workflow advanced"
        );
        if next == CreationState::RangeInstantiated {
            self.instantiated = true;
        }
        self.state = next;
    }

    /// Records a publish. Once the range is instantiated the state stays
    /// put; variation instances publish after instantiation.
    fn published(&mut self, activity_id: &str) {
        self.published.push(activity_id.to_string());
        if self.instantiated {
            debug!(
                workflow = self.workflow,
                range_id = %self.range_id,
                %activity_id,
                "instance content published"
            );
        } else {
            self.advance(CreationState::ContentPublished);
        }
    }

    /// Logs the failure and any external state it strands.
    fn fail(&self, err: TrainingError) -> TrainingError {
        if !self.published.is_empty() {
            warn!(
                workflow = self.workflow,
                range_id = %self.range_id,
                activity_ids = ?self.published,
                "content published before the failure is not retracted"
            );
        }
        if self.instantiated {
            warn!(
                workflow = self.workflow,
                range_id = %self.range_id,
                "range instantiated before the failure is not destroyed"
            );
        }

        error!(
            workflow = self.workflow,
            range_id = %self.range_id,
            state = ?self.state,
            kind = ?err.kind(),
            error = ?err,
            "workflow failed"
        );
        err
    }
}

const SIMPLE: &str = "create_training";
const VARIATION: &str = "create_training_variation";

pub struct LifecycleOrchestrator {
    db: TrainingDatabase,
    active: Arc<SessionRegistry>,
    saved: Arc<SessionRegistry>,
    pending: PendingIds,
    content: Arc<dyn ContentService>,
    instantiation: Arc<dyn InstantiationService>,
    max_sessions: u32,
}

impl LifecycleOrchestrator {
    pub fn new(
        db: TrainingDatabase,
        active: Arc<SessionRegistry>,
        saved: Arc<SessionRegistry>,
        content: Arc<dyn ContentService>,
        instantiation: Arc<dyn InstantiationService>,
        max_sessions: u32,
    ) -> Self {
        Self {
            db,
            active,
            saved,
            pending: PendingIds::new(),
            content,
            instantiation,
            max_sessions,
        }
    }

    pub fn pending(&self) -> &PendingIds {
        &self.pending
    }

    /// Publish content, instantiate the range, commit one record.
    #[instrument(
        skip(self, req, catalog),
        target = "orchestrator",
        fields(user = %req.user.id, scenario = %req.scenario, level = %req.level, range_id = field::Empty)
    )]
    pub async fn create_training(
        &self,
        req: &TrainingRequest,
        catalog: &TrainingCatalog,
    ) -> Result<CreatedTraining, TrainingError> {
        let plan = Plan::resolve(catalog, req)?;
        let reservation = self.reserve().await?;
        let range_id = reservation.range_id();
        annotate_span(&req.user.id, Some(range_id.as_str()));

        let mut progress = Progress::new(SIMPLE, &reservation);
        let (content, range_doc) = self
            .load_documents(req, &plan, &range_id)
            .await
            .map_err(|e| progress.fail(e))?;

        let activity_id = self
            .upload(&req.user.id, &content, &range_id)
            .await
            .map_err(|e| progress.fail(e))?;
        progress.published(&activity_id);

        let message = self
            .instantiate(&req.user.id, &range_doc, &range_id, plan.progression.as_deref())
            .await
            .map_err(|e| progress.fail(e))?;
        progress.advance(CreationState::RangeInstantiated);

        self.active
            .add(session_record(req, &range_id, Some(activity_id.clone())))
            .await
            .map_err(|e| progress.fail(e.into()))?;
        progress.advance(CreationState::Committed);
        drop(reservation);

        info!(%range_id, %activity_id, "training session created");
        Ok(CreatedTraining {
            range_id,
            activity_ids: vec![activity_id],
            message,
        })
    }

    /// Instantiate once, then publish per-instance content patched with the
    /// answers found in the creation log; one record per instance.
    #[instrument(
        skip(self, req, catalog),
        target = "orchestrator",
        fields(
            user = %req.user.id,
            scenario = %req.scenario,
            level = %req.level,
            count = req.instance_count,
            range_id = field::Empty
        )
    )]
    pub async fn create_training_variation(
        &self,
        req: &TrainingRequest,
        catalog: &TrainingCatalog,
    ) -> Result<CreatedTraining, TrainingError> {
        let plan = Plan::resolve(catalog, req)?;
        let reservation = self.reserve().await?;
        let range_id = reservation.range_id();
        annotate_span(&req.user.id, Some(range_id.as_str()));

        let mut progress = Progress::new(VARIATION, &reservation);
        let (template, range_doc) = self
            .load_documents(req, &plan, &range_id)
            .await
            .map_err(|e| progress.fail(e))?;

        let message = self
            .instantiate(&req.user.id, &range_doc, &range_id, plan.progression.as_deref())
            .await
            .map_err(|e| progress.fail(e))?;
        progress.advance(CreationState::RangeInstantiated);

        let log = warn_if_slow(
            "creation_log",
            call_budget(Stage::CreationLog),
            self.instantiation.creation_log(&req.user.id, &range_id),
        )
        .await
        .map_err(|e| progress.fail(TrainingError::upstream(Stage::CreationLog, e)))?;

        let answers = creation_log::extract_meta_answers(&log);
        if answers.is_empty() {
            return Err(progress.fail(TrainingError::Parse(msg::META_ANSWERS_MISSING)));
        }

        for instance in 1..=req.instance_count {
            let patched = content_patch::patch(&template, &answers.for_instance(instance))
                .map_err(|e| {
                    warn!(instance, error = %e, "content template could not be patched");
                    progress.fail(TrainingError::Parse(msg::CONTENT_TEMPLATE))
                })?;

            let activity_id = self
                .upload(&req.user.id, &patched, &range_id)
                .await
                .map_err(|e| progress.fail(e))?;
            progress.published(&activity_id);

            self.active
                .add(session_record(req, &range_id, Some(activity_id.clone())))
                .await
                .map_err(|e| progress.fail(e.into()))?;
            debug!(instance, %activity_id, "variation instance committed");
        }
        progress.advance(CreationState::Committed);
        drop(reservation);

        info!(%range_id, instances = req.instance_count, "training variation created");
        Ok(CreatedTraining {
            range_id,
            activity_ids: progress.published,
            message,
        })
    }

    /// Remove content, destroy the range, then drop the record.
    #[instrument(skip(self), target = "orchestrator")]
    pub async fn end_training(&self, range_id: &str, user: &str) -> Result<(), TrainingError> {
        let activity_id = self
            .active
            .activity_id_for(range_id, user)
            .await?
            .ok_or_else(|| not_found(range_id, user))?;

        self.remove_content(user, range_id, &activity_id).await?;
        self.destroy(user, range_id).await?;

        if !self.active.remove_simple(range_id, user).await? {
            error!("record vanished while its range was being destroyed");
            return Err(TrainingError::Consistency);
        }

        info!(%activity_id, "training session ended");
        Ok(())
    }

    /// Remove every instance's content, destroy the shared range once, then
    /// drop all records together.
    #[instrument(skip(self), target = "orchestrator")]
    pub async fn end_training_variation(
        &self,
        range_id: &str,
        user: &str,
    ) -> Result<(), TrainingError> {
        let activity_ids = self.active.activity_ids_for(range_id, user).await?;
        if activity_ids.is_empty() {
            return Err(not_found(range_id, user));
        }

        for activity_id in &activity_ids {
            self.remove_content(user, range_id, activity_id).await?;
        }
        self.destroy(user, range_id).await?;

        if !self
            .active
            .remove_variants(range_id, user, &activity_ids)
            .await?
        {
            error!(?activity_ids, "variation records changed while the range was being destroyed");
            return Err(TrainingError::Consistency);
        }

        info!(instances = activity_ids.len(), "training variation ended");
        Ok(())
    }

    pub async fn get_sessions(&self, user: &str) -> Result<Vec<SessionSection>, TrainingError> {
        Ok(self.active.document_for(user).await?)
    }

    pub async fn get_configurations(
        &self,
        user: &str,
    ) -> Result<Vec<SessionSection>, TrainingError> {
        Ok(self.saved.document_for(user).await?)
    }

    async fn reserve(&self) -> Result<Reservation, TrainingError> {
        self.active
            .reserve_id(&self.pending, self.max_sessions)
            .await?
            .ok_or(TrainingError::AllocationExhausted)
    }

    async fn load_documents(
        &self,
        req: &TrainingRequest,
        plan: &Plan,
        range_id: &str,
    ) -> Result<(String, String), TrainingError> {
        let content = self.db.read(&plan.content_file, msg::CONTENT_LOADING).await?;
        let range_template = self.db.read(&plan.range_file, msg::TEMPLATE_LOADING).await?;
        let range_doc = req
            .user
            .render_range(&range_template, range_id, req.instance_count);
        Ok((content, range_doc))
    }

    async fn upload(&self, user: &str, content: &str, range_id: &str) -> Result<String, TrainingError> {
        warn_if_slow(
            "content_upload",
            call_budget(Stage::ContentUpload),
            self.content.upload(user, content, range_id),
        )
        .await
        .map_err(|e| TrainingError::upstream(Stage::ContentUpload, e))
    }

    async fn instantiate(
        &self,
        user: &str,
        range_doc: &str,
        range_id: &str,
        progression: Option<&str>,
    ) -> Result<String, TrainingError> {
        warn_if_slow(
            "range_instantiation",
            call_budget(Stage::Instantiation),
            self.instantiation
                .instantiate(user, range_doc, range_id, progression),
        )
        .await
        .map_err(|e| TrainingError::upstream(Stage::Instantiation, e))
    }

    async fn remove_content(
        &self,
        user: &str,
        range_id: &str,
        activity_id: &str,
    ) -> Result<(), TrainingError> {
        warn_if_slow(
            "content_removal",
            call_budget(Stage::ContentRemoval),
            self.content.remove(user, range_id, activity_id),
        )
        .await
        .map_err(|e| {
            let err = TrainingError::upstream(Stage::ContentRemoval, e);
            error!(%activity_id, error = ?err, "content removal failed");
            err
        })
    }

    async fn destroy(&self, user: &str, range_id: &str) -> Result<(), TrainingError> {
        warn_if_slow(
            "range_destruction",
            call_budget(Stage::Destruction),
            self.instantiation.destroy(user, range_id),
        )
        .await
        .map_err(|e| {
            let err = TrainingError::upstream(Stage::Destruction, e);
            error!(error = ?err, "range destruction failed; record kept for retry");
            err
        })
    }
}

fn not_found(range_id: &str, user: &str) -> TrainingError {
    warn!("no session record for this range and user");
    TrainingError::SessionNotFound {
        id: range_id.to_string(),
        user: user.to_string(),
    }
}

fn session_record(req: &TrainingRequest, range_id: &str, activity_id: Option<String>) -> Session {
    Session {
        name: Session::display_name(range_id),
        id: range_id.to_string(),
        user: req.user.id.clone(),
        time: chrono::Local::now().format("%a %b %e %H:%M:%S %Y").to_string(),
        kind: req.training_type.clone(),
        scenarios: vec![req.scenario.clone()],
        levels: vec![req.level.clone()],
        language: req.language.as_str().to_string(),
        count: req.instance_count.to_string(),
        activity_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(workflow: &'static str) -> (PendingIds, Progress) {
        let pending = PendingIds::new();
        let reservation = pending.reserve(&Default::default(), 10).unwrap();
        let progress = Progress::new(workflow, &reservation);
        (pending, progress)
    }

    #[test]
    fn simple_workflow_moves_forward() {
        let (_pending, mut p) = progress(SIMPLE);
        assert_eq!(p.state, CreationState::IdAllocated);

        p.published("act-1");
        assert_eq!(p.state, CreationState::ContentPublished);
        p.advance(CreationState::RangeInstantiated);
        assert!(p.instantiated);
    }

    #[test]
    fn publishing_after_instantiation_keeps_state() {
        let (_pending, mut p) = progress(VARIATION);
        p.advance(CreationState::RangeInstantiated);

        p.published("act-1");
        p.published("act-2");

        assert_eq!(p.state, CreationState::RangeInstantiated);
        assert_eq!(p.published, vec!["act-1".to_string(), "act-2".to_string()]);
    }

    #[test]
    fn creation_log_is_timed_as_a_range_call() {
        assert_eq!(call_budget(Stage::CreationLog), RANGE_CALL_BUDGET);
        assert_eq!(call_budget(Stage::Instantiation), RANGE_CALL_BUDGET);
        assert_eq!(call_budget(Stage::Destruction), RANGE_CALL_BUDGET);
        assert_eq!(call_budget(Stage::ContentUpload), CONTENT_CALL_BUDGET);
        assert_eq!(call_budget(Stage::ContentRemoval), CONTENT_CALL_BUDGET);
    }
}
