use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::assessment::AssessmentDecisionEngine;
use super::declarations::DeclarationVerificationManager;
use super::documents::{DocumentLifecycleManager, GS_DOCUMENT_COUNT};
use super::domain::{
    ApplicantSnapshot, ApplicationId, Caller, GsRecord, GsStage, StageProgress, StageStatus,
};
use super::error::GsError;
use super::interview::InterviewScheduler;
use super::repository::{MeetingService, NotificationService, PersistenceGateway};
use super::store::WorkflowStore;
use crate::config::WorkflowConfig;

#[derive(Debug, Clone, Serialize)]
pub struct StageStep {
    pub index: usize,
    pub stage: GsStage,
    pub label: &'static str,
    pub status: StageStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOverview {
    pub current_stage: usize,
    pub steps_progress: Vec<StageStep>,
}

impl From<&StageProgress> for StageOverview {
    fn from(progress: &StageProgress) -> Self {
        let steps_progress = GsStage::ALL
            .iter()
            .map(|stage| StageStep {
                index: stage.index(),
                stage: *stage,
                label: stage.label(),
                status: progress.status_of(*stage),
            })
            .collect();

        Self {
            current_stage: progress.current_stage_index,
            steps_progress,
        }
    }
}

enum Gate {
    Satisfied,
    Soft,
    Blocked(String),
}

/// Evaluate a stage's own precondition against a freshly loaded record.
fn gate_for(record: &GsRecord, stage: GsStage) -> Gate {
    match stage {
        GsStage::Documents => {
            let approved = record.documents.approved_count();
            if approved == GS_DOCUMENT_COUNT {
                Gate::Satisfied
            } else {
                Gate::Blocked(format!(
                    "{approved} of {GS_DOCUMENT_COUNT} documents approved"
                ))
            }
        }
        GsStage::Declarations => {
            if record.declarations.both_approved() {
                Gate::Satisfied
            } else {
                Gate::Blocked(format!(
                    "student declaration {:?}, agent declaration {:?}",
                    record.declarations.student.status, record.declarations.agent.status
                ))
            }
        }
        GsStage::Schedule | GsStage::Interview => Gate::Soft,
        GsStage::Assessment => {
            if record.decision.is_some() {
                Gate::Satisfied
            } else {
                Gate::Blocked(format!(
                    "assessment is {} without a final decision",
                    record.assessment.status.label()
                ))
            }
        }
    }
}

/// Entry point for callers: composes the sub-managers and owns stage advancement.
pub struct StageController<P, N, M> {
    store: WorkflowStore<P>,
    documents: DocumentLifecycleManager<P>,
    declarations: DeclarationVerificationManager<P, N>,
    interviews: InterviewScheduler<P, M>,
    assessments: AssessmentDecisionEngine<P>,
}

impl<P, N, M> StageController<P, N, M>
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    pub fn new(
        gateway: Arc<P>,
        notifications: Arc<N>,
        meetings: Arc<M>,
        config: WorkflowConfig,
    ) -> Self {
        let store = WorkflowStore::new(gateway, config.write_attempts);
        Self {
            documents: DocumentLifecycleManager::new(store.clone(), config.demo_mode),
            declarations: DeclarationVerificationManager::new(
                store.clone(),
                notifications,
                config.external_timeout,
            ),
            interviews: InterviewScheduler::new(store.clone(), meetings, config.external_timeout),
            assessments: AssessmentDecisionEngine::new(store.clone()),
            store,
        }
    }

    pub fn documents(&self) -> &DocumentLifecycleManager<P> {
        &self.documents
    }

    pub fn declarations(&self) -> &DeclarationVerificationManager<P, N> {
        &self.declarations
    }

    pub fn interviews(&self) -> &InterviewScheduler<P, M> {
        &self.interviews
    }

    pub fn assessments(&self) -> &AssessmentDecisionEngine<P> {
        &self.assessments
    }

    /// Start the GS workflow for an application.
    pub fn open(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        applicant: ApplicantSnapshot,
    ) -> Result<GsRecord, GsError> {
        caller.require_staff("open GS assessments")?;
        if applicant.full_name.trim().is_empty() {
            return Err(GsError::Validation("applicant name is required".to_string()));
        }

        let record = self.store.insert(GsRecord::open(
            application_id.clone(),
            applicant,
            Utc::now(),
        ))?;
        info!(%application_id, opened_by = %caller.id, "gs assessment opened");
        Ok(record)
    }

    pub fn overview(
        &self,
        _caller: &Caller,
        application_id: &ApplicationId,
    ) -> Result<StageOverview, GsError> {
        let record = self.store.load(application_id)?;
        Ok(StageOverview::from(&record.progress))
    }

    pub fn stage_status(
        &self,
        _caller: &Caller,
        application_id: &ApplicationId,
        stage: GsStage,
    ) -> Result<StageStatus, GsError> {
        Ok(self.store.load(application_id)?.progress.status_of(stage))
    }

    /// Mark a stage complete after re-checking its gate against the stored state.
    ///
    /// Idempotent: completing an already-completed stage returns the progress unchanged.
    pub fn complete_stage(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        stage_index: usize,
    ) -> Result<StageProgress, GsError> {
        caller.require_staff("advance GS stages")?;
        let stage = GsStage::from_index(stage_index).ok_or_else(|| {
            GsError::Validation(format!(
                "stage index {stage_index} is out of range (0..={})",
                GsStage::LAST_INDEX
            ))
        })?;

        let (progress, advanced) = self.store.mutate(application_id, |record| {
            if record.progress.is_completed(stage) {
                return Ok((record.progress.clone(), false));
            }

            if let Some(previous) = stage.previous() {
                if !record.progress.is_completed(previous) {
                    return Err(GsError::OutOfOrder {
                        stage,
                        reason: format!("{previous} stage is not completed"),
                    });
                }
            }

            if let Gate::Blocked(reason) = gate_for(record, stage) {
                return Err(GsError::OutOfOrder { stage, reason });
            }

            record.progress.advance(stage, Utc::now());
            Ok((record.progress.clone(), true))
        })?;

        if advanced {
            if stage.is_soft_gated() {
                // Soft gate: completes on request. Logged so skips stay auditable.
                info!(
                    %application_id,
                    stage = stage.label(),
                    completed_by = %caller.id,
                    soft_gate = true,
                    "gs stage completed without precondition"
                );
            } else {
                info!(
                    %application_id,
                    stage = stage.label(),
                    completed_by = %caller.id,
                    current_stage = progress.current_stage_index,
                    "gs stage completed"
                );
            }
        }

        Ok(progress)
    }
}
