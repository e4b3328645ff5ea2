//! Staff questionnaire, its draft/submit lifecycle, and the one-shot final decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ApplicantSnapshot, ApplicationId, Caller};
use super::error::GsError;
use super::repository::PersistenceGateway;
use super::store::WorkflowStore;

pub const STAGE1_QUESTION_COUNT: usize = 7;
pub const STAGE2_QUESTION_COUNT: usize = 6;

/// Stage 1: applicant circumstances.
pub const STAGE1_QUESTIONS: [&str; STAGE1_QUESTION_COUNT] = [
    "Applicant's circumstances in home country support a temporary stay",
    "Potential situation in Australia is consistent with study intent",
    "Value of the course to the applicant's future is demonstrated",
    "Immigration history shows no adverse findings",
    "Course is consistent with prior study or employment",
    "Applicant understands course requirements and living costs",
    "Financial capacity covers tuition and living expenses",
];

/// Stage 2: evidence verification, each with a staff approval mark.
pub const STAGE2_QUESTIONS: [&str; STAGE2_QUESTION_COUNT] = [
    "Identity documents verified",
    "Academic records verified",
    "English proficiency verified",
    "Financial evidence verified",
    "Relationship and family ties verified",
    "Interview responses consistent with documents",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Yes,
    No,
    #[default]
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    NotApproved,
    NotApplicable,
    #[default]
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stage1Answer {
    #[serde(default)]
    pub answer: Answer,
    #[serde(default)]
    pub evidence_verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stage2Answer {
    #[serde(default)]
    pub answer: Answer,
    #[serde(default)]
    pub evidence_verified: bool,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approved,
    NotApproved,
    ConditionalApproval,
}

impl Recommendation {
    pub const fn label(self) -> &'static str {
        match self {
            Recommendation::Approved => "approved",
            Recommendation::NotApproved => "not_approved",
            Recommendation::ConditionalApproval => "conditional_approval",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Draft,
    Submitted,
    Completed,
}

impl AssessmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AssessmentStatus::Draft => "draft",
            AssessmentStatus::Submitted => "submitted",
            AssessmentStatus::Completed => "completed",
        }
    }
}

/// Answers a staff member saves or submits. Every row is independently optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssessmentAnswers {
    #[serde(default)]
    pub stage1_answers: [Stage1Answer; STAGE1_QUESTION_COUNT],
    #[serde(default)]
    pub stage2_answers: [Stage2Answer; STAGE2_QUESTION_COUNT],
    #[serde(default)]
    pub recommendation: Option<Recommendation>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub conditions: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AssessmentAnswers {
    pub fn stage1_answered(&self) -> usize {
        self.stage1_answers
            .iter()
            .filter(|row| row.answer != Answer::Unset)
            .count()
    }

    pub fn stage2_answered(&self) -> usize {
        self.stage2_answers
            .iter()
            .filter(|row| row.answer != Answer::Unset)
            .count()
    }

    pub fn is_fully_answered(&self) -> bool {
        self.stage1_answered() == STAGE1_QUESTION_COUNT
            && self.stage2_answered() == STAGE2_QUESTION_COUNT
    }

    fn validate_for_submission(&self) -> Result<Recommendation, GsError> {
        let recommendation = self.recommendation.ok_or_else(|| {
            GsError::Validation("a recommendation is required to submit".to_string())
        })?;

        if recommendation == Recommendation::ConditionalApproval
            && self
                .conditions
                .as_deref()
                .map_or(true, |conditions| conditions.trim().is_empty())
        {
            return Err(GsError::Validation(
                "conditional approval requires the conditions to be stated".to_string(),
            ));
        }

        Ok(recommendation)
    }
}

/// The single staff assessment attached to an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffAssessment {
    pub applicant: ApplicantSnapshot,
    #[serde(flatten)]
    pub answers: AssessmentAnswers,
    pub status: AssessmentStatus,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl StaffAssessment {
    pub fn new(applicant: ApplicantSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            applicant,
            answers: AssessmentAnswers::default(),
            status: AssessmentStatus::Draft,
            updated_at: now,
            submitted_at: None,
        }
    }

    fn ensure_editable(&self) -> Result<(), GsError> {
        match self.status {
            AssessmentStatus::Draft => Ok(()),
            other => Err(GsError::InvalidTransition(format!(
                "assessment is {} and can no longer be edited",
                other.label()
            ))),
        }
    }

    pub fn save_draft(&mut self, answers: AssessmentAnswers, now: DateTime<Utc>) -> Result<(), GsError> {
        self.ensure_editable()?;
        self.answers = answers;
        self.updated_at = now;
        Ok(())
    }

    pub fn submit(&mut self, answers: AssessmentAnswers, now: DateTime<Utc>) -> Result<(), GsError> {
        self.ensure_editable()?;
        answers.validate_for_submission()?;
        self.answers = answers;
        self.status = AssessmentStatus::Submitted;
        self.updated_at = now;
        self.submitted_at = Some(now);
        Ok(())
    }
}

/// Immutable compliance outcome, created at most once per application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub final_decision: Recommendation,
    pub rationale: String,
    pub decided_at: DateTime<Utc>,
    pub decided_by: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentView {
    pub assessment: StaffAssessment,
    pub decision: Option<Decision>,
}

/// Owns the staff assessment state machine: Draft -> Submitted -> Completed.
pub struct AssessmentDecisionEngine<P> {
    store: WorkflowStore<P>,
}

impl<P> AssessmentDecisionEngine<P>
where
    P: PersistenceGateway + 'static,
{
    pub(crate) fn new(store: WorkflowStore<P>) -> Self {
        Self { store }
    }

    pub fn get(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
    ) -> Result<AssessmentView, GsError> {
        caller.require_staff("read staff assessments")?;
        let record = self.store.load(application_id)?;
        Ok(AssessmentView {
            assessment: record.assessment,
            decision: record.decision,
        })
    }

    pub fn decision(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
    ) -> Result<Option<Decision>, GsError> {
        caller.require_staff("read GS decisions")?;
        Ok(self.store.load(application_id)?.decision)
    }

    pub fn save_draft(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        answers: AssessmentAnswers,
    ) -> Result<StaffAssessment, GsError> {
        caller.require_staff("edit staff assessments")?;
        let assessment = self.store.mutate(application_id, |record| {
            record.assessment.save_draft(answers.clone(), Utc::now())?;
            Ok(record.assessment.clone())
        })?;

        info!(
            %application_id,
            stage1_answered = assessment.answers.stage1_answered(),
            stage2_answered = assessment.answers.stage2_answered(),
            "gs assessment draft saved"
        );
        Ok(assessment)
    }

    pub fn submit(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        answers: AssessmentAnswers,
    ) -> Result<StaffAssessment, GsError> {
        caller.require_staff("submit staff assessments")?;
        let assessment = self.store.mutate(application_id, |record| {
            record.assessment.submit(answers.clone(), Utc::now())?;
            Ok(record.assessment.clone())
        })?;

        info!(
            %application_id,
            recommendation = assessment.answers.recommendation.map(Recommendation::label),
            fully_answered = assessment.answers.is_fully_answered(),
            assessor = %caller.id,
            "gs assessment submitted"
        );
        Ok(assessment)
    }

    /// Record the final decision. Exactly one decision can ever exist; later attempts get
    /// `AlreadyFinalized` carrying the stored decision, which is left untouched.
    pub fn finalize_decision(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        final_decision: Recommendation,
        rationale: &str,
    ) -> Result<Decision, GsError> {
        caller.require_staff("finalize GS decisions")?;
        let rationale = rationale.trim();
        if rationale.is_empty() {
            return Err(GsError::Validation("a decision rationale is required".to_string()));
        }

        let decision = self.store.mutate(application_id, |record| {
            if let Some(existing) = &record.decision {
                return Err(GsError::AlreadyFinalized(Box::new(existing.clone())));
            }

            match record.assessment.status {
                AssessmentStatus::Submitted => {}
                AssessmentStatus::Draft => {
                    return Err(GsError::InvalidTransition(
                        "assessment must be submitted before a decision is recorded".to_string(),
                    ))
                }
                AssessmentStatus::Completed => {
                    return Err(GsError::InvalidTransition(
                        "assessment is completed but has no decision on record".to_string(),
                    ))
                }
            }

            let now = Utc::now();
            let decision = Decision {
                final_decision,
                rationale: rationale.to_string(),
                decided_at: now,
                decided_by: caller.id.clone(),
            };
            record.decision = Some(decision.clone());
            record.assessment.status = AssessmentStatus::Completed;
            record.assessment.updated_at = now;
            Ok(decision)
        })?;

        info!(
            %application_id,
            final_decision = decision.final_decision.label(),
            decided_by = %decision.decided_by,
            "gs decision finalized"
        );
        Ok(decision)
    }
}
