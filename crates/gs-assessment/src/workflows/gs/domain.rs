use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assessment::{Decision, StaffAssessment};
use super::declarations::Declarations;
use super::documents::{DocumentChecklist, GsDocument};
use super::error::GsError;
use super::interview::InterviewBooking;

/// Identifier wrapper for an enrollment application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Applicant details copied onto the staff assessment when the workflow opens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplicantSnapshot {
    pub full_name: String,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub intake: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Staff,
    Admin,
    Student,
    Agent,
}

impl CallerRole {
    pub const fn label(self) -> &'static str {
        match self {
            CallerRole::Staff => "staff",
            CallerRole::Admin => "admin",
            CallerRole::Student => "student",
            CallerRole::Agent => "agent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "staff" => Some(Self::Staff),
            "admin" => Some(Self::Admin),
            "student" => Some(Self::Student),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

/// Authenticated principal on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub role: CallerRole,
}

impl Caller {
    pub fn new(id: impl Into<String>, role: CallerRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn staff(id: impl Into<String>) -> Self {
        Self::new(id, CallerRole::Staff)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, CallerRole::Admin)
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, CallerRole::Staff | CallerRole::Admin)
    }

    pub(crate) fn require_staff(&self, action: &str) -> Result<(), GsError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(self.forbidden(action))
        }
    }

    pub(crate) fn forbidden(&self, action: &str) -> GsError {
        GsError::Forbidden {
            caller: format!("{} ({})", self.id, self.role.label()),
            action: action.to_string(),
        }
    }
}

/// The five gated stages of the GS assessment, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GsStage {
    Documents,
    Declarations,
    Schedule,
    Interview,
    Assessment,
}

impl GsStage {
    pub const ALL: [GsStage; 5] = [
        GsStage::Documents,
        GsStage::Declarations,
        GsStage::Schedule,
        GsStage::Interview,
        GsStage::Assessment,
    ];

    pub const LAST_INDEX: usize = 4;

    pub const fn index(self) -> usize {
        match self {
            GsStage::Documents => 0,
            GsStage::Declarations => 1,
            GsStage::Schedule => 2,
            GsStage::Interview => 3,
            GsStage::Assessment => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub const fn label(self) -> &'static str {
        match self {
            GsStage::Documents => "Documents",
            GsStage::Declarations => "Declarations",
            GsStage::Schedule => "Schedule",
            GsStage::Interview => "Interview",
            GsStage::Assessment => "Assessment",
        }
    }

    /// Schedule and Interview complete on request without checking sub-entity state.
    pub const fn is_soft_gated(self) -> bool {
        matches!(self, GsStage::Schedule | GsStage::Interview)
    }
}

impl fmt::Display for GsStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Locked,
    Pending,
    Current,
    Completed,
}

/// Stage advancement owned by the stage controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub current_stage_index: usize,
    pub completed: BTreeSet<usize>,
    pub updated_at: DateTime<Utc>,
}

impl StageProgress {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            current_stage_index: 0,
            completed: BTreeSet::new(),
            updated_at: now,
        }
    }

    pub fn is_completed(&self, stage: GsStage) -> bool {
        self.completed.contains(&stage.index())
    }

    pub fn status_of(&self, stage: GsStage) -> StageStatus {
        let index = stage.index();
        if self.is_completed(stage) {
            return StageStatus::Completed;
        }

        let reachable = stage
            .previous()
            .map_or(true, |previous| self.is_completed(previous));

        if index == self.current_stage_index && reachable {
            StageStatus::Current
        } else if index <= self.current_stage_index {
            StageStatus::Pending
        } else {
            StageStatus::Locked
        }
    }

    pub(crate) fn advance(&mut self, stage: GsStage, now: DateTime<Utc>) {
        self.completed.insert(stage.index());
        let next = (stage.index() + 1).min(GsStage::LAST_INDEX);
        self.current_stage_index = self.current_stage_index.max(next);
        self.updated_at = now;
    }
}

/// Everything the workflow tracks for one application, persisted as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsRecord {
    pub application_id: ApplicationId,
    pub progress: StageProgress,
    pub documents: DocumentChecklist,
    pub declarations: Declarations,
    pub assessment: StaffAssessment,
    pub interview: Option<InterviewBooking>,
    pub decision: Option<Decision>,
    /// Incremented on every successful write; used for conditional updates.
    pub version: u64,
}

impl GsRecord {
    pub fn open(
        application_id: ApplicationId,
        applicant: ApplicantSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            application_id,
            progress: StageProgress::new(now),
            documents: DocumentChecklist::new(),
            declarations: Declarations::new(),
            assessment: StaffAssessment::new(applicant, now),
            interview: None,
            decision: None,
            version: 0,
        }
    }

    pub fn document(&self, document_number: u8) -> Result<&GsDocument, GsError> {
        self.documents.get(document_number)
    }
}
