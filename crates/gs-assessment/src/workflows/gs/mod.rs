//! Genuine Student (GS) assessment workflow.
//!
//! Five gated stages (Documents, Declarations, Schedule, Interview, Assessment) driven by
//! staff toward a compliance decision. [`StageController`] is the entry point; it composes
//! the document, declaration, interview, and assessment managers and owns stage
//! advancement. All state for an application lives in one [`GsRecord`] written through
//! conditional updates on the [`PersistenceGateway`].

pub mod assessment;
pub mod declarations;
pub mod documents;
pub mod domain;
pub mod error;
pub mod interview;
pub mod repository;
pub mod router;
pub mod stages;
mod store;

#[cfg(test)]
mod tests;

pub use assessment::{
    Answer, ApprovalStatus, AssessmentAnswers, AssessmentDecisionEngine, AssessmentStatus,
    AssessmentView, Decision, Recommendation, RiskLevel, Stage1Answer, Stage2Answer,
    StaffAssessment, STAGE1_QUESTIONS, STAGE2_QUESTIONS,
};
pub use declarations::{
    Declaration, DeclarationActor, DeclarationStatus, DeclarationVerificationManager,
    Declarations, LinkDispatch,
};
pub use documents::{
    DocumentChecklist, DocumentLifecycleManager, DocumentStatus, DocumentView, GsDocument,
    ReviewVerdict, GS_DOCUMENT_COUNT, GS_DOCUMENT_LABELS,
};
pub use domain::{
    ApplicantSnapshot, ApplicationId, Caller, CallerRole, GsRecord, GsStage, StageProgress,
    StageStatus,
};
pub use error::GsError;
pub use interview::{InterviewBooking, InterviewRequest, InterviewScheduler};
pub use repository::{
    ExternalServiceError, MeetingId, MeetingService, NotificationService, PersistenceGateway,
    RepositoryError,
};
pub use router::gs_router;
pub use stages::{StageController, StageOverview, StageStep};
