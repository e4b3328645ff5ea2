use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use serde_json::{json, Value};

use crate::config::WorkflowConfig;
use crate::workflows::gs::{
    ApplicantSnapshot, ApplicationId, AssessmentAnswers, Caller, CallerRole, DeclarationActor,
    ExternalServiceError, GsRecord, InterviewRequest, MeetingId, MeetingService,
    NotificationService, PersistenceGateway, Recommendation, RepositoryError, ReviewVerdict,
    StageController, GS_DOCUMENT_COUNT,
};

pub(super) type TestController = StageController<MemoryGateway, RecordingNotifier, StubMeetings>;

#[derive(Default, Clone)]
pub(super) struct MemoryGateway {
    pub(super) records: Arc<Mutex<HashMap<ApplicationId, GsRecord>>>,
    pub(super) writes: Arc<AtomicUsize>,
}

impl MemoryGateway {
    pub(super) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(super) fn stored(&self, id: &ApplicationId) -> GsRecord {
        self.records
            .lock()
            .expect("gateway mutex poisoned")
            .get(id)
            .cloned()
            .expect("record stored")
    }
}

impl PersistenceGateway for MemoryGateway {
    fn insert(&self, record: GsRecord) -> Result<GsRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("gateway mutex poisoned");
        if guard.contains_key(&record.application_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.application_id.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<GsRecord>, RepositoryError> {
        let guard = self.records.lock().expect("gateway mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn compare_and_swap(
        &self,
        record: GsRecord,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("gateway mutex poisoned");
        match guard.get(&record.application_id) {
            None => Err(RepositoryError::NotFound),
            Some(stored) if stored.version != expected_version => {
                Err(RepositoryError::VersionConflict)
            }
            Some(_) => {
                guard.insert(record.application_id.clone(), record);
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

/// Reports a version conflict for the first `conflicts` writes, then delegates.
pub(super) struct ContendedGateway {
    pub(super) inner: MemoryGateway,
    pub(super) conflicts: AtomicU32,
}

impl PersistenceGateway for ContendedGateway {
    fn insert(&self, record: GsRecord) -> Result<GsRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<GsRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn compare_and_swap(
        &self,
        record: GsRecord,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::VersionConflict);
        }
        self.inner.compare_and_swap(record, expected_version)
    }
}

pub(super) struct UnavailableGateway;

impl PersistenceGateway for UnavailableGateway {
    fn insert(&self, _record: GsRecord) -> Result<GsRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<GsRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn compare_and_swap(
        &self,
        _record: GsRecord,
        _expected_version: u64,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) enum ProviderMode {
    #[default]
    Healthy,
    Failing,
    Hanging,
}

async fn provider_call(mode: ProviderMode, service: &'static str) -> Result<(), ExternalServiceError> {
    match mode {
        ProviderMode::Healthy => Ok(()),
        ProviderMode::Failing => Err(ExternalServiceError::Unavailable {
            service,
            detail: "503 from upstream".to_string(),
        }),
        ProviderMode::Hanging => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    pub(super) mode: ProviderMode,
    sent: Mutex<Vec<(ApplicationId, DeclarationActor, bool)>>,
}

impl RecordingNotifier {
    pub(super) fn with_mode(mode: ProviderMode) -> Self {
        Self {
            mode,
            sent: Mutex::default(),
        }
    }

    pub(super) fn sent(&self) -> Vec<(ApplicationId, DeclarationActor, bool)> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationService for RecordingNotifier {
    async fn resend_declaration_link(
        &self,
        application_id: &ApplicationId,
        actor: DeclarationActor,
        rotate_token: bool,
    ) -> Result<(), ExternalServiceError> {
        provider_call(self.mode, "notification service").await?;
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push((application_id.clone(), actor, rotate_token));
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct StubMeetings {
    pub(super) mode: ProviderMode,
    booked: AtomicUsize,
}

impl StubMeetings {
    pub(super) fn with_mode(mode: ProviderMode) -> Self {
        Self {
            mode,
            booked: AtomicUsize::new(0),
        }
    }
}

impl MeetingService for StubMeetings {
    async fn schedule_meeting(
        &self,
        application_id: &ApplicationId,
        _request: &InterviewRequest,
    ) -> Result<MeetingId, ExternalServiceError> {
        provider_call(self.mode, "meeting provider").await?;
        let sequence = self.booked.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MeetingId(format!("mtg-{application_id}-{sequence}")))
    }
}

pub(super) fn workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        demo_mode: false,
        external_timeout: Duration::from_millis(50),
        write_attempts: 5,
    }
}

pub(super) fn build_controller_with(
    config: WorkflowConfig,
    notifier: RecordingNotifier,
    meetings: StubMeetings,
) -> (TestController, MemoryGateway, Arc<RecordingNotifier>) {
    let gateway = MemoryGateway::default();
    let notifier = Arc::new(notifier);
    let controller = StageController::new(
        Arc::new(gateway.clone()),
        notifier.clone(),
        Arc::new(meetings),
        config,
    );
    (controller, gateway, notifier)
}

pub(super) fn build_controller() -> (TestController, MemoryGateway) {
    let (controller, gateway, _) = build_controller_with(
        workflow_config(),
        RecordingNotifier::default(),
        StubMeetings::default(),
    );
    (controller, gateway)
}

pub(super) fn staff() -> Caller {
    Caller::staff("staff-amelia")
}

pub(super) fn admin() -> Caller {
    Caller::admin("admin-root")
}

pub(super) fn student() -> Caller {
    Caller::new("student-priya", CallerRole::Student)
}

pub(super) fn agent() -> Caller {
    Caller::new("agent-lotus", CallerRole::Agent)
}

pub(super) fn applicant() -> ApplicantSnapshot {
    ApplicantSnapshot {
        full_name: "Priya Raman".to_string(),
        nationality: Some("India".to_string()),
        course_code: Some("MIT-2026".to_string()),
        intake: Some("2026-T1".to_string()),
        agent_name: Some("Lotus Education".to_string()),
    }
}

pub(super) fn app_id(suffix: &str) -> ApplicationId {
    ApplicationId(format!("app-{suffix}"))
}

pub(super) fn open(controller: &TestController, suffix: &str) -> ApplicationId {
    let id = app_id(suffix);
    controller
        .open(&staff(), &id, applicant())
        .expect("workflow opens");
    id
}

pub(super) fn approve_documents(controller: &TestController, id: &ApplicationId, count: u8) {
    for number in 1..=count {
        controller
            .documents()
            .upload(&student(), id, number, &format!("s3://gs/{id}/{number}.pdf"))
            .expect("upload");
        controller
            .documents()
            .set_status(&staff(), id, number, ReviewVerdict::Approved, None)
            .expect("approve");
    }
}

pub(super) fn approve_all_documents(controller: &TestController, id: &ApplicationId) {
    approve_documents(controller, id, GS_DOCUMENT_COUNT as u8);
}

pub(super) fn declaration_payload(signer: &str) -> Value {
    json!({
        "signed_by": signer,
        "genuine_intent": true,
        "accepted_terms": ["accurate_information", "notify_changes"],
    })
}

pub(super) fn approve_declarations(controller: &TestController, id: &ApplicationId) {
    controller
        .declarations()
        .submit(&student(), id, DeclarationActor::Student, declaration_payload("Priya"))
        .expect("student submits");
    controller
        .declarations()
        .submit(&agent(), id, DeclarationActor::Agent, declaration_payload("Lotus"))
        .expect("agent submits");
    for actor in [DeclarationActor::Student, DeclarationActor::Agent] {
        controller
            .declarations()
            .verify(&staff(), id, actor)
            .expect("verify");
    }
}

/// Open an application and drive it through stages 0..=3.
pub(super) fn ready_for_assessment(controller: &TestController, suffix: &str) -> ApplicationId {
    let id = open(controller, suffix);
    approve_all_documents(controller, &id);
    approve_declarations(controller, &id);
    for stage in 0..=3 {
        controller
            .complete_stage(&staff(), &id, stage)
            .expect("stage completes");
    }
    id
}

pub(super) fn approved_answers() -> AssessmentAnswers {
    AssessmentAnswers {
        recommendation: Some(Recommendation::Approved),
        notes: Some("Strong ties to home country".to_string()),
        ..AssessmentAnswers::default()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
