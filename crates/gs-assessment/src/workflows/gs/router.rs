use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::assessment::{AssessmentAnswers, Recommendation};
use super::declarations::DeclarationActor;
use super::documents::{ReviewVerdict, GS_DOCUMENT_COUNT};
use super::domain::{ApplicantSnapshot, ApplicationId, Caller, CallerRole};
use super::error::GsError;
use super::interview::InterviewRequest;
use super::repository::{MeetingService, NotificationService, PersistenceGateway};
use super::stages::{StageController, StageOverview};

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

type Shared<P, N, M> = State<Arc<StageController<P, N, M>>>;

/// Router builder exposing the GS workflow over HTTP.
pub fn gs_router<P, N, M>(controller: Arc<StageController<P, N, M>>) -> Router
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let base = "/api/v1/applications/:application_id/gs";
    Router::new()
        .route(base, post(open_handler::<P, N, M>))
        .route(&format!("{base}/stage"), get(stage_handler::<P, N, M>))
        .route(
            &format!("{base}/stage/complete"),
            post(complete_stage_handler::<P, N, M>),
        )
        .route(&format!("{base}/documents"), get(documents_handler::<P, N, M>))
        .route(
            &format!("{base}/documents/:document_number/upload"),
            post(upload_handler::<P, N, M>),
        )
        .route(
            &format!("{base}/documents/:document_number/review"),
            post(begin_review_handler::<P, N, M>),
        )
        .route(
            &format!("{base}/documents/:document_number/status"),
            post(document_status_handler::<P, N, M>),
        )
        .route(
            &format!("{base}/demo/approve-documents"),
            post(approve_all_handler::<P, N, M>),
        )
        .route(
            &format!("{base}/declarations/:actor"),
            get(declaration_handler::<P, N, M>).post(submit_declaration_handler::<P, N, M>),
        )
        .route(
            &format!("{base}/declarations/:actor/review"),
            post(verify_declaration_handler::<P, N, M>),
        )
        .route(
            &format!("{base}/declarations/:actor/resend"),
            post(resend_link_handler::<P, N, M>),
        )
        .route(
            &format!("{base}/interview"),
            get(interview_handler::<P, N, M>).post(schedule_interview_handler::<P, N, M>),
        )
        .route(&format!("{base}/assessment"), get(assessment_handler::<P, N, M>))
        .route(
            &format!("{base}/assessment/draft"),
            post(save_draft_handler::<P, N, M>),
        )
        .route(
            &format!("{base}/assessment/submit"),
            post(submit_assessment_handler::<P, N, M>),
        )
        .route(
            &format!("{base}/decision"),
            get(decision_handler::<P, N, M>).post(finalize_decision_handler::<P, N, M>),
        )
        .with_state(controller)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompleteStageRequest {
    pub(crate) stage_to_complete: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadRequest {
    pub(crate) file_ref: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentStatusRequest {
    pub(crate) status: ReviewVerdict,
    #[serde(default)]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeclarationRequest {
    pub(crate) payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum DeclarationReviewStatus {
    Approved,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeclarationReviewRequest {
    pub(crate) status: DeclarationReviewStatus,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResendLinkRequest {
    #[serde(default)]
    pub(crate) rotate_token: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssessmentRequest {
    #[serde(default)]
    pub(crate) payload: AssessmentAnswers,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    pub(crate) final_decision: Recommendation,
    pub(crate) rationale: String,
}

/// Resolve the authenticated caller forwarded by the upstream gateway.
pub(crate) fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, Response> {
    let id = header_value(headers, CALLER_ID_HEADER);
    let role = header_value(headers, CALLER_ROLE_HEADER).and_then(CallerRole::parse);
    match (id, role) {
        (Some(id), Some(role)) => Ok(Caller::new(id, role)),
        _ => {
            let payload = json!({
                "error": "unauthenticated",
                "message": format!("{CALLER_ID_HEADER} and {CALLER_ROLE_HEADER} headers are required"),
            });
            Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response())
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn parse_actor(raw: &str) -> Result<DeclarationActor, GsError> {
    DeclarationActor::parse(raw)
        .ok_or_else(|| GsError::NotFound(format!("declaration actor '{raw}'")))
}

/// Non-numeric or oversized segments name no checklist entry.
fn parse_document_number(raw: &str) -> Result<u8, GsError> {
    raw.trim().parse::<u8>().map_err(|_| {
        GsError::NotFound(format!(
            "document '{raw}' is not part of the GS checklist (1..={GS_DOCUMENT_COUNT})"
        ))
    })
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, GsError>) -> Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(err) => err.into_response(),
    }
}

macro_rules! caller_or_reject {
    ($headers:expr) => {
        match caller_from_headers(&$headers) {
            Ok(caller) => caller,
            Err(response) => return response,
        }
    };
}

pub(crate) async fn open_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(applicant): Json<ApplicantSnapshot>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    let result = controller
        .open(&caller, &ApplicationId(application_id), applicant)
        .map(|record| StageOverview::from(&record.progress));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn stage_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    respond(
        StatusCode::OK,
        controller.overview(&caller, &ApplicationId(application_id)),
    )
}

pub(crate) async fn complete_stage_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CompleteStageRequest>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    let result = controller
        .complete_stage(
            &caller,
            &ApplicationId(application_id),
            request.stage_to_complete,
        )
        .map(|progress| StageOverview::from(&progress));
    respond(StatusCode::OK, result)
}

pub(crate) async fn documents_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    respond(
        StatusCode::OK,
        controller
            .documents()
            .list(&caller, &ApplicationId(application_id)),
    )
}

pub(crate) async fn upload_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path((application_id, document_number)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<UploadRequest>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    respond(
        StatusCode::OK,
        parse_document_number(&document_number).and_then(|number| {
            controller.documents().upload(
                &caller,
                &ApplicationId(application_id),
                number,
                &request.file_ref,
            )
        }),
    )
}

pub(crate) async fn begin_review_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path((application_id, document_number)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    respond(
        StatusCode::OK,
        parse_document_number(&document_number).and_then(|number| {
            controller
                .documents()
                .begin_review(&caller, &ApplicationId(application_id), number)
        }),
    )
}

pub(crate) async fn document_status_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path((application_id, document_number)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<DocumentStatusRequest>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    respond(
        StatusCode::OK,
        parse_document_number(&document_number).and_then(|number| {
            controller.documents().set_status(
                &caller,
                &ApplicationId(application_id),
                number,
                request.status,
                request.notes,
            )
        }),
    )
}

pub(crate) async fn approve_all_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    let result = controller
        .documents()
        .approve_all(&caller, &ApplicationId(application_id))
        .map(|approved| json!({ "approved": approved }));
    respond(StatusCode::OK, result)
}

pub(crate) async fn declaration_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path((application_id, actor)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    let result = parse_actor(&actor).and_then(|actor| {
        controller
            .declarations()
            .get(&caller, &ApplicationId(application_id), actor)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn submit_declaration_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path((application_id, actor)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<DeclarationRequest>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    let result = parse_actor(&actor).and_then(|actor| {
        controller.declarations().submit(
            &caller,
            &ApplicationId(application_id),
            actor,
            request.payload,
        )
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn verify_declaration_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path((application_id, actor)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<DeclarationReviewRequest>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    // Verification is the only review outcome a declaration supports.
    let DeclarationReviewRequest {
        status: DeclarationReviewStatus::Approved,
    } = request;
    let result = parse_actor(&actor).and_then(|actor| {
        controller
            .declarations()
            .verify(&caller, &ApplicationId(application_id), actor)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn resend_link_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path((application_id, actor)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<ResendLinkRequest>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    let actor = match parse_actor(&actor) {
        Ok(actor) => actor,
        Err(err) => return err.into_response(),
    };
    let result = controller
        .declarations()
        .resend_link(
            &caller,
            &ApplicationId(application_id),
            actor,
            request.rotate_token,
        )
        .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn interview_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    respond(
        StatusCode::OK,
        controller
            .interviews()
            .booking(&caller, &ApplicationId(application_id)),
    )
}

pub(crate) async fn schedule_interview_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<InterviewRequest>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    let result = controller
        .interviews()
        .schedule(&caller, &ApplicationId(application_id), request)
        .await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn assessment_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    respond(
        StatusCode::OK,
        controller
            .assessments()
            .get(&caller, &ApplicationId(application_id)),
    )
}

pub(crate) async fn save_draft_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<AssessmentRequest>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    respond(
        StatusCode::OK,
        controller.assessments().save_draft(
            &caller,
            &ApplicationId(application_id),
            request.payload,
        ),
    )
}

pub(crate) async fn submit_assessment_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<AssessmentRequest>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    respond(
        StatusCode::OK,
        controller.assessments().submit(
            &caller,
            &ApplicationId(application_id),
            request.payload,
        ),
    )
}

pub(crate) async fn decision_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    let id = ApplicationId(application_id);
    match controller.assessments().decision(&caller, &id) {
        Ok(Some(decision)) => (StatusCode::OK, Json(decision)).into_response(),
        Ok(None) => GsError::NotFound(format!("decision for application {id}")).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn finalize_decision_handler<P, N, M>(
    State(controller): Shared<P, N, M>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<DecisionRequest>,
) -> Response
where
    P: PersistenceGateway + 'static,
    N: NotificationService + 'static,
    M: MeetingService + 'static,
{
    let caller = caller_or_reject!(headers);
    respond(
        StatusCode::CREATED,
        controller.assessments().finalize_decision(
            &caller,
            &ApplicationId(application_id),
            request.final_decision,
            &request.rationale,
        ),
    )
}
