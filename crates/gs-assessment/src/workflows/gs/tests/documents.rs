use super::common::*;
use crate::config::WorkflowConfig;
use crate::workflows::gs::{ApplicationId, DocumentStatus, GsError, ReviewVerdict};

#[test]
fn documents_start_not_started_with_labels() {
    let (controller, _) = build_controller();
    let id = open(&controller, "doc-list");

    let documents = controller
        .documents()
        .list(&student(), &id)
        .expect("list documents");

    assert_eq!(documents.len(), 9);
    assert!(documents
        .iter()
        .all(|doc| doc.status == DocumentStatus::NotStarted));
    assert_eq!(documents[0].document_number, 1);
    assert_eq!(documents[0].label, "Passport");
}

#[test]
fn set_status_on_unknown_document_number_is_not_found() {
    let (controller, _) = build_controller();
    let id = open(&controller, "doc-range");

    for number in [0u8, 10, 42] {
        match controller
            .documents()
            .set_status(&staff(), &id, number, ReviewVerdict::Approved, None)
        {
            Err(GsError::NotFound(_)) => {}
            other => panic!("expected not found for document {number}, got {other:?}"),
        }
    }
}

#[test]
fn operations_on_unknown_application_are_not_found() {
    let (controller, _) = build_controller();
    let missing = ApplicationId("app-missing".to_string());

    assert!(matches!(
        controller.documents().upload(&student(), &missing, 1, "s3://x"),
        Err(GsError::NotFound(_))
    ));
    assert!(matches!(
        controller.documents().list(&staff(), &missing),
        Err(GsError::NotFound(_))
    ));
}

#[test]
fn reviewing_before_upload_is_an_invalid_transition() {
    let (controller, gateway) = build_controller();
    let id = open(&controller, "doc-early");
    let writes_before = gateway.writes();

    match controller
        .documents()
        .set_status(&staff(), &id, 4, ReviewVerdict::Rejected, Some("missing".into()))
    {
        Err(GsError::InvalidTransition(_)) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }
    assert_eq!(gateway.writes(), writes_before, "failed review must not write");
}

#[test]
fn upload_after_rejection_resets_to_uploaded_and_clears_notes() {
    let (controller, gateway) = build_controller();
    let id = open(&controller, "doc-reupload");
    let docs = controller.documents();

    docs.upload(&student(), &id, 2, "s3://gs/offer-v1.pdf")
        .expect("upload");
    docs.begin_review(&staff(), &id, 2).expect("begin review");
    let rejected = docs
        .set_status(&staff(), &id, 2, ReviewVerdict::Rejected, Some("unsigned".into()))
        .expect("reject");
    assert_eq!(rejected.status, DocumentStatus::Rejected);
    assert_eq!(rejected.review_notes.as_deref(), Some("unsigned"));

    let reuploaded = docs
        .upload(&student(), &id, 2, "s3://gs/offer-v2.pdf")
        .expect("re-upload");
    assert_eq!(reuploaded.status, DocumentStatus::Uploaded);
    assert_eq!(reuploaded.review_notes, None);

    let stored = gateway.stored(&id);
    let doc = stored.document(2).expect("document two");
    assert_eq!(doc.file_ref.as_deref(), Some("s3://gs/offer-v2.pdf"));
}

#[test]
fn students_cannot_review_documents() {
    let (controller, _) = build_controller();
    let id = open(&controller, "doc-authz");
    controller
        .documents()
        .upload(&student(), &id, 1, "s3://gs/passport.pdf")
        .expect("upload");

    assert!(matches!(
        controller
            .documents()
            .set_status(&student(), &id, 1, ReviewVerdict::Approved, None),
        Err(GsError::Forbidden { .. })
    ));
}

#[test]
fn empty_file_reference_is_rejected() {
    let (controller, _) = build_controller();
    let id = open(&controller, "doc-empty");
    assert!(matches!(
        controller.documents().upload(&student(), &id, 1, "   "),
        Err(GsError::Validation(_))
    ));
}

#[test]
fn all_approved_tracks_the_full_checklist() {
    let (controller, _) = build_controller();
    let id = open(&controller, "doc-gate");

    approve_documents(&controller, &id, 8);
    assert!(!controller
        .documents()
        .all_approved(&staff(), &id)
        .expect("gate read"));

    approve_all_documents(&controller, &id);
    assert!(controller
        .documents()
        .all_approved(&staff(), &id)
        .expect("gate read"));
}

#[test]
fn bulk_approval_requires_demo_mode_and_admin() {
    let (controller, _) = build_controller();
    let id = open(&controller, "doc-bulk-off");
    assert!(matches!(
        controller.documents().approve_all(&admin(), &id),
        Err(GsError::Forbidden { .. })
    ));

    let (demo, gateway, _) = build_controller_with(
        WorkflowConfig {
            demo_mode: true,
            ..workflow_config()
        },
        RecordingNotifier::default(),
        StubMeetings::default(),
    );
    let id = open(&demo, "doc-bulk-on");
    assert!(matches!(
        demo.documents().approve_all(&staff(), &id),
        Err(GsError::Forbidden { .. })
    ));

    for number in [1u8, 2, 3] {
        demo.documents()
            .upload(&student(), &id, number, "s3://gs/file.pdf")
            .expect("upload");
    }
    let approved = demo.documents().approve_all(&admin(), &id).expect("bulk");
    assert_eq!(approved, 3);

    let stored = gateway.stored(&id);
    assert_eq!(stored.documents.approved_count(), 3);
    assert_eq!(
        stored.document(4).expect("fourth").status,
        DocumentStatus::NotStarted
    );
}
