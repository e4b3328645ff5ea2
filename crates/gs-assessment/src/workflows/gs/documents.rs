use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ApplicationId, Caller, CallerRole};
use super::error::GsError;
use super::repository::PersistenceGateway;
use super::store::WorkflowStore;

pub const GS_DOCUMENT_COUNT: usize = 9;

const UNLISTED_DOCUMENT_LABEL: &str = "Unlisted document";

/// Checklist labels, indexed by `document_number - 1`.
pub const GS_DOCUMENT_LABELS: [&str; GS_DOCUMENT_COUNT] = [
    "Passport",
    "Offer letter",
    "Academic transcripts",
    "English proficiency",
    "Financial capacity evidence",
    "Statement of purpose",
    "Employment history",
    "Relationship evidence",
    "Previous visa history",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    NotStarted,
    Uploaded,
    InReview,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::NotStarted => "not_started",
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::InReview => "in_review",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
        }
    }
}

/// Outcome a reviewer can record against an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    Rejected,
}

impl From<ReviewVerdict> for DocumentStatus {
    fn from(value: ReviewVerdict) -> Self {
        match value {
            ReviewVerdict::Approved => DocumentStatus::Approved,
            ReviewVerdict::Rejected => DocumentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GsDocument {
    pub document_number: u8,
    pub status: DocumentStatus,
    pub file_ref: Option<String>,
    pub review_notes: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl GsDocument {
    pub(crate) fn new(document_number: u8) -> Self {
        Self {
            document_number,
            status: DocumentStatus::NotStarted,
            file_ref: None,
            review_notes: None,
            uploaded_at: None,
            reviewed_at: None,
        }
    }

    pub fn label(&self) -> &'static str {
        usize::from(self.document_number)
            .checked_sub(1)
            .and_then(|slot| GS_DOCUMENT_LABELS.get(slot))
            .copied()
            .unwrap_or(UNLISTED_DOCUMENT_LABEL)
    }

    pub fn is_approved(&self) -> bool {
        self.status == DocumentStatus::Approved
    }

    /// Replace the file from any prior status; earlier review notes no longer apply.
    pub fn upload(&mut self, file_ref: String, now: DateTime<Utc>) {
        self.status = DocumentStatus::Uploaded;
        self.file_ref = Some(file_ref);
        self.review_notes = None;
        self.uploaded_at = Some(now);
        self.reviewed_at = None;
    }

    pub fn begin_review(&mut self) -> Result<(), GsError> {
        match self.status {
            DocumentStatus::Uploaded => {
                self.status = DocumentStatus::InReview;
                Ok(())
            }
            DocumentStatus::InReview => Ok(()),
            other => Err(GsError::InvalidTransition(format!(
                "document {} cannot enter review from {}",
                self.document_number,
                other.label()
            ))),
        }
    }

    /// Approve or reject. Anything but `NotStarted` may be reviewed, including re-approval
    /// after a rejection.
    pub fn review(
        &mut self,
        verdict: ReviewVerdict,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), GsError> {
        if self.status == DocumentStatus::NotStarted {
            return Err(GsError::InvalidTransition(format!(
                "document {} has not been uploaded",
                self.document_number
            )));
        }

        self.status = verdict.into();
        self.review_notes = notes
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self.reviewed_at = Some(now);
        Ok(())
    }
}

/// The fixed nine-document GS checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChecklist {
    documents: [GsDocument; GS_DOCUMENT_COUNT],
}

impl DocumentChecklist {
    pub fn new() -> Self {
        Self {
            documents: std::array::from_fn(|index| GsDocument::new(index as u8 + 1)),
        }
    }

    fn slot(document_number: u8) -> Result<usize, GsError> {
        match usize::from(document_number) {
            number @ 1..=GS_DOCUMENT_COUNT => Ok(number - 1),
            _ => Err(GsError::NotFound(format!(
                "document {document_number} is not part of the GS checklist (1..={GS_DOCUMENT_COUNT})"
            ))),
        }
    }

    pub fn get(&self, document_number: u8) -> Result<&GsDocument, GsError> {
        Self::slot(document_number).map(|slot| &self.documents[slot])
    }

    pub fn get_mut(&mut self, document_number: u8) -> Result<&mut GsDocument, GsError> {
        Self::slot(document_number).map(move |slot| &mut self.documents[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &GsDocument> {
        self.documents.iter()
    }

    pub fn approved_count(&self) -> usize {
        self.documents.iter().filter(|doc| doc.is_approved()).count()
    }

    /// Documents-stage gate.
    pub fn all_approved(&self) -> bool {
        self.approved_count() == GS_DOCUMENT_COUNT
    }
}

impl Default for DocumentChecklist {
    fn default() -> Self {
        Self::new()
    }
}

/// Read model for the checklist endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub document_number: u8,
    pub label: &'static str,
    pub status: DocumentStatus,
    pub file_ref: Option<String>,
    pub review_notes: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl From<&GsDocument> for DocumentView {
    fn from(doc: &GsDocument) -> Self {
        Self {
            document_number: doc.document_number,
            label: doc.label(),
            status: doc.status,
            file_ref: doc.file_ref.clone(),
            review_notes: doc.review_notes.clone(),
            uploaded_at: doc.uploaded_at,
            reviewed_at: doc.reviewed_at,
        }
    }
}

/// Owns per-document review status for every application.
pub struct DocumentLifecycleManager<P> {
    store: WorkflowStore<P>,
    demo_mode: bool,
}

impl<P> DocumentLifecycleManager<P>
where
    P: PersistenceGateway + 'static,
{
    pub(crate) fn new(store: WorkflowStore<P>, demo_mode: bool) -> Self {
        Self { store, demo_mode }
    }

    pub fn list(
        &self,
        _caller: &Caller,
        application_id: &ApplicationId,
    ) -> Result<Vec<DocumentView>, GsError> {
        let record = self.store.load(application_id)?;
        Ok(record.documents.iter().map(DocumentView::from).collect())
    }

    pub fn get(
        &self,
        _caller: &Caller,
        application_id: &ApplicationId,
        document_number: u8,
    ) -> Result<DocumentView, GsError> {
        let record = self.store.load(application_id)?;
        record.document(document_number).map(DocumentView::from)
    }

    pub fn upload(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        document_number: u8,
        file_ref: &str,
    ) -> Result<DocumentView, GsError> {
        let file_ref = file_ref.trim();
        if file_ref.is_empty() {
            return Err(GsError::Validation("file reference is required".to_string()));
        }

        let view = self.store.mutate(application_id, |record| {
            let doc = record.documents.get_mut(document_number)?;
            doc.upload(file_ref.to_string(), Utc::now());
            Ok(DocumentView::from(&*doc))
        })?;

        info!(
            %application_id,
            document_number,
            caller = %caller.id,
            "gs document uploaded"
        );
        Ok(view)
    }

    pub fn begin_review(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        document_number: u8,
    ) -> Result<DocumentView, GsError> {
        caller.require_staff("review documents")?;
        self.store.mutate(application_id, |record| {
            let doc = record.documents.get_mut(document_number)?;
            doc.begin_review()?;
            Ok(DocumentView::from(&*doc))
        })
    }

    pub fn set_status(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
        document_number: u8,
        verdict: ReviewVerdict,
        notes: Option<String>,
    ) -> Result<DocumentView, GsError> {
        caller.require_staff("review documents")?;
        let view = self.store.mutate(application_id, |record| {
            let doc = record.documents.get_mut(document_number)?;
            doc.review(verdict, notes.clone(), Utc::now())?;
            Ok(DocumentView::from(&*doc))
        })?;

        info!(
            %application_id,
            document_number,
            status = view.status.label(),
            reviewer = %caller.id,
            "gs document reviewed"
        );
        Ok(view)
    }

    pub fn all_approved(
        &self,
        _caller: &Caller,
        application_id: &ApplicationId,
    ) -> Result<bool, GsError> {
        Ok(self.store.load(application_id)?.documents.all_approved())
    }

    /// Demo shortcut: approve every uploaded document in one write.
    pub fn approve_all(
        &self,
        caller: &Caller,
        application_id: &ApplicationId,
    ) -> Result<usize, GsError> {
        if !self.demo_mode || caller.role != CallerRole::Admin {
            return Err(caller.forbidden("bulk-approve documents outside demo mode"));
        }

        let approved = self.store.mutate(application_id, |record| {
            let now = Utc::now();
            let mut approved = 0;
            for number in 1..=GS_DOCUMENT_COUNT as u8 {
                let doc = record.documents.get_mut(number)?;
                if matches!(
                    doc.status,
                    DocumentStatus::Uploaded | DocumentStatus::InReview | DocumentStatus::Rejected
                ) {
                    doc.review(
                        ReviewVerdict::Approved,
                        Some("bulk approved (demo)".to_string()),
                        now,
                    )?;
                    approved += 1;
                }
            }
            Ok(approved)
        })?;

        info!(%application_id, approved, admin = %caller.id, "gs documents bulk approved");
        Ok(approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_clears_previous_review() {
        let mut doc = GsDocument::new(3);
        doc.upload("s3://gs/3-v1.pdf".to_string(), Utc::now());
        doc.review(
            ReviewVerdict::Rejected,
            Some("blurry scan".to_string()),
            Utc::now(),
        )
        .expect("uploaded document can be rejected");

        doc.upload("s3://gs/3-v2.pdf".to_string(), Utc::now());
        assert_eq!(doc.status, DocumentStatus::Uploaded);
        assert_eq!(doc.review_notes, None);
        assert_eq!(doc.reviewed_at, None);
        assert_eq!(doc.file_ref.as_deref(), Some("s3://gs/3-v2.pdf"));
    }

    #[test]
    fn review_requires_an_upload() {
        let mut doc = GsDocument::new(1);
        assert!(matches!(
            doc.review(ReviewVerdict::Approved, None, Utc::now()),
            Err(GsError::InvalidTransition(_))
        ));
        assert!(matches!(doc.begin_review(), Err(GsError::InvalidTransition(_))));
    }

    #[test]
    fn rejected_documents_can_be_approved_later() {
        let mut doc = GsDocument::new(5);
        doc.upload("s3://gs/5.pdf".to_string(), Utc::now());
        doc.begin_review().expect("uploaded enters review");
        doc.review(ReviewVerdict::Rejected, Some("  ".to_string()), Utc::now())
            .expect("reject");
        assert_eq!(doc.review_notes, None);
        doc.review(ReviewVerdict::Approved, Some(" ok ".to_string()), Utc::now())
            .expect("re-approve");
        assert!(doc.is_approved());
        assert_eq!(doc.review_notes.as_deref(), Some("ok"));
    }

    #[test]
    fn checklist_rejects_out_of_range_numbers() {
        let mut checklist = DocumentChecklist::new();
        assert!(matches!(checklist.get(0), Err(GsError::NotFound(_))));
        assert!(matches!(checklist.get_mut(10), Err(GsError::NotFound(_))));
        assert_eq!(checklist.get(9).expect("ninth").label(), "Previous visa history");
    }

    #[test]
    fn stray_document_numbers_get_a_fallback_label() {
        for number in [0u8, 10, 255] {
            let raw = serde_json::json!({
                "document_number": number,
                "status": "not_started",
                "file_ref": null,
                "review_notes": null,
                "uploaded_at": null,
                "reviewed_at": null,
            });
            let doc: GsDocument = serde_json::from_value(raw).expect("document deserializes");
            assert_eq!(doc.label(), "Unlisted document");
        }
        assert_eq!(GsDocument::new(1).label(), "Passport");
    }

    #[test]
    fn checklist_gate_needs_all_nine() {
        let mut checklist = DocumentChecklist::new();
        for number in 1..=8u8 {
            let doc = checklist.get_mut(number).expect("in range");
            doc.upload(format!("s3://gs/{number}.pdf"), Utc::now());
            doc.review(ReviewVerdict::Approved, None, Utc::now())
                .expect("approve");
        }
        assert_eq!(checklist.approved_count(), 8);
        assert!(!checklist.all_approved());

        let last = checklist.get_mut(9).expect("in range");
        last.upload("s3://gs/9.pdf".to_string(), Utc::now());
        last.review(ReviewVerdict::Approved, None, Utc::now())
            .expect("approve");
        assert!(checklist.all_approved());
    }
}
