use std::sync::Arc;

use shared::domain::{
    OrganizationId, Submission, SubmissionId, SubmissionStatus, Tender, TenderId, TenderStatus,
    UserId,
};
use tracing::info;

use super::failure;
use crate::{
    error::{ClientError, ClientResult},
    forms::TenderForm,
    registry::{DocumentUpload, SubmissionRegistry, TenderCreate, TenderRegistry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerView {
    List,
    Create,
    Details,
}

/// Owner screen: the owner's tenders, the creation form and the submissions
/// received on one tender.
pub struct OwnerDashboard {
    tenders: Arc<dyn TenderRegistry>,
    submissions: Arc<dyn SubmissionRegistry>,
    owner_id: UserId,
    organization_id: OrganizationId,
    view: OwnerView,
    listed: Vec<Tender>,
    selected: Option<Tender>,
    received: Vec<Submission>,
    selected_submission: Option<Submission>,
    pub form: TenderForm,
    pub files: Vec<DocumentUpload>,
    error: Option<String>,
}

impl OwnerDashboard {
    pub fn new(
        tenders: Arc<dyn TenderRegistry>,
        submissions: Arc<dyn SubmissionRegistry>,
        owner_id: UserId,
        organization_id: OrganizationId,
    ) -> Self {
        Self {
            tenders,
            submissions,
            owner_id,
            organization_id,
            view: OwnerView::List,
            listed: Vec::new(),
            selected: None,
            received: Vec::new(),
            selected_submission: None,
            form: TenderForm::default(),
            files: Vec::new(),
            error: None,
        }
    }

    pub fn view(&self) -> OwnerView {
        self.view
    }

    pub fn tenders(&self) -> &[Tender] {
        &self.listed
    }

    pub fn selected(&self) -> Option<&Tender> {
        self.selected.as_ref()
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.received
    }

    pub fn selected_submission(&self) -> Option<&Submission> {
        self.selected_submission.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn published_count(&self) -> usize {
        self.count(TenderStatus::Published)
    }

    pub fn draft_count(&self) -> usize {
        self.count(TenderStatus::Draft)
    }

    fn count(&self, status: TenderStatus) -> usize {
        self.listed.iter().filter(|t| t.status == status).count()
    }

    pub async fn load_tenders(&mut self) {
        self.error = None;
        match self.tenders.list_by_owner(self.owner_id).await {
            Ok(tenders) => self.listed = tenders,
            Err(err) => self.error = Some(failure("list owner tenders", &err)),
        }
    }

    pub fn switch_to_create(&mut self) {
        self.view = OwnerView::Create;
        self.form = TenderForm::default();
        self.files.clear();
        self.error = None;
    }

    pub fn switch_to_list(&mut self) {
        self.view = OwnerView::List;
        self.selected = None;
        self.received.clear();
        self.selected_submission = None;
        self.error = None;
    }

    /// Validates the form locally, creates the tender, then returns to the
    /// refreshed list. An invalid form never reaches the registry.
    pub async fn submit_form(&mut self) -> ClientResult<Tender> {
        let data = match self.form.validate(self.organization_id, self.owner_id) {
            Ok(data) => data,
            Err(err) => {
                let err = ClientError::from(err);
                self.error = Some(err.to_string());
                return Err(err);
            }
        };
        let create = TenderCreate {
            data,
            files: std::mem::take(&mut self.files),
        };

        match self.tenders.create(create).await {
            Ok(tender) => {
                info!(tender_id = %tender.id, "tender created");
                self.switch_to_list();
                self.load_tenders().await;
                Ok(tender)
            }
            Err(err) => {
                self.error = Some(failure("create tender", &err));
                Err(err)
            }
        }
    }

    pub async fn publish(&mut self, id: TenderId) -> ClientResult<Tender> {
        let result = self.tenders.publish(id).await;
        self.after_mutation("publish tender", result).await
    }

    pub async fn close(&mut self, id: TenderId) -> ClientResult<Tender> {
        let result = self.tenders.close(id).await;
        self.after_mutation("close tender", result).await
    }

    pub async fn delete(&mut self, id: TenderId) -> ClientResult<()> {
        let result = self.tenders.delete(id).await;
        self.after_mutation("delete tender", result).await
    }

    async fn after_mutation<T>(
        &mut self,
        action: &'static str,
        result: ClientResult<T>,
    ) -> ClientResult<T> {
        match result {
            Ok(value) => {
                self.load_tenders().await;
                Ok(value)
            }
            Err(err) => {
                self.error = Some(failure(action, &err));
                Err(err)
            }
        }
    }

    /// Shows one tender with its submissions. The view switches to details
    /// even when the submissions cannot be read.
    pub async fn view_details(&mut self, id: TenderId) {
        self.error = None;
        self.selected = self.listed.iter().find(|t| t.id == id).cloned();

        match self.submissions.list_by_tender(id).await {
            Ok(submissions) => self.received = submissions,
            Err(err) => {
                self.received.clear();
                self.error = Some(format!(
                    "failed to load submissions: {}",
                    failure("list tender submissions", &err)
                ));
            }
        }
        self.view = OwnerView::Details;
    }

    pub async fn view_submission(&mut self, id: SubmissionId) -> ClientResult<Submission> {
        match self.submissions.get_by_id(id).await {
            Ok(submission) => {
                self.selected_submission = Some(submission.clone());
                Ok(submission)
            }
            Err(err) => {
                self.error = Some(failure("get submission", &err));
                Err(err)
            }
        }
    }

    pub fn close_submission(&mut self) {
        self.selected_submission = None;
    }

    pub async fn update_submission_status(
        &mut self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> ClientResult<Submission> {
        let result = self.submissions.update_status(id, status).await;
        self.after_submission_change("update submission status", result)
            .await
    }

    pub async fn evaluate_submission(&mut self, id: SubmissionId) -> ClientResult<Submission> {
        let result = self.submissions.evaluate(id).await;
        self.after_submission_change("evaluate submission", result).await
    }

    async fn after_submission_change(
        &mut self,
        action: &'static str,
        result: ClientResult<Submission>,
    ) -> ClientResult<Submission> {
        match result {
            Ok(submission) => {
                self.selected_submission = None;
                if let Some(tender_id) = self.selected.as_ref().map(|t| t.id) {
                    self.view_details(tender_id).await;
                }
                Ok(submission)
            }
            Err(err) => {
                self.error = Some(failure(action, &err));
                Err(err)
            }
        }
    }
}
