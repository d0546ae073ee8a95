use async_trait::async_trait;
use shared::{
    domain::{
        EvaluationCriterion, OrganizationId, Submission, SubmissionId, SubmissionStatus, Tender,
        TenderId, UserId,
    },
    protocol::{SubmissionRequest, TenderRequest},
};

use crate::error::ClientResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Tender creation payload: the JSON part plus attached files.
#[derive(Debug, Clone, PartialEq)]
pub struct TenderCreate {
    pub data: TenderRequest,
    pub files: Vec<DocumentUpload>,
}

#[async_trait]
pub trait TenderRegistry: Send + Sync {
    async fn create(&self, request: TenderCreate) -> ClientResult<Tender>;
    async fn update(&self, id: TenderId, request: TenderRequest) -> ClientResult<Tender>;
    async fn publish(&self, id: TenderId) -> ClientResult<Tender>;
    async fn close(&self, id: TenderId) -> ClientResult<Tender>;
    async fn delete(&self, id: TenderId) -> ClientResult<()>;
    async fn get(&self, id: TenderId) -> ClientResult<Tender>;
    async fn criteria(&self, id: TenderId) -> ClientResult<Vec<EvaluationCriterion>>;
    async fn list_by_owner(&self, owner_id: UserId) -> ClientResult<Vec<Tender>>;
    async fn list_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> ClientResult<Vec<Tender>>;
    async fn list_all(&self) -> ClientResult<Vec<Tender>>;
}

#[async_trait]
pub trait SubmissionRegistry: Send + Sync {
    async fn create(&self, request: SubmissionRequest) -> ClientResult<Submission>;
    async fn update_status(
        &self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> ClientResult<Submission>;
    async fn delete(&self, id: SubmissionId) -> ClientResult<()>;
    async fn evaluate(&self, id: SubmissionId) -> ClientResult<Submission>;
    async fn get_by_id(&self, id: SubmissionId) -> ClientResult<Submission>;
    async fn list_by_tender(&self, tender_id: TenderId) -> ClientResult<Vec<Submission>>;
    async fn list_by_supplier(&self, supplier_id: UserId) -> ClientResult<Vec<Submission>>;
    async fn list_all(&self) -> ClientResult<Vec<Submission>>;
}
