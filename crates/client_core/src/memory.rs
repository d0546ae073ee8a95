use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use chrono::{Days, Utc};
use shared::{
    domain::{
        CriterionId, CriterionType, DocumentRefId, EvaluationCriterion, OrganizationId,
        Submission, SubmissionId, SubmissionStatus, Tender, TenderDocumentRef, TenderId,
        TenderStatus, TenderTransition, UserId,
    },
    protocol::{CriterionRequest, SubmissionRequest, TenderRequest, TENDERS_PATH},
    validation::{validate_submission_request, validate_tender_request},
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    error::{ClientError, ClientResult},
    registry::{SubmissionRegistry, TenderCreate, TenderRegistry},
};

/// In-process fake for both registries. Applies the same validation and
/// lifecycle rules as the server, after a fixed artificial delay.
pub struct InMemoryBackend {
    latency: Duration,
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    tenders: BTreeMap<TenderId, Tender>,
    submissions: Vec<Submission>,
    last_tender_id: i64,
    last_criterion_id: i64,
    last_document_id: i64,
}

impl MemoryState {
    fn next_tender_id(&mut self) -> TenderId {
        self.last_tender_id += 1;
        TenderId(self.last_tender_id)
    }

    fn criteria(&mut self, requested: &[CriterionRequest]) -> Vec<EvaluationCriterion> {
        requested
            .iter()
            .map(|criterion| {
                self.last_criterion_id += 1;
                EvaluationCriterion {
                    id: CriterionId(self.last_criterion_id),
                    criterion_type: criterion.criterion_type,
                    weight: criterion.weight,
                }
            })
            .collect()
    }

    fn tender(&self, id: TenderId) -> ClientResult<&Tender> {
        self.tenders
            .get(&id)
            .ok_or_else(|| ClientError::NotFound(format!("tender {id} not found")))
    }

    fn tender_mut(&mut self, id: TenderId) -> ClientResult<&mut Tender> {
        self.tenders
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("tender {id} not found")))
    }

    fn submission_mut(&mut self, id: SubmissionId) -> ClientResult<&mut Submission> {
        self.submissions
            .iter_mut()
            .find(|submission| submission.id == id)
            .ok_or_else(|| ClientError::NotFound(format!("submission {id} not found")))
    }

    fn insert_tender(&mut self, data: &TenderRequest, status: TenderStatus) -> TenderId {
        let id = self.next_tender_id();
        let criteria = self.criteria(&data.criteria);
        self.tenders.insert(
            id,
            Tender {
                id,
                title: data.title.clone(),
                description: data.description.clone(),
                organization_id: data.organization_id,
                owner_user_id: data.owner_user_id,
                status,
                publication_date: (status == TenderStatus::Published).then(Utc::now),
                deadline: data.deadline,
                criteria,
                documents: Vec::new(),
            },
        );
        id
    }
}

impl InMemoryBackend {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Starts with two published demo tenders owned by user 1.
    pub fn seeded(latency: Duration) -> Self {
        let today = Utc::now().date_naive();
        let mut state = MemoryState::default();
        for (title, description, days, weights) in [
            (
                "Construction of the new bridge",
                "Design, construction and two years of maintenance of a bridge linking both river banks",
                10,
                [40, 35, 25],
            ),
            (
                "Central hospital renovation",
                "Complete renovation of the central hospital infrastructure and technical wings",
                45,
                [30, 40, 30],
            ),
        ] {
            let request = TenderRequest {
                title: title.into(),
                description: description.into(),
                organization_id: OrganizationId(1),
                owner_user_id: UserId(1),
                deadline: today + Days::new(days),
                criteria: [
                    CriterionType::Price,
                    CriterionType::Technical,
                    CriterionType::Deadline,
                ]
                .into_iter()
                .zip(weights)
                .map(|(criterion_type, weight)| CriterionRequest {
                    criterion_type,
                    weight,
                })
                .collect(),
            };
            state.insert_tender(&request, TenderStatus::Published);
        }

        Self {
            latency,
            state: Mutex::new(state),
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn transition(&self, id: TenderId, transition: TenderTransition) -> ClientResult<Tender> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let tender = state.tender_mut(id)?;
        tender.status = transition.apply(tender.status)?;
        if transition == TenderTransition::Publish {
            tender.publication_date = Some(Utc::now());
        }
        debug!(%id, status = %tender.status, "tender transitioned");
        Ok(tender.clone())
    }

    async fn list_tenders(&self, keep: impl Fn(&Tender) -> bool) -> Vec<Tender> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        state.tenders.values().filter(|t| keep(t)).cloned().collect()
    }

    async fn list_submissions(&self, keep: impl Fn(&Submission) -> bool) -> Vec<Submission> {
        self.simulate_latency().await;
        let state = self.state.lock().await;
        state.submissions.iter().filter(|s| keep(s)).cloned().collect()
    }
}

#[async_trait]
impl TenderRegistry for InMemoryBackend {
    async fn create(&self, request: TenderCreate) -> ClientResult<Tender> {
        self.simulate_latency().await;
        validate_tender_request(&request.data)?;

        let mut state = self.state.lock().await;
        let id = state.insert_tender(&request.data, TenderStatus::Draft);
        let mut documents = Vec::with_capacity(request.files.len());
        for (index, file) in request.files.iter().enumerate() {
            state.last_document_id += 1;
            let document_id = format!("doc-{}-{index}", id);
            documents.push(TenderDocumentRef {
                id: DocumentRefId(state.last_document_id),
                download_url: format!("{TENDERS_PATH}/documents/{document_id}"),
                document_id,
                file_name: file.file_name.clone(),
                content_type: file.content_type.clone(),
            });
        }
        let tender = state.tender_mut(id)?;
        tender.documents = documents;
        Ok(tender.clone())
    }

    async fn update(&self, id: TenderId, request: TenderRequest) -> ClientResult<Tender> {
        self.simulate_latency().await;
        validate_tender_request(&request)?;

        let mut state = self.state.lock().await;
        state.tender(id)?;
        let criteria = state.criteria(&request.criteria);
        let tender = state.tender_mut(id)?;
        tender.title = request.title;
        tender.description = request.description;
        tender.organization_id = request.organization_id;
        tender.owner_user_id = request.owner_user_id;
        tender.deadline = request.deadline;
        tender.criteria = criteria;
        Ok(tender.clone())
    }

    async fn publish(&self, id: TenderId) -> ClientResult<Tender> {
        self.transition(id, TenderTransition::Publish).await
    }

    async fn close(&self, id: TenderId) -> ClientResult<Tender> {
        self.transition(id, TenderTransition::Close).await
    }

    async fn delete(&self, id: TenderId) -> ClientResult<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state
            .tenders
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound(format!("tender {id} not found")))
    }

    async fn get(&self, id: TenderId) -> ClientResult<Tender> {
        self.simulate_latency().await;
        self.state.lock().await.tender(id).cloned()
    }

    async fn criteria(&self, id: TenderId) -> ClientResult<Vec<EvaluationCriterion>> {
        self.simulate_latency().await;
        Ok(self.state.lock().await.tender(id)?.criteria.clone())
    }

    async fn list_by_owner(&self, owner_id: UserId) -> ClientResult<Vec<Tender>> {
        Ok(self.list_tenders(|t| t.owner_user_id == owner_id).await)
    }

    async fn list_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> ClientResult<Vec<Tender>> {
        Ok(self
            .list_tenders(|t| t.organization_id == organization_id)
            .await)
    }

    async fn list_all(&self) -> ClientResult<Vec<Tender>> {
        Ok(self.list_tenders(|_| true).await)
    }
}

#[async_trait]
impl SubmissionRegistry for InMemoryBackend {
    async fn create(&self, request: SubmissionRequest) -> ClientResult<Submission> {
        self.simulate_latency().await;
        validate_submission_request(&request)?;

        let mut state = self.state.lock().await;
        let tender = state.tender(request.tender_id)?;
        if tender.status != TenderStatus::Published {
            return Err(ClientError::InvalidTransition(format!(
                "tender {} is {} and does not accept submissions",
                tender.id, tender.status
            )));
        }
        let submission = Submission {
            id: SubmissionId::new(),
            tender_id: request.tender_id,
            supplier_id: request.supplier_id,
            document_id: request.document_id,
            status: SubmissionStatus::Submitted,
            price: request.price,
            technical: request.technical,
            deadline: request.deadline,
            score: None,
            analysis: None,
        };
        state.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn update_status(
        &self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> ClientResult<Submission> {
        self.simulate_latency().await;
        if status == SubmissionStatus::Submitted {
            return Err(ClientError::ValidationFailed(
                "status: a submission cannot be moved back to SUBMITTED".into(),
            ));
        }
        let mut state = self.state.lock().await;
        let submission = state.submission_mut(id)?;
        submission.status = status;
        Ok(submission.clone())
    }

    async fn delete(&self, id: SubmissionId) -> ClientResult<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let status = state.submission_mut(id)?.status;
        if status.is_final() {
            return Err(ClientError::InvalidTransition(format!(
                "submission is already {status} and cannot be withdrawn"
            )));
        }
        state.submissions.retain(|submission| submission.id != id);
        Ok(())
    }

    async fn evaluate(&self, id: SubmissionId) -> ClientResult<Submission> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        let tender_id = state.submission_mut(id)?.tender_id;
        let criteria = state.tender(tender_id)?.criteria.clone();
        let submission = state.submission_mut(id)?;
        submission.score = Some(submission.weighted_score(&criteria));
        Ok(submission.clone())
    }

    async fn get_by_id(&self, id: SubmissionId) -> ClientResult<Submission> {
        self.simulate_latency().await;
        self.state.lock().await.submission_mut(id).map(|s| s.clone())
    }

    async fn list_by_tender(&self, tender_id: TenderId) -> ClientResult<Vec<Submission>> {
        Ok(self.list_submissions(|s| s.tender_id == tender_id).await)
    }

    async fn list_by_supplier(&self, supplier_id: UserId) -> ClientResult<Vec<Submission>> {
        Ok(self.list_submissions(|s| s.supplier_id == supplier_id).await)
    }

    async fn list_all(&self) -> ClientResult<Vec<Submission>> {
        Ok(self.list_submissions(|_| true).await)
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
