use std::sync::Arc;

use shared::domain::{Submission, SubmissionStatus, Tender, TenderStatus};

use super::failure;
use crate::registry::{SubmissionRegistry, TenderRegistry};

/// Platform overview: everything, counted by status.
pub struct AdminDashboard {
    tenders: Arc<dyn TenderRegistry>,
    submissions: Arc<dyn SubmissionRegistry>,
    all_tenders: Vec<Tender>,
    all_submissions: Vec<Submission>,
    error: Option<String>,
}

impl AdminDashboard {
    pub fn new(tenders: Arc<dyn TenderRegistry>, submissions: Arc<dyn SubmissionRegistry>) -> Self {
        Self {
            tenders,
            submissions,
            all_tenders: Vec::new(),
            all_submissions: Vec::new(),
            error: None,
        }
    }

    pub async fn load(&mut self) {
        self.error = None;
        match self.tenders.list_all().await {
            Ok(tenders) => self.all_tenders = tenders,
            Err(err) => self.error = Some(failure("list tenders", &err)),
        }
        match self.submissions.list_all().await {
            Ok(submissions) => self.all_submissions = submissions,
            Err(err) => self.error = Some(failure("list submissions", &err)),
        }
    }

    pub fn tenders(&self) -> &[Tender] {
        &self.all_tenders
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.all_submissions
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn tender_count(&self, status: TenderStatus) -> usize {
        self.all_tenders.iter().filter(|t| t.status == status).count()
    }

    pub fn submission_count(&self, status: SubmissionStatus) -> usize {
        self.all_submissions
            .iter()
            .filter(|s| s.status == status)
            .count()
    }
}
