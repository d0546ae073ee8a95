use std::sync::Arc;

use chrono::NaiveDate;
use shared::domain::{Submission, SubmissionId, Tender, TenderId, TenderStatus, UserId};
use tracing::info;

use super::failure;
use crate::{
    error::{ClientError, ClientResult},
    forms::BidForm,
    registry::{SubmissionRegistry, TenderRegistry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierView {
    Opportunities,
    MySubmissions,
    Details,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Urgent,
    Warning,
    Normal,
}

/// Whole days from `today` until `deadline`, never negative.
pub fn days_remaining(deadline: NaiveDate, today: NaiveDate) -> i64 {
    (deadline - today).num_days().max(0)
}

pub fn urgency(days: i64) -> Urgency {
    match days {
        ..=7 => Urgency::Urgent,
        ..=14 => Urgency::Warning,
        _ => Urgency::Normal,
    }
}

/// Supplier screen: open tenders, the supplier's own bids and the detail of
/// one tender.
pub struct SupplierDashboard {
    tenders: Arc<dyn TenderRegistry>,
    submissions: Arc<dyn SubmissionRegistry>,
    supplier_id: UserId,
    view: SupplierView,
    opportunities: Vec<Tender>,
    own: Vec<Submission>,
    selected: Option<Tender>,
    error: Option<String>,
}

impl SupplierDashboard {
    pub fn new(
        tenders: Arc<dyn TenderRegistry>,
        submissions: Arc<dyn SubmissionRegistry>,
        supplier_id: UserId,
    ) -> Self {
        Self {
            tenders,
            submissions,
            supplier_id,
            view: SupplierView::Opportunities,
            opportunities: Vec::new(),
            own: Vec::new(),
            selected: None,
            error: None,
        }
    }

    pub fn view(&self) -> SupplierView {
        self.view
    }

    pub fn opportunities(&self) -> &[Tender] {
        &self.opportunities
    }

    pub fn my_submissions(&self) -> &[Submission] {
        &self.own
    }

    pub fn selected(&self) -> Option<&Tender> {
        self.selected.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Lists every published tender.
    pub async fn load_opportunities(&mut self) {
        self.view = SupplierView::Opportunities;
        self.error = None;
        match self.tenders.list_all().await {
            Ok(tenders) => {
                self.opportunities = tenders
                    .into_iter()
                    .filter(|t| t.status == TenderStatus::Published)
                    .collect();
            }
            Err(err) => self.error = Some(failure("list tenders", &err)),
        }
    }

    pub async fn show_my_submissions(&mut self) {
        self.view = SupplierView::MySubmissions;
        self.error = None;
        match self.submissions.list_by_supplier(self.supplier_id).await {
            Ok(submissions) => self.own = submissions,
            Err(err) => self.error = Some(failure("list supplier submissions", &err)),
        }
    }

    pub async fn view_details(&mut self, id: TenderId) {
        self.view = SupplierView::Details;
        self.error = None;
        match self.tenders.get(id).await {
            Ok(tender) => self.selected = Some(tender),
            Err(err) => {
                self.selected = None;
                self.error = Some(failure("get tender", &err));
            }
        }
    }

    /// Validates the bid locally before anything is sent.
    pub async fn submit_bid(
        &mut self,
        tender_id: TenderId,
        form: &BidForm,
    ) -> ClientResult<Submission> {
        self.error = None;
        let request = match form.validate(tender_id, self.supplier_id) {
            Ok(request) => request,
            Err(err) => {
                let err = ClientError::from(err);
                self.error = Some(err.to_string());
                return Err(err);
            }
        };

        match self.submissions.create(request).await {
            Ok(submission) => {
                info!(submission_id = %submission.id, %tender_id, "bid submitted");
                Ok(submission)
            }
            Err(err) => {
                self.error = Some(failure("submit bid", &err));
                Err(err)
            }
        }
    }

    pub async fn withdraw(&mut self, id: SubmissionId) -> ClientResult<()> {
        match self.submissions.delete(id).await {
            Ok(()) => {
                info!(submission_id = %id, "bid withdrawn");
                self.show_my_submissions().await;
                Ok(())
            }
            Err(err) => {
                self.error = Some(failure("withdraw bid", &err));
                Err(err)
            }
        }
    }
}
