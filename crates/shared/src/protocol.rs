use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CriterionType, Identity, OrganizationId, Role, SubmissionId, SubmissionStatus, TenderId,
    UserId,
};

pub const TENDERS_PATH: &str = "/api/v1/tenders";
pub const SUBMISSIONS_PATH: &str = "/api/submissions";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const CURRENT_USER_PATH: &str = "/api/users/me";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Identity,
}

/// Claims carried by bearer tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl TokenClaims {
    pub fn user_id(&self) -> Option<UserId> {
        self.sub.parse().ok()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp < now.timestamp()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionRequest {
    #[serde(rename = "type")]
    pub criterion_type: CriterionType,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderRequest {
    pub title: String,
    pub description: String,
    pub organization_id: OrganizationId,
    pub owner_user_id: UserId,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub criteria: Vec<CriterionRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub tender_id: TenderId,
    pub supplier_id: UserId,
    pub price: f64,
    pub technical: f64,
    pub deadline: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: SubmissionStatus,
}

/// Notification events fanned out to `/ws` subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    TenderPublished {
        tender_id: TenderId,
        title: String,
        owner_user_id: UserId,
    },
    SubmissionReceived {
        tender_id: TenderId,
        submission_id: SubmissionId,
        supplier_id: UserId,
        owner_user_id: UserId,
    },
    SubmissionAccepted {
        tender_id: TenderId,
        submission_id: SubmissionId,
        supplier_id: UserId,
    },
    SubmissionRejected {
        tender_id: TenderId,
        submission_id: SubmissionId,
        supplier_id: UserId,
    },
}

impl ServerEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::TenderPublished { .. } => "New Tender Published",
            Self::SubmissionReceived { .. } => "Submission Received",
            Self::SubmissionAccepted { .. } => "Submission Accepted",
            Self::SubmissionRejected { .. } => "Submission Rejected",
        }
    }

    /// The user the event is addressed to.
    pub fn recipient(&self) -> UserId {
        match self {
            Self::TenderPublished { owner_user_id, .. }
            | Self::SubmissionReceived { owner_user_id, .. } => *owner_user_id,
            Self::SubmissionAccepted { supplier_id, .. }
            | Self::SubmissionRejected { supplier_id, .. } => *supplier_id,
        }
    }
}
