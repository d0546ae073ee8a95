use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(TenderId);
id_newtype!(OrganizationId);
id_newtype!(CriterionId);
id_newtype!(DocumentRefId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub Uuid);

impl SubmissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubmissionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $wire:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($wire $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Owner,
    Supplier,
}

wire_enum!(Role, "role", {
    Admin => "ADMIN",
    Owner => "OWNER",
    Supplier => "SUPPLIER",
});

impl Role {
    /// Path of the dashboard a user with this role lands on.
    pub fn dashboard_path(self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Owner => "/owner",
            Self::Supplier => "/supplier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenderStatus {
    Draft,
    Published,
    Closed,
    Cancelled,
}

wire_enum!(TenderStatus, "tender status", {
    Draft => "DRAFT",
    Published => "PUBLISHED",
    Closed => "CLOSED",
    Cancelled => "CANCELLED",
});

impl TenderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}

/// Owner-initiated lifecycle moves. Each one is legal from exactly one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenderTransition {
    Publish,
    Close,
}

impl TenderTransition {
    pub fn required_status(self) -> TenderStatus {
        match self {
            Self::Publish => TenderStatus::Draft,
            Self::Close => TenderStatus::Published,
        }
    }

    pub fn target_status(self) -> TenderStatus {
        match self {
            Self::Publish => TenderStatus::Published,
            Self::Close => TenderStatus::Closed,
        }
    }

    pub fn apply(self, current: TenderStatus) -> Result<TenderStatus, InvalidTransition> {
        if current == self.required_status() {
            Ok(self.target_status())
        } else {
            Err(InvalidTransition {
                transition: self,
                from: current,
            })
        }
    }
}

impl fmt::Display for TenderTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish => f.write_str("publish"),
            Self::Close => f.write_str("close"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {transition} a tender in status {from} (expected {})", .transition.required_status())]
pub struct InvalidTransition {
    pub transition: TenderTransition,
    pub from: TenderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriterionType {
    Price,
    #[serde(alias = "TECHNICAL_QUALITY")]
    Technical,
    #[serde(alias = "DELIVERY_TIME")]
    Deadline,
    Experience,
    Quality,
}

wire_enum!(CriterionType, "criterion type", {
    Price => "PRICE",
    Technical => "TECHNICAL" | "TECHNICAL_QUALITY",
    Deadline => "DEADLINE" | "DELIVERY_TIME",
    Experience => "EXPERIENCE",
    Quality => "QUALITY",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Submitted,
    InEvaluation,
    Accepted,
    Rejected,
}

wire_enum!(SubmissionStatus, "submission status", {
    Submitted => "SUBMITTED",
    InEvaluation => "IN_EVALUATION",
    Accepted => "ACCEPTED",
    Rejected => "REJECTED",
});

impl SubmissionStatus {
    /// Accepted and rejected bids can no longer be withdrawn.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationCriterion {
    pub id: CriterionId,
    #[serde(rename = "type")]
    pub criterion_type: CriterionType,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderDocumentRef {
    pub id: DocumentRefId,
    pub document_id: String,
    pub file_name: String,
    pub content_type: String,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tender {
    pub id: TenderId,
    pub title: String,
    pub description: String,
    pub organization_id: OrganizationId,
    pub owner_user_id: UserId,
    pub status: TenderStatus,
    #[serde(default)]
    pub publication_date: Option<DateTime<Utc>>,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub criteria: Vec<EvaluationCriterion>,
    #[serde(default)]
    pub documents: Vec<TenderDocumentRef>,
}

impl Tender {
    pub fn total_weight(&self) -> u32 {
        self.criteria.iter().map(|criterion| criterion.weight).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub tender_id: TenderId,
    pub supplier_id: UserId,
    #[serde(default)]
    pub document_id: Option<String>,
    pub status: SubmissionStatus,
    pub price: f64,
    pub technical: f64,
    pub deadline: f64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub analysis: Option<String>,
}

impl Submission {
    /// Weighted sum of the bid components. PRICE weighs the price, TECHNICAL
    /// the technical score and DEADLINE the delivery score; other criterion
    /// types carry no bid component and contribute nothing.
    pub fn weighted_score(&self, criteria: &[EvaluationCriterion]) -> f64 {
        criteria
            .iter()
            .map(|criterion| {
                let component = match criterion.criterion_type {
                    CriterionType::Price => self.price,
                    CriterionType::Technical => self.technical,
                    CriterionType::Deadline => self.deadline,
                    CriterionType::Experience | CriterionType::Quality => 0.0,
                };
                f64::from(criterion.weight) / 100.0 * component
            })
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl Identity {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}
