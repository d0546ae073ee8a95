use thiserror::Error;

use crate::protocol::{CriterionRequest, SubmissionRequest, TenderRequest};

pub const TOTAL_CRITERIA_WEIGHT: u32 = 100;
pub const MAX_COMPONENT_SCORE: f64 = 100.0;
pub const MIN_TITLE_LEN: usize = 5;
pub const MIN_DESCRIPTION_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Trimmed length check; blank values report as missing.
pub fn require_min_len(
    field: &'static str,
    value: &str,
    min: usize,
) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(ValidationError::new(field, "is required"));
    }
    if len < min {
        return Err(ValidationError::new(
            field,
            format!("must be at least {min} characters"),
        ));
    }
    Ok(())
}

pub fn validate_criteria(criteria: &[CriterionRequest]) -> Result<(), ValidationError> {
    if criteria.is_empty() {
        return Err(ValidationError::new(
            "criteria",
            "at least one evaluation criterion is required",
        ));
    }
    if let Some(bad) = criteria
        .iter()
        .find(|criterion| criterion.weight == 0 || criterion.weight > TOTAL_CRITERIA_WEIGHT)
    {
        return Err(ValidationError::new(
            "criteria",
            format!(
                "weight of {} must be between 1 and {TOTAL_CRITERIA_WEIGHT}",
                bad.criterion_type
            ),
        ));
    }
    if let Some((index, repeated)) = criteria.iter().enumerate().find(|(index, criterion)| {
        criteria[..*index]
            .iter()
            .any(|earlier| earlier.criterion_type == criterion.criterion_type)
    }) {
        return Err(ValidationError::new(
            "criteria",
            format!(
                "{} appears more than once (position {})",
                repeated.criterion_type,
                index + 1
            ),
        ));
    }
    let total: u32 = criteria.iter().map(|criterion| criterion.weight).sum();
    if total != TOTAL_CRITERIA_WEIGHT {
        return Err(ValidationError::new(
            "criteria",
            format!("weights must sum to {TOTAL_CRITERIA_WEIGHT} (got {total})"),
        ));
    }
    Ok(())
}

pub fn validate_tender_request(request: &TenderRequest) -> Result<(), ValidationError> {
    require_min_len("title", &request.title, MIN_TITLE_LEN)?;
    require_min_len("description", &request.description, MIN_DESCRIPTION_LEN)?;
    validate_criteria(&request.criteria)
}

pub fn validate_submission_request(request: &SubmissionRequest) -> Result<(), ValidationError> {
    if !request.price.is_finite() || request.price < 0.0 {
        return Err(ValidationError::new("price", "price must be zero or more"));
    }
    for (field, value) in [
        ("technical", request.technical),
        ("deadline", request.deadline),
    ] {
        if !(0.0..=MAX_COMPONENT_SCORE).contains(&value) {
            return Err(ValidationError::new(
                field,
                format!("{field} score must be between 0 and {MAX_COMPONENT_SCORE}"),
            ));
        }
    }
    Ok(())
}
