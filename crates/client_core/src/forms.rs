//! Client-side form rules. A form that fails here never reaches a registry.

use chrono::NaiveDate;
use shared::{
    domain::{CriterionType, OrganizationId, TenderId, UserId},
    protocol::{CriterionRequest, LoginRequest, SubmissionRequest, TenderRequest},
    validation::{
        require_min_len, validate_submission_request, validate_tender_request, ValidationError,
        MAX_COMPONENT_SCORE, MIN_DESCRIPTION_LEN, MIN_TITLE_LEN, TOTAL_CRITERIA_WEIGHT,
    },
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, ValidationError> {
        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if email.is_empty() {
            return Err(ValidationError::new("email", "is required"));
        }
        if !well_formed {
            return Err(ValidationError::new("email", "is not a valid address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        Ok(LoginRequest {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

/// Owner tender-creation form. Criteria are always PRICE, TECHNICAL and
/// DEADLINE in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenderForm {
    pub title: String,
    pub description: String,
    pub deadline: Option<NaiveDate>,
    pub price_weight: u32,
    pub technical_weight: u32,
    pub delivery_weight: u32,
}

impl Default for TenderForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            deadline: None,
            price_weight: 40,
            technical_weight: 35,
            delivery_weight: 25,
        }
    }
}

impl TenderForm {
    pub fn total_weight(&self) -> u32 {
        self.price_weight + self.technical_weight + self.delivery_weight
    }

    pub fn validate(
        &self,
        organization_id: OrganizationId,
        owner_user_id: UserId,
    ) -> Result<TenderRequest, ValidationError> {
        require_min_len("title", &self.title, MIN_TITLE_LEN)?;
        require_min_len("description", &self.description, MIN_DESCRIPTION_LEN)?;
        let deadline = self
            .deadline
            .ok_or_else(|| ValidationError::new("deadline", "is required"))?;

        for (field, weight) in [
            ("priceWeight", self.price_weight),
            ("technicalWeight", self.technical_weight),
            ("deliveryWeight", self.delivery_weight),
        ] {
            if !(1..=TOTAL_CRITERIA_WEIGHT).contains(&weight) {
                return Err(ValidationError::new(
                    field,
                    format!("must be between 1 and {TOTAL_CRITERIA_WEIGHT}"),
                ));
            }
        }
        if self.total_weight() != TOTAL_CRITERIA_WEIGHT {
            return Err(ValidationError::new(
                "criteria",
                format!(
                    "weights must sum to {TOTAL_CRITERIA_WEIGHT}, got {}",
                    self.total_weight()
                ),
            ));
        }

        let request = TenderRequest {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            organization_id,
            owner_user_id,
            deadline,
            criteria: vec![
                CriterionRequest {
                    criterion_type: CriterionType::Price,
                    weight: self.price_weight,
                },
                CriterionRequest {
                    criterion_type: CriterionType::Technical,
                    weight: self.technical_weight,
                },
                CriterionRequest {
                    criterion_type: CriterionType::Deadline,
                    weight: self.delivery_weight,
                },
            ],
        };
        validate_tender_request(&request)?;
        Ok(request)
    }
}

/// Supplier bid form. The description is checked but not transmitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BidForm {
    pub price: Option<f64>,
    pub technical: Option<f64>,
    pub deadline: Option<f64>,
    pub description: String,
}

impl BidForm {
    pub fn validate(
        &self,
        tender_id: TenderId,
        supplier_id: UserId,
    ) -> Result<SubmissionRequest, ValidationError> {
        let price = self
            .price
            .ok_or_else(|| ValidationError::new("price", "is required"))?;
        if !price.is_finite() || price < 0.0 {
            return Err(ValidationError::new("price", "minimum value is 0"));
        }
        let technical = score_field("technical", self.technical)?;
        let deadline = score_field("deadline", self.deadline)?;
        require_min_len("description", &self.description, MIN_DESCRIPTION_LEN)?;

        let request = SubmissionRequest {
            tender_id,
            supplier_id,
            price,
            technical,
            deadline,
            document_id: None,
        };
        validate_submission_request(&request)?;
        Ok(request)
    }
}

fn score_field(field: &'static str, value: Option<f64>) -> Result<f64, ValidationError> {
    let value = value.ok_or_else(|| ValidationError::new(field, "is required"))?;
    if !value.is_finite() || !(0.0..=MAX_COMPONENT_SCORE).contains(&value) {
        return Err(ValidationError::new(
            field,
            format!("must be between 0 and {MAX_COMPONENT_SCORE}"),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_tender() -> TenderForm {
        TenderForm {
            title: "Road resurfacing".into(),
            description: "Resurfacing of the northern ring road, 12km".into(),
            deadline: NaiveDate::from_ymd_opt(2030, 6, 30),
            ..TenderForm::default()
        }
    }

    #[test]
    fn default_weights_produce_ordered_criteria() {
        let request = filled_tender()
            .validate(OrganizationId(1), UserId(7))
            .expect("valid form");
        let criteria: Vec<_> = request
            .criteria
            .iter()
            .map(|c| (c.criterion_type, c.weight))
            .collect();
        assert_eq!(
            criteria,
            vec![
                (CriterionType::Price, 40),
                (CriterionType::Technical, 35),
                (CriterionType::Deadline, 25)
            ]
        );
        assert_eq!(request.owner_user_id, UserId(7));
    }

    #[test]
    fn weights_not_summing_to_hundred_are_rejected() {
        let form = TenderForm {
            price_weight: 50,
            ..filled_tender()
        };
        let err = form
            .validate(OrganizationId(1), UserId(7))
            .expect_err("sum is 110");
        assert_eq!(err.field, "criteria");
    }

    #[test]
    fn short_title_and_missing_deadline_are_rejected() {
        let short = TenderForm {
            title: "Road".into(),
            ..filled_tender()
        };
        assert_eq!(
            short.validate(OrganizationId(1), UserId(7)).expect_err("short").field,
            "title"
        );

        let undated = TenderForm {
            deadline: None,
            ..filled_tender()
        };
        assert_eq!(
            undated
                .validate(OrganizationId(1), UserId(7))
                .expect_err("no deadline")
                .field,
            "deadline"
        );
    }

    #[test]
    fn bid_scores_are_bounded() {
        let mut bid = BidForm {
            price: Some(120_000.0),
            technical: Some(80.0),
            deadline: Some(90.0),
            description: "Experienced crew with local references".into(),
        };
        assert!(bid.validate(TenderId(1), UserId(2)).is_ok());

        bid.technical = Some(101.0);
        assert_eq!(
            bid.validate(TenderId(1), UserId(2)).expect_err("too high").field,
            "technical"
        );

        bid.technical = Some(80.0);
        bid.price = Some(-1.0);
        assert_eq!(
            bid.validate(TenderId(1), UserId(2)).expect_err("negative").field,
            "price"
        );
    }

    #[test]
    fn login_form_checks_email_and_password() {
        let form = LoginForm {
            email: " owner@city.gov ".into(),
            password: "secret1".into(),
        };
        assert_eq!(form.validate().expect("valid").email, "owner@city.gov");

        let bad_email = LoginForm {
            email: "owner".into(),
            ..form.clone()
        };
        assert_eq!(bad_email.validate().expect_err("email").field, "email");

        let short = LoginForm {
            password: "123".into(),
            ..form
        };
        assert_eq!(short.validate().expect_err("password").field, "password");
    }
}
