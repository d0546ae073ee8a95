use std::collections::HashSet;

use chrono::Utc;
use shared::{
    domain::{
        EvaluationCriterion, Identity, Role, Submission, SubmissionId, SubmissionStatus, Tender,
        TenderId, TenderStatus, TenderTransition, UserId,
    },
    error::{ApiError, ErrorCode},
    protocol::{LoginRequest, ServerEvent, SubmissionRequest, TenderRequest},
    validation::{validate_submission_request, validate_tender_request},
};
use storage::{Storage, StoredDocument, SubmissionFilter, TenderFilter};
use tracing::info;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

/// The authenticated principal behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub async fn authenticate(ctx: &ApiContext, request: &LoginRequest) -> Result<Identity, ApiError> {
    let user = ctx
        .storage
        .find_user_by_email(&request.email)
        .await
        .map_err(internal)?;
    match user {
        Some(user) if user.verify_password(&request.password) => Ok(user.identity),
        _ => Err(ApiError::new(
            ErrorCode::InvalidCredentials,
            "invalid email or password",
        )),
    }
}

pub async fn current_user(ctx: &ApiContext, caller: Caller) -> Result<Identity, ApiError> {
    ctx.storage
        .user_by_id(caller.user_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("user"))
}

pub async fn create_tender(
    ctx: &ApiContext,
    caller: Caller,
    request: &TenderRequest,
    documents: Vec<DocumentUpload>,
) -> Result<Tender, ApiError> {
    require_role(caller, Role::Owner)?;
    if request.owner_user_id != caller.user_id {
        return Err(ApiError::forbidden("tenders can only be created for yourself"));
    }
    validate_tender_request(request)?;

    let tender_id = ctx.storage.insert_tender(request).await.map_err(internal)?;
    for document in documents {
        ctx.storage
            .store_tender_document(
                tender_id,
                &document.file_name,
                &document.content_type,
                &document.bytes,
            )
            .await
            .map_err(internal)?;
    }
    info!(%tender_id, owner = %caller.user_id, "tender created");
    get_tender(ctx, tender_id).await
}

pub async fn update_tender(
    ctx: &ApiContext,
    caller: Caller,
    tender_id: TenderId,
    request: &TenderRequest,
) -> Result<Tender, ApiError> {
    owned_tender(ctx, caller, tender_id).await?;
    if request.owner_user_id != caller.user_id {
        return Err(ApiError::forbidden("tender ownership cannot be transferred"));
    }
    validate_tender_request(request)?;

    if !ctx
        .storage
        .replace_tender(tender_id, request)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::not_found(format!("tender {tender_id}")));
    }
    info!(%tender_id, "tender updated");
    get_tender(ctx, tender_id).await
}

pub async fn publish_tender(
    ctx: &ApiContext,
    caller: Caller,
    tender_id: TenderId,
) -> Result<(Tender, ServerEvent), ApiError> {
    let tender = transition_tender(ctx, caller, tender_id, TenderTransition::Publish).await?;
    let event = ServerEvent::TenderPublished {
        tender_id: tender.id,
        title: tender.title.clone(),
        owner_user_id: tender.owner_user_id,
    };
    Ok((tender, event))
}

pub async fn close_tender(
    ctx: &ApiContext,
    caller: Caller,
    tender_id: TenderId,
) -> Result<Tender, ApiError> {
    transition_tender(ctx, caller, tender_id, TenderTransition::Close).await
}

pub async fn delete_tender(
    ctx: &ApiContext,
    caller: Caller,
    tender_id: TenderId,
) -> Result<(), ApiError> {
    owned_tender(ctx, caller, tender_id).await?;
    if !ctx.storage.delete_tender(tender_id).await.map_err(internal)? {
        return Err(ApiError::not_found(format!("tender {tender_id}")));
    }
    info!(%tender_id, "tender deleted");
    Ok(())
}

pub async fn get_tender(ctx: &ApiContext, tender_id: TenderId) -> Result<Tender, ApiError> {
    ctx.storage
        .load_tender(tender_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("tender {tender_id}")))
}

pub async fn list_tenders(ctx: &ApiContext, filter: TenderFilter) -> Result<Vec<Tender>, ApiError> {
    ctx.storage.list_tenders(filter).await.map_err(internal)
}

pub async fn tender_criteria(
    ctx: &ApiContext,
    tender_id: TenderId,
) -> Result<Vec<EvaluationCriterion>, ApiError> {
    // unknown tenders are a 404, not an empty list
    get_tender(ctx, tender_id).await.map(|tender| tender.criteria)
}

pub async fn tender_document(
    ctx: &ApiContext,
    document_id: &str,
) -> Result<StoredDocument, ApiError> {
    ctx.storage
        .load_tender_document(document_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("document {document_id}")))
}

pub async fn create_submission(
    ctx: &ApiContext,
    caller: Caller,
    request: &SubmissionRequest,
) -> Result<(Submission, ServerEvent), ApiError> {
    require_role(caller, Role::Supplier)?;
    if request.supplier_id != caller.user_id {
        return Err(ApiError::forbidden("bids can only be submitted for yourself"));
    }
    validate_submission_request(request)?;

    let tender = get_tender(ctx, request.tender_id).await?;
    if tender.status != TenderStatus::Published {
        return Err(ApiError::new(
            ErrorCode::InvalidTransition,
            format!(
                "tender {} is {} and does not accept submissions",
                tender.id, tender.status
            ),
        ));
    }

    let submission = ctx
        .storage
        .insert_submission(request)
        .await
        .map_err(internal)?;
    info!(submission_id = %submission.id, tender_id = %tender.id, supplier = %caller.user_id, "submission received");
    let event = ServerEvent::SubmissionReceived {
        tender_id: tender.id,
        submission_id: submission.id,
        supplier_id: submission.supplier_id,
        owner_user_id: tender.owner_user_id,
    };
    Ok((submission, event))
}

/// Any target other than SUBMITTED is accepted regardless of the prior
/// status. Accepting or rejecting yields a notification for the supplier.
pub async fn update_submission_status(
    ctx: &ApiContext,
    caller: Caller,
    submission_id: SubmissionId,
    status: SubmissionStatus,
) -> Result<(Submission, Option<ServerEvent>), ApiError> {
    if status == SubmissionStatus::Submitted {
        return Err(ApiError::validation(
            "status: a submission cannot be moved back to SUBMITTED",
        ));
    }
    let mut submission = load_submission(ctx, submission_id).await?;
    owned_tender(ctx, caller, submission.tender_id).await?;

    if !ctx
        .storage
        .set_submission_status(submission_id, status)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::not_found(format!("submission {submission_id}")));
    }
    info!(%submission_id, from = %submission.status, to = %status, "submission status changed");
    submission.status = status;

    let event = match status {
        SubmissionStatus::Accepted => Some(ServerEvent::SubmissionAccepted {
            tender_id: submission.tender_id,
            submission_id,
            supplier_id: submission.supplier_id,
        }),
        SubmissionStatus::Rejected => Some(ServerEvent::SubmissionRejected {
            tender_id: submission.tender_id,
            submission_id,
            supplier_id: submission.supplier_id,
        }),
        SubmissionStatus::Submitted | SubmissionStatus::InEvaluation => None,
    };
    Ok((submission, event))
}

pub async fn evaluate_submission(
    ctx: &ApiContext,
    caller: Caller,
    submission_id: SubmissionId,
) -> Result<Submission, ApiError> {
    let mut submission = load_submission(ctx, submission_id).await?;
    let tender = owned_tender(ctx, caller, submission.tender_id).await?;

    let score = submission.weighted_score(&tender.criteria);
    ctx.storage
        .set_submission_score(submission_id, score)
        .await
        .map_err(internal)?;
    info!(%submission_id, score, "submission evaluated");
    submission.score = Some(score);
    Ok(submission)
}

pub async fn withdraw_submission(
    ctx: &ApiContext,
    caller: Caller,
    submission_id: SubmissionId,
) -> Result<(), ApiError> {
    let submission = load_submission(ctx, submission_id).await?;
    if caller.role != Role::Supplier || submission.supplier_id != caller.user_id {
        return Err(ApiError::forbidden(
            "only the submitting supplier can withdraw a bid",
        ));
    }
    if submission.status.is_final() {
        return Err(ApiError::new(
            ErrorCode::InvalidTransition,
            format!("submission is already {} and cannot be withdrawn", submission.status),
        ));
    }
    ctx.storage
        .delete_submission(submission_id)
        .await
        .map_err(internal)?;
    info!(%submission_id, "submission withdrawn");
    Ok(())
}

pub async fn get_submission(
    ctx: &ApiContext,
    caller: Caller,
    submission_id: SubmissionId,
) -> Result<Submission, ApiError> {
    let submission = load_submission(ctx, submission_id).await?;
    let visible = visible_submissions(ctx, caller, vec![submission]).await?;
    visible
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::forbidden("submission belongs to another party"))
}

/// Lists submissions, narrowed to what the caller may see: suppliers see
/// their own bids, owners see bids on their tenders, admins see everything.
pub async fn list_submissions(
    ctx: &ApiContext,
    caller: Caller,
    filter: SubmissionFilter,
) -> Result<Vec<Submission>, ApiError> {
    let submissions = ctx
        .storage
        .list_submissions(filter)
        .await
        .map_err(internal)?;
    visible_submissions(ctx, caller, submissions).await
}

async fn visible_submissions(
    ctx: &ApiContext,
    caller: Caller,
    submissions: Vec<Submission>,
) -> Result<Vec<Submission>, ApiError> {
    match caller.role {
        Role::Admin => Ok(submissions),
        Role::Supplier => Ok(submissions
            .into_iter()
            .filter(|submission| submission.supplier_id == caller.user_id)
            .collect()),
        Role::Owner => {
            let owned: HashSet<TenderId> = ctx
                .storage
                .list_tenders(TenderFilter::Owner(caller.user_id))
                .await
                .map_err(internal)?
                .into_iter()
                .map(|tender| tender.id)
                .collect();
            Ok(submissions
                .into_iter()
                .filter(|submission| owned.contains(&submission.tender_id))
                .collect())
        }
    }
}

async fn transition_tender(
    ctx: &ApiContext,
    caller: Caller,
    tender_id: TenderId,
    transition: TenderTransition,
) -> Result<Tender, ApiError> {
    let mut tender = owned_tender(ctx, caller, tender_id).await?;
    let next = transition.apply(tender.status)?;
    let publication_date = (transition == TenderTransition::Publish).then(Utc::now);

    ctx.storage
        .set_tender_status(tender_id, next, publication_date)
        .await
        .map_err(internal)?;
    info!(%tender_id, from = %tender.status, to = %next, "tender status changed");
    tender.status = next;
    if publication_date.is_some() {
        tender.publication_date = publication_date;
    }
    Ok(tender)
}

async fn owned_tender(
    ctx: &ApiContext,
    caller: Caller,
    tender_id: TenderId,
) -> Result<Tender, ApiError> {
    require_role(caller, Role::Owner)?;
    let tender = get_tender(ctx, tender_id).await?;
    if tender.owner_user_id != caller.user_id {
        return Err(ApiError::forbidden("tender belongs to another owner"));
    }
    Ok(tender)
}

async fn load_submission(
    ctx: &ApiContext,
    submission_id: SubmissionId,
) -> Result<Submission, ApiError> {
    ctx.storage
        .load_submission(submission_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("submission {submission_id}")))
}

fn require_role(caller: Caller, role: Role) -> Result<(), ApiError> {
    if caller.role == role {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("requires role {role}")))
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
