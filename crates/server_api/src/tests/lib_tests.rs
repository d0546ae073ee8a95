use chrono::NaiveDate;
use shared::{
    domain::{CriterionType, OrganizationId},
    protocol::CriterionRequest,
};
use storage::NewUser;

use super::*;

struct Fixture {
    ctx: ApiContext,
    owner: Caller,
    other_owner: Caller,
    supplier: Caller,
    admin: Caller,
}

async fn add_user(storage: &Storage, email: &str, role: Role) -> Caller {
    let user_id = storage
        .create_user(&NewUser {
            email: email.into(),
            first_name: "Test".into(),
            last_name: role.to_string(),
            role,
            password: "password".into(),
        })
        .await
        .expect("user");
    Caller { user_id, role }
}

async fn setup() -> Fixture {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = add_user(&storage, "owner@example.com", Role::Owner).await;
    let other_owner = add_user(&storage, "owner2@example.com", Role::Owner).await;
    let supplier = add_user(&storage, "supplier@example.com", Role::Supplier).await;
    let admin = add_user(&storage, "admin@example.com", Role::Admin).await;
    Fixture {
        ctx: ApiContext { storage },
        owner,
        other_owner,
        supplier,
        admin,
    }
}

fn tender_request(owner: UserId, weights: [u32; 3]) -> TenderRequest {
    TenderRequest {
        title: "School catering".into(),
        description: "Daily catering for three primary schools".into(),
        organization_id: OrganizationId(1),
        owner_user_id: owner,
        deadline: NaiveDate::from_ymd_opt(2031, 3, 1).expect("date"),
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
    }
}

fn bid(tender_id: TenderId, supplier: UserId) -> SubmissionRequest {
    SubmissionRequest {
        tender_id,
        supplier_id: supplier,
        price: 50.0,
        technical: 80.0,
        deadline: 60.0,
        document_id: None,
    }
}

async fn published_tender(f: &Fixture) -> Tender {
    let tender = create_tender(
        &f.ctx,
        f.owner,
        &tender_request(f.owner.user_id, [40, 35, 25]),
        Vec::new(),
    )
    .await
    .expect("create");
    publish_tender(&f.ctx, f.owner, tender.id)
        .await
        .expect("publish")
        .0
}

#[tokio::test]
async fn login_checks_password() {
    let f = setup().await;
    let identity = authenticate(
        &f.ctx,
        &LoginRequest {
            email: "supplier@example.com".into(),
            password: "password".into(),
        },
    )
    .await
    .expect("login");
    assert_eq!(identity.role, Role::Supplier);

    let err = authenticate(
        &f.ctx,
        &LoginRequest {
            email: "supplier@example.com".into(),
            password: "nope".into(),
        },
    )
    .await
    .expect_err("bad password");
    assert_eq!(err.code, ErrorCode::InvalidCredentials);
}

#[tokio::test]
async fn create_rejects_weights_not_summing_to_hundred() {
    let f = setup().await;
    let err = create_tender(
        &f.ctx,
        f.owner,
        &tender_request(f.owner.user_id, [40, 35, 30]),
        Vec::new(),
    )
    .await
    .expect_err("invalid weights");
    assert_eq!(err.code, ErrorCode::Validation);
    assert!(list_tenders(&f.ctx, TenderFilter::All)
        .await
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn only_owners_create_tenders_for_themselves() {
    let f = setup().await;
    let err = create_tender(
        &f.ctx,
        f.supplier,
        &tender_request(f.supplier.user_id, [40, 35, 25]),
        Vec::new(),
    )
    .await
    .expect_err("supplier");
    assert_eq!(err.code, ErrorCode::Forbidden);

    let err = create_tender(
        &f.ctx,
        f.owner,
        &tender_request(f.other_owner.user_id, [40, 35, 25]),
        Vec::new(),
    )
    .await
    .expect_err("someone else");
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[tokio::test]
async fn publish_then_close_follows_lifecycle() {
    let f = setup().await;
    let tender = create_tender(
        &f.ctx,
        f.owner,
        &tender_request(f.owner.user_id, [40, 35, 25]),
        vec![DocumentUpload {
            file_name: "terms.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: b"pdf".to_vec(),
        }],
    )
    .await
    .expect("create");
    assert_eq!(tender.status, TenderStatus::Draft);
    assert_eq!(tender.documents.len(), 1);

    let err = close_tender(&f.ctx, f.owner, tender.id)
        .await
        .expect_err("close draft");
    assert_eq!(err.code, ErrorCode::InvalidTransition);

    let (published, event) = publish_tender(&f.ctx, f.owner, tender.id)
        .await
        .expect("publish");
    assert_eq!(published.status, TenderStatus::Published);
    assert!(published.publication_date.is_some());
    assert_eq!(event.recipient(), f.owner.user_id);

    let err = publish_tender(&f.ctx, f.owner, tender.id)
        .await
        .expect_err("publish twice");
    assert_eq!(err.code, ErrorCode::InvalidTransition);

    let closed = close_tender(&f.ctx, f.owner, tender.id)
        .await
        .expect("close");
    assert_eq!(closed.status, TenderStatus::Closed);
    assert_eq!(
        get_tender(&f.ctx, tender.id).await.expect("get").status,
        TenderStatus::Closed
    );
}

#[tokio::test]
async fn other_owner_cannot_touch_tender() {
    let f = setup().await;
    let tender = published_tender(&f).await;
    let err = close_tender(&f.ctx, f.other_owner, tender.id)
        .await
        .expect_err("foreign owner");
    assert_eq!(err.code, ErrorCode::Forbidden);
    let err = delete_tender(&f.ctx, f.other_owner, tender.id)
        .await
        .expect_err("foreign owner");
    assert_eq!(err.code, ErrorCode::Forbidden);
}

#[tokio::test]
async fn update_replaces_fields_and_unknown_id_is_not_found() {
    let f = setup().await;
    let tender = published_tender(&f).await;
    let mut changed = tender_request(f.owner.user_id, [50, 25, 25]);
    changed.title = "School catering 2031".into();
    let updated = update_tender(&f.ctx, f.owner, tender.id, &changed)
        .await
        .expect("update");
    assert_eq!(updated.title, "School catering 2031");
    assert_eq!(updated.status, TenderStatus::Published);
    assert_eq!(updated.criteria[0].weight, 50);

    let err = update_tender(&f.ctx, f.owner, TenderId(404), &changed)
        .await
        .expect_err("missing");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn submissions_require_published_tender() {
    let f = setup().await;
    let draft = create_tender(
        &f.ctx,
        f.owner,
        &tender_request(f.owner.user_id, [40, 35, 25]),
        Vec::new(),
    )
    .await
    .expect("create");
    let err = create_submission(&f.ctx, f.supplier, &bid(draft.id, f.supplier.user_id))
        .await
        .expect_err("draft tender");
    assert_eq!(err.code, ErrorCode::InvalidTransition);

    let tender = published_tender(&f).await;
    let (submission, event) =
        create_submission(&f.ctx, f.supplier, &bid(tender.id, f.supplier.user_id))
            .await
            .expect("submit");
    assert_eq!(submission.status, SubmissionStatus::Submitted);
    assert!(submission.score.is_none());
    assert_eq!(event.recipient(), f.owner.user_id);
}

#[tokio::test]
async fn status_changes_belong_to_tender_owner() {
    let f = setup().await;
    let tender = published_tender(&f).await;
    let (submission, _) =
        create_submission(&f.ctx, f.supplier, &bid(tender.id, f.supplier.user_id))
            .await
            .expect("submit");

    let err = update_submission_status(
        &f.ctx,
        f.supplier,
        submission.id,
        SubmissionStatus::Accepted,
    )
    .await
    .expect_err("supplier cannot decide");
    assert_eq!(err.code, ErrorCode::Forbidden);

    let err = update_submission_status(
        &f.ctx,
        f.owner,
        submission.id,
        SubmissionStatus::Submitted,
    )
    .await
    .expect_err("back to submitted");
    assert_eq!(err.code, ErrorCode::Validation);

    let (rejected, event) = update_submission_status(
        &f.ctx,
        f.owner,
        submission.id,
        SubmissionStatus::Rejected,
    )
    .await
    .expect("reject");
    assert_eq!(rejected.status, SubmissionStatus::Rejected);
    assert!(matches!(
        event,
        Some(ServerEvent::SubmissionRejected { supplier_id, .. }) if supplier_id == f.supplier.user_id
    ));

    // no prior-state precondition: a rejected bid may still be accepted
    let (accepted, _) = update_submission_status(
        &f.ctx,
        f.owner,
        submission.id,
        SubmissionStatus::Accepted,
    )
    .await
    .expect("accept");
    assert_eq!(accepted.status, SubmissionStatus::Accepted);

    let err = withdraw_submission(&f.ctx, f.supplier, submission.id)
        .await
        .expect_err("final");
    assert_eq!(err.code, ErrorCode::InvalidTransition);
}

#[tokio::test]
async fn evaluation_applies_criteria_weights() {
    let f = setup().await;
    let tender = published_tender(&f).await;
    let (submission, _) =
        create_submission(&f.ctx, f.supplier, &bid(tender.id, f.supplier.user_id))
            .await
            .expect("submit");
    let evaluated = evaluate_submission(&f.ctx, f.owner, submission.id)
        .await
        .expect("evaluate");
    // 0.40 * 50 + 0.35 * 80 + 0.25 * 60
    let score = evaluated.score.expect("score");
    assert!((score - 63.0).abs() < 1e-9, "unexpected score {score}");
    assert_eq!(
        get_submission(&f.ctx, f.owner, submission.id)
            .await
            .expect("get")
            .score,
        Some(score)
    );
}

#[tokio::test]
async fn withdrawal_is_for_the_submitting_supplier() {
    let f = setup().await;
    let tender = published_tender(&f).await;
    let (submission, _) =
        create_submission(&f.ctx, f.supplier, &bid(tender.id, f.supplier.user_id))
            .await
            .expect("submit");
    let err = withdraw_submission(&f.ctx, f.owner, submission.id)
        .await
        .expect_err("owner");
    assert_eq!(err.code, ErrorCode::Forbidden);

    withdraw_submission(&f.ctx, f.supplier, submission.id)
        .await
        .expect("withdraw");
    let err = get_submission(&f.ctx, f.admin, submission.id)
        .await
        .expect_err("gone");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn submission_lists_are_scoped_to_caller() {
    let f = setup().await;
    let tender = published_tender(&f).await;
    create_submission(&f.ctx, f.supplier, &bid(tender.id, f.supplier.user_id))
        .await
        .expect("submit");

    let all = SubmissionFilter::All;
    assert_eq!(
        list_submissions(&f.ctx, f.admin, all).await.expect("admin").len(),
        1
    );
    assert_eq!(
        list_submissions(&f.ctx, f.owner, all).await.expect("owner").len(),
        1
    );
    assert!(list_submissions(&f.ctx, f.other_owner, all)
        .await
        .expect("other owner")
        .is_empty());
    assert_eq!(
        list_submissions(&f.ctx, f.supplier, SubmissionFilter::Tender(tender.id))
            .await
            .expect("supplier")
            .len(),
        1
    );
}
