use chrono::NaiveDate;

use super::*;
use crate::registry::DocumentUpload;

fn tender_request(weights: &[u32]) -> TenderRequest {
    let types = [
        CriterionType::Price,
        CriterionType::Technical,
        CriterionType::Deadline,
    ];
    TenderRequest {
        title: "Water treatment plant upgrade".into(),
        description: "Replacement of filtration units at the eastern plant".into(),
        organization_id: OrganizationId(3),
        owner_user_id: UserId(10),
        deadline: NaiveDate::from_ymd_opt(2031, 1, 15).expect("date"),
        criteria: types
            .into_iter()
            .zip(weights.iter().copied())
            .map(|(criterion_type, weight)| CriterionRequest {
                criterion_type,
                weight,
            })
            .collect(),
    }
}

fn bid(tender_id: TenderId) -> SubmissionRequest {
    SubmissionRequest {
        tender_id,
        supplier_id: UserId(20),
        price: 70.0,
        technical: 60.0,
        deadline: 55.0,
        document_id: None,
    }
}

async fn published_tender(backend: &InMemoryBackend) -> Tender {
    let created = TenderRegistry::create(
        backend,
        TenderCreate {
            data: tender_request(&[40, 35, 25]),
            files: Vec::new(),
        },
    )
    .await
    .expect("create");
    backend.publish(created.id).await.expect("publish")
}

#[tokio::test]
async fn criteria_round_trip_in_submitted_order() {
    let backend = InMemoryBackend::new(Duration::ZERO);
    let created = TenderRegistry::create(
        &backend,
        TenderCreate {
            data: tender_request(&[40, 35, 25]),
            files: vec![DocumentUpload {
                file_name: "specs.pdf".into(),
                content_type: "application/pdf".into(),
                bytes: b"%PDF".to_vec(),
            }],
        },
    )
    .await
    .expect("create");
    assert_eq!(created.status, TenderStatus::Draft);
    assert_eq!(created.publication_date, None);
    assert_eq!(created.documents.len(), 1);
    assert_eq!(created.documents[0].file_name, "specs.pdf");

    let criteria = backend.criteria(created.id).await.expect("criteria");
    let read_back: Vec<_> = criteria
        .iter()
        .map(|c| (c.criterion_type, c.weight))
        .collect();
    assert_eq!(
        read_back,
        vec![
            (CriterionType::Price, 40),
            (CriterionType::Technical, 35),
            (CriterionType::Deadline, 25)
        ]
    );
}

#[tokio::test]
async fn invalid_weights_are_refused() {
    let backend = InMemoryBackend::new(Duration::ZERO);
    let err = TenderRegistry::create(
        &backend,
        TenderCreate {
            data: tender_request(&[50, 35, 25]),
            files: Vec::new(),
        },
    )
    .await
    .expect_err("sum is 110");
    assert!(matches!(err, ClientError::ValidationFailed(_)));
    assert!(TenderRegistry::list_all(&backend)
        .await
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn repeated_criterion_and_short_title_are_refused() {
    let backend = InMemoryBackend::new(Duration::ZERO);
    let mut repeated = tender_request(&[50, 50]);
    repeated.criteria[1].criterion_type = CriterionType::Price;
    let short = TenderRequest {
        title: "x".into(),
        ..tender_request(&[40, 35, 25])
    };

    for data in [repeated, short] {
        let err = TenderRegistry::create(
            &backend,
            TenderCreate {
                data,
                files: Vec::new(),
            },
        )
        .await
        .expect_err("invalid tender");
        assert!(matches!(err, ClientError::ValidationFailed(_)));
    }
    assert!(TenderRegistry::list_all(&backend)
        .await
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn publish_and_close_follow_the_lifecycle() {
    let backend = InMemoryBackend::new(Duration::ZERO);
    let tender = published_tender(&backend).await;
    assert_eq!(tender.status, TenderStatus::Published);
    assert!(tender.publication_date.is_some());

    let err = backend.publish(tender.id).await.expect_err("already published");
    assert!(matches!(err, ClientError::InvalidTransition(_)));

    let closed = backend.close(tender.id).await.expect("close");
    assert_eq!(closed.status, TenderStatus::Closed);
    assert!(matches!(
        backend.close(tender.id).await,
        Err(ClientError::InvalidTransition(_))
    ));
}

#[tokio::test]
async fn update_replaces_fields_and_keeps_status() {
    let backend = InMemoryBackend::new(Duration::ZERO);
    let tender = published_tender(&backend).await;

    let mut request = tender_request(&[20, 30, 50]);
    request.title = "Water treatment plant upgrade, phase 2".into();
    let updated = backend.update(tender.id, request).await.expect("update");
    assert_eq!(updated.status, TenderStatus::Published);
    assert_eq!(updated.title, "Water treatment plant upgrade, phase 2");
    assert_eq!(updated.total_weight(), 100);
    assert_eq!(updated.criteria[2].weight, 50);

    let err = backend
        .update(TenderId(999), tender_request(&[40, 35, 25]))
        .await
        .expect_err("unknown id");
    assert!(matches!(err, ClientError::NotFound(_)));
}

#[tokio::test]
async fn filtered_listings() {
    let backend = InMemoryBackend::new(Duration::ZERO);
    published_tender(&backend).await;
    let mut other = tender_request(&[40, 35, 25]);
    other.owner_user_id = UserId(11);
    other.organization_id = OrganizationId(4);
    TenderRegistry::create(
        &backend,
        TenderCreate {
            data: other,
            files: Vec::new(),
        },
    )
    .await
    .expect("create");

    assert_eq!(backend.list_by_owner(UserId(10)).await.expect("owner").len(), 1);
    assert_eq!(
        backend
            .list_by_organization(OrganizationId(4))
            .await
            .expect("org")[0]
            .owner_user_id,
        UserId(11)
    );
    assert_eq!(TenderRegistry::list_all(&backend).await.expect("all").len(), 2);
}

#[tokio::test]
async fn submissions_need_a_published_tender() {
    let backend = InMemoryBackend::new(Duration::ZERO);
    let draft = TenderRegistry::create(
        &backend,
        TenderCreate {
            data: tender_request(&[40, 35, 25]),
            files: Vec::new(),
        },
    )
    .await
    .expect("create");

    let err = SubmissionRegistry::create(&backend, bid(draft.id))
        .await
        .expect_err("draft tender");
    assert!(matches!(err, ClientError::InvalidTransition(_)));

    let err = SubmissionRegistry::create(&backend, bid(TenderId(404)))
        .await
        .expect_err("unknown tender");
    assert!(matches!(err, ClientError::NotFound(_)));
}

#[tokio::test]
async fn submission_status_and_evaluation() {
    let backend = InMemoryBackend::new(Duration::ZERO);
    let tender = published_tender(&backend).await;
    let submission = SubmissionRegistry::create(&backend, bid(tender.id))
        .await
        .expect("submit");
    assert_eq!(submission.status, SubmissionStatus::Submitted);
    assert_eq!(submission.score, None);

    assert!(matches!(
        backend
            .update_status(submission.id, SubmissionStatus::Submitted)
            .await,
        Err(ClientError::ValidationFailed(_))
    ));

    let rejected = backend
        .update_status(submission.id, SubmissionStatus::Rejected)
        .await
        .expect("reject");
    assert_eq!(rejected.status, SubmissionStatus::Rejected);
    let accepted = backend
        .update_status(submission.id, SubmissionStatus::Accepted)
        .await
        .expect("prior status is not checked");
    assert_eq!(accepted.status, SubmissionStatus::Accepted);

    let evaluated = backend.evaluate(submission.id).await.expect("evaluate");
    let score = evaluated.score.expect("score");
    assert!((score - 62.75).abs() < 1e-9, "score was {score}");
    assert_eq!(
        backend.get_by_id(submission.id).await.expect("get").score,
        Some(score)
    );
}

#[tokio::test]
async fn withdrawal_is_blocked_once_final() {
    let backend = InMemoryBackend::new(Duration::ZERO);
    let tender = published_tender(&backend).await;
    let open = SubmissionRegistry::create(&backend, bid(tender.id))
        .await
        .expect("submit");
    let decided = SubmissionRegistry::create(&backend, bid(tender.id))
        .await
        .expect("submit");
    backend
        .update_status(decided.id, SubmissionStatus::Accepted)
        .await
        .expect("accept");

    SubmissionRegistry::delete(&backend, open.id)
        .await
        .expect("withdraw");
    assert!(matches!(
        SubmissionRegistry::delete(&backend, decided.id).await,
        Err(ClientError::InvalidTransition(_))
    ));

    let remaining = backend.list_by_supplier(UserId(20)).await.expect("list");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, decided.id);
    assert_eq!(
        backend.list_by_tender(tender.id).await.expect("by tender").len(),
        1
    );
}

#[tokio::test]
async fn seeded_backend_offers_published_tenders() {
    let backend = InMemoryBackend::seeded(Duration::ZERO);
    let tenders = TenderRegistry::list_all(&backend).await.expect("list");
    assert_eq!(tenders.len(), 2);
    assert!(tenders
        .iter()
        .all(|t| t.status == TenderStatus::Published && t.total_weight() == 100));
}
