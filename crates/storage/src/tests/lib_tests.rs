use super::*;
use shared::protocol::CriterionRequest;

fn tender_request(owner: UserId) -> TenderRequest {
    TenderRequest {
        title: "Road resurfacing".into(),
        description: "Resurfacing of the northern ring road, phase two".into(),
        organization_id: OrganizationId(7),
        owner_user_id: owner,
        deadline: NaiveDate::from_ymd_opt(2030, 6, 30).expect("date"),
        criteria: vec![
            CriterionRequest {
                criterion_type: CriterionType::Price,
                weight: 40,
            },
            CriterionRequest {
                criterion_type: CriterionType::Technical,
                weight: 35,
            },
            CriterionRequest {
                criterion_type: CriterionType::Deadline,
                weight: 25,
            },
        ],
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

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("bidconnect.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn verifies_user_passwords() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = storage
        .create_user(&NewUser {
            email: "Owner@Example.com".into(),
            first_name: "Olive".into(),
            last_name: "Owner".into(),
            role: Role::Owner,
            password: "s3cret".into(),
        })
        .await
        .expect("user");

    let stored = storage
        .find_user_by_email("owner@example.com")
        .await
        .expect("lookup")
        .expect("present");
    assert_eq!(stored.identity.id, id);
    assert_eq!(stored.identity.role, Role::Owner);
    assert!(stored.verify_password("s3cret"));
    assert!(!stored.verify_password("wrong"));

    let by_id = storage.user_by_id(id).await.expect("lookup").expect("present");
    assert_eq!(by_id.display_name(), "Olive Owner");
    assert!(storage
        .find_user_by_email("nobody@example.com")
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn tender_criteria_keep_submission_order() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let tender_id = storage
        .insert_tender(&tender_request(UserId(2)))
        .await
        .expect("tender");

    let tender = storage
        .load_tender(tender_id)
        .await
        .expect("load")
        .expect("present");
    assert_eq!(tender.status, TenderStatus::Draft);
    assert!(tender.publication_date.is_none());
    let shape: Vec<(CriterionType, u32)> = tender
        .criteria
        .iter()
        .map(|c| (c.criterion_type, c.weight))
        .collect();
    assert_eq!(
        shape,
        vec![
            (CriterionType::Price, 40),
            (CriterionType::Technical, 35),
            (CriterionType::Deadline, 25)
        ]
    );
    assert_eq!(storage.list_criteria(tender_id).await.expect("criteria"), tender.criteria);
}

#[tokio::test]
async fn replace_tender_swaps_criteria_and_keeps_status() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let tender_id = storage
        .insert_tender(&tender_request(UserId(2)))
        .await
        .expect("tender");
    let published_at = Utc::now();
    assert!(storage
        .set_tender_status(tender_id, TenderStatus::Published, Some(published_at))
        .await
        .expect("status"));

    let mut changed = tender_request(UserId(2));
    changed.title = "Road resurfacing (revised)".into();
    changed.criteria = vec![CriterionRequest {
        criterion_type: CriterionType::Quality,
        weight: 100,
    }];
    assert!(storage
        .replace_tender(tender_id, &changed)
        .await
        .expect("replace"));

    let tender = storage
        .load_tender(tender_id)
        .await
        .expect("load")
        .expect("present");
    assert_eq!(tender.title, "Road resurfacing (revised)");
    assert_eq!(tender.status, TenderStatus::Published);
    assert!(tender.publication_date.is_some());
    assert_eq!(tender.criteria.len(), 1);
    assert_eq!(tender.criteria[0].criterion_type, CriterionType::Quality);

    assert!(!storage
        .replace_tender(TenderId(999), &changed)
        .await
        .expect("replace missing"));
}

#[tokio::test]
async fn lists_tenders_by_owner_and_organization() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .insert_tender(&tender_request(UserId(2)))
        .await
        .expect("first");
    let mut other = tender_request(UserId(3));
    other.organization_id = OrganizationId(8);
    storage.insert_tender(&other).await.expect("second");

    assert_eq!(storage.list_tenders(TenderFilter::All).await.expect("all").len(), 2);
    let owned = storage
        .list_tenders(TenderFilter::Owner(UserId(3)))
        .await
        .expect("owner");
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].owner_user_id, UserId(3));
    let org = storage
        .list_tenders(TenderFilter::Organization(OrganizationId(7)))
        .await
        .expect("org");
    assert_eq!(org.len(), 1);
    assert_eq!(org[0].owner_user_id, UserId(2));
}

#[tokio::test]
async fn documents_are_attached_and_removed_with_tender() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let tender_id = storage
        .insert_tender(&tender_request(UserId(2)))
        .await
        .expect("tender");
    let doc = storage
        .store_tender_document(tender_id, "terms.pdf", "application/pdf", b"%PDF-1.4")
        .await
        .expect("document");
    assert_eq!(doc.download_url, format!("/api/v1/tenders/documents/{}", doc.document_id));

    let tender = storage
        .load_tender(tender_id)
        .await
        .expect("load")
        .expect("present");
    assert_eq!(tender.documents, vec![doc.clone()]);

    let stored = storage
        .load_tender_document(&doc.document_id)
        .await
        .expect("load doc")
        .expect("present");
    assert_eq!(stored.content, b"%PDF-1.4");
    assert_eq!(stored.tender_id, tender_id);

    assert!(storage.delete_tender(tender_id).await.expect("delete"));
    assert!(storage.load_tender(tender_id).await.expect("load").is_none());
    assert!(storage
        .load_tender_document(&doc.document_id)
        .await
        .expect("load doc")
        .is_none());
    assert!(storage.list_criteria(tender_id).await.expect("criteria").is_empty());
}

#[tokio::test]
async fn submissions_round_trip_with_status_and_score() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let tender_id = storage
        .insert_tender(&tender_request(UserId(2)))
        .await
        .expect("tender");
    let first = storage
        .insert_submission(&bid(tender_id, UserId(5)))
        .await
        .expect("first");
    let second = storage
        .insert_submission(&bid(tender_id, UserId(6)))
        .await
        .expect("second");
    assert_eq!(first.status, SubmissionStatus::Submitted);
    assert!(first.score.is_none());

    assert!(storage
        .set_submission_status(first.id, SubmissionStatus::Accepted)
        .await
        .expect("status"));
    assert!(storage
        .set_submission_score(first.id, 65.0)
        .await
        .expect("score"));
    let loaded = storage
        .load_submission(first.id)
        .await
        .expect("load")
        .expect("present");
    assert_eq!(loaded.status, SubmissionStatus::Accepted);
    assert_eq!(loaded.score, Some(65.0));

    let by_tender = storage
        .list_submissions(SubmissionFilter::Tender(tender_id))
        .await
        .expect("by tender");
    assert_eq!(by_tender.len(), 2);
    let by_supplier = storage
        .list_submissions(SubmissionFilter::Supplier(UserId(6)))
        .await
        .expect("by supplier");
    assert_eq!(by_supplier.len(), 1);
    assert_eq!(by_supplier[0].id, second.id);

    assert!(storage.delete_submission(second.id).await.expect("delete"));
    assert!(!storage.delete_submission(second.id).await.expect("delete again"));
    assert_eq!(
        storage
            .list_submissions(SubmissionFilter::All)
            .await
            .expect("all")
            .len(),
        1
    );
}

#[test]
fn sqlite_path_skips_memory_urls() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert_eq!(
        sqlite_path("sqlite://data/app.db?mode=rwc"),
        Some(PathBuf::from("data/app.db"))
    );
}
