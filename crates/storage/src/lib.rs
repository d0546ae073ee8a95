use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;
use uuid::Uuid;

use shared::{
    domain::{
        CriterionId, CriterionType, DocumentRefId, EvaluationCriterion, Identity, OrganizationId,
        Role, Submission, SubmissionId, SubmissionStatus, Tender, TenderDocumentRef, TenderId,
        TenderStatus, UserId,
    },
    protocol::{SubmissionRequest, TenderRequest, TENDERS_PATH},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub identity: Identity,
    password_salt: String,
    password_hash: String,
}

impl StoredUser {
    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(&self.password_salt, password) == self.password_hash
    }
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub document_id: String,
    pub tender_id: TenderId,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenderFilter {
    All,
    Owner(UserId),
    Organization(OrganizationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionFilter {
    All,
    Tender(TenderId),
    Supplier(UserId),
}

const TENDER_COLUMNS: &str =
    "id, title, description, organization_id, owner_user_id, status, publication_date, deadline";
const SUBMISSION_COLUMNS: &str =
    "id, tender_id, supplier_id, document_id, status, price, technical, deadline, score, analysis";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<UserId> {
        let salt = Uuid::new_v4().simple().to_string();
        let hash = hash_password(&salt, &user.password);
        let rec = sqlx::query(
            "INSERT INTO users (email, first_name, last_name, role, password_salt, password_hash)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(user.email.trim().to_ascii_lowercase())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.as_str())
        .bind(salt)
        .bind(hash)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create user '{}'", user.email))?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT id, email, first_name, last_name, role, password_salt, password_hash
             FROM users WHERE email = ?",
        )
        .bind(email.trim().to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| {
            Ok(StoredUser {
                identity: identity_from_row(&r)?,
                password_salt: r.get::<String, _>(5),
                password_hash: r.get::<String, _>(6),
            })
        })
        .transpose()
    }

    pub async fn user_by_id(&self, user_id: UserId) -> Result<Option<Identity>> {
        let row =
            sqlx::query("SELECT id, email, first_name, last_name, role FROM users WHERE id = ?")
                .bind(user_id.0)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(identity_from_row).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<Identity>> {
        let rows =
            sqlx::query("SELECT id, email, first_name, last_name, role FROM users ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(identity_from_row).collect()
    }

    pub async fn insert_tender(&self, request: &TenderRequest) -> Result<TenderId> {
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO tenders (title, description, organization_id, owner_user_id, status, deadline)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.organization_id.0)
        .bind(request.owner_user_id.0)
        .bind(TenderStatus::Draft.as_str())
        .bind(request.deadline)
        .fetch_one(&mut *tx)
        .await?;
        let tender_id = TenderId(rec.get::<i64, _>(0));

        for (position, criterion) in request.criteria.iter().enumerate() {
            sqlx::query(
                "INSERT INTO evaluation_criteria (tender_id, position, criterion_type, weight)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(tender_id.0)
            .bind(position as i64)
            .bind(criterion.criterion_type.as_str())
            .bind(i64::from(criterion.weight))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(%tender_id, criteria = request.criteria.len(), "tender inserted");
        Ok(tender_id)
    }

    /// Replaces every mutable field and the criteria list. Status, publication
    /// date and documents are left untouched. Returns `false` if the tender
    /// does not exist.
    pub async fn replace_tender(&self, tender_id: TenderId, request: &TenderRequest) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE tenders
             SET title = ?, description = ?, organization_id = ?, owner_user_id = ?, deadline = ?,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
        )
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.organization_id.0)
        .bind(request.owner_user_id.0)
        .bind(request.deadline)
        .bind(tender_id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM evaluation_criteria WHERE tender_id = ?")
            .bind(tender_id.0)
            .execute(&mut *tx)
            .await?;
        for (position, criterion) in request.criteria.iter().enumerate() {
            sqlx::query(
                "INSERT INTO evaluation_criteria (tender_id, position, criterion_type, weight)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(tender_id.0)
            .bind(position as i64)
            .bind(criterion.criterion_type.as_str())
            .bind(i64::from(criterion.weight))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn load_tender(&self, tender_id: TenderId) -> Result<Option<Tender>> {
        let row = sqlx::query(&format!("SELECT {TENDER_COLUMNS} FROM tenders WHERE id = ?"))
            .bind(tender_id.0)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_tender(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn list_tenders(&self, filter: TenderFilter) -> Result<Vec<Tender>> {
        let rows = match filter {
            TenderFilter::All => {
                sqlx::query(&format!("SELECT {TENDER_COLUMNS} FROM tenders ORDER BY id ASC"))
                    .fetch_all(&self.pool)
                    .await?
            }
            TenderFilter::Owner(owner) => {
                sqlx::query(&format!(
                    "SELECT {TENDER_COLUMNS} FROM tenders WHERE owner_user_id = ? ORDER BY id ASC"
                ))
                .bind(owner.0)
                .fetch_all(&self.pool)
                .await?
            }
            TenderFilter::Organization(org) => {
                sqlx::query(&format!(
                    "SELECT {TENDER_COLUMNS} FROM tenders WHERE organization_id = ? ORDER BY id ASC"
                ))
                .bind(org.0)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut tenders = Vec::with_capacity(rows.len());
        for row in &rows {
            tenders.push(self.hydrate_tender(row).await?);
        }
        Ok(tenders)
    }

    pub async fn set_tender_status(
        &self,
        tender_id: TenderId,
        status: TenderStatus,
        publication_date: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE tenders
             SET status = ?, publication_date = COALESCE(?, publication_date),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(publication_date)
        .bind(tender_id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn delete_tender(&self, tender_id: TenderId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM tenders WHERE id = ?")
            .bind(tender_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    pub async fn list_criteria(&self, tender_id: TenderId) -> Result<Vec<EvaluationCriterion>> {
        let rows = sqlx::query(
            "SELECT id, criterion_type, weight
             FROM evaluation_criteria
             WHERE tender_id = ?
             ORDER BY position ASC",
        )
        .bind(tender_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                Ok(EvaluationCriterion {
                    id: CriterionId(r.get::<i64, _>(0)),
                    criterion_type: r.get::<String, _>(1).parse::<CriterionType>()?,
                    weight: u32::try_from(r.get::<i64, _>(2)).unwrap_or_default(),
                })
            })
            .collect()
    }

    pub async fn store_tender_document(
        &self,
        tender_id: TenderId,
        file_name: &str,
        content_type: &str,
        content: &[u8],
    ) -> Result<TenderDocumentRef> {
        let document_id = Uuid::new_v4().to_string();
        let size_bytes = i64::try_from(content.len()).unwrap_or(i64::MAX);
        let rec = sqlx::query(
            "INSERT INTO tender_documents (tender_id, document_id, file_name, content_type, size_bytes, content)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(tender_id.0)
        .bind(&document_id)
        .bind(file_name)
        .bind(content_type)
        .bind(size_bytes)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(TenderDocumentRef {
            id: DocumentRefId(rec.get::<i64, _>(0)),
            download_url: document_download_url(&document_id),
            document_id,
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
        })
    }

    pub async fn load_tender_document(&self, document_id: &str) -> Result<Option<StoredDocument>> {
        let row = sqlx::query(
            "SELECT document_id, tender_id, file_name, content_type, content
             FROM tender_documents WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| StoredDocument {
            document_id: r.get::<String, _>(0),
            tender_id: TenderId(r.get::<i64, _>(1)),
            file_name: r.get::<String, _>(2),
            content_type: r.get::<String, _>(3),
            content: r.get::<Vec<u8>, _>(4),
        }))
    }

    pub async fn insert_submission(&self, request: &SubmissionRequest) -> Result<Submission> {
        let submission = Submission {
            id: SubmissionId::new(),
            tender_id: request.tender_id,
            supplier_id: request.supplier_id,
            document_id: request.document_id.clone(),
            status: SubmissionStatus::Submitted,
            price: request.price,
            technical: request.technical,
            deadline: request.deadline,
            score: None,
            analysis: None,
        };
        sqlx::query(
            "INSERT INTO submissions (id, tender_id, supplier_id, document_id, status, price, technical, deadline)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(submission.id.to_string())
        .bind(submission.tender_id.0)
        .bind(submission.supplier_id.0)
        .bind(submission.document_id.as_deref())
        .bind(submission.status.as_str())
        .bind(submission.price)
        .bind(submission.technical)
        .bind(submission.deadline)
        .execute(&self.pool)
        .await?;
        Ok(submission)
    }

    pub async fn load_submission(&self, submission_id: SubmissionId) -> Result<Option<Submission>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?"
        ))
        .bind(submission_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(submission_from_row).transpose()
    }

    pub async fn list_submissions(&self, filter: SubmissionFilter) -> Result<Vec<Submission>> {
        let rows = match filter {
            SubmissionFilter::All => {
                sqlx::query(&format!(
                    "SELECT {SUBMISSION_COLUMNS} FROM submissions ORDER BY created_at ASC, rowid ASC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            SubmissionFilter::Tender(tender_id) => {
                sqlx::query(&format!(
                    "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE tender_id = ?
                     ORDER BY created_at ASC, rowid ASC"
                ))
                .bind(tender_id.0)
                .fetch_all(&self.pool)
                .await?
            }
            SubmissionFilter::Supplier(supplier_id) => {
                sqlx::query(&format!(
                    "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE supplier_id = ?
                     ORDER BY created_at ASC, rowid ASC"
                ))
                .bind(supplier_id.0)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(submission_from_row).collect()
    }

    pub async fn set_submission_status(
        &self,
        submission_id: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE submissions SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(submission_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn set_submission_score(&self, submission_id: SubmissionId, score: f64) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE submissions SET score = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(score)
        .bind(submission_id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn delete_submission(&self, submission_id: SubmissionId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM submissions WHERE id = ?")
            .bind(submission_id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn hydrate_tender(&self, row: &SqliteRow) -> Result<Tender> {
        let tender_id = TenderId(row.get::<i64, _>(0));
        let criteria = self.list_criteria(tender_id).await?;
        let documents = self.list_tender_documents(tender_id).await?;
        Ok(Tender {
            id: tender_id,
            title: row.get::<String, _>(1),
            description: row.get::<String, _>(2),
            organization_id: OrganizationId(row.get::<i64, _>(3)),
            owner_user_id: UserId(row.get::<i64, _>(4)),
            status: row.get::<String, _>(5).parse::<TenderStatus>()?,
            publication_date: row.get::<Option<DateTime<Utc>>, _>(6),
            deadline: row.get::<NaiveDate, _>(7),
            criteria,
            documents,
        })
    }

    async fn list_tender_documents(&self, tender_id: TenderId) -> Result<Vec<TenderDocumentRef>> {
        let rows = sqlx::query(
            "SELECT id, document_id, file_name, content_type
             FROM tender_documents WHERE tender_id = ? ORDER BY id ASC",
        )
        .bind(tender_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let document_id = r.get::<String, _>(1);
                TenderDocumentRef {
                    id: DocumentRefId(r.get::<i64, _>(0)),
                    download_url: document_download_url(&document_id),
                    document_id,
                    file_name: r.get::<String, _>(2),
                    content_type: r.get::<String, _>(3),
                }
            })
            .collect())
    }
}

pub fn document_download_url(document_id: &str) -> String {
    format!("{TENDERS_PATH}/documents/{document_id}")
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

fn identity_from_row(r: &SqliteRow) -> Result<Identity> {
    Ok(Identity {
        id: UserId(r.get::<i64, _>(0)),
        email: r.get::<String, _>(1),
        first_name: r.get::<String, _>(2),
        last_name: r.get::<String, _>(3),
        role: r.get::<String, _>(4).parse::<Role>()?,
    })
}

fn submission_from_row(r: &SqliteRow) -> Result<Submission> {
    let raw_id = r.get::<String, _>(0);
    Ok(Submission {
        id: raw_id
            .parse::<SubmissionId>()
            .map_err(|e| anyhow!("corrupt submission id '{raw_id}': {e}"))?,
        tender_id: TenderId(r.get::<i64, _>(1)),
        supplier_id: UserId(r.get::<i64, _>(2)),
        document_id: r.get::<Option<String>, _>(3),
        status: r.get::<String, _>(4).parse::<SubmissionStatus>()?,
        price: r.get::<f64, _>(5),
        technical: r.get::<f64, _>(6),
        deadline: r.get::<f64, _>(7),
        score: r.get::<Option<f64>, _>(8),
        analysis: r.get::<Option<String>, _>(9),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
