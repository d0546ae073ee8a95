use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Method, RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{
        EvaluationCriterion, OrganizationId, Submission, SubmissionId, SubmissionStatus, Tender,
        TenderId, UserId,
    },
    error::ApiError,
    protocol::{StatusUpdateRequest, SubmissionRequest, TenderRequest, SUBMISSIONS_PATH, TENDERS_PATH},
};
use tracing::{info, warn};

use crate::{
    error::{ClientError, ClientResult},
    registry::{SubmissionRegistry, TenderCreate, TenderRegistry},
    session::TokenProvider,
};

/// Joins an API path onto the configured base, keeping any path prefix the
/// base already carries.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Registry client for the BidConnect REST API.
pub struct HttpBackend {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpBackend {
    pub fn new(http: Client, base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
        }
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, endpoint(&self.base_url, path));
        match self.tokens.bearer_token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = checked(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> ClientResult<()> {
        checked(builder.send().await?).await.map(|_| ())
    }

    /// Lists tenders from a filtered endpoint. Deployments without that
    /// endpoint answer 404, in which case the full list is filtered here.
    async fn filtered_tenders(
        &self,
        path: String,
        keep: impl Fn(&Tender) -> bool + Send,
    ) -> ClientResult<Vec<Tender>> {
        let response = self.request(Method::GET, &path).await.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            info!(%path, "filtered tender listing unavailable; filtering full list");
            let all = TenderRegistry::list_all(self).await?;
            return Ok(all.into_iter().filter(|tender| keep(tender)).collect());
        }
        Ok(checked(response).await?.json().await?)
    }
}

async fn checked(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let message = match response.json::<ApiError>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    warn!(status = status.as_u16(), %url, %message, "api request failed");
    Err(ClientError::from_status(status.as_u16(), message))
}

#[async_trait]
impl TenderRegistry for HttpBackend {
    async fn create(&self, request: TenderCreate) -> ClientResult<Tender> {
        let data = serde_json::to_string(&request.data)
            .map_err(|e| ClientError::ServerError(format!("tender encode failed: {e}")))?;
        let mut form = Form::new().part(
            "data",
            Part::text(data).mime_str("application/json")?,
        );
        for file in request.files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }

        let builder = self.request(Method::POST, TENDERS_PATH).await.multipart(form);
        self.send(builder).await
    }

    async fn update(&self, id: TenderId, request: TenderRequest) -> ClientResult<Tender> {
        let builder = self
            .request(Method::PUT, &format!("{TENDERS_PATH}/{id}"))
            .await
            .json(&request);
        self.send(builder).await
    }

    async fn publish(&self, id: TenderId) -> ClientResult<Tender> {
        let builder = self
            .request(Method::PATCH, &format!("{TENDERS_PATH}/{id}/publish"))
            .await;
        self.send(builder).await
    }

    async fn close(&self, id: TenderId) -> ClientResult<Tender> {
        let builder = self
            .request(Method::PATCH, &format!("{TENDERS_PATH}/{id}/close"))
            .await;
        self.send(builder).await
    }

    async fn delete(&self, id: TenderId) -> ClientResult<()> {
        let builder = self
            .request(Method::DELETE, &format!("{TENDERS_PATH}/{id}"))
            .await;
        self.send_empty(builder).await
    }

    async fn get(&self, id: TenderId) -> ClientResult<Tender> {
        let builder = self
            .request(Method::GET, &format!("{TENDERS_PATH}/{id}"))
            .await;
        self.send(builder).await
    }

    async fn criteria(&self, id: TenderId) -> ClientResult<Vec<EvaluationCriterion>> {
        let builder = self
            .request(Method::GET, &format!("{TENDERS_PATH}/{id}/criteria"))
            .await;
        self.send(builder).await
    }

    async fn list_by_owner(&self, owner_id: UserId) -> ClientResult<Vec<Tender>> {
        self.filtered_tenders(format!("{TENDERS_PATH}/owner/{owner_id}"), move |tender| {
            tender.owner_user_id == owner_id
        })
        .await
    }

    async fn list_by_organization(
        &self,
        organization_id: OrganizationId,
    ) -> ClientResult<Vec<Tender>> {
        self.filtered_tenders(
            format!("{TENDERS_PATH}/organization/{organization_id}"),
            move |tender| tender.organization_id == organization_id,
        )
        .await
    }

    async fn list_all(&self) -> ClientResult<Vec<Tender>> {
        let builder = self.request(Method::GET, TENDERS_PATH).await;
        self.send(builder).await
    }
}

#[async_trait]
impl SubmissionRegistry for HttpBackend {
    async fn create(&self, request: SubmissionRequest) -> ClientResult<Submission> {
        let builder = self
            .request(Method::POST, SUBMISSIONS_PATH)
            .await
            .json(&request);
        self.send(builder).await
    }

    async fn update_status(
        &self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> ClientResult<Submission> {
        let builder = self
            .request(Method::PATCH, &format!("{SUBMISSIONS_PATH}/{id}/status"))
            .await
            .json(&StatusUpdateRequest { status });
        self.send(builder).await
    }

    async fn delete(&self, id: SubmissionId) -> ClientResult<()> {
        let builder = self
            .request(Method::DELETE, &format!("{SUBMISSIONS_PATH}/{id}"))
            .await;
        self.send_empty(builder).await
    }

    async fn evaluate(&self, id: SubmissionId) -> ClientResult<Submission> {
        let builder = self
            .request(Method::POST, &format!("{SUBMISSIONS_PATH}/{id}/evaluate"))
            .await;
        self.send(builder).await
    }

    async fn get_by_id(&self, id: SubmissionId) -> ClientResult<Submission> {
        let builder = self
            .request(Method::GET, &format!("{SUBMISSIONS_PATH}/{id}"))
            .await;
        self.send(builder).await
    }

    async fn list_by_tender(&self, tender_id: TenderId) -> ClientResult<Vec<Submission>> {
        let builder = self
            .request(Method::GET, &format!("{SUBMISSIONS_PATH}/tender/{tender_id}"))
            .await;
        self.send(builder).await
    }

    async fn list_by_supplier(&self, supplier_id: UserId) -> ClientResult<Vec<Submission>> {
        let builder = self
            .request(
                Method::GET,
                &format!("{SUBMISSIONS_PATH}/supplier/{supplier_id}"),
            )
            .await;
        self.send(builder).await
    }

    async fn list_all(&self) -> ClientResult<Vec<Submission>> {
        let builder = self.request(Method::GET, SUBMISSIONS_PATH).await;
        self.send(builder).await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
