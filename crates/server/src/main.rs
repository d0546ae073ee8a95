use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, WebSocketUpgrade},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use server_api::{ApiContext, Caller, DocumentUpload};
use shared::{
    domain::{
        EvaluationCriterion, Identity, OrganizationId, Role, Submission, SubmissionId, Tender,
        TenderId, UserId,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        LoginRequest, LoginResponse, ServerEvent, StatusUpdateRequest, SubmissionRequest,
        TenderRequest, CURRENT_USER_PATH, LOGIN_PATH, SUBMISSIONS_PATH, TENDERS_PATH,
    },
};
use storage::{Storage, SubmissionFilter, TenderFilter};
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

mod auth;
mod config;

use auth::{bearer_token, mint_token, verify_token, TokenConfig};
use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    tokens: TokenConfig,
    events: broadcast::Sender<ServerEvent>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

type HttpError = (StatusCode, Json<ApiError>);

const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const MAX_FILENAME_BYTES: usize = 180;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let tokens = TokenConfig {
        secret: settings.jwt_secret,
        ttl_seconds: settings.token_ttl_seconds,
    };
    let (events, _) = broadcast::channel(256);

    let state = AppState {
        api: ApiContext { storage },
        tokens,
        events,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(LOGIN_PATH, post(login))
        .route(CURRENT_USER_PATH, get(current_user))
        .route(TENDERS_PATH, get(list_all_tenders).post(create_tender))
        .route(
            &format!("{TENDERS_PATH}/:tender_id"),
            get(get_tender).put(update_tender).delete(delete_tender),
        )
        .route(&format!("{TENDERS_PATH}/:tender_id/publish"), patch(publish_tender))
        .route(&format!("{TENDERS_PATH}/:tender_id/close"), patch(close_tender))
        .route(&format!("{TENDERS_PATH}/:tender_id/criteria"), get(tender_criteria))
        .route(&format!("{TENDERS_PATH}/owner/:owner_id"), get(tenders_by_owner))
        .route(
            &format!("{TENDERS_PATH}/organization/:organization_id"),
            get(tenders_by_organization),
        )
        .route(
            &format!("{TENDERS_PATH}/documents/:document_id"),
            get(download_document),
        )
        .route(
            SUBMISSIONS_PATH,
            get(list_all_submissions).post(create_submission),
        )
        .route(
            &format!("{SUBMISSIONS_PATH}/:submission_id"),
            get(get_submission).delete(withdraw_submission),
        )
        .route(
            &format!("{SUBMISSIONS_PATH}/:submission_id/status"),
            patch(update_submission_status),
        )
        .route(
            &format!("{SUBMISSIONS_PATH}/:submission_id/evaluate"),
            post(evaluate_submission),
        )
        .route(
            &format!("{SUBMISSIONS_PATH}/tender/:tender_id"),
            get(submissions_by_tender),
        )
        .route(
            &format!("{SUBMISSIONS_PATH}/supplier/:supplier_id"),
            get(submissions_by_supplier),
        )
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized | ErrorCode::InvalidCredentials => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::InvalidTransition => StatusCode::CONFLICT,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> HttpError {
    let status = status_for(err.code);
    if status.is_server_error() {
        error!(message = %err.message, "request failed");
    }
    (status, Json(err))
}

fn validation(message: impl Into<String>) -> HttpError {
    reject(ApiError::validation(message))
}

fn authenticate(state: &AppState, token: Option<&str>) -> Result<Caller, HttpError> {
    let token = token.ok_or_else(|| {
        reject(ApiError::new(
            ErrorCode::Unauthorized,
            "missing bearer token",
        ))
    })?;
    let claims = verify_token(&state.tokens, token).map_err(|error| {
        warn!(%error, "rejected bearer token");
        reject(ApiError::new(
            ErrorCode::Unauthorized,
            "invalid or expired token",
        ))
    })?;
    let user_id = claims.user_id().ok_or_else(|| {
        reject(ApiError::new(
            ErrorCode::Unauthorized,
            "token subject is not a user id",
        ))
    })?;
    Ok(Caller {
        user_id,
        role: claims.role,
    })
}

fn caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, HttpError> {
    authenticate(state, bearer_token(headers))
}

fn publish(state: &AppState, event: ServerEvent) {
    info!(
        subject = event.subject(),
        recipient = %event.recipient(),
        "notification event"
    );
    let _ = state.events.send(event);
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|error| {
            error!(%error, "health check failed");
            StatusCode::SERVICE_UNAVAILABLE
        })?;
    Ok("ok")
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, HttpError> {
    let user = server_api::authenticate(&state.api, &req)
        .await
        .map_err(|err| {
            warn!(email = %req.email, "login refused");
            reject(err)
        })?;
    let token = mint_token(&state.tokens, &user).map_err(|e| {
        reject(ApiError::new(
            ErrorCode::Internal,
            format!("token mint failed: {e}"),
        ))
    })?;
    info!(user_id = %user.id, role = %user.role, "login succeeded");
    Ok(Json(LoginResponse { token, user }))
}

async fn current_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Identity>, HttpError> {
    let caller = caller(&state, &headers)?;
    let identity = server_api::current_user(&state.api, caller)
        .await
        .map_err(reject)?;
    Ok(Json(identity))
}

async fn create_tender(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Tender>), HttpError> {
    let caller = caller(&state, &headers)?;

    let mut request: Option<TenderRequest> = None;
    let mut documents = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("data") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| validation(format!("unreadable data field: {e}")))?;
                let parsed = serde_json::from_str::<TenderRequest>(&raw)
                    .map_err(|e| validation(format!("data: {e}")))?;
                request = Some(parsed);
            }
            Some("files") => {
                let file_name = field
                    .file_name()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or("document")
                    .to_string();
                if file_name.len() > MAX_FILENAME_BYTES {
                    return Err(validation("files: filename is too long"));
                }
                if file_name.contains('/') || file_name.contains('\\') {
                    return Err(validation("files: filename must not contain path separators"));
                }
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| validation(format!("unreadable file field: {e}")))?;
                documents.push(DocumentUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let request = request.ok_or_else(|| validation("data: missing tender data part"))?;
    let tender = server_api::create_tender(&state.api, caller, &request, documents)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(tender)))
}

async fn list_all_tenders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Tender>>, HttpError> {
    caller(&state, &headers)?;
    let tenders = server_api::list_tenders(&state.api, TenderFilter::All)
        .await
        .map_err(reject)?;
    Ok(Json(tenders))
}

async fn tenders_by_owner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(owner_id): Path<i64>,
) -> Result<Json<Vec<Tender>>, HttpError> {
    caller(&state, &headers)?;
    let tenders = server_api::list_tenders(&state.api, TenderFilter::Owner(UserId(owner_id)))
        .await
        .map_err(reject)?;
    Ok(Json(tenders))
}

async fn tenders_by_organization(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(organization_id): Path<i64>,
) -> Result<Json<Vec<Tender>>, HttpError> {
    caller(&state, &headers)?;
    let tenders = server_api::list_tenders(
        &state.api,
        TenderFilter::Organization(OrganizationId(organization_id)),
    )
    .await
    .map_err(reject)?;
    Ok(Json(tenders))
}

async fn get_tender(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tender_id): Path<i64>,
) -> Result<Json<Tender>, HttpError> {
    caller(&state, &headers)?;
    let tender = server_api::get_tender(&state.api, TenderId(tender_id))
        .await
        .map_err(reject)?;
    Ok(Json(tender))
}

async fn update_tender(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tender_id): Path<i64>,
    Json(req): Json<TenderRequest>,
) -> Result<Json<Tender>, HttpError> {
    let caller = caller(&state, &headers)?;
    let tender = server_api::update_tender(&state.api, caller, TenderId(tender_id), &req)
        .await
        .map_err(reject)?;
    Ok(Json(tender))
}

async fn delete_tender(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tender_id): Path<i64>,
) -> Result<StatusCode, HttpError> {
    let caller = caller(&state, &headers)?;
    server_api::delete_tender(&state.api, caller, TenderId(tender_id))
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn publish_tender(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tender_id): Path<i64>,
) -> Result<Json<Tender>, HttpError> {
    let caller = caller(&state, &headers)?;
    let (tender, event) = server_api::publish_tender(&state.api, caller, TenderId(tender_id))
        .await
        .map_err(reject)?;
    publish(&state, event);
    Ok(Json(tender))
}

async fn close_tender(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tender_id): Path<i64>,
) -> Result<Json<Tender>, HttpError> {
    let caller = caller(&state, &headers)?;
    let tender = server_api::close_tender(&state.api, caller, TenderId(tender_id))
        .await
        .map_err(reject)?;
    Ok(Json(tender))
}

async fn tender_criteria(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tender_id): Path<i64>,
) -> Result<Json<Vec<EvaluationCriterion>>, HttpError> {
    caller(&state, &headers)?;
    let criteria = server_api::tender_criteria(&state.api, TenderId(tender_id))
        .await
        .map_err(reject)?;
    Ok(Json(criteria))
}

async fn download_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    caller(&state, &headers)?;
    let document = server_api::tender_document(&state.api, &document_id)
        .await
        .map_err(reject)?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&document.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", document.file_name))
    {
        response_headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((StatusCode::OK, response_headers, document.content))
}

async fn create_submission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SubmissionRequest>,
) -> Result<(StatusCode, Json<Submission>), HttpError> {
    let caller = caller(&state, &headers)?;
    let (submission, event) = server_api::create_submission(&state.api, caller, &req)
        .await
        .map_err(reject)?;
    publish(&state, event);
    Ok((StatusCode::CREATED, Json(submission)))
}

async fn list_all_submissions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Submission>>, HttpError> {
    list_submissions(&state, &headers, SubmissionFilter::All).await
}

async fn submissions_by_tender(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(tender_id): Path<i64>,
) -> Result<Json<Vec<Submission>>, HttpError> {
    list_submissions(&state, &headers, SubmissionFilter::Tender(TenderId(tender_id))).await
}

async fn submissions_by_supplier(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(supplier_id): Path<i64>,
) -> Result<Json<Vec<Submission>>, HttpError> {
    list_submissions(
        &state,
        &headers,
        SubmissionFilter::Supplier(UserId(supplier_id)),
    )
    .await
}

async fn list_submissions(
    state: &AppState,
    headers: &HeaderMap,
    filter: SubmissionFilter,
) -> Result<Json<Vec<Submission>>, HttpError> {
    let caller = caller(state, headers)?;
    let submissions = server_api::list_submissions(&state.api, caller, filter)
        .await
        .map_err(reject)?;
    Ok(Json(submissions))
}

async fn get_submission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(submission_id): Path<SubmissionId>,
) -> Result<Json<Submission>, HttpError> {
    let caller = caller(&state, &headers)?;
    let submission = server_api::get_submission(&state.api, caller, submission_id)
        .await
        .map_err(reject)?;
    Ok(Json(submission))
}

async fn update_submission_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(submission_id): Path<SubmissionId>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<Submission>, HttpError> {
    let caller = caller(&state, &headers)?;
    let (submission, event) =
        server_api::update_submission_status(&state.api, caller, submission_id, req.status)
            .await
            .map_err(reject)?;
    if let Some(event) = event {
        publish(&state, event);
    }
    Ok(Json(submission))
}

async fn evaluate_submission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(submission_id): Path<SubmissionId>,
) -> Result<Json<Submission>, HttpError> {
    let caller = caller(&state, &headers)?;
    let submission = server_api::evaluate_submission(&state.api, caller, submission_id)
        .await
        .map_err(reject)?;
    Ok(Json(submission))
}

async fn withdraw_submission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(submission_id): Path<SubmissionId>,
) -> Result<StatusCode, HttpError> {
    let caller = caller(&state, &headers)?;
    server_api::withdraw_submission(&state.api, caller, submission_id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Admins see every event; everyone else only events addressed to them.
fn delivers_to(caller: Caller, event: &ServerEvent) -> bool {
    caller.role == Role::Admin || event.recipient() == caller.user_id
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<WsQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let token = bearer_token(&headers).or(q.token.as_deref());
    let caller = authenticate(&state, token)?;
    Ok(ws.on_upgrade(move |socket| ws_connection(state, socket, caller)))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket, caller: Caller) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();
    info!(user_id = %caller.user_id, "event feed subscribed");

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event feed lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if !delivers_to(caller, &event) {
                continue;
            }
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
