use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{response, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::session::{AdminSession, COOKIE_SESSION_TOKEN_KEY};
use super::{log_requests, state::*, ServerConfig};
use crate::catalog::{BookRecord, CatalogStore};
use crate::ingestion::{IngestError, IngestionPipeline};
use crate::registry::StoreRegistry;
use crate::search::{SearchEngine, SearchError};
use crate::user::{AdminStore, AuthError, AuthService};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub store_spots: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub handle: String,
    pub password: String,
    pub store_spot: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
    store_spot: String,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

fn error_response(status: StatusCode, kind: &str) -> Response {
    (status, Json(json!({ "error": kind }))).into_response()
}

fn error_response_with_detail(status: StatusCode, kind: &str, detail: &str) -> Response {
    (status, Json(json!({ "error": kind, "detail": detail }))).into_response()
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        store_spots: state.registry.spots().len(),
    };
    Json(stats)
}

async fn list_store_spots(State(registry): State<GuardedRegistry>) -> Response {
    Json(registry.spots()).into_response()
}

async fn login(
    State(auth): State<GuardedAuthService>,
    Json(body): Json<LoginBody>,
) -> Response {
    debug!("login() called for handle '{}'", body.handle);
    match auth.login(&body.handle, &body.password, &body.store_spot) {
        Ok(issued) => {
            let response_body = LoginSuccessResponse {
                token: issued.value.clone(),
                store_spot: issued.store_spot,
            };
            let response_body = match serde_json::to_string(&response_body) {
                Ok(body) => body,
                Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            };

            let cookie_value = HeaderValue::from_str(&format!(
                "{}={}; Path=/; HttpOnly",
                COOKIE_SESSION_TOKEN_KEY, issued.value
            ));
            match cookie_value {
                Ok(cookie_value) => response::Builder::new()
                    .status(StatusCode::CREATED)
                    .header(axum::http::header::SET_COOKIE, cookie_value)
                    .body(Body::from(response_body))
                    .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
                Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            }
        }
        Err(AuthError::InvalidCredentials) => {
            error_response(StatusCode::UNAUTHORIZED, "invalid_credentials")
        }
        Err(err) => {
            error!("Login failed on the server side: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn logout(State(auth): State<GuardedAuthService>, session: AdminSession) -> Response {
    match auth.logout(&session.0.token) {
        Ok(()) => {
            let cookie_value = Cookie::build(Cookie::new(COOKIE_SESSION_TOKEN_KEY, ""))
                .path("/")
                .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1)) // Expire it in the past
                .same_site(SameSite::Lax)
                .build();

            response::Builder::new()
                .status(StatusCode::OK)
                .header(axum::http::header::SET_COOKIE, cookie_value.to_string())
                .body(Body::empty())
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn search_books(
    State(search): State<GuardedSearchEngine>,
    Path(spot): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Response {
    match search.search(&spot, &query.q) {
        Ok(books) => Json(books).into_response(),
        Err(SearchError::UnknownStoreSpot(_)) => {
            error_response(StatusCode::NOT_FOUND, "unknown_store_spot")
        }
        Err(SearchError::EmptyQuery) => error_response(StatusCode::BAD_REQUEST, "empty_query"),
        Err(SearchError::Storage(err)) => {
            error!("Search failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn upload_catalog(
    State(pipeline): State<GuardedIngestionPipeline>,
    session: AdminSession,
    Path(spot): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let mut file_bytes: Option<Vec<u8>> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            match field.bytes().await {
                Ok(bytes) => file_bytes = Some(bytes.to_vec()),
                Err(err) => {
                    debug!("Failed to read upload body: {}", err);
                    return error_response_with_detail(
                        StatusCode::BAD_REQUEST,
                        "malformed_file",
                        "Failed to read the uploaded file",
                    );
                }
            }
        }
    }

    let file_bytes = match file_bytes {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => {
            return error_response_with_detail(
                StatusCode::BAD_REQUEST,
                "malformed_file",
                "No file was uploaded",
            )
        }
    };

    match pipeline.ingest(&spot, file_bytes, &session.0).await {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(IngestError::Forbidden) => error_response(StatusCode::FORBIDDEN, "forbidden"),
        Err(IngestError::UnknownStoreSpot(_)) => {
            error_response(StatusCode::NOT_FOUND, "unknown_store_spot")
        }
        Err(IngestError::MalformedFile(detail)) => {
            error_response_with_detail(StatusCode::BAD_REQUEST, "malformed_file", &detail)
        }
        Err(IngestError::Timeout) => error_response(StatusCode::REQUEST_TIMEOUT, "timeout"),
        Err(IngestError::Storage(err)) => {
            error!("Ingestion failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn add_book(
    State(state): State<ServerState>,
    session: AdminSession,
    Path(spot): Path<String>,
    Json(record): Json<BookRecord>,
) -> Response {
    if !state.registry.is_valid(&spot) {
        return error_response(StatusCode::NOT_FOUND, "unknown_store_spot");
    }
    if session.0.store_spot != spot {
        return error_response(StatusCode::FORBIDDEN, "forbidden");
    }
    let record = BookRecord {
        title: record.title.trim().to_owned(),
        ..record
    };
    if record.title.is_empty() {
        return error_response_with_detail(
            StatusCode::BAD_REQUEST,
            "invalid_record",
            "The title must not be blank",
        );
    }
    match state.catalog_store.insert_book(&spot, &record) {
        Ok(id) => (StatusCode::CREATED, Json(json!({ "id": id }))).into_response(),
        Err(err) => {
            error!("Failed to insert book into '{}': {}", spot, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn delete_book(
    State(state): State<ServerState>,
    session: AdminSession,
    Path((spot, book_id)): Path<(String, i64)>,
) -> Response {
    if !state.registry.is_valid(&spot) {
        return error_response(StatusCode::NOT_FOUND, "unknown_store_spot");
    }
    if session.0.store_spot != spot {
        return error_response(StatusCode::FORBIDDEN, "forbidden");
    }
    match state.catalog_store.delete_book(&spot, book_id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "unknown_book"),
        Err(err) => {
            error!("Failed to delete book {} from '{}': {}", book_id, spot, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    registry: Arc<StoreRegistry>,
    catalog_store: Arc<dyn CatalogStore>,
    admin_store: Arc<dyn AdminStore>,
) -> Result<Router> {
    let auth = Arc::new(AuthService::new(admin_store, config.session_ttl)?);
    let search = Arc::new(SearchEngine::new(registry.clone(), catalog_store.clone()));
    let pipeline = Arc::new(IngestionPipeline::new(
        registry.clone(),
        catalog_store.clone(),
        config.ingest_mode,
        config.decode_timeout,
    ));

    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        registry,
        catalog_store,
        auth,
        search,
        pipeline,
    };

    let auth_routes: Router = Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .with_state(state.clone());

    let catalog_routes: Router = Router::new()
        .route("/{spot}/search", get(search_books))
        .route("/{spot}/upload", post(upload_catalog))
        .route("/{spot}/books", post(add_book))
        .route("/{spot}/books/{book_id}", delete(delete_book))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state.clone());

    let mut app: Router = Router::new()
        .route("/", get(home))
        .route("/v1/spots", get(list_store_spots))
        .with_state(state.clone())
        .nest("/v1/auth", auth_routes)
        .nest("/v1/catalog", catalog_routes);

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

pub async fn run_server(
    config: ServerConfig,
    registry: Arc<StoreRegistry>,
    catalog_store: Arc<dyn CatalogStore>,
    admin_store: Arc<dyn AdminStore>,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, registry, catalog_store, admin_store)?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
