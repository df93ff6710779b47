use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    AppState,
    auth::verify_token,
    error::ApiError,
    importer,
    models::{Branch, Classroom, NewRoomRequest, OccupancyStatus, OccupancyUpdate, RoomRequest},
    occupancy, requests,
    session::ImportSession,
    validation::validate_upload,
};

type BearerAuth = Option<TypedHeader<Authorization<Bearer>>>;

fn authorize(state: &AppState, auth: BearerAuth, token: Option<&str>) -> Result<(), ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, token)
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    pub branch: Branch,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoomRequestQuery {
    pub viewer: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImportResult {
    pub imported: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResult {
    pub classroom_id: String,
    pub status: OccupancyStatus,
}

#[utoipa::path(get, path = "/", tag = "classrooms")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Classroom Timetable API",
        "endpoints": {
            "/classrooms": "List the room directory",
            "/classrooms/{id}/status": "Mark a classroom vacant, occupied or reserved",
            "/imports": "Upload a timetable CSV for preview",
            "/imports/{id}/submit": "Import the valid rows of a previewed timetable",
            "/room-requests": "Post or list room requests"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "classrooms")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "classrooms")]
pub async fn healthz_ready() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(
    get,
    path = "/classrooms",
    params(("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")),
    responses(
        (status = 200, description = "Room directory ordered by room number", body = [Classroom]),
        (status = 401, description = "Invalid authentication token"),
        (status = 502, description = "Database error")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "classrooms"
)]
pub async fn list_classrooms(
    State(state): State<AppState>,
    auth: BearerAuth,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    let classrooms = state.backend.fetch_classrooms().await?;
    Ok(Json(classrooms))
}

#[utoipa::path(
    post,
    path = "/classrooms/{id}/status",
    params(
        ("id" = String, Path, description = "Classroom id"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    request_body = OccupancyUpdate,
    responses(
        (status = 200, description = "Status recorded", body = StatusResult),
        (status = 400, description = "Invalid form"),
        (status = 401, description = "Invalid authentication token"),
        (status = 502, description = "Database error")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "classrooms"
)]
pub async fn update_classroom_status(
    State(state): State<AppState>,
    auth: BearerAuth,
    Path(classroom_id): Path<String>,
    Query(query): Query<TokenQuery>,
    Json(update): Json<OccupancyUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    let status =
        occupancy::apply_status_update(&state.backend, &classroom_id, update, Utc::now()).await?;
    Ok(Json(StatusResult {
        classroom_id,
        status,
    }))
}

#[utoipa::path(
    post,
    path = "/imports",
    params(
        ("branch" = Branch, Query, description = "Branch the imported timetable belongs to"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    request_body(content = String, content_type = "text/csv", description = "Timetable with a `Days` column and numbered slot columns"),
    responses(
        (status = 201, description = "Parsed timetable awaiting submission", body = ImportSession),
        (status = 400, description = "Unreadable file or no slots found"),
        (status = 401, description = "Invalid authentication token"),
        (status = 502, description = "Database error")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "imports"
)]
pub async fn create_import(
    State(state): State<AppState>,
    auth: BearerAuth,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    let file = validate_upload(&body)?;

    let classrooms = state.backend.fetch_classrooms().await?;
    let parsed = importer::parse(file, &classrooms)?;
    if parsed.slots.is_empty() {
        return Err(ApiError::BadRequest("No valid slots found in CSV".into()));
    }

    let session = state.sessions.create(query.branch, parsed);
    info!(
        session_id = %session.id,
        rows = session.summary.total,
        valid = session.summary.valid,
        "timetable parsed"
    );
    Ok((StatusCode::CREATED, Json(session)))
}

#[utoipa::path(
    get,
    path = "/imports/{id}",
    params(
        ("id" = Uuid, Path, description = "Import session id"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Import session", body = ImportSession),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Unknown session")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "imports"
)]
pub async fn get_import(
    State(state): State<AppState>,
    auth: BearerAuth,
    Path(id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| ApiError::NotFound("Import session not found".into()))?;
    Ok(Json(session))
}

#[utoipa::path(
    post,
    path = "/imports/{id}/submit",
    params(
        ("id" = Uuid, Path, description = "Import session id"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Rows written", body = ImportResult),
        (status = 400, description = "Nothing to import or rows with errors"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Submission already in progress"),
        (status = 502, description = "Database rejected the batch")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "imports"
)]
pub async fn submit_import(
    State(state): State<AppState>,
    auth: BearerAuth,
    Path(id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;

    let submission = state.sessions.begin_submit(&id)?;
    let imported = submission.batch().len();
    let result = state.backend.insert_timetable(submission.batch()).await;
    submission.finish(result.is_ok());
    result?;

    info!(session_id = %id, rows = imported, "timetable imported");
    Ok(Json(ImportResult { imported }))
}

#[utoipa::path(
    delete,
    path = "/imports/{id}",
    params(
        ("id" = Uuid, Path, description = "Import session id"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 204, description = "Session discarded"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "Unknown session")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "imports"
)]
pub async fn discard_import(
    State(state): State<AppState>,
    auth: BearerAuth,
    Path(id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    if state.sessions.discard(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Import session not found".into()))
    }
}

#[utoipa::path(
    post,
    path = "/room-requests",
    params(("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")),
    request_body = NewRoomRequest,
    responses(
        (status = 201, description = "Request posted"),
        (status = 400, description = "Empty message"),
        (status = 401, description = "Invalid authentication token"),
        (status = 502, description = "Database error")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "room-requests"
)]
pub async fn create_room_request(
    State(state): State<AppState>,
    auth: BearerAuth,
    Query(query): Query<TokenQuery>,
    Json(request): Json<NewRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    requests::submit(&state.backend, request).await?;
    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    get,
    path = "/room-requests",
    params(
        ("viewer" = Option<String>, Query, description = "Hide requests posted by this user"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 200, description = "Most recent requests, newest first", body = [RoomRequest]),
        (status = 401, description = "Invalid authentication token"),
        (status = 502, description = "Database error")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "room-requests"
)]
pub async fn list_room_requests(
    State(state): State<AppState>,
    auth: BearerAuth,
    Query(query): Query<RoomRequestQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, query.token.as_deref())?;
    let visible = requests::recent_for(&state.backend, query.viewer.as_deref()).await?;
    Ok(Json(visible))
}
