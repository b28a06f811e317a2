//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use lektor_core::dashboard::{Section, StatusFilter};
use lektor_core::domain::{Identity, Role, Submission, SubmissionStatus};
use lektor_core::ports::PortError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        dashboard_handler,
        get_submission_handler,
        create_submission_handler,
        submit_review_handler,
    ),
    components(
        schemas(
            SubmissionPayload,
            SectionPayload,
            DashboardResponse,
            SubmissionViewResponse,
            CreateSubmissionRequest,
            ReviewRequest
        )
    ),
    tags(
        (name = "Lektor API", description = "API endpoints for the peer-review service.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The wire form of one submission.
#[derive(Serialize, ToSchema)]
pub struct SubmissionPayload {
    id: Uuid,
    owner_id: Uuid,
    reviewer_id: Uuid,
    file_name: String,
    size: i64,
    storage_ref: String,
    status: &'static str,
    notes: String,
    created_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl From<&Submission> for SubmissionPayload {
    fn from(s: &Submission) -> Self {
        Self {
            id: s.id,
            owner_id: s.owner_id,
            reviewer_id: s.reviewer_id,
            file_name: s.file_name.clone(),
            size: s.size,
            storage_ref: s.storage_ref.clone(),
            status: match s.status {
                SubmissionStatus::Pending => "pending",
                SubmissionStatus::Done => "done",
            },
            notes: s.notes.clone(),
            created_at: s.created_at,
            reviewed_at: s.reviewed_at,
        }
    }
}

/// One half of the dashboard. `error` carries the failure kind when the
/// underlying query failed; the list is then empty rather than the whole
/// dashboard erroring out.
#[derive(Serialize, ToSchema)]
pub struct SectionPayload {
    items: Vec<SubmissionPayload>,
    error: Option<String>,
}

impl SectionPayload {
    fn new(section: &Section, filter: StatusFilter) -> Self {
        Self {
            items: section
                .filtered(filter)
                .into_iter()
                .map(SubmissionPayload::from)
                .collect(),
            error: section.error.as_ref().map(error_kind).map(str::to_string),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    documents: SectionPayload,
    assignments: SectionPayload,
}

#[derive(Serialize, ToSchema)]
pub struct SubmissionViewResponse {
    submission: SubmissionPayload,
    role: &'static str,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateSubmissionRequest {
    pub reviewer_id: Uuid,
    pub file_name: String,
    pub size: i64,
    pub storage_ref: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub notes: String,
}

#[derive(Deserialize)]
pub struct DashboardParams {
    documents: Option<String>,
    assignments: Option<String>,
}

fn parse_filter(raw: Option<&str>) -> StatusFilter {
    match raw {
        Some("pending") => StatusFilter::Pending,
        Some("done") => StatusFilter::Done,
        _ => StatusFilter::All,
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn error_kind(e: &PortError) -> &'static str {
    match e {
        PortError::Unauthenticated => "unauthenticated",
        PortError::Unauthorized => "unauthorized",
        PortError::NotFound(_) => "not_found",
        PortError::InvalidTransition(_) => "already_reviewed",
        PortError::Validation(_) => "validation_failed",
        PortError::Transient(_) => "transient",
        PortError::Unexpected(_) => "internal",
    }
}

/// Maps a port failure to an HTTP response. The body carries the kind
/// tag so a client retrying after a race can tell "already reviewed"
/// apart from a transport error.
fn port_error_response(e: PortError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &e {
        PortError::Unauthenticated => StatusCode::UNAUTHORIZED,
        PortError::Unauthorized => StatusCode::FORBIDDEN,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::InvalidTransition(_) => StatusCode::CONFLICT,
        PortError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PortError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("request failed: {:?}", e);
    }
    (
        status,
        Json(json!({ "kind": error_kind(&e), "message": e.to_string() })),
    )
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Load the caller's dashboard: uploaded documents and review assignments.
///
/// The two halves are fetched concurrently; if one query fails the other
/// still returns, with the failure recorded per section.
#[utoipa::path(
    get,
    path = "/dashboard",
    params(
        ("documents" = Option<String>, Query, description = "Status filter for the documents list: all | pending | done"),
        ("assignments" = Option<String>, Query, description = "Status filter for the assignments list: all | pending | done")
    ),
    responses(
        (status = 200, description = "Dashboard loaded", body = DashboardResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<DashboardParams>,
) -> impl IntoResponse {
    let dashboard = state.dashboard.load_dashboard(identity).await;
    let documents_filter = parse_filter(params.documents.as_deref());
    let assignments_filter = parse_filter(params.assignments.as_deref());

    Json(DashboardResponse {
        documents: SectionPayload::new(&dashboard.documents, documents_filter),
        assignments: SectionPayload::new(&dashboard.assignments, assignments_filter),
    })
}

/// Load one submission together with the caller's role.
#[utoipa::path(
    get,
    path = "/submissions/{id}",
    params(("id" = Uuid, Path, description = "The submission id")),
    responses(
        (status = 200, description = "Submission loaded", body = SubmissionViewResponse),
        (status = 403, description = "Caller is neither owner nor reviewer"),
        (status = 404, description = "No such submission")
    )
)]
pub async fn get_submission_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionViewResponse>, (StatusCode, Json<serde_json::Value>)> {
    let view = state
        .reviews
        .load_submission(id, identity)
        .await
        .map_err(port_error_response)?;

    Ok(Json(SubmissionViewResponse {
        submission: SubmissionPayload::from(&view.submission),
        role: match view.role {
            Role::Reviewer => "reviewer",
            Role::Uploader => "uploader",
            Role::None => "none",
        },
    }))
}

/// Record a new upload. The binary artifact itself lives in external
/// storage; the request carries only its opaque reference.
#[utoipa::path(
    post,
    path = "/submissions",
    request_body = CreateSubmissionRequest,
    responses(
        (status = 201, description = "Submission created", body = SubmissionPayload),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_submission_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let created = state
        .reviews
        .create_submission(
            identity,
            req.reviewer_id,
            &req.file_name,
            req.size,
            &req.storage_ref,
        )
        .await
        .map_err(port_error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmissionPayload::from(&created)),
    ))
}

/// File the review for a pending submission, moving it to done.
#[utoipa::path(
    post,
    path = "/submissions/{id}/review",
    params(("id" = Uuid, Path, description = "The submission id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Review recorded", body = SubmissionPayload),
        (status = 403, description = "Caller is not the assigned reviewer"),
        (status = 409, description = "Already reviewed"),
        (status = 422, description = "Empty review notes")
    )
)]
pub async fn submit_review_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<SubmissionPayload>, (StatusCode, Json<serde_json::Value>)> {
    let updated = state
        .reviews
        .submit_review(id, identity, &req.notes)
        .await
        .map_err(port_error_response)?;

    Ok(Json(SubmissionPayload::from(&updated)))
}
