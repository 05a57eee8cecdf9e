//! Per-kind resource endpoints: upload, edit, delete, listings, and
//! search. The kind comes from the path (`/notes/...`, `/pyqs/...`,
//! `/syllabus/...`); one set of handlers serves all three.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use crate::api::middleware::AuthUser;
use crate::api::response::{ApiError, Envelope};
use crate::lifecycle::{self, ResourceMetadata, SearchFilters};
use crate::storage::models::ResourceKind;
use crate::AppState;

pub fn parse_kind(kind: &str) -> Result<ResourceKind, ApiError> {
    ResourceKind::parse(kind).ok_or_else(|| ApiError::NotFound("Not found".to_string()))
}

/// An id-based route only resolves ids of its own kind; a note id on a
/// PYQ path is a 404, mirroring per-kind collections.
pub fn ensure_kind(state: &AppState, id: &str, kind: ResourceKind) -> Result<(), ApiError> {
    match state.db.get_resource(id)? {
        Some(resource) if resource.kind == kind => Ok(()),
        _ => Err(ApiError::NotFound("Resource not found".to_string())),
    }
}

/// Metadata and file pulled out of a multipart upload body.
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    metadata: ResourceMetadata,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut title = String::new();
    let mut program = String::new();
    let mut course_code = String::new();
    let mut course_name = String::new();
    let mut semester: u8 = 0;
    let mut year = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("Malformed multipart body"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::validation("Failed to read uploaded file"))?;
                file = Some((filename, bytes.to_vec()));
            }
            other => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::validation("Malformed multipart body"))?;
                match other {
                    "title" => title = value,
                    "program" => program = value,
                    "courseCode" => course_code = value,
                    "courseName" => course_name = value,
                    "semester" => semester = value.trim().parse().unwrap_or(0),
                    "year" => year = Some(value),
                    _ => {}
                }
            }
        }
    }

    Ok(UploadForm {
        file,
        metadata: ResourceMetadata {
            course_code,
            course_name,
            program,
            semester,
            title,
            year,
        },
    })
}

pub async fn upload(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<(StatusCode, Envelope), ApiError> {
    let kind = parse_kind(&kind)?;
    let form = read_upload_form(multipart).await?;
    let (filename, bytes) = form
        .file
        .ok_or_else(|| ApiError::validation("A file is required"))?;

    let resource = lifecycle::create(
        &state.db,
        state.blobs.as_ref(),
        &user.id,
        kind,
        form.metadata,
        &filename,
        bytes,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Envelope::ok("Uploaded. Your submission is awaiting review").with("resource", resource),
    ))
}

pub async fn edit(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Envelope, ApiError> {
    let kind = parse_kind(&kind)?;
    ensure_kind(&state, &id, kind)?;

    let form = read_upload_form(multipart).await?;
    let resource = lifecycle::edit(
        &state.db,
        state.blobs.as_ref(),
        &id,
        &user.id,
        form.metadata,
        form.file,
    )
    .await?;

    Ok(Envelope::ok("Updated. Your submission is awaiting review").with("resource", resource))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<Envelope, ApiError> {
    let kind = parse_kind(&kind)?;
    ensure_kind(&state, &id, kind)?;

    lifecycle::delete(&state.db, state.blobs.as_ref(), &id, &user.id).await?;
    Ok(Envelope::ok("Deleted"))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

pub async fn all(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Envelope, ApiError> {
    let kind = parse_kind(&kind)?;
    let resources = lifecycle::list_approved(&state.db, kind, params.limit)?;
    Ok(Envelope::ok("Fetched").with("resources", resources))
}

pub async fn mine(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    user: AuthUser,
) -> Result<Envelope, ApiError> {
    let kind = parse_kind(&kind)?;
    let resources = lifecycle::list_mine(&state.db, &user.id, kind)?;
    Ok(Envelope::ok("Fetched").with("resources", resources))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub course_code: Option<String>,
    pub program: Option<String>,
    pub query: Option<String>,
    pub semester: Option<u8>,
    pub year: Option<String>,
}

impl From<SearchParams> for SearchFilters {
    fn from(params: SearchParams) -> Self {
        SearchFilters {
            course_code: params.course_code,
            program: params.program,
            query: params.query,
            semester: params.semester,
            year: params.year,
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Envelope, ApiError> {
    let kind = parse_kind(&kind)?;
    let resources = lifecycle::search(&state.db, kind, &params.into())?;
    Ok(Envelope::ok("Fetched").with("resources", resources))
}

/// Search every kind at once.
pub async fn search_all(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Envelope, ApiError> {
    let resources = lifecycle::search_all(&state.db, &params.into())?;
    Ok(Envelope::ok("Fetched").with("resources", resources))
}
