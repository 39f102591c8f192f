use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;

use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::services::{AllocationEngine, RequestLifecycle, StudentPromotion};
use crate::state::AppState;
use crate::state_machine::BulkAction;

#[derive(Deserialize)]
struct ReplacementQueryParams {
    old_course_id: String,
}

#[derive(Deserialize)]
struct TransitionBody {
    ids: Vec<String>,
    action: BulkAction,
}

#[derive(Deserialize)]
struct AllocateBody {
    academic_year: String,
    semester_type: String,
}

#[derive(Deserialize)]
struct PromoteBody {
    student_ids: Vec<String>,
}

#[derive(Deserialize)]
struct BatchChangeBody {
    changes: Vec<BatchChange>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses))
        .route("/courses/{id}", get(course_occupancy))
        .route("/slots/{id}/replacements", get(eligible_replacements))
        .route("/requests", get(list_requests).post(submit_request))
        .route("/requests/transition", post(transition_requests))
        .route("/allocations", post(allocate))
        .route("/students/promote", post(promote_students))
        .route("/students/batch-change", post(change_batches))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    let courses = repository::fetch_courses(&state.db).await?;
    Ok(Json(courses))
}

async fn course_occupancy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Course>, AppError> {
    let course = repository::find_course_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(course))
}

async fn eligible_replacements(
    State(state): State<AppState>,
    Path(slot_id): Path<String>,
    Query(params): Query<ReplacementQueryParams>,
) -> Result<Json<Vec<Course>>, AppError> {
    repository::find_slot_by_id(&state.db, &slot_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let candidates = repository::fetch_slot_courses(&state.db, &slot_id)
        .await?
        .into_iter()
        .filter(|c| c.id != params.old_course_id && c.has_free_seat())
        .collect();
    Ok(Json(candidates))
}

async fn list_requests(
    State(state): State<AppState>,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<Vec<CourseRequest>>, AppError> {
    let requests = repository::fetch_requests(&state.db, &filter).await?;
    Ok(Json(requests))
}

async fn submit_request(
    State(state): State<AppState>,
    Json(req): Json<NewCourseRequest>,
) -> Result<(StatusCode, Json<CourseRequest>), AppError> {
    let request = RequestLifecycle::new(state.db.clone()).submit(req).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn transition_requests(
    State(state): State<AppState>,
    Json(body): Json<TransitionBody>,
) -> Result<Json<BulkResult>, AppError> {
    let result = RequestLifecycle::new(state.db.clone())
        .transition(body.ids, body.action)
        .await?;
    Ok(Json(result))
}

async fn allocate(
    State(state): State<AppState>,
    Json(body): Json<AllocateBody>,
) -> Result<Json<AllocationSummary>, AppError> {
    let summary = AllocationEngine::new(state.db.clone())
        .allocate(&body.academic_year, &body.semester_type)
        .await?;
    Ok(Json(summary))
}

async fn promote_students(
    State(state): State<AppState>,
    Json(body): Json<PromoteBody>,
) -> Result<Json<BulkResult>, AppError> {
    let result = StudentPromotion::new(state.db.clone())
        .promote(body.student_ids)
        .await?;
    Ok(Json(result))
}

async fn change_batches(
    State(state): State<AppState>,
    Json(body): Json<BatchChangeBody>,
) -> Result<Json<BulkResult>, AppError> {
    let result = StudentPromotion::new(state.db.clone())
        .apply_batch_change(body.changes)
        .await?;
    Ok(Json(result))
}
