//! Registration and inspection of job records.
//!
//! Submission itself goes straight to the backend; this service only
//! learns about a job when the submitter registers its id here. The
//! bridge may have already routed events for that id, so registration
//! replays anything buffered before returning the record.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::post, Json, Router};
use easel_core::{CoreError, JobRecord};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Response for a successful job registration.
#[derive(Serialize)]
pub struct RegisterJobResponse {
    /// The fresh record, after replaying any buffered events.
    pub data: JobRecord,
    /// Events that arrived before registration and were applied now.
    pub replayed: usize,
}

/// POST /jobs/{id} -- register the record for a job submitted to the
/// backend.
///
/// Call this with the backend-assigned job id as soon as submission
/// succeeds. Registering the same id twice is a conflict.
pub async fn register_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    // Lock order everywhere is router, then store.
    let mut router = state.router.lock().await;
    let mut store = state.store.lock().await;

    store.insert(JobRecord::new(id.clone()))?;
    let replayed = router.job_created(&id, &mut *store);

    tracing::info!(job_id = %id, replayed, "Job record registered");

    let record = store
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::InternalError(format!("job {id} vanished during registration")))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterJobResponse {
            data: record,
            replayed,
        }),
    ))
}

/// GET /jobs/{id} -- inspect the local record for a job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<JobRecord>>> {
    let store = state.store.lock().await;
    let record = store
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::Core(CoreError::JobNotFound(id)))?;

    Ok(Json(DataResponse { data: record }))
}

/// Routes mounted for the `/jobs` resource.
///
/// ```text
/// POST   /jobs/{id}   -> register_job
/// GET    /jobs/{id}   -> get_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/jobs/{id}", post(register_job).get(get_job))
}
