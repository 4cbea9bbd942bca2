use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::{EnqueueResponse, JobStatusResponse};
use crate::models::job::{JobStatus, PackageJob};
use crate::models::package::PackageOptions;

type ApiError = (StatusCode, String);

/// POST /api/v1/packages: Create a packaging job and queue it.
pub async fn enqueue_package(
    State(state): State<AppState>,
    Json(options): Json<PackageOptions>,
) -> Result<(StatusCode, Json<EnqueueResponse>), ApiError> {
    options
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let job = PackageJob::new(options);

    // Save the record first so its status can be looked up immediately.
    state.store.save(&job).await.map_err(|e| {
        tracing::error!(job_id = %job.id, error = %e, "Failed to save new packaging job");
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to enqueue package job".to_string())
    })?;
    let queue_length = state.queue.enqueue(&job).await.map_err(|e| {
        tracing::error!(job_id = %job.id, error = %e, "Failed to enqueue packaging job");
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to enqueue package job".to_string())
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            job_id: job.id,
            status: job.status.to_string(),
            queue_length,
        }),
    ))
}

/// GET /api/v1/packages/{job_id}: Current job record, including status.
pub async fn get_package_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    find_job(&state, &job_id).await.map(Json)
}

/// GET /api/v1/packages/{job_id}/download: The zip of a completed job.
pub async fn download_package(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job = find_job(&state, &job_id).await?;

    if job.status == JobStatus::Failed {
        let errors = if job.errors.is_empty() {
            "Unknown error".to_string()
        } else {
            job.errors.join("; ")
        };
        return Err((StatusCode::BAD_REQUEST, format!("Job failed: {}", errors)));
    }

    let artifact = match (&job.status, &job.uploaded_artifact_name) {
        (JobStatus::Completed, Some(artifact)) => artifact,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Job is not ready for download. Current status: {}", job.status),
            ))
        }
    };

    let bytes = state.artifacts.download(artifact).await.map_err(|e| {
        tracing::error!(job_id = %job.id, artifact = %artifact, error = %e, "Failed to download package");
        (StatusCode::INTERNAL_SERVER_ERROR, "Download failed".to_string())
    })?;

    let file_name = format!("{}.zip", job.package_options.name.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn find_job(state: &AppState, job_id: &str) -> Result<PackageJob, ApiError> {
    match state.store.get(job_id).await {
        Ok(Some(job)) => Ok(job),
        Ok(None) => Err((StatusCode::NOT_FOUND, "No job found with ID".to_string())),
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to load packaging job");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to load job".to_string()))
        }
    }
}
