use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clipqueue::{GenerateRequest, JobStore, JobView, OneShotRequest};

pub type SharedStore = Arc<JobStore>;

#[derive(Deserialize)]
pub struct CreateClipRequest {
    /// Remote clip id when regenerating an existing clip.
    pub clip_id: Option<String>,
    pub name: String,
    pub body: String,
    pub voice: String,
    pub output_path: PathBuf,
    pub subject: Option<String>,
}

#[derive(Deserialize)]
pub struct OneShotClipRequest {
    pub body: String,
    pub voice: String,
    pub output_path: PathBuf,
}

#[derive(Serialize)]
pub struct JobCreatedResponse {
    pub job_id: Uuid,
}

pub async fn create_clip(
    State(store): State<SharedStore>,
    Json(req): Json<CreateClipRequest>,
) -> Result<(StatusCode, Json<JobCreatedResponse>), (StatusCode, String)> {
    let job_id = store
        .start_clip(GenerateRequest {
            remote_id: req.clip_id,
            clip_name: req.name,
            body: req.body,
            voice: req.voice,
            target_path: req.output_path,
            subject: req.subject,
        })
        .await
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;

    Ok((StatusCode::CREATED, Json(JobCreatedResponse { job_id })))
}

pub async fn create_one_shot(
    State(store): State<SharedStore>,
    Json(req): Json<OneShotClipRequest>,
) -> Result<(StatusCode, Json<JobCreatedResponse>), (StatusCode, String)> {
    let job_id = store
        .start_one_shot(OneShotRequest {
            body: req.body,
            voice: req.voice,
            target_path: req.output_path,
        })
        .await
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;

    Ok((StatusCode::CREATED, Json(JobCreatedResponse { job_id })))
}

pub async fn get_jobs(State(store): State<SharedStore>) -> Json<Vec<JobView>> {
    Json(store.jobs().await)
}

pub async fn get_job(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobView>, (StatusCode, String)> {
    match store.job(id).await {
        Some(view) => Ok(Json(view)),
        None => Err((StatusCode::NOT_FOUND, "Job not found".to_string())),
    }
}

#[derive(Serialize)]
pub struct LifecycleResponse {
    pub status: String,
    pub message: String,
}

pub async fn cancel_job(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> Result<Json<LifecycleResponse>, (StatusCode, String)> {
    if store.cancel(id).await {
        Ok(Json(LifecycleResponse {
            status: "cancelled".to_string(),
            message: "Job removed; any in-flight call will be ignored".to_string(),
        }))
    } else {
        Err((StatusCode::NOT_FOUND, "Job not found".to_string()))
    }
}
