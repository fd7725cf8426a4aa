//! Handlers. Every response is a `{ success, message, ... }` envelope.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docketwatch_core::{FilingType, Matter, MatterOutcome, RuntimeSnapshot, TargetedReport};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::ApiContext;
use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub extra: T,
}

#[derive(Debug, Serialize)]
pub struct Empty {}

fn ok(message: impl Into<String>) -> Json<Envelope<Empty>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        extra: Empty {},
    })
}

/// `POST /api/sweep`: start a sweep in the background.
pub async fn sweep(State(ctx): State<ApiContext>) -> Response {
    let orchestrator = ctx.app.orchestrator.clone();
    tokio::spawn(async move {
        match orchestrator.sweep().await {
            Ok(report) => info!(summary = %report.headline(), "triggered sweep done"),
            Err(e) => error!(error = %format!("{e:#}"), "triggered sweep failed"),
        }
    });
    (StatusCode::ACCEPTED, ok("sweep started")).into_response()
}

/// `POST /api/matters/:id/process`
pub async fn process_one(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let report = ctx.app.orchestrator.process_one(&id).await?;
    targeted_response(report)
}

#[derive(Debug, Deserialize)]
pub struct ProcessMany {
    pub matter_ids: Vec<String>,
}

/// `POST /api/matters/process`
pub async fn process_many(
    State(ctx): State<ApiContext>,
    Json(body): Json<ProcessMany>,
) -> Result<Response, ApiError> {
    if body.matter_ids.iter().all(|id| id.trim().is_empty()) {
        return Err(ApiError::BadRequest("matter_ids must not be empty".into()));
    }
    let report = ctx.app.orchestrator.process_targeted(&body.matter_ids).await?;
    targeted_response(report)
}

fn targeted_response(report: TargetedReport) -> Result<Response, ApiError> {
    if let [single] = report.matters.as_slice() {
        match single.outcome {
            MatterOutcome::NotFound => {
                return Err(ApiError::NotFound(format!(
                    "matter not found: {}",
                    single.matter_id
                )));
            }
            MatterOutcome::AlreadyProcessing => {
                return Ok((StatusCode::CONFLICT, Json(report)).into_response());
            }
            _ => {}
        }
    }
    Ok(Json(report).into_response())
}

/// `POST /api/scheduler/start`
pub async fn scheduler_start(State(ctx): State<ApiContext>) -> Json<Envelope<Empty>> {
    if ctx.app.scheduler.start() {
        ok("scheduler started")
    } else {
        Json(Envelope {
            success: false,
            message: "scheduler already running".into(),
            extra: Empty {},
        })
    }
}

/// `POST /api/scheduler/stop`
pub async fn scheduler_stop(State(ctx): State<ApiContext>) -> Json<Envelope<Empty>> {
    if ctx.app.scheduler.stop() {
        ok("scheduler stopped")
    } else {
        Json(Envelope {
            success: false,
            message: "scheduler not running".into(),
            extra: Empty {},
        })
    }
}

/// `GET /api/status`
pub async fn status(State(ctx): State<ApiContext>) -> Json<Envelope<RuntimeSnapshot>> {
    let mut snapshot = ctx.app.orchestrator.runtime().snapshot();
    snapshot.scheduler_running = ctx.app.scheduler.is_running();
    let message = if snapshot.active_sweeps > 0 {
        format!("{} sweep(s) running", snapshot.active_sweeps)
    } else {
        "idle".to_string()
    };
    Json(Envelope {
        success: true,
        message,
        extra: snapshot,
    })
}

#[derive(Debug, Serialize)]
pub struct MatterList {
    pub matters: Vec<Matter>,
}

/// `GET /api/matters`
pub async fn list_matters(
    State(ctx): State<ApiContext>,
) -> Result<Json<Envelope<MatterList>>, ApiError> {
    let matters = ctx.app.orchestrator.registry().list()?;
    Ok(Json(Envelope {
        success: true,
        message: format!("{} matter(s) registered", matters.len()),
        extra: MatterList { matters },
    }))
}

#[derive(Debug, Deserialize)]
pub struct NewMatter {
    pub crm_id: String,
    pub application_number: String,
    pub filing_type: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Registered {
    pub matter: Matter,
}

/// `POST /api/matters`
pub async fn register_matter(
    State(ctx): State<ApiContext>,
    Json(body): Json<NewMatter>,
) -> Result<Response, ApiError> {
    let filing_type: FilingType = body
        .filing_type
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let orchestrator = &ctx.app.orchestrator;
    let mut matter = Matter::new(
        body.crm_id,
        &body.application_number,
        filing_type,
        orchestrator.clock().now(),
    );
    if let Some(title) = body.title.filter(|t| !t.trim().is_empty()) {
        matter = matter.with_title(title);
    }
    let matter = orchestrator.registry().register(matter)?;
    let body = Envelope {
        success: true,
        message: format!("registered {}", matter.crm_id),
        extra: Registered { matter },
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}
