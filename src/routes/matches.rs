use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::core::MatchOrchestrator;
use crate::error::MatchError;
use crate::models::{
    AnchorKind, AnchorRef, ErrorResponse, HealthResponse, MatchAccepted, MatchJobRequest,
    MatchRun, MatchUserRequest, StatusResponse,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: MatchOrchestrator,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/match", web::post().to(match_job))
        .route("/match-user", web::post().to(match_user))
        .route("/status/{kind}/{id}", web::get().to(get_status));
}

/// Translate a trigger failure into a JSON error body
pub fn error_response(err: &MatchError) -> HttpResponse {
    match err {
        MatchError::Validation(_) => HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: err.to_string(),
            status_code: 400,
        }),
        MatchError::AnchorBusy(_) => HttpResponse::Conflict().json(ErrorResponse {
            error: "Matching in progress".to_string(),
            message: err.to_string(),
            status_code: 409,
        }),
        MatchError::NotFound(_) => HttpResponse::NotFound().json(ErrorResponse {
            error: "Not found".to_string(),
            message: err.to_string(),
            status_code: 404,
        }),
        MatchError::ShuttingDown => HttpResponse::ServiceUnavailable().json(ErrorResponse {
            error: "Shutting down".to_string(),
            message: err.to_string(),
            status_code: 503,
        }),
        _ => HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Internal error".to_string(),
            message: err.to_string(),
            status_code: 500,
        }),
    }
}

fn accepted(run: MatchRun) -> HttpResponse {
    let message = format!(
        "Matching started for {} {}; results are written asynchronously",
        run.anchor.kind, run.anchor.id
    );

    HttpResponse::Accepted().json(MatchAccepted {
        status: "accepted".to_string(),
        anchor_id: run.anchor.id,
        anchor_kind: run.anchor.kind,
        run_id: run.run_id,
        message,
    })
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state
        .orchestrator
        .store()
        .health_check()
        .await
        .unwrap_or(false);

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Match a job against every active candidate
///
/// POST /api/v1/match
///
/// Request body:
/// ```json
/// {
///   "job_id": "string",
///   "overwrite_existing_matches": false
/// }
/// ```
async fn match_job(
    state: web::Data<AppState>,
    req: web::Json<MatchJobRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for match request: {}", errors);
        return error_response(&MatchError::from(errors));
    }

    match state
        .orchestrator
        .run_job_match(&req.job_id, req.overwrite_existing_matches)
        .await
    {
        Ok(run) => accepted(run),
        Err(e) => {
            tracing::info!("Rejected match request for job {}: {}", req.job_id, e);
            error_response(&e)
        }
    }
}

/// Match a candidate against every open job
///
/// POST /api/v1/match-user
async fn match_user(
    state: web::Data<AppState>,
    req: web::Json<MatchUserRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for match-user request: {}", errors);
        return error_response(&MatchError::from(errors));
    }

    match state
        .orchestrator
        .run_candidate_match(&req.user_id, req.overwrite_existing_matches)
        .await
    {
        Ok(run) => accepted(run),
        Err(e) => {
            tracing::info!("Rejected match request for candidate {}: {}", req.user_id, e);
            error_response(&e)
        }
    }
}

/// Current matching status of an anchor
///
/// GET /api/v1/status/{kind}/{id}
async fn get_status(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (kind, id) = path.into_inner();

    let kind: AnchorKind = match kind.parse() {
        Ok(kind) => kind,
        Err(message) => return error_response(&MatchError::Validation(message)),
    };
    let anchor = AnchorRef { kind, id };

    match state.orchestrator.store().status(&anchor).await {
        Ok(matching_status) => HttpResponse::Ok().json(StatusResponse {
            anchor_id: anchor.id,
            anchor_kind: anchor.kind,
            matching_status,
        }),
        Err(e) => {
            tracing::error!("Failed to read status for {}: {}", anchor, e);
            error_response(&e)
        }
    }
}
