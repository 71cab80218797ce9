//! REST API for the research pipeline
//!
//! Runs pipeline queries over HTTP and exposes the claim ledger and the
//! audit trail of past runs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditLog, RunRecord};
use crate::error::ResearchError;
use crate::pipeline::PipelineOrchestrator;
use crate::report::format_report;

const DEFAULT_CLAIM_LIMIT: u32 = 20;
const MAX_CLAIM_LIMIT: u32 = 500;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResearchRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ClaimsQuery {
    pub limit: Option<u32>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(data: T) -> ApiResult {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

fn fail(status: StatusCode, message: String) -> ApiResult {
    (status, Json(ApiResponse::error(message)))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<PipelineOrchestrator>,
    pub audit: Arc<AuditLog>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Research Endpoint
/// =============================

async fn run_research(
    State(state): State<ApiState>,
    Json(req): Json<ResearchRequest>,
) -> ApiResult {
    if req.query.trim().is_empty() {
        return fail(StatusCode::BAD_REQUEST, "Query must not be empty".into());
    }
    info!("Received research request: {}", req.query);

    let output = match state.pipeline.run(&req.query).await {
        Ok(output) => output,
        Err(e @ ResearchError::InvalidQuery(_)) => {
            return fail(StatusCode::BAD_REQUEST, e.to_string());
        }
        Err(e) => {
            error!(error = %e, "Pipeline run failed");
            return fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Pipeline failed: {}", e),
            );
        }
    };

    let report = format_report(&output);
    if let Err(e) = state
        .audit
        .record(RunRecord::from_output(&output, &report))
        .await
    {
        warn!(run_id = %output.run_id, error = %e, "Failed to record audit entry");
    }

    ok(serde_json::json!({
        "run_id": output.run_id,
        "report": report,
        "output": output,
    }))
}

/// =============================
/// Claims Endpoints
/// =============================

async fn verification_report(State(state): State<ApiState>) -> ApiResult {
    match state.pipeline.store().report().await {
        Ok(report) => ok(report),
        Err(e) => fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read verification report: {}", e),
        ),
    }
}

async fn list_claims(
    State(state): State<ApiState>,
    Query(params): Query<ClaimsQuery>,
) -> ApiResult {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_CLAIM_LIMIT)
        .min(MAX_CLAIM_LIMIT);

    match state.pipeline.store().list_recent(limit).await {
        Ok(claims) => ok(claims),
        Err(e) => fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to list claims: {}", e),
        ),
    }
}

/// =============================
/// Audit Endpoint
/// =============================

async fn get_run(State(state): State<ApiState>, Path(run_id): Path<String>) -> ApiResult {
    let Ok(run_id) = Uuid::parse_str(&run_id) else {
        return fail(StatusCode::BAD_REQUEST, format!("Invalid run id: {}", run_id));
    };

    match state.audit.get(run_id).await {
        Ok(Some(record)) => ok(record),
        Ok(None) => fail(StatusCode::NOT_FOUND, format!("Run {} not found", run_id)),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(pipeline: Arc<PipelineOrchestrator>, audit: Arc<AuditLog>) -> Router {
    let state = ApiState { pipeline, audit };

    Router::new()
        .route("/health", get(health))
        .route("/api/research", post(run_research))
        .route("/api/claims", get(list_claims))
        .route("/api/claims/report", get(verification_report))
        .route("/api/runs/:id", get(get_run))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    pipeline: Arc<PipelineOrchestrator>,
    audit: Arc<AuditLog>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(pipeline, audit);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{ClaimStore, InMemoryClaimStore};
    use crate::testing::scripted_pipeline;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn router() -> Router {
        let store: Arc<dyn ClaimStore> = Arc::new(InMemoryClaimStore::new());
        let pipeline = scripted_pipeline(
            store,
            "- Next.js supports SSR.\n- SvelteKit is faster than Next.js for small bundles.",
        )
        .await;
        create_router(Arc::new(pipeline), Arc::new(AuditLog::new()))
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let router = router().await;
        let (status, body) = send(&router, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_empty_claim_report() {
        let router = router().await;
        let (status, body) = send(&router, get("/api/claims/report")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], serde_json::json!({ "unverified": 0 }));
    }

    #[tokio::test]
    async fn test_research_round_trip() {
        let router = router().await;

        let (status, body) = send(
            &router,
            post_json("/api/research", serde_json::json!({ "query": "Next.js or SvelteKit?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let data = &body["data"];
        assert!(data["report"].as_str().unwrap().starts_with("# Research Report"));
        assert_eq!(data["output"]["research"]["outcome"], "success");
        let run_id = data["run_id"].as_str().unwrap().to_string();

        let (status, body) = send(&router, get(&format!("/api/runs/{}", run_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["query"], "Next.js or SvelteKit?");
        assert_eq!(body["data"]["stages"].as_array().unwrap().len(), 3);

        let (_, body) = send(&router, get("/api/claims?limit=1")).await;
        let claims = body["data"].as_array().unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0]["source"], "Researcher Agent");

        let (_, body) = send(&router, get("/api/claims/report")).await;
        assert!(body["data"]["unverified"].as_u64().unwrap() >= 2);
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let router = router().await;
        let (status, body) = send(
            &router,
            post_json("/api/research", serde_json::json!({ "query": "  " })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_runs() {
        let router = router().await;

        let (status, _) = send(&router, get(&format!("/api/runs/{}", Uuid::new_v4()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&router, get("/api/runs/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
