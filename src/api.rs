// src/api.rs
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::JobError;
use crate::jobs::{JobName, JobResult, JobRouter};
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobRouter>,
}

impl AppState {
    pub fn new(jobs: Arc<JobRouter>) -> Self {
        Self { jobs }
    }
}

/// Public routes plus `/metrics`.
pub fn router(state: AppState, metrics: &Metrics) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/cron", post(cron))
        .route("/generate", post(generate))
        .route("/scrape", post(scrape))
        .route("/dashboard", get(dashboard))
        .with_state(state)
        .merge(metrics.router())
        .layer(CorsLayer::very_permissive())
}

#[derive(Debug, Deserialize)]
pub struct CronReq {
    pub job: String,
}

async fn cron(State(state): State<AppState>, Json(body): Json<CronReq>) -> (StatusCode, Json<JobResult>) {
    info!(target: "api", job = %body.job, "cron trigger");
    if let Err(e) = body.job.parse::<JobName>() {
        warn!(target: "api", job = %body.job, "rejecting unknown job");
        return (StatusCode::BAD_REQUEST, Json(JobResult::failed(body.job.trim(), &e)));
    }
    let res = state.jobs.route(&body.job).await;
    (StatusCode::OK, Json(res))
}

#[derive(Debug, Deserialize)]
pub struct GenerateReq {
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateResp {
    pub topic: String,
    pub text: String,
}

/// Preview a post for `topic` without publishing it.
async fn generate(State(state): State<AppState>, Json(body): Json<GenerateReq>) -> Response {
    let topic = body.topic.trim();
    if topic.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "topic is empty" }))).into_response();
    }
    let prompt = format!(
        "Write a creative post about {topic} and add emoji to express your sentiment."
    );
    match state.jobs.dispatcher().generate_post("generate", &prompt).await {
        Ok(text) => Json(GenerateResp {
            topic: topic.to_string(),
            text,
        })
        .into_response(),
        Err(e) => {
            warn!(target: "api", error = %e, "generate failed");
            (job_error_status(&e), Json(json!({ "error": e.to_string(), "kind": e.kind() }))).into_response()
        }
    }
}

fn job_error_status(e: &JobError) -> StatusCode {
    match e {
        JobError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::BAD_GATEWAY,
    }
}

#[derive(Debug, Deserialize)]
pub struct ScrapeReq {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ScrapeResp {
    pub url: String,
    pub headlines: Vec<String>,
}

/// Preview the headlines a page yields; nothing is marked seen or posted.
async fn scrape(State(state): State<AppState>, Json(body): Json<ScrapeReq>) -> Response {
    let url = body.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "url must be an http(s) URL" })),
        )
            .into_response();
    }
    match state.jobs.dispatcher().preview_scrape(url).await {
        Ok(headlines) => Json(ScrapeResp {
            url: url.to_string(),
            headlines,
        })
        .into_response(),
        Err(e) => {
            warn!(target: "api", %url, error = %e, "scrape preview failed");
            (
                job_error_status(&e),
                Json(json!({ "error": e.to_string(), "kind": e.kind() })),
            )
                .into_response()
        }
    }
}

/// `{"items": [...], "error": null}` or `{"items": [], "error": "..."}`.
fn listing<T: Serialize>(res: Result<Vec<T>, JobError>) -> serde_json::Value {
    match res {
        Ok(items) => json!({ "items": items, "error": null }),
        Err(e) => {
            warn!(target: "api", error = %e, "dashboard listing unavailable");
            json!({ "items": [], "error": e.to_string() })
        }
    }
}

async fn dashboard(State(state): State<AppState>) -> Response {
    let d = state.jobs.dispatcher();
    let gates = d.gates();
    let snap = async {
        let quota = gates.quota.snapshot().await?;
        let throttle = gates.mention_throttle.snapshot().await?;
        let daily = gates.poll_gate.snapshot().await?;
        anyhow::Ok((quota, throttle, daily))
    };
    let snap = snap.await;
    let mentions = listing(d.recent_mentions().await);
    let trends = listing(d.trending().await);
    match snap {
        Ok((quota, throttle, daily)) => Json(json!({
            "quota": {
                "count": quota.count,
                "limit": gates.quota.daily_limit(),
                "windowStart": quota.window_start,
            },
            "mentionThrottle": throttle,
            "postPoll": {
                "lastRunDate": daily.last_run_date,
                "today": gates.poll_gate.today(),
            },
            "seenHeadlines": d.headlines().len(),
            "mentions": mentions,
            "trends": trends,
        }))
        .into_response(),
        Err(e) => {
            warn!(target: "api", error = %e, "dashboard state unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": format!("{e:#}") })),
            )
                .into_response()
        }
    }
}
