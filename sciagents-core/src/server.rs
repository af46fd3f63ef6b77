//! REST wrapper around [`ScientificWorkflow`], built on axum.

use crate::schemas::{ExperimentalResults, Hypothesis};
use crate::store::InvestigationStore;
use crate::workflow::ScientificWorkflow;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    workflow: Arc<ScientificWorkflow>,
    store: Option<InvestigationStore>,
    started: Instant,
}

impl AppState {
    pub fn new(workflow: Arc<ScientificWorkflow>) -> Self {
        let store = workflow.store().cloned();
        Self {
            workflow,
            store,
            started: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvestigateRequest {
    pub question: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
}

impl InvestigateRequest {
    /// Extra prompt context built from the optional hints.
    fn context(&self) -> String {
        let mut parts = Vec::new();
        if let Some(domain) = &self.domain {
            parts.push(format!("Preferred domain: {}", domain));
        }
        if let Some(parameters) = &self.parameters {
            parts.push(format!("Suggested parameters: {}", Value::Object(parameters.clone())));
        }
        parts.join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigateResponse {
    pub question: String,
    pub hypothesis: Hypothesis,
    pub experimental_results: ExperimentalResults,
    pub final_conclusion: String,
    /// Experimental confidence.
    pub confidence: f64,
    pub future_research: Vec<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/investigate", post(investigate_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/investigations", get(investigations_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn investigate_handler(
    State(state): State<AppState>,
    Json(request): Json<InvestigateRequest>,
) -> Response {
    let question = request.question.trim();
    if question.is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "question must not be empty");
    }

    let analysis = state
        .workflow
        .investigate_with_context(question, &request.context())
        .await;
    Json(InvestigateResponse {
        question: analysis.scientific_question,
        confidence: analysis.experimental_results.confidence,
        hypothesis: analysis.hypothesis,
        experimental_results: analysis.experimental_results,
        final_conclusion: analysis.final_conclusion,
        future_research: analysis.future_research,
    })
    .into_response()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.started.elapsed().as_secs(),
    }))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.workflow.status())
}

async fn investigations_handler(State(state): State<AppState>) -> Response {
    let Some(store) = &state.store else {
        return Json(Vec::<Value>::new()).into_response();
    };
    match store.list() {
        Ok(summaries) => Json(summaries).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn run(state: AppState, host: &str, port: u16) -> Result<(), std::io::Error> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "SciAgents API listening");
    axum::serve(listener, router(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context() {
        let request: InvestigateRequest = serde_json::from_value(json!({
            "question": "Q",
            "domain": "biology",
            "parameters": {"light_intensity": [0, 100]}
        }))
        .unwrap();
        assert_eq!(
            request.context(),
            "Preferred domain: biology\nSuggested parameters: {\"light_intensity\":[0,100]}"
        );

        let bare: InvestigateRequest = serde_json::from_value(json!({"question": "Q"})).unwrap();
        assert_eq!(bare.context(), "");
    }
}
