// The hosted analysis endpoint: proxies error text to the upstream
// generative-AI provider and normalizes its reply into the wire shape the
// analyzer client expects. The provider is asked for raw JSON but does not
// always comply, so replies are salvage-parsed before responding.
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

const NO_EXPLANATION_PROVIDED: &str = "No explanation provided";
const FALLBACK_SOLUTION: &str = "Check the error message above for details";

pub struct ServerState {
    http: reqwest::Client,
    api_key: Option<String>,
    upstream_url: String,
}

impl ServerState {
    pub fn new(api_key: Option<String>, upstream_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(35))
            .build()?;
        Ok(Self {
            http,
            api_key,
            upstream_url: upstream_url.into(),
        })
    }
}

#[derive(Deserialize)]
struct AnalyzeBody {
    #[serde(default)]
    error: String,
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze_handler))
        .with_state(state)
}

pub async fn serve(bind: &str, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("analysis endpoint listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn analyze_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<AnalyzeBody>,
) -> (StatusCode, Json<Value>) {
    let (status, value) = analyze_request(&state, &body.error).await;
    (status, Json(value))
}

async fn analyze_request(state: &ServerState, error_text: &str) -> (StatusCode, Value) {
    if error_text.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            json!({ "error": "No error message provided" }),
        );
    }
    let Some(api_key) = &state.api_key else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "API key not configured" }),
        );
    };

    let res = state
        .http
        .post(format!("{}?key={}", state.upstream_url, api_key))
        .json(&json!({
            "contents": [{ "parts": [{ "text": analysis_prompt(error_text) }] }]
        }))
        .send()
        .await;
    let res = match res {
        Ok(res) => res,
        Err(e) => {
            tracing::error!("upstream request failed: {e}");
            return (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "upstream request failed" }),
            );
        }
    };

    let upstream_status = res.status();
    if !upstream_status.is_success() {
        tracing::error!("upstream returned {upstream_status}");
        let status = StatusCode::from_u16(upstream_status.as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        return (status, json!({ "error": "upstream request failed" }));
    }

    let data: Value = match res.json().await {
        Ok(data) => data,
        Err(e) => {
            tracing::error!("upstream reply was not JSON: {e}");
            return (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "upstream request failed" }),
            );
        }
    };
    let text = data["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .unwrap_or("");
    if text.is_empty() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "No response from AI" }),
        );
    }

    (StatusCode::OK, salvage_response(text))
}

/// Locate a JSON object in the model's reply and normalize it; with no
/// parseable object, fall back to the raw text as the explanation.
fn salvage_response(text: &str) -> Value {
    match extract_json_object(text) {
        Some(parsed) => json!({
            "id": Utc::now().timestamp_millis(),
            "explanation": parsed
                .get("explanation")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(NO_EXPLANATION_PROVIDED),
            "solutions": parsed
                .get("solutions")
                .filter(|s| s.is_array())
                .cloned()
                .unwrap_or_else(|| json!([])),
            "fix": parsed
                .get("fix")
                .filter(|f| f.is_object())
                .cloned()
                .unwrap_or(Value::Null),
        }),
        None => json!({
            "id": Utc::now().timestamp_millis(),
            "explanation": text,
            "solutions": [FALLBACK_SOLUTION],
            "fix": Value::Null,
        }),
    }
}

/// Strip markdown code fences, then take the first `{` through the last `}`.
fn extract_json_object(text: &str) -> Option<Value> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&cleaned[start..=end]).ok()
}

fn analysis_prompt(error_text: &str) -> String {
    format!(
        "You are a debugging assistant. Analyze the following error and respond ONLY \
with valid JSON (no markdown, no code blocks, just raw JSON).\n\n\
Error to analyze:\n{error_text}\n\n\
Respond with this exact JSON structure:\n\
{{\n\
  \"explanation\": \"A clear, plain English explanation of what's causing this error and why it happens\",\n\
  \"solutions\": [\n\
    \"First step to fix the issue\",\n\
    \"Second step to fix the issue\",\n\
    \"Third step to fix the issue\"\n\
  ],\n\
  \"fix\": {{\n\
    \"code\": \"A complete code snippet that fixes the issue\",\n\
    \"pros\": [\"Advantage 1 of this fix\", \"Advantage 2 of this fix\"],\n\
    \"cons\": [\"Potential drawback 1\", \"Potential drawback 2\"]\n\
  }}\n\
}}\n\n\
Remember: Respond ONLY with the JSON object, nothing else."
    )
}
