// Client for the hosted error-analysis endpoint.
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Placeholder used when the endpoint supplies no usable explanation.
pub const NO_EXPLANATION: &str = "No explanation available";

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    error: &'a str,
}

/// A suggested code fix with its trade-offs. Either fully present or absent;
/// a reply whose fix lacks the code snippet is treated as having none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedFix {
    pub code: String,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub explanation: String,
    pub solutions: Vec<String>,
    pub fix: Option<SuggestedFix>,
}

impl Default for Analysis {
    fn default() -> Self {
        Self {
            explanation: NO_EXPLANATION.to_string(),
            solutions: Vec::new(),
            fix: None,
        }
    }
}

impl Analysis {
    /// Normalize an arbitrary endpoint payload, defaulting each field
    /// separately so a partial reply never fails the whole call.
    pub fn from_value(value: Value) -> Self {
        let explanation = value
            .get("explanation")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_EXPLANATION)
            .to_string();
        let solutions = value
            .get("solutions")
            .and_then(Value::as_array)
            .map(|steps| {
                steps
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let fix = value
            .get("fix")
            .cloned()
            .and_then(|f| serde_json::from_value::<SuggestedFix>(f).ok());
        Self {
            explanation,
            solutions,
            fix,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("could not reach analysis endpoint: {0}")]
    Network(#[source] reqwest::Error),
    #[error("analysis endpoint failed: {0}")]
    Upstream(String),
}

pub struct Analyzer {
    client: Client,
    endpoint: String,
}

impl Analyzer {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(35))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// One POST per call; no retries and no caching of identical inputs,
    /// since the same error may legitimately yield a different answer.
    pub async fn analyze(&self, error_text: &str) -> Result<Analysis, AnalyzeError> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(&AnalyzeRequest { error: error_text })
            .send()
            .await
            .map_err(AnalyzeError::Network)?;

        let status = res.status();
        if !status.is_success() {
            let message = res
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| status.to_string());
            return Err(AnalyzeError::Upstream(message));
        }

        let body = res.text().await.map_err(AnalyzeError::Network)?;
        let value = serde_json::from_str::<Value>(&body).unwrap_or(Value::Null);
        Ok(Analysis::from_value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn analyzer_for(server: &mockito::ServerGuard) -> Analyzer {
        Analyzer::new(format!("{}/api/analyze", server.url())).unwrap()
    }

    #[tokio::test]
    async fn parses_full_payload() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/analyze")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": 1,
                    "explanation": "index out of bounds",
                    "solutions": ["check the length first", "use get()"],
                    "fix": { "code": "v.get(i)", "pros": ["no panic"], "cons": ["returns Option"] }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let analysis = analyzer_for(&server)
            .await
            .analyze("panicked at index out of bounds")
            .await
            .unwrap();
        assert_eq!(analysis.explanation, "index out of bounds");
        assert_eq!(analysis.solutions.len(), 2);
        let fix = analysis.fix.unwrap();
        assert_eq!(fix.code, "v.get(i)");
        assert_eq!(fix.pros, vec!["no panic"]);
    }

    #[tokio::test]
    async fn missing_fields_take_defaults() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/analyze")
            .with_status(200)
            .with_body(json!({ "id": 2 }).to_string())
            .create_async()
            .await;

        let analysis = analyzer_for(&server).await.analyze("boom").await.unwrap();
        assert_eq!(analysis.explanation, NO_EXPLANATION);
        assert!(analysis.solutions.is_empty());
        assert!(analysis.fix.is_none());
    }

    #[tokio::test]
    async fn empty_explanation_takes_placeholder() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/analyze")
            .with_status(200)
            .with_body(json!({ "explanation": "", "solutions": [] }).to_string())
            .create_async()
            .await;

        let analysis = analyzer_for(&server).await.analyze("boom").await.unwrap();
        assert_eq!(analysis.explanation, NO_EXPLANATION);
    }

    #[tokio::test]
    async fn non_json_body_yields_default_analysis() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/analyze")
            .with_status(200)
            .with_body("<html>gateway page</html>")
            .create_async()
            .await;

        let analysis = analyzer_for(&server).await.analyze("boom").await.unwrap();
        assert_eq!(analysis, Analysis::default());
    }

    #[tokio::test]
    async fn fix_without_code_is_absent() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/analyze")
            .with_status(200)
            .with_body(
                json!({
                    "explanation": "e",
                    "solutions": ["s"],
                    "fix": { "pros": ["looks nice"] }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let analysis = analyzer_for(&server).await.analyze("boom").await.unwrap();
        assert!(analysis.fix.is_none());
    }

    #[tokio::test]
    async fn server_error_is_upstream() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/analyze")
            .with_status(500)
            .with_body(json!({ "error": "Gemini API request failed" }).to_string())
            .create_async()
            .await;

        let err = analyzer_for(&server)
            .await
            .analyze("boom")
            .await
            .unwrap_err();
        match err {
            AnalyzeError::Upstream(msg) => assert_eq!(msg, "Gemini API request failed"),
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_without_body_uses_status_text() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/api/analyze")
            .with_status(503)
            .create_async()
            .await;

        let err = analyzer_for(&server)
            .await
            .analyze("boom")
            .await
            .unwrap_err();
        match err {
            AnalyzeError::Upstream(msg) => assert!(msg.contains("503")),
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network() {
        let analyzer = Analyzer::new("http://127.0.0.1:9/api/analyze").unwrap();
        let err = analyzer.analyze("boom").await.unwrap_err();
        assert!(matches!(err, AnalyzeError::Network(_)));
    }
}
