//! HTTP client for the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use fineprint_core::AnalysisResult;
use fineprint_core::schema::analysis;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::prompt::{self, FALLBACK_LETTER};
use crate::{ModelClient, ModelConfig, ModelError};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// [`ModelClient`] backed by the hosted Gemini REST API.
pub struct GeminiClient {
    client: reqwest::Client,
    config: ModelConfig,
}

// ── Wire types ──

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    InlineData(InlineData<'a>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl GenerateContentResponse {
    /// Concatenated answer text of the first candidate, skipping thought parts.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Leading `max` bytes of `text`, cut back to a char boundary.
fn snippet(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let end = (0..=max).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
    &text[..end]
}

impl GeminiClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Issue one `generateContent` call. `Ok(None)` means the service answered
    /// without any text.
    async fn generate(
        &self,
        request: &GenerateContentRequest<'_>,
    ) -> Result<Option<String>, ModelError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ModelError::MissingCredential)?;

        let url = self.endpoint();
        info!(url = %url, model = %self.config.model, "calling model service");
        let resp = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = resp.json().await?;
        let text = parsed.text();
        info!(
            chars = text.as_ref().map_or(0, |t| t.len()),
            "model service responded"
        );
        Ok(text)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn analyze_document(
        &self,
        base64_data: &str,
        mime_type: &str,
        user_context: &str,
    ) -> Result<AnalysisResult, ModelError> {
        let instruction = prompt::analysis_prompt(user_context);
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::InlineData(InlineData {
                        mime_type,
                        data: base64_data,
                    }),
                    Part::Text(&instruction),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: Some("application/json"),
                response_schema: Some(analysis::response_schema()),
                thinking_config: ThinkingConfig {
                    thinking_budget: self.config.analysis_thinking_budget,
                },
            },
        };

        let text = self
            .generate(&request)
            .await
            .inspect_err(|e| warn!(error = %e, "analysis failed"))?
            .ok_or(ModelError::EmptyResponse)?;

        AnalysisResult::from_json(&text).map_err(|e| {
            warn!(
                error = %e,
                raw = %snippet(&text, 200),
                "analysis response did not match schema"
            );
            ModelError::MalformedResponse(e)
        })
    }

    async fn generate_dispute_letter(
        &self,
        analysis: &AnalysisResult,
        user_context: &str,
    ) -> Result<String, ModelError> {
        let instruction = prompt::letter_prompt(analysis, user_context)
            .map_err(|e| ModelError::GenerationFailure(Box::new(ModelError::Encode(e))))?;
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part::Text(&instruction)],
            }],
            generation_config: GenerationConfig {
                response_mime_type: None,
                response_schema: None,
                thinking_config: ThinkingConfig {
                    thinking_budget: self.config.letter_thinking_budget,
                },
            },
        };

        match self.generate(&request).await {
            Ok(Some(letter)) => Ok(letter),
            Ok(None) => {
                warn!("letter response was empty, using fallback text");
                Ok(FALLBACK_LETTER.to_string())
            }
            Err(e) => {
                warn!(error = %e, "letter generation failed");
                Err(ModelError::GenerationFailure(Box::new(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use fineprint_core::{RiskTier, Severity};
    use serde_json::{Value, json};

    use super::*;

    struct Seen {
        path: String,
        api_key: Option<String>,
        body: Value,
    }

    #[derive(Clone)]
    struct Stub {
        status: StatusCode,
        reply: Value,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    async fn handle(
        State(stub): State<Stub>,
        uri: Uri,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        stub.seen.lock().unwrap().push(Seen {
            path: uri.path().to_string(),
            api_key: headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body,
        });
        (stub.status, Json(stub.reply))
    }

    /// Serve `reply` with `status` for every request; returns the base URL.
    async fn spawn_stub(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Seen>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stub = Stub {
            status,
            reply,
            seen: seen.clone(),
        };
        let app = Router::new().fallback(handle).with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    fn client_for(base_url: &str) -> GeminiClient {
        GeminiClient::new(ModelConfig {
            api_key: Some("test-key".into()),
            model: "gemini-test".into(),
            base_url: base_url.to_string(),
            ..ModelConfig::default()
        })
    }

    fn text_reply(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] }
            }]
        })
    }

    fn lease_analysis() -> AnalysisResult {
        AnalysisResult::from_json(
            r#"{"summary":"s","overallRiskScore":85,"redFlags":[
                {"title":"Non-refundable deposit",
                 "quote":"deposit is non-refundable under any circumstance",
                 "explanation":"e","severity":"High"}]}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn analyze_sends_inline_document_and_schema() {
        let payload = r#"{"summary":"Predatory lease.","overallRiskScore":85,"redFlags":[
            {"title":"Non-refundable deposit",
             "quote":"deposit is non-refundable under any circumstance",
             "explanation":"Deposits must be returned.","severity":"High"}]}"#;
        let (base, seen) = spawn_stub(StatusCode::OK, text_reply(payload)).await;

        let result = client_for(&base)
            .analyze_document("JVBERi0=", "application/pdf", "Lease deposit dispute")
            .await
            .unwrap();
        assert_eq!(result.overall_risk_score.value(), 85);
        assert_eq!(result.risk_tier(), RiskTier::High);
        assert_eq!(result.red_flags[0].severity, Severity::High);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].path, "/v1beta/models/gemini-test:generateContent");
        assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));

        let parts = &seen[0].body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "JVBERi0=");
        assert!(
            parts[1]["text"]
                .as_str()
                .unwrap()
                .contains("Lease deposit dispute")
        );

        let config = &seen[0].body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"], analysis::response_schema());
        assert_eq!(config["thinkingConfig"]["thinkingBudget"], 4096);
    }

    #[tokio::test]
    async fn analyze_skips_thought_parts() {
        let reply = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "weighing clauses...", "thought": true },
                    { "text": r#"{"summary":"ok","overallRiskScore":45,"redFlags":[]}"# }
                ]}
            }]
        });
        let (base, _) = spawn_stub(StatusCode::OK, reply).await;
        let result = client_for(&base)
            .analyze_document("aGk=", "image/png", "ctx")
            .await
            .unwrap();
        assert_eq!(result.risk_tier(), RiskTier::Medium);
    }

    #[tokio::test]
    async fn analyze_without_text_is_empty_response() {
        let (base, _) = spawn_stub(StatusCode::OK, json!({ "candidates": [] })).await;
        let err = client_for(&base)
            .analyze_document("aGk=", "image/png", "ctx")
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::EmptyResponse), "{err:?}");
    }

    #[tokio::test]
    async fn analyze_with_bad_json_is_malformed() {
        let (base, _) = spawn_stub(StatusCode::OK, text_reply("not json at all")).await;
        let err = client_for(&base)
            .analyze_document("aGk=", "image/png", "ctx")
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::MalformedResponse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn analyze_with_out_of_range_score_is_malformed() {
        let payload = r#"{"summary":"s","overallRiskScore":140,"redFlags":[]}"#;
        let (base, _) = spawn_stub(StatusCode::OK, text_reply(payload)).await;
        let err = client_for(&base)
            .analyze_document("aGk=", "image/png", "ctx")
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::MalformedResponse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn provider_error_status_is_reported() {
        let (base, _) = spawn_stub(
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": { "message": "quota" } }),
        )
        .await;
        let err = client_for(&base)
            .analyze_document("aGk=", "image/png", "ctx")
            .await
            .unwrap_err();
        match err {
            ModelError::Provider { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("quota"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_without_calling_service() {
        let (base, seen) = spawn_stub(StatusCode::OK, text_reply("{}")).await;
        let client = GeminiClient::new(ModelConfig {
            api_key: None,
            base_url: base,
            ..ModelConfig::default()
        });
        let err = client
            .analyze_document("aGk=", "image/png", "ctx")
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::MissingCredential));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn letter_returns_generated_markdown() {
        let (base, seen) = spawn_stub(StatusCode::OK, text_reply("# Notice of Dispute")).await;
        let letter = client_for(&base)
            .generate_dispute_letter(&lease_analysis(), "Tenant since 2021")
            .await
            .unwrap();
        assert_eq!(letter, "# Notice of Dispute");

        let seen = seen.lock().unwrap();
        let body = &seen[0].body;
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert!(
            parts[0]["text"]
                .as_str()
                .unwrap()
                .contains("Non-refundable deposit")
        );
        assert!(body["generationConfig"].get("responseSchema").is_none());
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 2048);
    }

    #[tokio::test]
    async fn empty_letter_uses_fallback() {
        let reply = json!({ "candidates": [{ "content": { "parts": [] } }] });
        let (base, _) = spawn_stub(StatusCode::OK, reply).await;
        let letter = client_for(&base)
            .generate_dispute_letter(&lease_analysis(), "ctx")
            .await
            .unwrap();
        assert_eq!(letter, FALLBACK_LETTER);
    }

    #[tokio::test]
    async fn letter_provider_error_is_generation_failure() {
        let (base, _) = spawn_stub(StatusCode::INTERNAL_SERVER_ERROR, json!("boom")).await;
        let err = client_for(&base)
            .generate_dispute_letter(&lease_analysis(), "ctx")
            .await
            .unwrap_err();
        match err {
            ModelError::GenerationFailure(inner) => {
                assert!(matches!(*inner, ModelError::Provider { status: 500, .. }));
            }
            other => panic!("expected generation failure, got {other:?}"),
        }
    }

    /// Base URL of a port that was bound and released, so connects are refused.
    async fn closed_port() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn refused_connection_is_service_error() {
        let client = client_for(&closed_port().await);

        let err = client
            .analyze_document("JVBERi0=", "application/pdf", "ctx")
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Service(_)), "got {err:?}");
        assert!(err.is_service_error());

        let err = client
            .generate_dispute_letter(&lease_analysis(), "ctx")
            .await
            .unwrap_err();
        match err {
            ModelError::GenerationFailure(inner) => {
                assert!(matches!(*inner, ModelError::Service(_)), "got {inner:?}");
            }
            other => panic!("expected generation failure, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = client_for("http://localhost:4000/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:4000/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        assert_eq!(snippet("short", 200), "short");
        assert_eq!(snippet("ab\u{e9}cd", 3), "ab");
    }

    #[test]
    fn response_text_is_none_without_candidates() {
        assert!(GenerateContentResponse::default().text().is_none());
    }
}
