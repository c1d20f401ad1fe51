//! Hugging Face Inference API backend.

use serde_json::json;

use crate::error::LlmError;
use crate::http::{default_client, error_body};
use crate::media::ImageData;
use crate::provider::{Answer, Embedder, Generator};
use crate::response::{answer_from_value, embedding_from_value};

pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_MODEL: &str = "Qwen/Qwen2-VL-7B-Instruct";

#[derive(Clone)]
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    model: String,
    vision_model: Option<String>,
    embedding_model: String,
    max_new_tokens: u32,
    name: String,
}

impl std::fmt::Debug for HuggingFaceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .field("embedding_model", &self.embedding_model)
            .field("has_token", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl HuggingFaceProvider {
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: Option<String>, model: String) -> Self {
        Self {
            client: default_client(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.filter(|t| !t.is_empty()),
            model,
            vision_model: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_owned(),
            max_new_tokens: 256,
            name: format!("huggingface:{DEFAULT_EMBEDDING_MODEL}"),
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_vision_model(mut self, model: Option<String>) -> Self {
        self.vision_model = model;
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: String) -> Self {
        self.name = format!("huggingface:{model}");
        self.embedding_model = model;
        self
    }

    #[must_use]
    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<serde_json::Value, LlmError> {
        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| LlmError::UpstreamUnavailable(format!("huggingface request failed: {e}")))?;

        if !resp.status().is_success() {
            let detail = error_body(resp).await;
            tracing::warn!("huggingface returned error: {detail}");
            return Err(LlmError::UpstreamUnavailable(detail));
        }

        resp.json::<serde_json::Value>().await.map_err(|e| {
            LlmError::UpstreamUnavailable(format!("huggingface response unreadable: {e}"))
        })
    }
}

impl Embedder for HuggingFaceProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!(
            "{}/pipeline/feature-extraction/{}",
            self.base_url, self.embedding_model
        );
        let body = json!({
            "inputs": text,
            "options": { "wait_for_model": true },
        });
        let value = self.send(self.client.post(&url).json(&body)).await?;
        embedding_from_value("huggingface", &value)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Generator for HuggingFaceProvider {
    async fn complete(&self, prompt: &str) -> Result<Answer, LlmError> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let body = json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": self.max_new_tokens,
                "return_full_text": false,
            },
        });
        let value = self.send(self.client.post(&url).json(&body)).await?;
        answer_from_value("huggingface", &value)
    }

    async fn describe_image(&self, image: &ImageData, question: &str) -> Result<Answer, LlmError> {
        let model = self.vision_model.as_deref().unwrap_or(&self.model);
        let url = format!("{}/models/{model}", self.base_url);

        let part = reqwest::multipart::Part::bytes(image.data.clone())
            .file_name(format!("image.{}", image.extension()))
            .mime_str(&image.mime_type)
            .map_err(|e| LlmError::InvalidImage(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("inputs", question.to_owned())
            .part("image", part);

        let value = self.send(self.client.post(&url).multipart(form)).await?;
        answer_from_value("huggingface", &value)
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "huggingface"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn jpeg() -> ImageData {
        ImageData {
            data: vec![0xFF, 0xD8, 0xFF, 0xE0],
            mime_type: "image/jpeg".into(),
        }
    }

    fn provider(server: &MockServer) -> HuggingFaceProvider {
        HuggingFaceProvider::new(server.uri(), Some("hf_test".into()), "test/model".into())
    }

    #[tokio::test]
    async fn complete_sends_prompt_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test/model"))
            .and(header("authorization", "Bearer hf_test"))
            .and(body_partial_json(json!({"inputs": "hello"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"generated_text": "world"}])),
            )
            .mount(&server)
            .await;

        let answer = provider(&server).complete("hello").await.unwrap();
        assert_eq!(answer.text, "world");
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading"))
            .mount(&server)
            .await;

        let err = provider(&server).complete("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::UpstreamUnavailable(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"generated_text": "late"}]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let p = provider(&server)
            .with_client(crate::http::client_with_timeout(Duration::from_millis(100)));
        let err = p.complete("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn describe_image_uses_vision_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test/vision"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"generated_text": "a cat"}])),
            )
            .mount(&server)
            .await;

        let p = provider(&server).with_vision_model(Some("test/vision".into()));
        let answer = p.describe_image(&jpeg(), "What is it?").await.unwrap();
        assert_eq!(answer.text, "a cat");
    }

    #[tokio::test]
    async fn embed_uses_feature_extraction_pipeline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!(
                "/pipeline/feature-extraction/{DEFAULT_EMBEDDING_MODEL}"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([0.1, 0.2, 0.3])))
            .mount(&server)
            .await;

        let v = provider(&server).embed("text").await.unwrap();
        assert_eq!(v.len(), 3);
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors() {
        let p = HuggingFaceProvider::new("http://127.0.0.1:1", None, "m".into());
        assert!(matches!(
            p.complete("hi").await,
            Err(LlmError::UpstreamUnavailable(_))
        ));
    }

    #[test]
    fn embedder_name_tracks_model() {
        let p = HuggingFaceProvider::new(DEFAULT_BASE_URL, None, DEFAULT_MODEL.into())
            .with_embedding_model("BAAI/bge-small-en-v1.5".into());
        assert_eq!(Embedder::name(&p), "huggingface:BAAI/bge-small-en-v1.5");
        assert_eq!(Generator::name(&p), "huggingface");
    }

    #[test]
    fn empty_token_is_dropped() {
        let p = HuggingFaceProvider::new(DEFAULT_BASE_URL, Some(String::new()), "m".into());
        assert!(p.token.is_none());
        let dbg = format!("{p:?}");
        assert!(dbg.contains("has_token: false"));
    }
}
