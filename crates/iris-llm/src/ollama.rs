use base64::{Engine, engine::general_purpose::STANDARD};
use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::generation::images::Image as OllamaImage;

use crate::error::LlmError;
use crate::media::ImageData;
use crate::provider::{Answer, Embedder, Generator};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
    vision_model: Option<String>,
    name: String,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            name: format!("ollama:{embedding_model}"),
            embedding_model,
            vision_model: None,
        }
    }

    #[must_use]
    pub fn with_vision_model(mut self, model: Option<String>) -> Self {
        self.vision_model = model;
        self
    }

    async fn chat(&self, model: &str, message: ChatMessage) -> Result<Answer, LlmError> {
        let request = ChatMessageRequest::new(model.to_owned(), vec![message]);
        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| LlmError::UpstreamUnavailable(format!("Ollama chat request failed: {e}")))?;
        Ok(Answer::new(response.message.content))
    }
}

impl Embedder for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::from(text),
        );

        let response = self.client.generate_embeddings(request).await.map_err(|e| {
            LlmError::UpstreamUnavailable(format!("Ollama embedding request failed: {e}"))
        })?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse {
                provider: "ollama".into(),
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Generator for OllamaProvider {
    async fn complete(&self, prompt: &str) -> Result<Answer, LlmError> {
        self.chat(&self.model, ChatMessage::user(prompt.to_owned()))
            .await
    }

    async fn describe_image(&self, image: &ImageData, question: &str) -> Result<Answer, LlmError> {
        let model = self.vision_model.as_deref().unwrap_or(&self.model);
        let message = ChatMessage::user(question.to_owned())
            .with_images(vec![OllamaImage::from_base64(STANDARD.encode(&image.data))]);
        self.chat(model, message).await
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), 11434)
}
