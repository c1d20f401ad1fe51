use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::error::ClientError;

pub const DEFAULT_API_BASE: &str = "http://localhost:8080";

/// Response of `POST /query/text`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TextReply {
    pub answer: String,
    #[serde(default)]
    pub context: String,
}

#[derive(Debug, Deserialize)]
struct ImageReply {
    answer: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Health {
    pub status: String,
    pub time: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("iris-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask a text question; the service retrieves context and answers.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with the service's error message on a
    /// non-success status, or [`ClientError::Http`] on transport failure.
    pub async fn ask_text(&self, query: &str) -> Result<TextReply, ClientError> {
        let resp = self
            .client
            .post(format!("{}/query/text", self.base_url))
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await?;
        parse(resp).await
    }

    /// Ask a question about raw image bytes.
    ///
    /// # Errors
    ///
    /// See [`Self::ask_text`].
    pub async fn ask_image(
        &self,
        image: Vec<u8>,
        file_name: &str,
        question: Option<&str>,
    ) -> Result<String, ClientError> {
        let mut form = Form::new().part("image", Part::bytes(image).file_name(file_name.to_owned()));
        if let Some(q) = question.filter(|q| !q.trim().is_empty()) {
            form = form.text("question", q.to_owned());
        }
        let resp = self
            .client
            .post(format!("{}/query/image", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let reply: ImageReply = parse(resp).await?;
        Ok(reply.answer)
    }

    /// Read an image file and ask about it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the file cannot be read, otherwise see
    /// [`Self::ask_text`].
    pub async fn ask_image_file(
        &self,
        path: &Path,
        question: Option<&str>,
    ) -> Result<String, ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "image".to_owned(), |n| n.to_string_lossy().into_owned());
        self.ask_image(bytes, &file_name, question).await
    }

    /// # Errors
    ///
    /// See [`Self::ask_text`].
    pub async fn health(&self) -> Result<Health, ClientError> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        parse(resp).await
    }
}

async fn parse<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    tracing::debug!("service error {status}: {message}");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
