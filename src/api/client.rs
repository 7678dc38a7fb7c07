//! HTTP client for the study service

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, Url};

use super::models::{
    ClearResponse, DeleteResponse, ErrorBody, GenerateResponse, HistoryListResponse,
    SpeechRequest, StoreResponse, VerifyRequest, VerifyResponse,
};
use crate::error::{AudioError, GenerationError, PersistenceError, VerificationError};
use crate::history::{HistoryDraft, HistoryEntry};
use crate::session::ports::{Generator, HistoryService, Synthesizer, Verifier};
use crate::session::source::Source;

/// Study service client
///
/// Implements every remote port a [`crate::session::StudySession`] needs.
pub struct ApiClient {
    /// HTTP client
    client: Client,
    /// Service root, without trailing slash
    base_url: String,
    /// Identity token sent as a bearer credential
    token: Option<String>,
}

impl ApiClient {
    const GENERATE_PATH: &'static str = "/api/generate/study-set";
    const VERIFY_PATH: &'static str = "/api/verify/mcq";
    const HISTORY_PATH: &'static str = "/api/history";
    const SAVE_PATH: &'static str = "/api/history/session";
    const CLEAR_PATH: &'static str = "/api/history/clear";
    const TTS_PATH: &'static str = "/api/tts";

    /// Create a client for the service at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url, token: None })
    }

    /// Attach an identity token to every request
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: impl reqwest::IntoUrl) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Pull a human readable message out of an error response
    async fn error_message(response: Response) -> Option<String> {
        let text = response.text().await.ok()?;
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.into_message(),
            Err(_) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        }
    }

    fn source_form(source: &Source) -> Form {
        match source {
            Source::Text(text) => Form::new().text("text", text.clone()),
            Source::File(file) => Form::new()
                .part("file", Part::bytes(file.payload.clone()).file_name(file.filename.clone())),
        }
    }

    fn history_item_url(&self, id: &str) -> Option<Url> {
        let mut url = Url::parse(&self.url(Self::HISTORY_PATH)).ok()?;
        url.path_segments_mut().ok()?.push(id);
        Some(url)
    }
}

impl Generator for ApiClient {
    async fn generate(&self, source: &Source) -> Result<GenerateResponse, GenerationError> {
        let response = self
            .request(Method::POST, self.url(Self::GENERATE_PATH))
            .multipart(Self::source_form(source))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Generation request failed: {}", e);
                GenerationError::Transport
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = Self::error_message(response)
                .await
                .unwrap_or_else(|| format!("Failed to generate study set ({status})"));
            return Err(GenerationError::Remote(message));
        }

        let body = response.text().await.map_err(|_| GenerationError::Transport)?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::debug!("Unparseable generation body: {}", e);
            GenerationError::InvalidShape
        })
    }
}

impl Verifier for ApiClient {
    async fn verify(
        &self,
        mcq_set_id: &str,
        question_index: usize,
        selected_answer: &str,
    ) -> Result<VerifyResponse, VerificationError> {
        let request = VerifyRequest { mcq_set_id, question_index, selected_answer };
        let response = self
            .request(Method::POST, self.url(Self::VERIFY_PATH))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Verification request failed: {}", e);
                VerificationError::Transport
            })?;

        if !response.status().is_success() {
            let message = Self::error_message(response)
                .await
                .unwrap_or_else(|| "Verification failed".to_string());
            return Err(VerificationError::Remote(message));
        }

        let body = response.text().await.map_err(|_| VerificationError::Transport)?;
        serde_json::from_str(&body)
            .map_err(|_| VerificationError::Remote("Verification failed".to_string()))
    }
}

impl HistoryService for ApiClient {
    async fn list(&self, limit: u32) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let response = self
            .request(Method::GET, self.url(Self::HISTORY_PATH))
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|_| PersistenceError::Transport)?;

        if !response.status().is_success() {
            let message = Self::error_message(response)
                .await
                .unwrap_or_else(|| "Failed to load history".to_string());
            return Err(PersistenceError::NotStored(message));
        }

        let body: HistoryListResponse = response
            .json()
            .await
            .map_err(|_| PersistenceError::NotStored("Failed to load history".to_string()))?;
        if let Some(message) = body.message {
            tracing::warn!("History service reported: {}", message);
        }
        Ok(body.items)
    }

    async fn create(&self, draft: &HistoryDraft) -> Result<(), PersistenceError> {
        let response = self
            .request(Method::POST, self.url(Self::SAVE_PATH))
            .json(draft)
            .send()
            .await
            .map_err(|_| PersistenceError::Transport)?;

        if !response.status().is_success() {
            let message = Self::error_message(response)
                .await
                .unwrap_or_else(|| "Failed to store session".to_string());
            return Err(PersistenceError::NotStored(message));
        }

        let body: StoreResponse = response.json().await.unwrap_or_default();
        if !body.stored {
            let message = body
                .error
                .unwrap_or_else(|| "History not stored. Check the history backend".to_string());
            return Err(PersistenceError::NotStored(message));
        }
        tracing::debug!(session_id = ?body.session_id, "History entry stored");
        Ok(())
    }

    async fn delete_one(&self, id: &str) -> Result<(), PersistenceError> {
        let url = self
            .history_item_url(id)
            .ok_or_else(|| PersistenceError::NotStored(format!("Invalid history id: {id}")))?;
        let response = self
            .request(Method::DELETE, url)
            .send()
            .await
            .map_err(|_| PersistenceError::Transport)?;

        if !response.status().is_success() {
            let message = Self::error_message(response)
                .await
                .unwrap_or_else(|| "Failed to delete history item".to_string());
            return Err(PersistenceError::NotStored(message));
        }

        let body: DeleteResponse = response.json().await.unwrap_or_default();
        if !body.deleted {
            let message = body.message.unwrap_or_else(|| "History item not deleted".to_string());
            return Err(PersistenceError::NotStored(message));
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), PersistenceError> {
        let response = self
            .request(Method::POST, self.url(Self::CLEAR_PATH))
            .send()
            .await
            .map_err(|_| PersistenceError::Transport)?;

        if !response.status().is_success() {
            let message = Self::error_message(response)
                .await
                .unwrap_or_else(|| "Failed to clear history".to_string());
            return Err(PersistenceError::NotStored(message));
        }

        let body: ClearResponse = response
            .json()
            .await
            .map_err(|_| PersistenceError::NotStored("Failed to clear history".to_string()))?;
        if let Some(message) = body.message {
            return Err(PersistenceError::NotStored(message));
        }
        tracing::debug!(cleared = body.cleared, "History cleared");
        Ok(())
    }
}

impl Synthesizer for ApiClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, AudioError> {
        let response = self
            .request(Method::POST, self.url(Self::TTS_PATH))
            .json(&SpeechRequest { text })
            .send()
            .await
            .map_err(|e| AudioError::Remote(format!("Failed to generate audio: {e}")))?;

        if !response.status().is_success() {
            let message = Self::error_message(response)
                .await
                .unwrap_or_else(|| "Failed to generate audio".to_string());
            return Err(AudioError::Remote(message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AudioError::Remote(format!("Failed to read audio: {e}")))?;
        Ok(bytes.to_vec())
    }
}
