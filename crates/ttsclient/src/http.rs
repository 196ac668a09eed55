use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::{ApiError, ClipSpec, ClipState, ProgressFn, TtsService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the speech service's clip endpoints.
pub struct HttpTtsService {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpTtsService {
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn clips_url(&self) -> String {
        format!("{}/clips", self.base_url)
    }

    fn clip_url(&self, clip_id: &str) -> String {
        format!("{}/clips/{}", self.base_url, clip_id)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    async fn expect_ok(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        // Any 2xx counts; DELETE in particular answers 204.
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl TtsService for HttpTtsService {
    async fn create_or_update(
        &self,
        clip_id: Option<&str>,
        spec: &ClipSpec,
    ) -> Result<String, ApiError> {
        let request = match clip_id {
            // Existing clip: patch it in place.
            Some(id) => self.authed(self.client.put(self.clip_url(id))),
            None => self.authed(self.client.post(self.clips_url())),
        };
        let response = Self::expect_ok(request.json(spec).send().await?).await?;
        let state: ClipState = response.json().await?;
        debug!(clip_id = %state.id, "clip submitted");
        Ok(state.id)
    }

    async fn clip_state(&self, clip_id: &str) -> Result<ClipState, ApiError> {
        let response = self.authed(self.client.get(self.clip_url(clip_id))).send().await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.json().await?)
    }

    async fn download(&self, url: &str, progress: ProgressFn<'_>) -> Result<Vec<u8>, ApiError> {
        let response = Self::expect_ok(self.client.get(url).send().await?).await?;
        let total = response.content_length();

        let mut bytes = match total {
            Some(n) => Vec::with_capacity(n as usize),
            None => Vec::new(),
        };
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            bytes.extend_from_slice(&chunk);
            if let Some(total) = total.filter(|&t| t > 0) {
                progress((bytes.len() as f32 / total as f32).min(1.0));
            }
        }
        progress(1.0);
        debug!(len = bytes.len(), "clip downloaded");
        Ok(bytes)
    }

    async fn delete_clip(&self, clip_id: &str) -> Result<(), ApiError> {
        let response = self
            .authed(self.client.delete(self.clip_url(clip_id)))
            .send()
            .await?;
        Self::expect_ok(response).await?;
        Ok(())
    }
}
