use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use shared::{
    config::ClientConfig,
    models::{ChatMessage, ErrorResponse, HistoryPage, OutgoingMessage, Participant},
    reconcile::ConversationScope,
    sync::{HistorySource, SyncError},
};
use url::Url;

/// REST client for the chat endpoints.
#[derive(Clone, Debug)]
pub struct ChatApiClient {
    base: Url,
    client: Client,
    auth_token: Option<String>,
    page_size: u32,
}

impl ChatApiClient {
    pub fn new(base: Url, auth_token: Option<String>, page_size: u32) -> Result<Self> {
        let client = Client::builder()
            .user_agent("fitchat-cli")
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base,
            client,
            auth_token,
            page_size,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            config.server_base()?,
            config.auth_token.clone(),
            config.history_page_size,
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("server URL {} cannot carry a path", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetches one page of the conversation with `participant`.
    pub async fn history_page(&self, participant: &str, page: u32) -> Result<HistoryPage> {
        let endpoint = self.endpoint(&["api", "chat", participant, "messages"])?;
        let request = self
            .client
            .get(endpoint)
            .query(&[("page", page), ("limit", self.page_size)]);

        let response = self
            .authorize(request)
            .send()
            .await
            .context("failed to fetch history")?;
        let response = ensure_success(response, "history request").await?;
        response.json().await.context("malformed history page")
    }

    /// Posts a message and returns the stored copy.
    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<ChatMessage> {
        let endpoint = self.endpoint(&["api", "chat", "messages"])?;
        let response = self
            .authorize(self.client.post(endpoint).json(message))
            .send()
            .await
            .context("failed to send message")?;
        let response = ensure_success(response, "send").await?;
        response.json().await.context("malformed send response")
    }

    pub async fn participant(&self, id: &str) -> Result<Participant> {
        let endpoint = self.endpoint(&["api", "chat", "participants", id])?;
        let response = self
            .authorize(self.client.get(endpoint))
            .send()
            .await
            .context("failed to fetch participant")?;
        let response = ensure_success(response, "participant request").await?;
        response.json().await.context("malformed participant")
    }

    /// Opens the server-sent event stream, resuming after `last_event_id`.
    pub async fn open_stream(&self, last_event_id: Option<&str>) -> Result<Response> {
        let endpoint = self.endpoint(&["api", "chat", "stream"])?;
        let mut request = self
            .client
            .get(endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if let Some(id) = last_event_id {
            request = request.header("Last-Event-ID", id);
        }

        let response = self
            .authorize(request)
            .send()
            .await
            .context("failed to open live channel")?;
        ensure_success(response, "live channel").await
    }
}

#[async_trait]
impl HistorySource for ChatApiClient {
    async fn fetch_history(&self, scope: &ConversationScope) -> Result<HistoryPage, SyncError> {
        self.history_page(&scope.participant, 1)
            .await
            .map_err(|err| SyncError::Fetch(format!("{err:#}")))
    }
}

async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = serde_json::from_str::<ErrorResponse>(&body)
        .unwrap_or_else(|_| ErrorResponse::new(body.trim()));
    if error.message.is_empty() {
        bail!("{what} rejected with {status}");
    }
    bail!("{what} rejected with {status}: {error}")
}
