use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::api::MailApi;
use crate::error::{ClientError, ClientResult};
use crate::types::*;

/// Connection settings for a mail-trap server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:1080`
    pub base_url: String,
    /// Path prefix of the REST endpoints (`""` or `"/api"`)
    pub api_prefix: String,
    /// HTTP basic auth user
    pub username: Option<String>,
    /// HTTP basic auth password
    pub password: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Delay between event stream reconnection attempts in seconds
    pub retry_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1080".to_string(),
            api_prefix: String::new(),
            username: None,
            password: None,
            timeout_secs: 30,
            retry_secs: 5,
        }
    }
}

impl ClientConfig {
    pub fn base(&self) -> ClientResult<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    /// Root of the REST endpoints, always ending in `/`
    pub fn api_root(&self) -> ClientResult<Url> {
        let prefix = self.api_prefix.trim_matches('/');
        let path = if prefix.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", prefix)
        };
        Ok(self.base()?.join(&path)?)
    }

    /// Location of the live event stream (`ws://host/ws` or `wss://host/ws`)
    pub fn websocket_url(&self) -> ClientResult<Url> {
        let mut url = self.base()?.join("/ws")?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::ParseError(format!("cannot use {} for websockets", url)))?;
        Ok(url)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_secs.max(1))
    }
}

/// HTTP client for the mail-trap REST API
pub struct MailtrapClient {
    client: reqwest::Client,
    config: ClientConfig,
    base: Url,
    api_root: Url,
}

impl MailtrapClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base = config.base()?;
        let api_root = config.api_root()?;
        Ok(Self {
            client,
            config,
            base,
            api_root,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::ApiError { status, body });
        }

        Ok(response)
    }

    /// Send a request and decode its JSON reply
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))?;

        let data = open_envelope(status, body)?;
        serde_json::from_value(data).map_err(|e| ClientError::ParseError(e.to_string()))
    }

    /// Send a request whose reply carries no data
    async fn execute(&self, request: RequestBuilder) -> ClientResult<()> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        // Older servers answer with an empty or plain-text body
        if let Ok(body) = serde_json::from_str::<Value>(&text) {
            open_envelope(status, body)?;
        }
        Ok(())
    }

    /// Turn a server-relative link into an absolute URL
    fn resolve(&self, href: &str) -> String {
        self.base
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string())
    }

    fn resolve_links(&self, mut detail: MessageDetail) -> MessageDetail {
        detail.href = self.resolve(&detail.href);
        for url in detail.formats.values_mut() {
            *url = self.resolve(url);
        }
        for attachment in &mut detail.attachments {
            attachment.href = self.resolve(&attachment.href);
        }
        detail
    }

    /// `DELETE /` lives on the prefix itself, without a trailing slash
    fn terminate_url(&self) -> ClientResult<Url> {
        let prefix = self.config.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            Ok(self.base.join("/")?)
        } else {
            Ok(self.base.join(&format!("/{}", prefix))?)
        }
    }
}

/// Unwrap an [`Envelope`] reply, turning a failure code into an error.
///
/// Bare replies pass through untouched.
fn open_envelope(status: u16, body: Value) -> ClientResult<Value> {
    if !Envelope::wraps(&body) {
        return Ok(body);
    }

    let envelope: Envelope =
        serde_json::from_value(body).map_err(|e| ClientError::ParseError(e.to_string()))?;
    if envelope.code != Envelope::OK {
        let body = match envelope.message {
            Some(message) => format!("{}: {}", envelope.code, message),
            None => envelope.code,
        };
        return Err(ClientError::ApiError { status, body });
    }

    Ok(envelope.data.unwrap_or(Value::Null))
}

#[async_trait]
impl MailApi for MailtrapClient {
    async fn list_messages(&self) -> ClientResult<Vec<MessageSummary>> {
        let url = self.api_root.join("messages/")?;
        debug!("Listing messages from {}", url);

        let list: MessageList = self.fetch(self.request(Method::GET, url)).await?;

        let messages = list.into_messages();
        info!("Server holds {} messages", messages.len());
        Ok(messages)
    }

    async fn get_message(&self, id: &MessageId) -> ClientResult<MessageDetail> {
        let url = self.api_root.join(&format!("messages/{}.json", id))?;
        debug!("Fetching message {}", id);

        let detail: MessageDetail = self.fetch(self.request(Method::GET, url)).await?;

        Ok(self.resolve_links(detail))
    }

    async fn delete_message(&self, id: &MessageId) -> ClientResult<()> {
        let url = self.api_root.join(&format!("messages/{}", id))?;
        debug!("Deleting message {}", id);

        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    async fn delete_messages(&self) -> ClientResult<()> {
        let url = self.api_root.join("messages/")?;
        debug!("Deleting all messages");

        self.execute(self.request(Method::DELETE, url)).await?;
        info!("Requested deletion of all messages");
        Ok(())
    }

    async fn terminate(&self) -> ClientResult<()> {
        let url = self.terminate_url()?;
        debug!("Requesting server termination via {}", url);

        self.execute(self.request(Method::DELETE, url)).await?;
        info!("Server termination requested");
        Ok(())
    }
}
