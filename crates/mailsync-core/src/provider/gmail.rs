//! Gmail REST adapter.
//!
//! Lists message ids through `users/{user}/messages` and fetches full
//! messages with `format=full`. Gmail re-encodes every body part as URL-safe
//! Base64 regardless of its original transfer encoding.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::registry::ProviderFactory;
use super::{
    BodyPart, ProviderError, ProviderResult, RemoteListing, RemoteMessage, RemoteProvider,
    SharedProvider,
};
use crate::model::{Credential, ProviderLink, ProviderType};
use mailsync_mime::TransferEncoding;

/// Public Gmail API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Link setting naming the Gmail user id (defaults to `me`).
const USER_SETTING: &str = "gmail_user";

/// Creates [`GmailProvider`]s sharing one HTTP client.
#[derive(Debug, Clone)]
pub struct GmailFactory {
    http: Client,
    base_url: String,
}

impl Default for GmailFactory {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl GmailFactory {
    /// Creates a factory targeting `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ProviderFactory for GmailFactory {
    fn create(&self, link: &ProviderLink, credential: &Credential) -> ProviderResult<SharedProvider> {
        let user = link.setting(USER_SETTING).unwrap_or("me");
        if !is_path_segment(user) || user.contains('/') {
            return Err(ProviderError::Decode(format!("invalid {USER_SETTING}: {user:?}")));
        }
        let mut messages_url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Decode(format!("base url {}: {e}", self.base_url)))?;
        messages_url
            .path_segments_mut()
            .map_err(|()| ProviderError::Decode(format!("base url {} cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .extend(["users", user, "messages"]);

        Ok(std::sync::Arc::new(GmailProvider {
            http: self.http.clone(),
            messages_url,
            credential: credential.clone(),
        }))
    }
}

/// Gmail adapter bound to one mailbox and credential.
#[derive(Debug)]
pub struct GmailProvider {
    http: Client,
    messages_url: Url,
    credential: Credential,
}

/// Segments the URL parser would drop or collapse.
fn is_path_segment(segment: &str) -> bool {
    !matches!(segment, "" | "." | "..")
}

impl GmailProvider {
    /// `messages/{id}`, with the id percent-encoded as a single segment.
    fn message_url(&self, message_id: &str) -> ProviderResult<Url> {
        let mut url = self.messages_url.clone();
        url.path_segments_mut()
            .map_err(|()| ProviderError::Decode(format!("{} cannot hold a path", self.messages_url)))?
            .push(message_id);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header(
            reqwest::header::AUTHORIZATION,
            format!("{} {}", self.credential.token_type, self.credential.access_token),
        )
    }
}

#[async_trait]
impl RemoteProvider for GmailProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Gmail
    }

    async fn list(
        &self,
        page_size: u32,
        continuation: Option<&str>,
    ) -> ProviderResult<RemoteListing> {
        let max = ProviderType::Gmail.capabilities().max_page_size;
        let mut query = vec![("maxResults", page_size.clamp(1, max).to_string())];
        if let Some(token) = continuation {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .authorize(self.http.get(self.messages_url.clone()))
            .query(&query)
            .send()
            .await?;
        let listing: ListResponse = check_status(response, None).await?.json().await?;

        debug!(count = listing.messages.len(), "Listed Gmail messages");
        Ok(RemoteListing {
            ids: listing.messages.into_iter().map(|m| m.id).collect(),
            next_continuation: listing.next_page_token,
        })
    }

    async fn get(&self, message_id: &str) -> ProviderResult<RemoteMessage> {
        if !is_path_segment(message_id) {
            return Err(ProviderError::NotFound(message_id.to_string()));
        }
        let url = self.message_url(message_id)?;
        let response = self
            .authorize(self.http.get(url))
            .query(&[("format", "full")])
            .send()
            .await?;
        let raw: serde_json::Value = check_status(response, Some(message_id)).await?.json().await?;
        parse_message(raw)
    }
}

async fn check_status(response: Response, message_id: Option<&str>) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match (status, message_id) {
        (StatusCode::NOT_FOUND, Some(id)) => Err(ProviderError::NotFound(id.to_string())),
        (StatusCode::UNAUTHORIZED, _) => Err(ProviderError::Unauthorized),
        _ => Err(ProviderError::Status {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    history_id: String,
    #[serde(default)]
    internal_date: String,
    payload: Option<GmailPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailPart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    headers: Vec<GmailHeader>,
    body: Option<GmailBody>,
    #[serde(default)]
    parts: Vec<GmailPart>,
}

#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct GmailBody {
    data: Option<String>,
}

/// Converts a `format=full` message resource.
///
/// # Errors
///
/// Returns `ProviderError::Decode` if the resource is malformed.
pub fn parse_message(raw: serde_json::Value) -> ProviderResult<RemoteMessage> {
    let message: GmailMessage =
        serde_json::from_value(raw.clone()).map_err(|e| ProviderError::Decode(e.to_string()))?;

    let internal_date = if message.internal_date.is_empty() {
        0
    } else {
        message
            .internal_date
            .parse::<i64>()
            .map_err(|e| ProviderError::Decode(format!("internalDate: {e}")))?
    };

    let payload = message.payload.unwrap_or_default();
    let headers = payload
        .headers
        .iter()
        .map(|h| (h.name.clone(), h.value.clone()))
        .collect();
    let mut parts = Vec::new();
    collect_text_parts(&payload, &mut parts);

    Ok(RemoteMessage {
        id: message.id,
        thread_id: message.thread_id,
        headers,
        snippet: message.snippet,
        parts,
        internal_date,
        revision: message.history_id,
        raw_payload: raw,
    })
}

fn collect_text_parts(part: &GmailPart, out: &mut Vec<BodyPart>) {
    if part.filename.is_empty() && part.mime_type.starts_with("text/") {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
            if !data.is_empty() {
                out.push(BodyPart {
                    mime_type: part.mime_type.clone(),
                    transfer_encoding: TransferEncoding::Base64Url,
                    data: data.to_string(),
                });
            }
        }
    }
    for child in &part.parts {
        collect_text_parts(child, out);
    }
}
