//! Remote message to cache record translation.

use chrono::{DateTime, Utc};
use mailsync_mime::Headers;
use tracing::warn;

use super::{BodyPart, RemoteMessage};
use crate::model::{CachedMessage, ProviderType, UserId};

/// Builds the cache record for `remote`, stamped as fetched at `now`.
///
/// Header values have RFC 2047 words decoded. The first `text/plain` and
/// first `text/html` parts become the bodies; a part that fails to decode is
/// dropped with a warning rather than failing the whole message.
#[must_use]
pub fn to_cached_message(
    user_id: &UserId,
    provider: ProviderType,
    remote: RemoteMessage,
    now: DateTime<Utc>,
) -> CachedMessage {
    let headers = Headers::from_pairs(remote.headers.iter().map(|(n, v)| (n.as_str(), v.as_str())));
    let header = |name: &str| headers.decoded(name).unwrap_or_default();

    let plain_body = first_body(&remote.parts, "text/plain", &remote.id);
    let html_body = first_body(&remote.parts, "text/html", &remote.id);

    let display_date = headers
        .decoded("Date")
        .filter(|d| !d.trim().is_empty())
        .or_else(|| DateTime::from_timestamp_millis(remote.internal_date).map(|d| d.to_rfc3339()))
        .unwrap_or_default();

    CachedMessage {
        user_id: user_id.clone(),
        provider,
        message_id: remote.id,
        thread_id: remote.thread_id,
        subject: header("Subject"),
        sender: header("From"),
        recipient: headers.decoded_all("To").join(", "),
        snippet: remote.snippet,
        plain_body,
        html_body,
        internal_date: remote.internal_date,
        display_date,
        provider_revision: remote.revision,
        cached_at: now,
        last_fetched_at: Some(now),
        category: None,
        category_confidence: None,
        raw_payload: remote.raw_payload,
    }
}

fn first_body(parts: &[BodyPart], mime_type: &str, message_id: &str) -> Option<String> {
    let part = parts
        .iter()
        .find(|p| p.mime_type.eq_ignore_ascii_case(mime_type))?;
    match part.transfer_encoding.decode_text(&part.data) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(message_id, mime_type, transfer_encoding = %part.transfer_encoding, error = %e, "Dropping undecodable body part");
            None
        }
    }
}
