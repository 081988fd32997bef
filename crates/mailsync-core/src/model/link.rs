//! Provider types and user links.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::Error;

/// Kind of remote mail source.
///
/// Ordering follows the stored tag (`as_str`), so in-memory sorting agrees
/// with the database's text collation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Gmail REST API.
    Gmail,
    /// Microsoft Outlook / Graph.
    Outlook,
    /// Generic IMAP mailbox.
    Imap,
}

/// Static description of what a provider type offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Human readable name.
    pub display_name: &'static str,
    /// Largest page the provider's list call accepts.
    pub max_page_size: u32,
}

impl ProviderType {
    /// Every known provider type.
    pub const ALL: [Self; 3] = [Self::Gmail, Self::Outlook, Self::Imap];

    /// Stable tag stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Outlook => "outlook",
            Self::Imap => "imap",
        }
    }

    /// Capability descriptor for this provider type.
    #[must_use]
    pub const fn capabilities(self) -> ProviderCapabilities {
        match self {
            Self::Gmail => ProviderCapabilities {
                display_name: "Gmail",
                max_page_size: 500,
            },
            Self::Outlook => ProviderCapabilities {
                display_name: "Outlook",
                max_page_size: 1000,
            },
            Self::Imap => ProviderCapabilities {
                display_name: "IMAP",
                max_page_size: 200,
            },
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Invalid(format!("unknown provider type: {s}")))
    }
}

impl PartialOrd for ProviderType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProviderType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

/// A user's link to one provider account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderLink {
    /// Owning user.
    pub user_id: UserId,
    /// Provider type; at most one link per type per user.
    pub provider: ProviderType,
    /// Provider-specific settings (opaque to the engine).
    pub config: serde_json::Value,
    /// When the link was registered.
    pub linked_at: DateTime<Utc>,
}

impl ProviderLink {
    /// Creates a link with empty provider settings.
    #[must_use]
    pub fn new(user_id: UserId, provider: ProviderType) -> Self {
        Self {
            user_id,
            provider,
            config: serde_json::Value::Object(serde_json::Map::new()),
            linked_at: Utc::now(),
        }
    }

    /// Sets provider-specific settings.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Reads a string setting.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(serde_json::Value::as_str)
    }
}
