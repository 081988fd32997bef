//! Bearer credentials handed in by the caller.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use super::ProviderType;

/// Seconds before expiry at which a credential stops being used.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Opaque bearer credential for one provider.
///
/// The engine never refreshes credentials; an expired one is treated as
/// absent.
#[derive(Clone)]
pub struct Credential {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Expiration time, if known.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Creates a bearer credential without a known expiry.
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expires_at: None,
        }
    }

    /// Sets the expiration time.
    #[must_use]
    pub const fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true if the credential is usable at `now` (with a 60 second buffer).
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && self
                .expires_at
                .is_none_or(|exp| now + Duration::seconds(EXPIRY_SKEW_SECS) < exp)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Credentials for the providers of one request, keyed by provider type.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    by_provider: HashMap<ProviderType, Credential>,
}

impl Credentials {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a credential, replacing any previous one for the provider.
    #[must_use]
    pub fn with(mut self, provider: ProviderType, credential: Credential) -> Self {
        self.by_provider.insert(provider, credential);
        self
    }

    /// Returns the provider's credential if it is valid at `now`.
    #[must_use]
    pub fn valid_for(&self, provider: ProviderType, now: DateTime<Utc>) -> Option<&Credential> {
        self.by_provider
            .get(&provider)
            .filter(|credential| credential.is_valid_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_window() {
        let now = Utc::now();
        assert!(Credential::bearer("t").is_valid_at(now));
        assert!(
            Credential::bearer("t")
                .with_expires_at(now + Duration::minutes(5))
                .is_valid_at(now)
        );
        assert!(
            !Credential::bearer("t")
                .with_expires_at(now + Duration::seconds(30))
                .is_valid_at(now)
        );
        assert!(!Credential::bearer("").is_valid_at(now));
    }

    #[test]
    fn test_valid_for_filters_expired() {
        let now = Utc::now();
        let creds = Credentials::new()
            .with(ProviderType::Gmail, Credential::bearer("g"))
            .with(
                ProviderType::Outlook,
                Credential::bearer("o").with_expires_at(now - Duration::minutes(1)),
            );

        assert!(creds.valid_for(ProviderType::Gmail, now).is_some());
        assert!(creds.valid_for(ProviderType::Outlook, now).is_none());
        assert!(creds.valid_for(ProviderType::Imap, now).is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", Credential::bearer("secret-token"));
        assert!(!rendered.contains("secret-token"));
    }
}
