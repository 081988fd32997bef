//! Factory registry keyed by provider type.

use std::collections::HashMap;
use std::sync::Arc;

use super::gmail::GmailFactory;
use super::{ProviderError, ProviderResult, SharedProvider};
use crate::model::{Credential, ProviderLink, ProviderType};

/// Creates a connected adapter for one link.
pub trait ProviderFactory: Send + Sync {
    /// Builds an adapter using `credential` for every remote call.
    ///
    /// # Errors
    ///
    /// Returns an error if the link's settings are unusable.
    fn create(&self, link: &ProviderLink, credential: &Credential) -> ProviderResult<SharedProvider>;
}

/// Factories for every supported provider type.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<ProviderType, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in adapters (Gmail).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new().with(ProviderType::Gmail, Arc::new(GmailFactory::default()))
    }

    /// Registers a factory, replacing any previous one for the type.
    #[must_use]
    pub fn with(mut self, provider: ProviderType, factory: Arc<dyn ProviderFactory>) -> Self {
        self.register(provider, factory);
        self
    }

    /// Registers a factory, replacing any previous one for the type.
    pub fn register(&mut self, provider: ProviderType, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(provider, factory);
    }

    /// Returns true if an adapter exists for the type.
    #[must_use]
    pub fn supports(&self, provider: ProviderType) -> bool {
        self.factories.contains_key(&provider)
    }

    /// Connects an adapter for `link`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Unsupported` if no factory is registered, or
    /// the factory's error.
    pub fn connect(&self, link: &ProviderLink, credential: &Credential) -> ProviderResult<SharedProvider> {
        let factory = self
            .factories
            .get(&link.provider)
            .ok_or(ProviderError::Unsupported(link.provider))?;
        factory.create(link, credential)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::UserId;

    #[test]
    fn test_defaults_register_gmail_only() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.supports(ProviderType::Gmail));
        assert!(!registry.supports(ProviderType::Outlook));
        assert!(!registry.supports(ProviderType::Imap));
    }

    #[test]
    fn test_connect_unsupported() {
        let registry = ProviderRegistry::with_defaults();
        let link = ProviderLink::new(UserId::from("u1"), ProviderType::Imap);
        let err = registry
            .connect(&link, &Credential::bearer("t"))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Unsupported(ProviderType::Imap)));
    }

    #[test]
    fn test_connect_gmail() {
        let registry = ProviderRegistry::with_defaults();
        let link = ProviderLink::new(UserId::from("u1"), ProviderType::Gmail);
        let provider = registry.connect(&link, &Credential::bearer("t")).unwrap();
        assert_eq!(provider.provider_type(), ProviderType::Gmail);
    }
}
