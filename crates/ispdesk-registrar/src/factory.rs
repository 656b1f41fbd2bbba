//! Registrar client resolution

use ispdesk_core::config::RegistrarConfig;
use ispdesk_core::models::Registrar;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::client::{HttpRegistrarClient, RegistrarClient};
use crate::error::{RegistrarError, Result};

/// Resolves the API client for a registrar
pub trait RegistrarClientFactory: Send + Sync {
    fn client_for(&self, registrar: &Registrar) -> Result<Arc<dyn RegistrarClient>>;
}

/// Factory building HTTP clients from the `registrar.clients` configuration
///
/// A registrar without a configured entry falls back to its stored `api_url`.
pub struct ConfiguredClientFactory {
    config: RegistrarConfig,
    clients: HashMap<String, Arc<dyn RegistrarClient>>,
}

impl ConfiguredClientFactory {
    /// Build clients for every configured registrar up front
    pub fn new(config: RegistrarConfig) -> Result<Self> {
        let mut clients: HashMap<String, Arc<dyn RegistrarClient>> = HashMap::new();

        for (code, settings) in &config.clients {
            let key = code.to_ascii_lowercase();
            let client = HttpRegistrarClient::new(
                &key,
                &settings.base_url,
                settings.api_key.clone(),
                config.request_timeout_ms,
            )?;
            clients.insert(key, Arc::new(client));
        }

        debug!("Configured {} registrar clients", clients.len());
        Ok(Self { config, clients })
    }
}

impl RegistrarClientFactory for ConfiguredClientFactory {
    fn client_for(&self, registrar: &Registrar) -> Result<Arc<dyn RegistrarClient>> {
        let key = registrar.code.trim().to_ascii_lowercase();

        if let Some(client) = self.clients.get(&key) {
            return Ok(Arc::clone(client));
        }

        match registrar.api_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                debug!("Using stored API URL for registrar {}", registrar.code);
                let client = HttpRegistrarClient::new(
                    &key,
                    url,
                    None,
                    self.config.request_timeout_ms,
                )?;
                Ok(Arc::new(client))
            }
            _ => Err(RegistrarError::NotConfigured(registrar.code.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ispdesk_core::config::RegistrarClientConfig;

    fn registrar(code: &str, api_url: Option<&str>) -> Registrar {
        let now = Utc::now();
        Registrar {
            id: 1,
            code: code.to_string(),
            name: code.to_uppercase(),
            api_url: api_url.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn config() -> RegistrarConfig {
        let mut config = RegistrarConfig::default();
        config.clients.insert(
            "Acme".to_string(),
            RegistrarClientConfig {
                base_url: "https://api.acme.test".to_string(),
                api_key: Some("k".to_string()),
            },
        );
        config
    }

    #[test]
    fn test_configured_client_is_found_case_insensitively() {
        let factory = ConfiguredClientFactory::new(config()).unwrap();
        let client = factory.client_for(&registrar("ACME", None)).unwrap();
        assert_eq!(client.code(), "acme");
    }

    #[test]
    fn test_falls_back_to_stored_api_url() {
        let factory = ConfiguredClientFactory::new(config()).unwrap();
        let client = factory
            .client_for(&registrar("other", Some("https://other.test")))
            .unwrap();
        assert_eq!(client.code(), "other");
    }

    #[test]
    fn test_unknown_registrar_is_not_configured() {
        let factory = ConfiguredClientFactory::new(config()).unwrap();
        let result = factory.client_for(&registrar("missing", None));
        assert!(matches!(result, Err(RegistrarError::NotConfigured(_))));
    }
}
