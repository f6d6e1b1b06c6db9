//! Builds the provider registry from configuration

use super::catalog::{CatalogAdapter, CatalogExecutor, CatalogNormalizer};
use super::marketplace::{MarketplaceAdapter, MarketplaceExecutor, MarketplaceNormalizer};
use super::mock::{MockAdapter, MockExecutor, MockNormalizer};
use super::registry::ProviderRegistry;
use super::websearch::{WebSearchAdapter, WebSearchExecutor, WebSearchNormalizer};
use crate::config::ProvidersSettings;
use std::sync::Arc;
use tracing::{info, warn};

/// Register every provider the settings configure. The mock provider joins
/// when explicitly enabled, or automatically when nothing else is.
pub fn build_registry(settings: &ProvidersSettings) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    if let Some(ref catalog) = settings.catalog {
        if catalog.api_key.is_empty() {
            warn!("catalog provider configured without an api key, skipping");
        } else {
            registry.register(
                Arc::new(CatalogAdapter::new(catalog)),
                Arc::new(CatalogExecutor::new(catalog)),
                Arc::new(CatalogNormalizer),
            );
            info!("registered catalog provider");
        }
    }

    if let Some(ref websearch) = settings.websearch {
        if websearch.api_key.is_empty() || websearch.engine_id.is_empty() {
            warn!("websearch provider missing api key or engine id, skipping");
        } else {
            registry.register(
                Arc::new(WebSearchAdapter),
                Arc::new(WebSearchExecutor::new(websearch)),
                Arc::new(WebSearchNormalizer),
            );
            info!("registered websearch provider");
        }
    }

    if let Some(ref marketplace) = settings.marketplace {
        if marketplace.client_id.is_empty() || marketplace.client_secret.is_empty() {
            warn!("marketplace provider missing client credentials, skipping");
        } else {
            registry.register(
                Arc::new(MarketplaceAdapter),
                Arc::new(MarketplaceExecutor::new(marketplace)),
                Arc::new(MarketplaceNormalizer),
            );
            info!("registered marketplace provider");
        }
    }

    let register_mock = match settings.mock.enabled {
        Some(enabled) => enabled,
        None => registry.is_empty(),
    };
    if register_mock {
        registry.register(
            Arc::new(MockAdapter),
            Arc::new(MockExecutor),
            Arc::new(MockNormalizer),
        );
        info!("registered mock provider");
    }

    registry
}
