//! Tools to manage the search backends.

use std::sync::Arc;

use anyhow::{Context, Result};
use cadence::StatsdClient;
use formulary_search::{Aggregator, Executor, FieldSearcher};
use formulary_settings::Settings;

/// The search backends stored in Actix's app_data.
#[derive(Clone)]
pub struct SearchProviderRef {
    /// Runs single-field searches.
    pub searcher: Arc<dyn FieldSearcher>,

    /// Runs searches across every field of a resource.
    pub aggregator: Arc<Aggregator>,
}

impl SearchProviderRef {
    /// Set up the search backends that talk to the configured upstream.
    ///
    /// # Errors
    /// If the upstream HTTP client cannot be created.
    pub fn init(settings: &Settings, metrics_client: &StatsdClient) -> Result<Self> {
        let _setup_span = tracing::info_span!("search_provider_setup").entered();
        tracing::info!(
            r#type = "web.configuring-searchers",
            upstream = %settings.upstream.base_url,
            "Setting up search providers"
        );

        let executor = Executor::new(&settings.upstream).context("Creating upstream executor")?;
        Ok(Self::with_searcher(
            Arc::new(executor),
            settings,
            metrics_client,
        ))
    }

    /// Use `searcher` for both single-field and aggregated searches.
    pub fn with_searcher(
        searcher: Arc<dyn FieldSearcher>,
        settings: &Settings,
        metrics_client: &StatsdClient,
    ) -> Self {
        let aggregator = Aggregator::new(searcher.clone(), &settings.search, metrics_client.clone());
        Self {
            searcher,
            aggregator: Arc::new(aggregator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SearchProviderRef;
    use anyhow::Result;
    use cadence::{SpyMetricSink, StatsdClient};
    use formulary_settings::Settings;

    #[test]
    fn test_providers_use_the_configured_upstream() -> Result<()> {
        let mut settings = Settings::load_for_tests();
        settings.upstream.base_url = "https://api.example.com/".to_string();
        let metrics_client = StatsdClient::from_sink("formulary-test", SpyMetricSink::new().1);

        let providers = SearchProviderRef::init(&settings, &metrics_client)?;

        assert_eq!(
            providers.searcher.name(),
            "Executor(https://api.example.com)"
        );
        assert_eq!(
            providers.aggregator.searcher().name(),
            providers.searcher.name()
        );
        Ok(())
    }
}
