//! Provider Registry
//!
//! Name-keyed table of live provider clients. Reads are lock-free through
//! `DashMap`; register/deregister are serialized with each other. Clients
//! are handed out as `Arc`s, so replacing a name never disturbs calls
//! already running on the previous client.

use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

use super::{HealthThresholds, ProviderClient, ProviderConfig};
use crate::ai::audit::{SharedAuditSink, TracingAuditSink};
use crate::ai::metrics::{SharedMetrics, create_shared_metrics};
use crate::config::{Config, RetrySettings};
use crate::types::{CrossCheckError, Result};

pub struct ProviderRegistry {
    clients: DashMap<String, Arc<ProviderClient>>,
    /// Serializes mutations; readers never take it
    write_lock: Mutex<()>,
    retry: RetrySettings,
    thresholds: HealthThresholds,
    audit: SharedAuditSink,
    metrics: Option<SharedMetrics>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list())
            .finish()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            write_lock: Mutex::new(()),
            retry: RetrySettings::default(),
            thresholds: HealthThresholds::default(),
            audit: Arc::new(TracingAuditSink),
            metrics: None,
        }
    }

    /// Registry whose clients use the configured retry and health settings
    ///
    /// Registers every configured provider; fails on the first provider
    /// that cannot be constructed. All clients share one metrics collector.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = Self::new()
            .with_retry_settings(config.retry.clone())
            .with_health_thresholds(HealthThresholds::from(&config.health))
            .with_metrics(create_shared_metrics(Uuid::new_v4().to_string()));
        for provider in &config.providers {
            registry.register(provider.clone())?;
        }
        Ok(registry)
    }

    pub fn with_retry_settings(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_health_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_audit_sink(mut self, sink: SharedAuditSink) -> Self {
        self.audit = sink;
        self
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Collector shared by every client this registry builds
    pub fn metrics(&self) -> Option<&SharedMetrics> {
        self.metrics.as_ref()
    }

    /// Build a client from `config` and store it under its logical name
    ///
    /// An existing client under the same name is replaced; calls already
    /// holding it run to completion.
    pub fn register(&self, config: ProviderConfig) -> Result<Arc<ProviderClient>> {
        config.validate()?;
        let mut client = ProviderClient::from_config(&config, &self.retry)?
            .with_health_thresholds(self.thresholds)
            .with_audit_sink(Arc::clone(&self.audit));
        if let Some(metrics) = &self.metrics {
            client = client.with_metrics(Arc::clone(metrics));
        }
        Ok(self.register_client(client))
    }

    /// Store an already constructed client under its own name
    pub fn register_client(&self, client: ProviderClient) -> Arc<ProviderClient> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let name = client.name().to_string();
        let client = Arc::new(client);
        let replaced = self.clients.insert(name.clone(), Arc::clone(&client));
        if replaced.is_some() {
            info!(provider = %name, "Replaced registered provider");
        } else {
            info!(provider = %name, kind = %client.config().provider, "Registered provider");
        }
        client
    }

    pub fn get(&self, name: &str) -> Result<Arc<ProviderClient>> {
        self.clients
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CrossCheckError::ProviderNotFound(name.to_string()))
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Registered clients, sorted by name
    pub fn clients(&self) -> Vec<Arc<ProviderClient>> {
        let mut clients: Vec<Arc<ProviderClient>> =
            self.clients.iter().map(|e| Arc::clone(e.value())).collect();
        clients.sort_by(|a, b| a.name().cmp(b.name()));
        clients
    }

    pub fn deregister(&self, name: &str) -> Result<Arc<ProviderClient>> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let (_, client) = self
            .clients
            .remove(name)
            .ok_or_else(|| CrossCheckError::ProviderNotFound(name.to_string()))?;
        info!(provider = %name, "Deregistered provider");
        Ok(client)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::MockProvider;
    use crate::ai::provider::{GenerationParams, ProviderKind};
    use std::time::Duration;

    fn mock_client(name: &str, content: &str, delay: Duration) -> ProviderClient {
        let backend = Arc::new(MockProvider::new(name).always_ok(content, delay));
        ProviderClient::with_backend(ProviderConfig::new(ProviderKind::OpenAi).with_name(name), backend)
    }

    #[test]
    fn test_get_unknown_is_provider_not_found() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.get("missing"),
            Err(CrossCheckError::ProviderNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_register_list_deregister() {
        let registry = ProviderRegistry::new();
        registry.register_client(mock_client("openai", "a", Duration::ZERO));
        registry.register_client(mock_client("anthropic", "b", Duration::ZERO));

        assert_eq!(registry.list(), vec!["anthropic", "openai"]);
        assert!(registry.deregister("openai").is_ok());
        assert_eq!(registry.list(), vec!["anthropic"]);
        assert!(registry.deregister("openai").is_err());
    }

    #[test]
    fn test_register_from_config() {
        let registry = ProviderRegistry::new();
        let config = ProviderConfig::new(ProviderKind::Ollama).with_name("local");
        registry.register(config).unwrap();
        assert!(registry.contains("local"));
    }

    #[test]
    fn test_from_config_registers_providers_with_shared_metrics() {
        let mut config = Config::default();
        config.providers = vec![
            ProviderConfig::new(ProviderKind::Ollama).with_name("local"),
            ProviderConfig::new(ProviderKind::Ollama).with_name("remote"),
        ];
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.list(), vec!["local", "remote"]);
        assert!(registry.metrics().is_some());
        assert!(ProviderRegistry::new().metrics().is_none());
    }

    #[test]
    fn test_register_rejects_invalid_config() {
        let registry = ProviderRegistry::new();
        let mut config = ProviderConfig::new(ProviderKind::Ollama);
        config.max_requests_per_minute = Some(0);
        assert!(registry.register(config).is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_replace_keeps_in_flight_call_on_old_client() {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register_client(mock_client("openai", "old", Duration::from_millis(150)));

        let in_flight = {
            let client = registry.get("openai").unwrap();
            tokio::spawn(async move { client.generate("q", &GenerationParams::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        registry.register_client(mock_client("openai", "new", Duration::ZERO));
        let fresh = registry
            .get("openai")
            .unwrap()
            .generate("q", &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(in_flight.await.unwrap().unwrap().content, "old");
        assert_eq!(fresh.content, "new");
        assert_eq!(registry.len(), 1);
    }
}
