//! Agent configuration
//!
//! Layered: built-in defaults, then an optional file named by
//! `CLUSTERCOST_CONFIG_FILE`, then `CLUSTERCOST_*` environment variables
//! (nested keys separated by `__`, e.g. `CLUSTERCOST_PRICING__REGION`).

use agent_lib::classifier::{ClassifierConfig, DEFAULT_ENVIRONMENT_LABEL};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::Duration;

const ENV_PREFIX: &str = "CLUSTERCOST";
const CONFIG_FILE_ENV: &str = "CLUSTERCOST_CONFIG_FILE";
const INSTANCE_PRICES_ENV: &str = "CLUSTERCOST_INSTANCE_PRICES";
const CLUSTER_NAME_ENV: &str = "CLUSTER_NAME";

/// Lowest accepted scrape interval
pub const MIN_SCRAPE_INTERVAL_SECS: u64 = 5;

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Logical cluster identifier; falls back to `cluster_name`
    pub cluster_id: String,

    pub cluster_name: String,

    /// HTTP listen address for the API, health and metrics
    pub listen_addr: String,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,

    pub scrape_interval_secs: u64,

    /// Path to a kubeconfig; in-cluster or default config when unset
    pub kubeconfig: Option<String>,

    pub cache_sync_timeout_secs: u64,

    pub metrics_timeout_secs: u64,

    pub pricing: PricingConfig,

    pub environment: EnvironmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub provider: String,
    /// Region reported when it cannot be detected from node labels
    pub region: String,
    pub default_node_hourly_usd: f64,
    pub instance_prices: BTreeMap<String, f64>,
}

/// Namespace classification rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub label_keys: Vec<String>,
    pub production_label_values: Vec<String>,
    pub nonprod_label_values: Vec<String>,
    pub system_label_values: Vec<String>,
    pub production_name_contains: Vec<String>,
    pub system_namespaces: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cluster_id: String::new(),
            cluster_name: "kubernetes".to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            scrape_interval_secs: 60,
            kubeconfig: None,
            cache_sync_timeout_secs: 120,
            metrics_timeout_secs: 15,
            pricing: PricingConfig::default(),
            environment: EnvironmentConfig::default(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            default_node_hourly_usd: 0.1,
            instance_prices: BTreeMap::new(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            label_keys: strings(&[DEFAULT_ENVIRONMENT_LABEL]),
            production_label_values: strings(&["production", "prod"]),
            nonprod_label_values: strings(&["nonprod", "staging", "dev", "test"]),
            system_label_values: strings(&["system"]),
            production_name_contains: strings(&["prod"]),
            system_namespaces: strings(&[
                "kube-system",
                "monitoring",
                "logging",
                "ingress",
                "istio-system",
                "linkerd",
                "cert-manager",
            ]),
        }
    }
}

impl From<&EnvironmentConfig> for ClassifierConfig {
    fn from(env: &EnvironmentConfig) -> Self {
        ClassifierConfig {
            label_keys: env.label_keys.clone(),
            production_label_values: env.production_label_values.clone(),
            nonprod_label_values: env.nonprod_label_values.clone(),
            system_label_values: env.system_label_values.clone(),
            production_name_contains: env.production_name_contains.clone(),
            system_namespaces: env.system_namespaces.clone(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_from_env(&env)
    }

    /// Load configuration from an explicit set of environment variables
    pub fn load_from_env(env: &HashMap<String, String>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&AgentConfig::default()).context("encode defaults")?,
        );

        if let Some(path) = env.get(CONFIG_FILE_ENV).filter(|p| !p.is_empty()) {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let overrides: config::Map<String, String> = env
            .iter()
            .filter(|(k, _)| k.as_str() != CONFIG_FILE_ENV && k.as_str() != INSTANCE_PRICES_ENV)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(overrides)),
        );

        let mut cfg: AgentConfig = builder
            .build()
            .context("load configuration")?
            .try_deserialize()
            .context("parse configuration")?;

        if let Some(raw) = env.get(INSTANCE_PRICES_ENV).filter(|v| !v.is_empty()) {
            cfg.pricing.instance_prices = serde_json::from_str(raw)
                .with_context(|| format!("parse {}", INSTANCE_PRICES_ENV))?;
        }

        if let Some(name) = env.get(CLUSTER_NAME_ENV).filter(|v| !v.is_empty()) {
            cfg.cluster_name = name.clone();
        }

        cfg.finalize()?;
        Ok(cfg)
    }

    /// Apply fallbacks and validate
    fn finalize(&mut self) -> Result<()> {
        if self.cluster_id.is_empty() {
            self.cluster_id = self.cluster_name.clone();
        }
        if self.cluster_name.is_empty() {
            self.cluster_name = self.cluster_id.clone();
        }

        if self.pricing.default_node_hourly_usd < 0.0 {
            bail!("default node hourly price must be non-negative");
        }

        if self.scrape_interval_secs < MIN_SCRAPE_INTERVAL_SECS {
            self.scrape_interval_secs = MIN_SCRAPE_INTERVAL_SECS;
        }

        Ok(())
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }

    pub fn cache_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_sync_timeout_secs)
    }

    pub fn metrics_timeout(&self) -> Duration {
        Duration::from_secs(self.metrics_timeout_secs)
    }

    /// Listen address as a socket address; `:8080` binds all interfaces
    pub fn listen_socket_addr(&self) -> Result<SocketAddr> {
        let addr = if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        };
        addr.parse()
            .with_context(|| format!("invalid listen address {:?}", self.listen_addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let cfg = AgentConfig::load_from_env(&HashMap::new()).unwrap();

        assert_eq!(cfg.cluster_name, "kubernetes");
        assert_eq!(cfg.cluster_id, "kubernetes");
        assert_eq!(cfg.scrape_interval(), Duration::from_secs(60));
        assert_eq!(cfg.metrics_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.pricing.default_node_hourly_usd, 0.1);
        assert_eq!(cfg.environment.system_namespaces.len(), 7);
        assert_eq!(
            cfg.listen_socket_addr().unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_env_overrides() {
        let cfg = AgentConfig::load_from_env(&env(&[
            ("CLUSTERCOST_CLUSTER_ID", "prod-eu"),
            ("CLUSTERCOST_SCRAPE_INTERVAL_SECS", "30"),
            ("CLUSTERCOST_PRICING__REGION", "eu-west-1"),
            ("CLUSTERCOST_PRICING__DEFAULT_NODE_HOURLY_USD", "0.2"),
        ]))
        .unwrap();

        assert_eq!(cfg.cluster_id, "prod-eu");
        assert_eq!(cfg.cluster_name, "kubernetes");
        assert_eq!(cfg.scrape_interval_secs, 30);
        assert_eq!(cfg.pricing.region, "eu-west-1");
        assert_eq!(cfg.pricing.default_node_hourly_usd, 0.2);
    }

    #[test]
    fn test_scrape_interval_floor() {
        let cfg =
            AgentConfig::load_from_env(&env(&[("CLUSTERCOST_SCRAPE_INTERVAL_SECS", "1")])).unwrap();
        assert_eq!(cfg.scrape_interval_secs, MIN_SCRAPE_INTERVAL_SECS);
    }

    #[test]
    fn test_negative_default_price_rejected() {
        let result = AgentConfig::load_from_env(&env(&[(
            "CLUSTERCOST_PRICING__DEFAULT_NODE_HOURLY_USD",
            "-1",
        )]));
        assert!(result.is_err());
    }

    #[test]
    fn test_instance_prices_from_json_env() {
        let cfg = AgentConfig::load_from_env(&env(&[(
            INSTANCE_PRICES_ENV,
            r#"{"m5.large": 0.096, "c5.xlarge": 0.17}"#,
        )]))
        .unwrap();
        assert_eq!(cfg.pricing.instance_prices["m5.large"], 0.096);
        assert_eq!(cfg.pricing.instance_prices.len(), 2);

        let bad = AgentConfig::load_from_env(&env(&[(INSTANCE_PRICES_ENV, "not json")]));
        assert!(bad.is_err());
    }

    #[test]
    fn test_cluster_name_env_override_and_fallback() {
        let cfg = AgentConfig::load_from_env(&env(&[(CLUSTER_NAME_ENV, "shop")])).unwrap();
        assert_eq!(cfg.cluster_name, "shop");
        assert_eq!(cfg.cluster_id, "shop");
    }

    #[test]
    fn test_file_then_env_precedence() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "cluster_name: from-file\nlisten_addr: \":9090\"\npricing:\n  instance_prices:\n    m5.large: 0.5\nenvironment:\n  system_namespaces: [infra]"
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let cfg = AgentConfig::load_from_env(&env(&[
            (CONFIG_FILE_ENV, path),
            ("CLUSTERCOST_CLUSTER_NAME", "from-env"),
        ]))
        .unwrap();

        assert_eq!(cfg.cluster_name, "from-env");
        assert_eq!(cfg.pricing.instance_prices["m5.large"], 0.5);
        assert_eq!(cfg.environment.system_namespaces[0], "infra");
        assert_eq!(cfg.environment.production_name_contains, vec!["prod".to_string()]);
        assert_eq!(cfg.listen_socket_addr().unwrap().port(), 9090);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let result = AgentConfig::load_from_env(&env(&[(
            CONFIG_FILE_ENV,
            "/nonexistent/clustercost.yaml",
        )]));
        assert!(result.is_err());
    }
}
