//! Server Configuration
//!
//! Built once at startup: defaults, then an optional YAML file named by
//! `TRAVEL_AGENT_CONFIG`, then environment overrides. The result is passed
//! into constructors; nothing reads the environment after this.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use agent_core::provider::GenerationOptions;
use agent_core::{LoopConfig, RateLimitConfig};
use agent_runtime::OllamaConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use travel_tools::TravelClients;
use travel_tools::currency::{CachedRateSource, ExchangeRateApiClient, MockRateSource, RateSource};
use travel_tools::places::{
    FallbackPlacesClient, GooglePlacesClient, MockPlacesClient, PlacesClient, TavilyPlacesClient,
};
use travel_tools::weather::{MockWeatherClient, OpenWeatherClient, WeatherClient};

pub const CONFIG_PATH_VAR: &str = "TRAVEL_AGENT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Environment variable {key}={value:?} is not valid")]
    Env { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
        }
    }
}

/// Ollama endpoint and sampling settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    /// Replaces the built-in travel planner prompt
    pub system_prompt: Option<String>,
}

impl Default for ModelSection {
    fn default() -> Self {
        let ollama = OllamaConfig::default();
        let generation = GenerationOptions::default();
        Self {
            host: ollama.host,
            port: ollama.port,
            timeout_secs: ollama.timeout_secs,
            name: generation.model,
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
            top_p: generation.top_p,
            system_prompt: None,
        }
    }
}

impl ModelSection {
    pub fn ollama(&self) -> OllamaConfig {
        OllamaConfig {
            host: self.host.clone(),
            port: self.port,
            timeout_secs: self.timeout_secs,
        }
    }

    pub fn generation(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.name.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        }
    }
}

/// External API keys; a missing key selects the offline mock
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub openweathermap_api_key: Option<String>,
    pub exchange_rate_api_key: Option<String>,
    pub gplaces_api_key: Option<String>,
    /// Web search used when Google Places fails
    pub tavily_api_key: Option<String>,
    /// Ignore keys and use mocks everywhere
    pub use_mock_tools: bool,
    pub http_timeout_secs: u64,
    pub rate_cache_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            openweathermap_api_key: None,
            exchange_rate_api_key: None,
            gplaces_api_key: None,
            tavily_api_key: None,
            use_mock_tools: false,
            http_timeout_secs: 10,
            rate_cache_secs: 600,
        }
    }
}

impl ToolsSection {
    fn key(&self, key: Option<&String>) -> Option<String> {
        if self.use_mock_tools {
            return None;
        }
        key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
    }

    /// Build the tool backends, falling back to mocks where keys are absent
    pub fn clients(&self) -> travel_tools::Result<TravelClients> {
        let timeout = Duration::from_secs(self.http_timeout_secs);

        let weather: Arc<dyn WeatherClient> = match self.key(self.openweathermap_api_key.as_ref()) {
            Some(key) => Arc::new(OpenWeatherClient::new(key, timeout)?),
            None => {
                tracing::warn!("OPENWEATHERMAP_API_KEY not set - using mock weather");
                Arc::new(MockWeatherClient::new())
            }
        };

        // the mock only stands in when no real backend is configured
        let google = self.key(self.gplaces_api_key.as_ref());
        let tavily = self.key(self.tavily_api_key.as_ref());
        let places: Arc<dyn PlacesClient> = match (google, tavily) {
            (Some(google), Some(tavily)) => Arc::new(FallbackPlacesClient::new(
                Arc::new(GooglePlacesClient::new(google, timeout)?),
                Arc::new(TavilyPlacesClient::new(tavily, timeout)?),
            )),
            (Some(google), None) => {
                tracing::info!("TAVILY_API_KEY not set - place search has no fallback");
                Arc::new(GooglePlacesClient::new(google, timeout)?)
            }
            (None, Some(tavily)) => Arc::new(TavilyPlacesClient::new(tavily, timeout)?),
            (None, None) => {
                tracing::warn!("GPLACES_API_KEY and TAVILY_API_KEY not set - using mock place search");
                Arc::new(MockPlacesClient::new())
            }
        };

        let rates: Arc<dyn RateSource> = match self.key(self.exchange_rate_api_key.as_ref()) {
            Some(key) => Arc::new(CachedRateSource::new(
                Arc::new(ExchangeRateApiClient::new(key, timeout)?),
                Duration::from_secs(self.rate_cache_secs),
            )),
            None => {
                tracing::warn!("EXCHANGE_RATE_API_KEY not set - using mock exchange rates");
                Arc::new(MockRateSource::new())
            }
        };

        Ok(TravelClients { weather, places, rates })
    }
}

/// Complete server configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub model: ModelSection,
    #[serde(rename = "loop")]
    pub agent: LoopConfig,
    pub rate_limit: RateLimitConfig,
    pub tools: ToolsSection,
}

impl ServerConfig {
    /// Load from the process environment (after `.env` has been read)
    pub fn from_env() -> Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Load with an explicit variable lookup
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loaded config file");
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Environment variables win over file values
    pub fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("OLLAMA_HOST") {
            self.model.host = v;
        }
        if let Some(v) = parsed(lookup, "OLLAMA_PORT")? {
            self.model.port = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            self.model.name = v;
        }
        if let Some(v) = parsed(lookup, "AGENT_MAX_ITERATIONS")? {
            self.agent.max_iterations = v;
        }
        if let Some(v) = parsed(lookup, "AGENT_MODEL_RETRIES")? {
            self.agent.model_retries = v;
        }
        if let Some(v) = parsed(lookup, "AGENT_REQUEST_TIMEOUT_SECS")? {
            self.agent.request_timeout_secs = v;
        }
        if let Some(v) = parsed(lookup, "RATE_LIMIT_MAX_REQUESTS")? {
            self.rate_limit.max_requests = v;
        }
        if let Some(v) = parsed(lookup, "RATE_LIMIT_WINDOW_SECS")? {
            self.rate_limit.window_secs = v;
        }
        if let Some(v) = lookup("OPENWEATHERMAP_API_KEY") {
            self.tools.openweathermap_api_key = Some(v);
        }
        if let Some(v) = lookup("EXCHANGE_RATE_API_KEY") {
            self.tools.exchange_rate_api_key = Some(v);
        }
        if let Some(v) = lookup("GPLACES_API_KEY") {
            self.tools.gplaces_api_key = Some(v);
        }
        if let Some(v) = lookup("TAVILY_API_KEY") {
            self.tools.tavily_api_key = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        self.agent
            .validate()
            .and_then(|()| self.rate_limit.validate())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.model.name.trim().is_empty() {
            return Err(ConfigError::Invalid("model name must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "model temperature {} is outside 0.0..=2.0",
                self.model.temperature
            )));
        }
        if self.model.timeout_secs == 0 || self.tools.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 second".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind_addr
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("bind_addr '{}' is not host:port", self.server.bind_addr)))
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>> {
    lookup(key)
        .map(|value| value.trim().parse().map_err(|_| ConfigError::Env { key, value }))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::load(env(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.rate_limit.max_requests, 60);
        assert_eq!(config.bind_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_partial_yaml() {
        let config = ServerConfig::from_yaml(
            r"
server:
  bind_addr: 127.0.0.1:8080
model:
  name: qwen2.5
loop:
  max_iterations: 4
rate_limit:
  max_requests: 10
tools:
  use_mock_tools: true
",
        )
        .unwrap();

        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.model.name, "qwen2.5");
        assert_eq!(config.model.port, 11434);
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.agent.model_retries, LoopConfig::default().model_retries);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert!(config.tools.use_mock_tools);
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::load(env(&[
            ("OLLAMA_MODEL", "mistral"),
            ("AGENT_MAX_ITERATIONS", "3"),
            ("RATE_LIMIT_WINDOW_SECS", "30"),
            ("OPENWEATHERMAP_API_KEY", "abc"),
        ]))
        .unwrap();
        assert_eq!(config.model.generation().model, "mistral");
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.rate_limit.window_secs, 30);
        assert_eq!(config.tools.openweathermap_api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServerConfig::load(env(&[("OLLAMA_PORT", "eleven")])),
            Err(ConfigError::Env { key: "OLLAMA_PORT", .. })
        ));
        assert!(matches!(
            ServerConfig::load(env(&[("AGENT_MAX_ITERATIONS", "0")])),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::load(env(&[("RATE_LIMIT_WINDOW_SECS", "0")])),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::load(env(&[("BIND_ADDR", "localhost")])),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_config_file() {
        let err = ServerConfig::load(env(&[(CONFIG_PATH_VAR, "/nonexistent/travel-agent.yaml")])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_mock_clients_without_keys() {
        let tools = ToolsSection {
            openweathermap_api_key: Some("   ".into()),
            ..ToolsSection::default()
        };
        let clients = tools.clients().unwrap();
        assert_eq!(clients.weather.name(), "MockWeather");
        assert_eq!(clients.places.name(), "MockPlaces");
        assert_eq!(clients.rates.name(), "MockRates");

        let keyed = ToolsSection {
            openweathermap_api_key: Some("k".into()),
            ..ToolsSection::default()
        };
        assert_eq!(keyed.clients().unwrap().weather.name(), "OpenWeatherMap");

        let forced = ToolsSection {
            use_mock_tools: true,
            ..keyed
        };
        assert_eq!(forced.clients().unwrap().weather.name(), "MockWeather");
    }

    #[test]
    fn test_place_chain_never_falls_back_to_mock() {
        let google_only = ToolsSection {
            gplaces_api_key: Some("g".into()),
            ..ToolsSection::default()
        };
        assert_eq!(google_only.clients().unwrap().places.name(), "Google Places");

        let both = ToolsSection {
            tavily_api_key: Some("t".into()),
            ..google_only
        };
        assert_eq!(both.clients().unwrap().places.name(), "Fallback");

        let tavily_only = ToolsSection {
            tavily_api_key: Some("t".into()),
            ..ToolsSection::default()
        };
        assert_eq!(tavily_only.clients().unwrap().places.name(), "Tavily");

        let config = ServerConfig::load(env(&[("TAVILY_API_KEY", "t")])).unwrap();
        assert_eq!(config.tools.tavily_api_key.as_deref(), Some("t"));
    }
}
