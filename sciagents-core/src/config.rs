//! Configuration system for SciAgents.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides.
//! Configuration is loaded from `~/.config/sciagents/config.toml` and/or
//! `.sciagents/config.toml` in the workspace directory. Environment variables
//! use the `SCIAGENTS_` prefix with `__` between sections, e.g.
//! `SCIAGENTS_LLM__MODEL=gemini-1.5-pro`.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the per-workspace configuration directory.
pub const WORKSPACE_DIR: &str = ".sciagents";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SciConfig {
    pub llm: LlmConfig,
    pub agents: AgentsConfig,
    pub simulation: SimulationConfig,
    pub workflow: WorkflowConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

impl SciConfig {
    /// Validate the whole configuration and return human-readable warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.llm.validate();
        if !(0.0..=1.0).contains(&self.workflow.confidence_threshold) {
            warnings.push(format!(
                "workflow.confidence_threshold ({}) is outside 0.0–1.0",
                self.workflow.confidence_threshold
            ));
        }
        if self.workflow.max_turns == 0 {
            warnings.push("workflow.max_turns is 0; the refinement loop will never run".into());
        }
        if self.simulation.default_time_step <= 0.0 {
            warnings.push(format!(
                "simulation.default_time_step ({}) must be positive",
                self.simulation.default_time_step
            ));
        }
        warnings
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "gemini" or "mock".
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Inline API key; takes precedence over `api_key_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    pub temperature: f32,
    pub context_window: usize,
    /// Cost per 1M input tokens (USD).
    pub input_cost_per_million: f64,
    /// Cost per 1M output tokens (USD).
    pub output_cost_per_million: f64,
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 4096,
            temperature: 0.1,
            context_window: 1_000_000,
            input_cost_per_million: 0.10,
            output_cost_per_million: 0.40,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_tokens >= self.context_window {
            warnings.push(format!(
                "max_tokens ({}) >= context_window ({}); responses may be truncated or fail",
                self.max_tokens, self.context_window
            ));
        }
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0–2.0",
                self.temperature
            ));
        }
        warnings
    }

    /// Whether the configured provider talks to a remote API.
    pub fn requires_api_key(&self) -> bool {
        self.provider != "mock"
    }

    /// Check that an API key is available for the configured provider.
    pub fn check_credentials(&self) -> Result<(), ConfigError> {
        if !self.requires_api_key() {
            return Ok(());
        }
        let inline = self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        let from_env = std::env::var(&self.api_key_env).is_ok_and(|k| !k.trim().is_empty());
        if inline || from_env {
            Ok(())
        } else {
            Err(ConfigError::EnvVarMissing {
                var: self.api_key_env.clone(),
            })
        }
    }
}

/// Retry policy for transient LLM failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Per-agent limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Upper bound on a single agent call, retries included.
    pub timeout_secs: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

/// Measurement characteristics for one scientific domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSettings {
    pub precision: f64,
    pub noise_level: f64,
    pub units: String,
}

impl DomainSettings {
    fn new(precision: f64, noise_level: f64, units: &str) -> Self {
        Self {
            precision,
            noise_level,
            units: units.to_string(),
        }
    }
}

/// Simulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub default_steps: usize,
    pub default_time_step: f64,
    /// Fixed RNG seed for reproducible measurement noise.
    pub seed: Option<u64>,
    pub domains: BTreeMap<String, DomainSettings>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let domains = [
            ("physics", DomainSettings::new(0.001, 0.02, "SI")),
            ("chemistry", DomainSettings::new(0.01, 0.05, "molarity")),
            ("biology", DomainSettings::new(0.1, 0.15, "relative")),
            ("environmental", DomainSettings::new(0.05, 0.10, "standard")),
            ("general", DomainSettings::new(0.01, 0.05, "arbitrary")),
        ]
        .into_iter()
        .map(|(name, settings)| (name.to_string(), settings))
        .collect();
        Self {
            default_steps: 1000,
            default_time_step: 0.01,
            seed: None,
            domains,
        }
    }
}

impl SimulationConfig {
    /// Settings for `domain`, falling back to the `general` entry.
    pub fn domain_settings(&self, domain: &str) -> DomainSettings {
        self.domains
            .get(domain)
            .or_else(|| self.domains.get("general"))
            .cloned()
            .unwrap_or_else(|| DomainSettings::new(0.01, 0.05, "arbitrary"))
    }
}

/// Investigation workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Refinement stops once the experiment confidence reaches this value.
    pub confidence_threshold: f64,
    /// Refinement stops after this many turns.
    pub max_turns: u32,
    /// Persist each completed investigation to the store.
    pub record_investigations: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.9,
            max_turns: 5,
            record_investigations: true,
        }
    }
}

/// REST server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Output locations, relative to the workspace unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub results_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
            data_dir: PathBuf::from(WORKSPACE_DIR),
        }
    }
}

impl StorageConfig {
    pub fn results_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.results_dir)
    }

    pub fn data_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.data_dir)
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "sciagents", "sciagents")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_DIR).join("config.toml")
}

/// Load configuration from all layers.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&SciConfig>,
) -> Result<SciConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(SciConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // SCIAGENTS_LLM__MODEL, SCIAGENTS_WORKFLOW__MAX_TURNS, ...
    figment = figment.merge(Env::prefixed("SCIAGENTS_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether any SciAgents configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = SciConfig::default();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.llm.api_key_env, "GOOGLE_API_KEY");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.agents.timeout_secs, 120);
        assert_eq!(config.llm.retry.max_retries, 3);
        assert_eq!(config.simulation.default_steps, 1000);
        assert_eq!(config.workflow.max_turns, 5);
        assert_eq!(config.server.port, 8000);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_domain_settings_lookup() {
        let sim = SimulationConfig::default();
        assert_eq!(sim.domain_settings("physics").units, "SI");
        assert_eq!(sim.domain_settings("chemistry").noise_level, 0.05);
        assert_eq!(sim.domain_settings("biology").noise_level, 0.15);
        let fallback = sim.domain_settings("astrology");
        assert_eq!(fallback, sim.domain_settings("general"));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = SciConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: SciConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.llm.model, config.llm.model);
        assert_eq!(
            deserialized.simulation.domains.len(),
            config.simulation.domains.len()
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SciConfig = toml::from_str("[workflow]\nmax_turns = 2\n").unwrap();
        assert_eq!(config.workflow.max_turns, 2);
        assert_eq!(config.workflow.confidence_threshold, 0.9);
        assert_eq!(config.llm.provider, "gemini");
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None).unwrap();
        assert_eq!(config.agents.timeout_secs, 120);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = SciConfig::default();
        overrides.llm.provider = "mock".to_string();
        overrides.workflow.max_turns = 3;

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.llm.provider, "mock");
        assert_eq!(config.workflow.max_turns, 3);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let ws_dir = dir.path().join(WORKSPACE_DIR);
        std::fs::create_dir_all(&ws_dir).unwrap();
        std::fs::write(
            ws_dir.join("config.toml"),
            r#"
[llm]
model = "gemini-1.5-pro"

[simulation]
seed = 7

[server]
port = 9100
"#,
        )
        .unwrap();

        assert!(config_exists(Some(dir.path())));
        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.llm.model, "gemini-1.5-pro");
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.llm.provider, "gemini");
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = SciConfig::default();
        config.llm.max_tokens = 2_000_000;
        config.llm.temperature = 3.0;
        config.workflow.confidence_threshold = 1.5;
        config.workflow.max_turns = 0;
        assert_eq!(config.validate().len(), 4);
    }

    #[test]
    fn test_check_credentials() {
        let mock = LlmConfig {
            provider: "mock".into(),
            ..Default::default()
        };
        assert!(mock.check_credentials().is_ok());

        let inline = LlmConfig {
            api_key: Some("abc".into()),
            ..Default::default()
        };
        assert!(inline.check_credentials().is_ok());

        let missing = LlmConfig {
            api_key_env: "SCIAGENTS_TEST_SURELY_UNSET_KEY".into(),
            ..Default::default()
        };
        match missing.check_credentials() {
            Err(ConfigError::EnvVarMissing { var }) => {
                assert_eq!(var, "SCIAGENTS_TEST_SURELY_UNSET_KEY")
            }
            other => panic!("expected EnvVarMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_storage_paths() {
        let storage = StorageConfig::default();
        let ws = Path::new("/tmp/ws");
        assert_eq!(storage.results_path(ws), PathBuf::from("/tmp/ws/results"));
        assert_eq!(storage.data_path(ws), PathBuf::from("/tmp/ws/.sciagents"));
    }
}
