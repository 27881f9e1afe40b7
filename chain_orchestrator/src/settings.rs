//! Layered configuration: embedded defaults, optional local file, environment.

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Where capability definition files are discovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub repo_root: PathBuf,
    /// Relative to `repo_root`.
    pub agents_dir: PathBuf,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            agents_dir: PathBuf::from(".github/agents"),
        }
    }
}

impl DiscoveryConfig {
    pub fn agents_path(&self) -> PathBuf {
        self.repo_root.join(&self.agents_dir)
    }
}

/// External capability process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerConfig {
    pub program: String,
    pub timeout_seconds: u64,
    pub retries: u32,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            program: "copilot".to_string(),
            timeout_seconds: 300,
            retries: 1,
        }
    }
}

impl InvokerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Capability selection limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on keyword-ranked capabilities per automatic chain.
    pub max_selected: usize,
    /// How many registered capabilities to run when nothing matches.
    pub fallback_count: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_selected: 2,
            fallback_count: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Main settings structure with all configuration sections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub discovery: DiscoveryConfig,
    pub invoker: InvokerConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load settings from the embedded defaults, `chain.toml`, an optional
    /// explicit config file (which must exist) and the environment.
    pub fn load_from(path: Option<&std::path::Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::from_str(
                include_str!("../config.toml"),
                FileFormat::Toml,
            ))
            .add_source(File::with_name("chain").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("CHAIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to build configuration")?;

        let mut settings: Settings = config
            .try_deserialize()
            .context("invalid configuration")?;

        settings.apply_env_overrides()?;
        settings.validate()?;

        Ok(settings)
    }

    /// Unprefixed variables kept for compatibility with existing deployments.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(root) = std::env::var("REPO_ROOT") {
            self.discovery.repo_root = PathBuf::from(root);
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(program) = std::env::var("COPILOT_CLI_PROGRAM") {
            self.invoker.program = program;
        }
        if let Ok(timeout) = std::env::var("COPILOT_CLI_TIMEOUT") {
            match parse_timeout_seconds(&timeout) {
                Some(seconds) => self.invoker.timeout_seconds = seconds,
                None => warn!(value = %timeout, "ignoring unparseable COPILOT_CLI_TIMEOUT"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.max_selected == 0 {
            return Err(anyhow!("orchestrator.max_selected must be at least 1"));
        }
        if self.invoker.timeout_seconds == 0 {
            return Err(anyhow!("invoker.timeout_seconds cannot be 0"));
        }
        if self.invoker.program.trim().is_empty() {
            return Err(anyhow!("invoker.program cannot be empty"));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(anyhow!(
                "logging.format must be \"text\" or \"json\", got {:?}",
                self.logging.format
            ));
        }

        let agents = self.discovery.agents_path();
        if !agents.exists() {
            warn!("Capability directory does not exist: {:?}", agents);
        }

        Ok(())
    }
}

/// Accepts `300`, `300s`, `5m` or `1h`.
fn parse_timeout_seconds(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let (digits, multiplier) = match raw.char_indices().last()? {
        (i, 's') => (&raw[..i], 1),
        (i, 'm') => (&raw[..i], 60),
        (i, 'h') => (&raw[..i], 3_600),
        _ => (raw, 1),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .filter(|&n| n > 0)
}
