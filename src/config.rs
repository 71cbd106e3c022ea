//! Defines the configuration settings for the email-cleaner application.

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.emailcleaner.com/v1";

/// Which validation client the pipeline talks to.
#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The remote validation service over HTTPS.
    Http,
    /// Deterministic local results, no network.
    Fixture,
}

/// Service options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ServiceArgs {
    /// Path to configuration file (TOML format)
    #[arg(long = "config", global = true, env = "EMAIL_CLEANER_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Validation backend to use
    #[arg(long, global = true, value_enum, env = "EMAIL_CLEANER_BACKEND")]
    pub backend: Option<Backend>,

    /// Base URL of the validation service
    #[arg(long, global = true, env = "EMAIL_CLEANER_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token sent to the validation service
    #[arg(long, global = true, env = "EMAIL_CLEANER_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long, global = true, env = "EMAIL_CLEANER_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// User agent string for HTTP requests
    #[arg(long, global = true, env = "EMAIL_CLEANER_USER_AGENT")]
    pub user_agent: Option<String>,
}

/// TOML Configuration file structure
#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    service: Option<ServiceConfig>,
    progress: Option<ProgressConfig>,
    fixture: Option<FixtureConfig>,
    report: Option<ReportConfig>,
}

#[derive(Deserialize, Debug, Default)]
struct ServiceConfig {
    backend: Option<Backend>,
    api_url: Option<String>,
    api_token: Option<String>,
    request_timeout: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ProgressConfig {
    tick_interval_ms: Option<u64>,
    tick_step: Option<u8>,
    tick_cap: Option<u8>,
}

#[derive(Deserialize, Debug, Default)]
struct FixtureConfig {
    bulk_delay_ms: Option<u64>,
    single_delay_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
struct ReportConfig {
    export_dir: Option<PathBuf>,
}

/// Application configuration settings.
#[derive(Clone)]
pub struct Config {
    pub backend: Backend,
    /// Base URL the `/validate/*` paths are joined onto.
    pub api_url: String,
    /// Credential handed to the HTTP client at construction.
    pub api_token: Option<String>,
    /// Timeout for individual HTTP requests.
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Period of the synthetic progress tick while a call is outstanding.
    pub tick_interval: Duration,
    /// Percentage points added per tick.
    pub tick_step: u8,
    /// Highest value synthetic ticking may reach.
    pub tick_cap: u8,
    /// Simulated latency of the fixture backend.
    pub fixture_bulk_delay: Duration,
    pub fixture_single_delay: Duration,
    /// Default directory for category exports.
    pub export_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: Backend::Http,
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(60),
            user_agent: format!("email-cleaner/{}", env!("CARGO_PKG_VERSION")),
            tick_interval: Duration::from_millis(500),
            tick_step: 10,
            tick_cap: 90,
            fixture_bulk_delay: Duration::from_millis(2000),
            fixture_single_delay: Duration::from_millis(1000),
            export_dir: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("backend", &self.backend)
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("tick_interval", &self.tick_interval)
            .field("tick_step", &self.tick_step)
            .field("tick_cap", &self.tick_cap)
            .field("fixture_bulk_delay", &self.fixture_bulk_delay)
            .field("fixture_single_delay", &self.fixture_single_delay)
            .field("export_dir", &self.export_dir)
            .finish()
    }
}

/// Load configuration from a TOML file
fn load_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    if !path.exists() {
        tracing::warn!("Configuration file {} not found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

    let config = parse_config_file(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", path.display()))?;

    tracing::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn parse_config_file(content: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(content)
}

fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    if let Some(service) = &file_config.service {
        if let Some(backend) = service.backend {
            config.backend = backend;
        }
        if let Some(url) = &service.api_url {
            config.api_url = url.clone();
        }
        if let Some(token) = &service.api_token {
            config.api_token = Some(token.clone());
        }
        if let Some(timeout) = service.request_timeout {
            config.request_timeout = Duration::from_secs(timeout);
        }
        if let Some(agent) = &service.user_agent {
            config.user_agent = agent.clone();
        }
    }

    if let Some(progress) = &file_config.progress {
        if let Some(ms) = progress.tick_interval_ms {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(step) = progress.tick_step {
            config.tick_step = step;
        }
        if let Some(cap) = progress.tick_cap {
            config.tick_cap = cap;
        }
    }

    if let Some(fixture) = &file_config.fixture {
        if let Some(ms) = fixture.bulk_delay_ms {
            config.fixture_bulk_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = fixture.single_delay_ms {
            config.fixture_single_delay = Duration::from_millis(ms);
        }
    }

    if let Some(report) = &file_config.report {
        if let Some(dir) = &report.export_dir {
            config.export_dir = Some(dir.clone());
        }
    }
}

/// Apply command line arguments to the Config instance
fn apply_cli_args(config: &mut Config, args: &ServiceArgs) {
    if let Some(backend) = args.backend {
        config.backend = backend;
    }

    if let Some(ref url) = args.api_url {
        config.api_url = url.clone();
    }

    if let Some(ref token) = args.api_token {
        config.api_token = Some(token.clone());
    }

    if let Some(timeout) = args.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }

    if let Some(ref agent) = args.user_agent {
        config.user_agent = agent.clone();
    }
}

fn validate_config(config: &mut Config) -> anyhow::Result<()> {
    if config.tick_interval.is_zero() {
        config.tick_interval = Duration::from_millis(500);
        tracing::warn!("Tick interval was 0. Setting to 500ms.");
    }

    if config.tick_step == 0 {
        config.tick_step = 1;
        tracing::warn!("Tick step was 0. Setting to 1.");
    }

    if config.tick_cap > 99 {
        config.tick_cap = 99;
        tracing::warn!("Tick cap must stay below 100. Setting to 99.");
    }

    if config.request_timeout.is_zero() {
        config.request_timeout = Duration::from_secs(60);
        tracing::warn!("Request timeout was 0. Setting to 60s.");
    }

    if config.backend == Backend::Http {
        Url::parse(&config.api_url)
            .with_context(|| format!("Invalid validation service URL: {}", config.api_url))?;
        if config.api_token.is_none() {
            tracing::warn!("No API token configured; requests will be sent unauthenticated.");
        }
    }

    Ok(())
}

pub fn build_config(args: &ServiceArgs) -> anyhow::Result<Config> {
    let mut config = Config::default();

    if let Some(ref file_path) = args.config_file {
        match load_config_file(file_path) {
            Ok(file_config) => apply_file_config(&mut config, &file_config),
            Err(e) => {
                tracing::error!("Failed to load configuration file: {:#}", e);
            }
        }
    } else {
        for path in ["./email-cleaner.toml", "./config.toml"] {
            let path = Path::new(path);
            if path.exists() {
                match load_config_file(path) {
                    Ok(file_config) => {
                        apply_file_config(&mut config, &file_config);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load configuration from {}: {:#}", path.display(), e);
                    }
                }
            }
        }
    }

    apply_cli_args(&mut config, args);

    validate_config(&mut config)?;

    tracing::debug!("Final configuration: {:?}", config);

    Ok(config)
}
