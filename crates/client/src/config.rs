//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `REALTY_API_BASE_URL` - Base URL of the marketplace REST API
//!
//! ## Optional
//! - `REALTY_HTTP_TIMEOUT_SECS` - Transport timeout in seconds (default: 30)
//! - `REALTY_SESSION_FILE` - Durable session file (default: .realty-session.json)
//! - `REALTY_COMPANY_AGENT_ROUTING` - `by-intent`, `company` or `agent` (default: by-intent)
//! - `REALTY_LOG_FORMAT` - `text` or `json` (default: text)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SESSION_FILE: &str = ".realty-session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Where a `COMPANY_AGENT` principal's session is stored.
///
/// A company-affiliated agent can legitimately sign in through either the
/// company or the agent portal, so the target slot is a policy choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompanyAgentRouting {
    /// COMPANY intent goes to the company slot, anything else to the agent slot.
    #[default]
    ByIntent,
    AlwaysCompany,
    AlwaysAgent,
}

impl std::str::FromStr for CompanyAgentRouting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "by-intent" | "intent" => Ok(Self::ByIntent),
            "company" => Ok(Self::AlwaysCompany),
            "agent" => Ok(Self::AlwaysAgent),
            other => Err(format!("expected by-intent, company or agent, got {other}")),
        }
    }
}

/// Log output format for binaries embedding the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every API path is resolved against
    pub base_url: Url,
    /// Transport timeout for every request
    pub timeout: Duration,
    /// Durable session file used by the CLI
    pub session_file: PathBuf,
    /// Slot policy for `COMPANY_AGENT` principals
    pub company_agent_routing: CompanyAgentRouting,
    /// Log output format
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Build a configuration for `base_url` with every optional value defaulted.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the URL does not parse or is
    /// not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            company_agent_routing: CompanyAgentRouting::default(),
            log_format: LogFormat::default(),
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url(&get_required_env("REALTY_API_BASE_URL")?)?;
        let timeout_secs = get_env_or_default("REALTY_HTTP_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("REALTY_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?;
        let session_file =
            PathBuf::from(get_env_or_default("REALTY_SESSION_FILE", DEFAULT_SESSION_FILE));
        let company_agent_routing = get_env_or_default("REALTY_COMPANY_AGENT_ROUTING", "by-intent")
            .parse()
            .map_err(|e| ConfigError::InvalidEnvVar("REALTY_COMPANY_AGENT_ROUTING".to_string(), e))?;
        let log_format = match get_optional_env("REALTY_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar(
                    "REALTY_LOG_FORMAT".to_string(),
                    format!("expected text or json, got {other}"),
                ));
            }
        };

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            session_file,
            company_agent_routing,
            log_format,
        })
    }

    /// Returns a copy with a different `COMPANY_AGENT` routing policy.
    #[must_use]
    pub const fn with_company_agent_routing(mut self, routing: CompanyAgentRouting) -> Self {
        self.company_agent_routing = routing;
        self
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("REALTY_API_BASE_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "REALTY_API_BASE_URL".to_string(),
            format!("unsupported scheme: {}", url.scheme()),
        ));
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
