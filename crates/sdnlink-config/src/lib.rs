//! Configuration for the SDN controller bridge.
//!
//! TOML file plus `SDNLINK_`-prefixed environment overlay, merged over
//! serde defaults, and translation into the wire layer's
//! `HandlerConfig`. The password stays plaintext in the file format
//! and is wrapped in a `SecretString` at the point of use.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sdnlink_api::{
    AcceptablePolicy, ControllerClient, Credentials, Endpoints, Format, HandlerConfig,
};

/// Environment variable prefix: `SDNLINK_PORT`, `SDNLINK_USERID`, ...
const ENV_PREFIX: &str = "SDNLINK_";

/// Default config file, looked up relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "sdnlink.toml";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// The full configuration surface consumed by the bridge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Ordered controller address list; failover follows this order.
    pub controller_ips: Vec<String>,

    /// Controller REST port, shared by all addresses.
    pub port: u16,

    /// Base URL prefix for the controller REST API.
    pub base_url: String,

    /// Administrator user id for HTTP basic auth.
    pub userid: String,

    /// Administrator password (plaintext here; secret at use).
    pub password: String,

    /// Request/response wire format.
    pub format: Format,

    /// Per-attempt request timeout in seconds.
    pub timeout_secs: u64,

    /// Substitute the no-op fake client for the real controller.
    pub use_fake_controller: bool,

    /// HTTP statuses treated as success by the driver.
    pub acceptable_status_codes: Vec<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            controller_ips: vec!["127.0.0.1".into()],
            port: 443,
            base_url: "/v2.0/".into(),
            userid: "admin".into(),
            password: "admin".into(),
            format: Format::Json,
            timeout_secs: 10,
            use_fake_controller: false,
            acceptable_status_codes: vec![200, 201, 202, 204],
        }
    }
}

impl Settings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.controller_ips.is_empty() {
            return Err(ConfigError::Validation {
                field: "controller_ips".into(),
                reason: "at least one controller address is required".into(),
            });
        }
        if self.acceptable_status_codes.is_empty() {
            return Err(ConfigError::Validation {
                field: "acceptable_status_codes".into(),
                reason: "the acceptable-status set must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Wire-layer handler configuration.
    pub fn handler_config(&self) -> Result<HandlerConfig, sdnlink_api::Error> {
        Ok(HandlerConfig {
            endpoints: Endpoints::new(
                self.controller_ips.clone(),
                self.port,
                self.base_url.clone(),
            )?,
            credentials: Some(Credentials {
                userid: self.userid.clone(),
                password: SecretString::from(self.password.clone()),
            }),
            timeout: Duration::from_secs(self.timeout_secs),
            format: self.format,
        })
    }

    pub fn acceptable_policy(&self) -> AcceptablePolicy {
        AcceptablePolicy::new(self.acceptable_status_codes.clone())
    }

    /// Build the controller client this configuration describes
    /// (real, or the no-op fake when `use_fake_controller` is set).
    pub fn build_client(&self) -> Result<Arc<dyn ControllerClient>, sdnlink_api::Error> {
        sdnlink_api::build_client(
            self.handler_config()?,
            self.acceptable_policy(),
            self.use_fake_controller,
        )
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load settings from the default file location plus environment.
pub fn load() -> Result<Settings, ConfigError> {
    load_from(Path::new(DEFAULT_CONFIG_FILE))
}

/// Load settings from an explicit TOML path plus environment.
pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX));

    let settings: Settings = figment.extract()?;
    settings.validate()?;
    Ok(settings)
}
