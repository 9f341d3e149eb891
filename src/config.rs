//! Provider configuration.
//!
//! The host sends the provider block as JSON in `Configure`. Credentials may
//! also come from the environment, which is how CI pipelines usually supply
//! them:
//!
//! | Attribute     | Environment variable    | Default |
//! |---------------|-------------------------|---------|
//! | `access_id`   | `SUMOLOGIC_ACCESSID`    |         |
//! | `access_key`  | `SUMOLOGIC_ACCESSKEY`   |         |
//! | `environment` | `SUMOLOGIC_ENVIRONMENT` | `us2`   |
//! | `base_url`    | `SUMOLOGIC_BASE_URL`    |         |
//!
//! Explicit configuration always wins over the environment.

use serde::Deserialize;
use serde_json::json;

use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};

/// Deployments the SumoLogic API is served from, with their API roots.
pub const ENVIRONMENTS: &[(&str, &str)] = &[
    ("us1", "https://api.sumologic.com/api/v1/"),
    ("us2", "https://api.us2.sumologic.com/api/v1/"),
    ("eu", "https://api.eu.sumologic.com/api/v1/"),
    ("au", "https://api.au.sumologic.com/api/v1/"),
    ("de", "https://api.de.sumologic.com/api/v1/"),
    ("jp", "https://api.jp.sumologic.com/api/v1/"),
    ("ca", "https://api.ca.sumologic.com/api/v1/"),
    ("in", "https://api.in.sumologic.com/api/v1/"),
    ("fed", "https://api.fed.sumologic.com/api/v1/"),
];

/// Environment used when neither configuration nor `SUMOLOGIC_ENVIRONMENT` names one.
pub const DEFAULT_ENVIRONMENT: &str = "us2";

const ENV_ACCESS_ID: &str = "SUMOLOGIC_ACCESSID";
const ENV_ACCESS_KEY: &str = "SUMOLOGIC_ACCESSKEY";
const ENV_ENVIRONMENT: &str = "SUMOLOGIC_ENVIRONMENT";
const ENV_BASE_URL: &str = "SUMOLOGIC_BASE_URL";

/// Raw provider block as written by the user. Every field is optional here
/// because the environment may fill it in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// SumoLogic access id.
    pub access_id: Option<String>,
    /// SumoLogic access key.
    pub access_key: Option<String>,
    /// Deployment name such as `us2` or `eu`.
    pub environment: Option<String>,
    /// Explicit API root, overriding `environment`.
    pub base_url: Option<String>,
}

/// Fully resolved connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// SumoLogic access id.
    pub access_id: String,
    /// SumoLogic access key.
    pub access_key: String,
    /// API root URL, always ending in `/`.
    pub base_url: String,
}

impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("access_id", &self.access_id)
            .field("access_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ProviderConfig {
    /// Parse the provider block sent by the host. `null` is an empty block.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<ResolvedConfig, ProviderError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` for environment fallbacks.
    pub fn resolve_with<F>(self, lookup: F) -> Result<ResolvedConfig, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |explicit: Option<String>, var: &str| {
            explicit
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(var).filter(|v| !v.is_empty()))
        };

        let access_id = pick(self.access_id, ENV_ACCESS_ID).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "access_id must be set in the provider block or via {}",
                ENV_ACCESS_ID
            ))
        })?;
        let access_key = pick(self.access_key, ENV_ACCESS_KEY).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "access_key must be set in the provider block or via {}",
                ENV_ACCESS_KEY
            ))
        })?;

        // An explicit `environment` outranks `SUMOLOGIC_BASE_URL`.
        let explicit_url = self.base_url.filter(|v| !v.is_empty());
        let explicit_environment = self.environment.filter(|v| !v.is_empty());
        let base_url = match explicit_url.or_else(|| {
            explicit_environment
                .is_none()
                .then(|| lookup(ENV_BASE_URL).filter(|v| !v.is_empty()))
                .flatten()
        }) {
            Some(url) => url,
            None => {
                let environment = pick(explicit_environment, ENV_ENVIRONMENT)
                    .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
                environment_url(&environment)
                    .ok_or_else(|| {
                        ProviderError::Configuration(format!(
                            "unknown SumoLogic environment '{}', expected one of [{}]",
                            environment,
                            environment_names().join(", ")
                        ))
                    })?
                    .to_string()
            },
        };

        Ok(ResolvedConfig {
            access_id,
            access_key,
            base_url: with_trailing_slash(base_url),
        })
    }
}

/// API root for a deployment name. Names are matched exactly, as the schema
/// validates them.
pub fn environment_url(environment: &str) -> Option<&'static str> {
    ENVIRONMENTS
        .iter()
        .find(|(name, _)| *name == environment)
        .map(|(_, url)| *url)
}

fn environment_names() -> Vec<&'static str> {
    ENVIRONMENTS.iter().map(|(name, _)| *name).collect()
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Schema of the provider block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "access_id",
            Attribute::optional_string().with_description(format!(
                "SumoLogic access id. Falls back to {}.",
                ENV_ACCESS_ID
            )),
        )
        .with_attribute(
            "access_key",
            Attribute::optional_string()
                .sensitive()
                .with_description(format!(
                    "SumoLogic access key. Falls back to {}.",
                    ENV_ACCESS_KEY
                )),
        )
        .with_attribute(
            "environment",
            Attribute::optional_string()
                .with_allowed_values(environment_names())
                .with_default(json!(DEFAULT_ENVIRONMENT))
                .with_description(format!(
                    "SumoLogic deployment. Falls back to {}.",
                    ENV_ENVIRONMENT
                )),
        )
        .with_attribute(
            "base_url",
            Attribute::optional_string().with_description(format!(
                "API root overriding environment. Falls back to {}.",
                ENV_BASE_URL
            )),
        )
}

/// Check that a provider block can be resolved, without keeping the result.
pub fn check(config: serde_json::Value) -> Vec<Diagnostic> {
    match ProviderConfig::from_value(config).and_then(ProviderConfig::resolve) {
        Ok(_) => vec![],
        Err(e) => vec![Diagnostic::error("Invalid provider configuration").with_detail(e.message())],
    }
}
