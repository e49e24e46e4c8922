//! Connection settings for the Content Understanding service.

use std::time::Duration;

use crate::error::AzureError;

/// Environment variable holding the resource endpoint.
pub const ENDPOINT_ENV_VAR: &str = "AZURE_CONTENT_UNDERSTANDING_ENDPOINT";
/// Environment variable overriding the REST API version.
pub const API_VERSION_ENV_VAR: &str = "AZURE_CONTENT_UNDERSTANDING_API_VERSION";
/// Environment variable holding the subscription key.
pub const SUBSCRIPTION_KEY_ENV_VAR: &str = "AZURE_CONTENT_UNDERSTANDING_SUBSCRIPTION_KEY";
/// Environment variable holding an Entra ID (AAD) bearer token.
pub const AAD_TOKEN_ENV_VAR: &str = "AZURE_CONTENT_UNDERSTANDING_AAD_TOKEN";
/// Environment variable naming the analyzer to use.
pub const ANALYZER_ID_ENV_VAR: &str = "AZURE_CONTENT_UNDERSTANDING_ANALYZER_ID";

/// REST API version used when none is configured.
pub const DEFAULT_API_VERSION: &str = "2024-12-01-preview";

const DEFAULT_USER_AGENT: &str = "cu-sample-code";

/// How requests authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    /// `Ocp-Apim-Subscription-Key` header.
    SubscriptionKey(&'a str),
    /// `Authorization: Bearer` header.
    AadToken(&'a str),
}

/// Settings for one Content Understanding resource and analyzer.
#[derive(Clone)]
pub struct Settings {
    /// Resource endpoint, e.g. `https://<name>.cognitiveservices.azure.com`.
    pub endpoint: String,
    /// REST API version.
    pub api_version: String,
    /// Subscription key; takes precedence over `aad_token`.
    pub subscription_key: Option<String>,
    /// Bearer token.
    pub aad_token: Option<String>,
    /// Analyzer id used for analysis.
    pub analyzer_id: String,
    /// Value of the `x-ms-useragent` header.
    pub user_agent: String,
    /// Delay between polls of a long-running operation (default: 2 s).
    pub poll_interval: Duration,
    /// Give up polling after this long (default: 5 min).
    pub poll_timeout: Duration,
}

impl Settings {
    /// Settings with defaults and no credential yet.
    pub fn new(endpoint: impl Into<String>, analyzer_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            subscription_key: None,
            aad_token: None,
            analyzer_id: analyzer_id.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(300),
        }
    }

    /// Reads settings from the `AZURE_CONTENT_UNDERSTANDING_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AzureError::InvalidConfig` when the endpoint or analyzer id is
    /// unset, or when neither a key nor a token is provided.
    pub fn from_env() -> Result<Self, AzureError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AzureError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AzureError::InvalidConfig(format!("{name} is not set")))
        };

        let mut settings = Self::new(required(ENDPOINT_ENV_VAR)?, required(ANALYZER_ID_ENV_VAR)?);
        if let Some(version) = lookup(API_VERSION_ENV_VAR).filter(|v| !v.trim().is_empty()) {
            settings.api_version = version;
        }
        settings.subscription_key = lookup(SUBSCRIPTION_KEY_ENV_VAR);
        settings.aad_token = lookup(AAD_TOKEN_ENV_VAR);
        settings.validate()?;
        Ok(settings)
    }

    /// Sets the subscription key.
    #[must_use]
    pub fn with_subscription_key(mut self, key: impl Into<String>) -> Self {
        self.subscription_key = Some(key.into());
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_aad_token(mut self, token: impl Into<String>) -> Self {
        self.aad_token = Some(token.into());
        self
    }

    /// Sets the API version.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Sets the poll interval and overall poll timeout.
    #[must_use]
    pub const fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }

    /// The credential to authenticate with.
    ///
    /// Empty values and values equal to the variable name (an unfilled
    /// template) count as missing.
    pub fn credential(&self) -> Result<Credential<'_>, AzureError> {
        if let Some(key) = provided(self.subscription_key.as_deref(), SUBSCRIPTION_KEY_ENV_VAR) {
            return Ok(Credential::SubscriptionKey(key));
        }
        if let Some(token) = provided(self.aad_token.as_deref(), AAD_TOKEN_ENV_VAR) {
            return Ok(Credential::AadToken(token));
        }
        Err(AzureError::InvalidConfig(
            "Either 'subscription_key' or 'aad_token' must be provided".to_string(),
        ))
    }

    /// Checks that the settings can be used to build a client.
    pub fn validate(&self) -> Result<(), AzureError> {
        if self.endpoint.trim().is_empty() {
            return Err(AzureError::InvalidConfig("Endpoint must be provided".to_string()));
        }
        if self.api_version.trim().is_empty() {
            return Err(AzureError::InvalidConfig("API version must be provided".to_string()));
        }
        if self.analyzer_id.trim().is_empty() {
            return Err(AzureError::InvalidConfig("Analyzer id must be provided".to_string()));
        }
        self.credential().map(|_| ())
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("api_version", &self.api_version)
            .field("subscription_key", &self.subscription_key.as_ref().map(|_| "<redacted>"))
            .field("aad_token", &self.aad_token.as_ref().map(|_| "<redacted>"))
            .field("analyzer_id", &self.analyzer_id)
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

fn provided<'a>(value: Option<&'a str>, placeholder: &str) -> Option<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != placeholder)
}
