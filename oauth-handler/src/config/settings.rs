use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::error::OAuthError;

const CONFIG_PATH_VAR: &str = "OAUTH_HANDLER_CONFIG";
const ENV_PREFIX: &str = "OAUTH_HANDLER";

/// How client credentials are presented to the token endpoint.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// HTTP Basic authentication header.
    Basic,
    /// `client_id` and `client_secret` form fields.
    RequestBody,
}

#[derive(Debug, Deserialize)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
    pub authorization_base_url: String,
    pub token_url: String,

    #[serde(default)]
    pub scope: Option<Vec<String>>,

    /// Credentials for the authorization-code exchange.
    #[serde(default = "default_auth_method")]
    pub auth_method: ClientAuthMethod,

    /// Credentials for the refresh grant.
    #[serde(default = "default_refresh_auth_method")]
    pub refresh_auth_method: ClientAuthMethod,

    /// Unset leaves reqwest's default in place.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

fn default_auth_method() -> ClientAuthMethod {
    ClientAuthMethod::Basic
}

fn default_refresh_auth_method() -> ClientAuthMethod {
    ClientAuthMethod::RequestBody
}

impl OAuthSettings {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        authorization_base_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            redirect_uri: redirect_uri.into(),
            authorization_base_url: authorization_base_url.into(),
            token_url: token_url.into(),
            scope: None,
            auth_method: default_auth_method(),
            refresh_auth_method: default_refresh_auth_method(),
            timeout_seconds: None,
        }
    }

    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = Some(scope.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_auth_method(mut self, auth_method: ClientAuthMethod) -> Self {
        self.auth_method = auth_method;
        self
    }

    pub fn with_refresh_auth_method(mut self, auth_method: ClientAuthMethod) -> Self {
        self.refresh_auth_method = auth_method;
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Load settings from an optional TOML file and `OAUTH_HANDLER__*`
    /// environment variables, the latter taking precedence.
    pub fn load() -> Result<Self, OAuthError> {
        let config_path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "oauth.toml".to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&config_path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(" ")
                    .with_list_parse_key("scope")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), OAuthError> {
        let required = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("authorization_base_url", self.authorization_base_url.as_str()),
            ("token_url", self.token_url.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(OAuthError::Configuration(format!("{} is required", name)));
            }
        }

        for (name, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("authorization_base_url", &self.authorization_base_url),
            ("token_url", &self.token_url),
        ] {
            Url::parse(value).map_err(|e| {
                OAuthError::Configuration(format!("{} must be an absolute URL: {}", name, e))
            })?;
        }

        if self.timeout_seconds == Some(0) {
            return Err(OAuthError::Configuration(
                "timeout_seconds must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
