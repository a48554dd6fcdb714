use oauth2::basic::BasicErrorResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The authorization or token endpoint refused the code, refresh token or
    /// client credentials.
    #[error("Authentication error: {error}{}", parenthesized(.description))]
    Authentication {
        error: String,
        description: Option<String>,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request was rejected with 401 and no refresh token is stored")]
    MissingRefreshToken,

    /// The token endpoint answered with a body that is not a token.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn parenthesized(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

impl OAuthError {
    pub(crate) fn authentication(error: impl Into<String>, description: Option<String>) -> Self {
        OAuthError::Authentication {
            error: error.into(),
            description,
        }
    }
}

impl From<config::ConfigError> for OAuthError {
    fn from(err: config::ConfigError) -> Self {
        OAuthError::Configuration(err.to_string())
    }
}

impl From<url::ParseError> for OAuthError {
    fn from(err: url::ParseError) -> Self {
        OAuthError::Configuration(format!("Invalid URL: {}", err))
    }
}

impl From<BasicErrorResponse> for OAuthError {
    fn from(response: BasicErrorResponse) -> Self {
        OAuthError::authentication(
            response.error().to_string(),
            response.error_description().cloned(),
        )
    }
}
