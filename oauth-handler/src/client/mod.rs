use oauth2::http::{Method, StatusCode};
use tokio::sync::Mutex;

use crate::common::{AuthorizationRequest, RequestOptions, Response, Token};
use crate::config::OAuthSettings;
use crate::error::OAuthError;
use crate::session::{BasicSession, OAuth2Session};

/// Authorization-code OAuth2 client.
///
/// Holds at most one current token. Requests that come back `401 Unauthorized`
/// are retried exactly once after refreshing with the stored refresh token.
pub struct OAuthClient<S = BasicSession> {
    session: S,
    token: Mutex<Option<Token>>,
}

impl OAuthClient<BasicSession> {
    pub fn new(settings: OAuthSettings) -> Result<Self, OAuthError> {
        Ok(Self::with_session(BasicSession::new(settings)?))
    }

    pub fn settings(&self) -> &OAuthSettings {
        self.session.settings()
    }
}

impl<S: OAuth2Session> OAuthClient<S> {
    pub fn with_session(session: S) -> Self {
        Self {
            session,
            token: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn build_authorization_url(&self) -> Result<AuthorizationRequest, OAuthError> {
        self.session.authorization_url()
    }

    /// Exchange the authorization redirect for a token and make it current.
    pub async fn fetch_token(&self, authorization_response: &str) -> Result<Token, OAuthError> {
        let token = self.session.fetch_token(authorization_response).await?;
        *self.token.lock().await = Some(token.clone());
        Ok(token)
    }

    /// Obtain a new token. The stored token is left untouched.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Token, OAuthError> {
        self.session.refresh_token(refresh_token).await
    }

    /// Send a request authorized with the current token.
    ///
    /// On `401 Unauthorized` the stored refresh token is exchanged, the new
    /// token is installed, and the request is sent once more; whatever that
    /// second attempt returns is passed back as-is.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<Response, OAuthError> {
        let mut current = self.token.lock().await;

        let response = self
            .session
            .request(current.as_ref(), &method, url, &options)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!(%method, url, "Request unauthorized, refreshing token");

        let refresh_token = current
            .as_ref()
            .and_then(|token| token.refresh_token.clone())
            .ok_or(OAuthError::MissingRefreshToken)?;

        let token = self.refresh_token(&refresh_token).await?;
        *current = Some(token);
        tracing::info!("Installed refreshed token");

        let response = self
            .session
            .request(current.as_ref(), &method, url, &options)
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(%method, url, "Request still unauthorized after refresh");
        }

        Ok(response)
    }

    pub async fn token(&self) -> Option<Token> {
        self.token.lock().await.clone()
    }

    /// Install a token obtained outside this client.
    pub async fn set_token(&self, token: Token) {
        *self.token.lock().await = Some(token);
    }

    pub async fn clear_token(&self) {
        *self.token.lock().await = None;
    }
}
