//! The OAuth2 session capability the client delegates to.
//!
//! [`BasicSession`] implements it on top of the `oauth2` crate; tests and
//! alternative OAuth2 libraries can substitute their own implementation.

mod basic;
mod http;

pub use basic::BasicSession;

use async_trait::async_trait;
use oauth2::http::Method;

use crate::common::{AuthorizationRequest, RequestOptions, Response, Token};
use crate::error::OAuthError;

#[async_trait]
pub trait OAuth2Session: Send + Sync {
    /// Build the URL the user is sent to in order to grant access.
    fn authorization_url(&self) -> Result<AuthorizationRequest, OAuthError>;

    /// Exchange the redirect received after authorization for a token.
    async fn fetch_token(&self, authorization_response: &str) -> Result<Token, OAuthError>;

    /// Obtain a new token from a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, OAuthError>;

    /// Send a resource request, authorized with `token` when one is given.
    async fn request(
        &self,
        token: Option<&Token>,
        method: &Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Response, OAuthError>;
}
