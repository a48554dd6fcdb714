//! Authorization-code OAuth2 client that refreshes and retries once when a
//! request is rejected with `401 Unauthorized`.

mod client;
pub mod common;
mod config;
mod error;
pub mod session;

pub use client::OAuthClient;
pub use common::{AuthorizationRequest, RequestBody, RequestOptions, Response, Token};
pub use config::{ClientAuthMethod, OAuthSettings};
pub use error::OAuthError;
pub use oauth2::http::{Method, StatusCode};
pub use session::{BasicSession, OAuth2Session};
