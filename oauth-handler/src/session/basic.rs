use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::http::Method;
use oauth2::{AuthUrl, ClientId, CsrfToken, EndpointNotSet, EndpointSet, RedirectUrl, Scope};
use secrecy::ExposeSecret;
use url::Url;

use super::http::{request_token, send_resource_request, ClientCredentials};
use super::OAuth2Session;
use crate::common::{AuthorizationRequest, RequestOptions, Response, Token};
use crate::config::{ClientAuthMethod, OAuthSettings};
use crate::error::OAuthError;

type AuthorizationClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet>;

/// Authorization-code session. `oauth2` builds the authorization URL; token
/// endpoint bodies are read straight into [`Token`] so every field survives.
pub struct BasicSession {
    settings: OAuthSettings,
    oauth_client: AuthorizationClient,
    token_url: Url,
    /// Token endpoint client; follows no redirects.
    token_http: reqwest::Client,
    http_client: reqwest::Client,
    /// CSRF state of the most recent authorization URL.
    state: Mutex<Option<CsrfToken>>,
}

impl BasicSession {
    pub fn new(settings: OAuthSettings) -> Result<Self, OAuthError> {
        settings.validate()?;

        let auth_url = AuthUrl::new(settings.authorization_base_url.clone())?;
        let redirect_url = RedirectUrl::new(settings.redirect_uri.clone())?;
        let token_url = Url::parse(&settings.token_url)?;

        let oauth_client = BasicClient::new(ClientId::new(settings.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_redirect_uri(redirect_url);

        let mut token_http =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        let mut http_client = reqwest::Client::builder();
        if let Some(seconds) = settings.timeout_seconds {
            token_http = token_http.timeout(Duration::from_secs(seconds));
            http_client = http_client.timeout(Duration::from_secs(seconds));
        }

        Ok(Self {
            settings,
            oauth_client,
            token_url,
            token_http: token_http.build()?,
            http_client: http_client.build()?,
            state: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    fn scopes(&self) -> impl Iterator<Item = Scope> + '_ {
        self.settings
            .scope
            .iter()
            .flatten()
            .map(|scope| Scope::new(scope.clone()))
    }

    fn credentials(&self, method: ClientAuthMethod) -> ClientCredentials<'_> {
        ClientCredentials {
            client_id: &self.settings.client_id,
            client_secret: self.settings.client_secret.expose_secret(),
            method,
        }
    }

    fn issued_state(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|state| state.secret().clone())
    }
}

#[async_trait]
impl OAuth2Session for BasicSession {
    fn authorization_url(&self) -> Result<AuthorizationRequest, OAuthError> {
        let (url, state) = self
            .oauth_client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes())
            .url();

        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(state.clone());

        tracing::debug!(
            authorization_base_url = %self.settings.authorization_base_url,
            "Built authorization URL"
        );

        Ok(AuthorizationRequest {
            url,
            state: state.secret().clone(),
        })
    }

    async fn fetch_token(&self, authorization_response: &str) -> Result<Token, OAuthError> {
        let code =
            authorization_code(authorization_response, self.issued_state().as_deref())?;

        let params = vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];
        let token = request_token(
            &self.token_http,
            &self.token_url,
            params,
            self.credentials(self.settings.auth_method),
        )
        .await?;

        tracing::debug!(
            expires_at = ?token.expires_at,
            "Successfully exchanged code for tokens"
        );

        Ok(token)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Token, OAuthError> {
        let scope = self.settings.scope.as_ref().map(|scope| scope.join(" "));

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(scope) = &scope {
            params.push(("scope", scope.as_str()));
        }

        let mut token = request_token(
            &self.token_http,
            &self.token_url,
            params,
            self.credentials(self.settings.refresh_auth_method),
        )
        .await?;
        // Providers that do not rotate refresh tokens omit them from the response.
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        tracing::debug!(expires_at = ?token.expires_at, "Successfully refreshed tokens");

        Ok(token)
    }

    async fn request(
        &self,
        token: Option<&Token>,
        method: &Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Response, OAuthError> {
        send_resource_request(&self.http_client, token, method, url, options).await
    }
}

/// Extract the authorization code from the redirect URL, checking the error
/// and state parameters first.
fn authorization_code(
    authorization_response: &str,
    expected_state: Option<&str>,
) -> Result<String, OAuthError> {
    let url = Url::parse(authorization_response).map_err(|e| {
        OAuthError::authentication(
            "invalid_request",
            Some(format!("Authorization response is not a valid URL: {}", e)),
        )
    })?;

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        return Err(OAuthError::authentication(
            error.clone(),
            params.get("error_description").cloned(),
        ));
    }

    if let Some(expected) = expected_state {
        if params.get("state").map(String::as_str) != Some(expected) {
            tracing::warn!("Authorization response state does not match the issued state");
            return Err(OAuthError::authentication(
                "mismatching_state",
                Some("CSRF state of the authorization response does not match".to_string()),
            ));
        }
    }

    params.get("code").cloned().ok_or_else(|| {
        OAuthError::authentication(
            "invalid_request",
            Some("Authorization response has no code parameter".to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> OAuthSettings {
        OAuthSettings::new(
            "client-123",
            "secret",
            "http://localhost:8080/callback",
            "https://provider.example/oauth/authorize",
            "https://provider.example/oauth/token",
        )
    }

    #[test]
    fn authorization_url_carries_client_and_redirect() {
        let session = BasicSession::new(settings().with_scope(["read", "write"])).unwrap();
        let request = session.authorization_url().unwrap();

        assert_eq!(request.url.host_str(), Some("provider.example"));
        assert_eq!(request.url.path(), "/oauth/authorize");

        let params: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["redirect_uri"], "http://localhost:8080/callback");
        assert_eq!(params["scope"], "read write");
        assert_eq!(params["state"], request.state);
        assert_eq!(session.issued_state().as_deref(), Some(request.state.as_str()));
    }

    #[test]
    fn authorization_url_without_scope() {
        let session = BasicSession::new(settings()).unwrap();
        let request = session.authorization_url().unwrap();

        assert!(!request.url.query_pairs().any(|(key, _)| key == "scope"));
    }

    #[test]
    fn each_authorization_url_gets_fresh_state() {
        let session = BasicSession::new(settings()).unwrap();
        let first = session.authorization_url().unwrap();
        let second = session.authorization_url().unwrap();

        assert_ne!(first.state, second.state);
        assert_eq!(session.issued_state(), Some(second.state));
    }

    #[test]
    fn invalid_settings_fail_construction() {
        let mut s = settings();
        s.authorization_base_url = "not a url".to_string();
        assert!(matches!(
            BasicSession::new(s),
            Err(OAuthError::Configuration(_))
        ));
    }

    #[test]
    fn code_is_extracted() {
        let code = authorization_code(
            "http://localhost:8080/callback?code=abc&state=xyz",
            Some("xyz"),
        )
        .unwrap();
        assert_eq!(code, "abc");

        let code = authorization_code("http://localhost:8080/callback?code=abc", None).unwrap();
        assert_eq!(code, "abc");
    }

    #[test]
    fn provider_error_is_reported() {
        let err = authorization_code(
            "http://localhost:8080/callback?error=access_denied&error_description=User+declined",
            None,
        )
        .unwrap_err();

        match err {
            OAuthError::Authentication { error, description } => {
                assert_eq!(error, "access_denied");
                assert_eq!(description.as_deref(), Some("User declined"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn state_mismatch_is_refused() {
        for response in [
            "http://localhost:8080/callback?code=abc&state=other",
            "http://localhost:8080/callback?code=abc",
        ] {
            let err = authorization_code(response, Some("xyz")).unwrap_err();
            assert!(
                matches!(err, OAuthError::Authentication { ref error, .. } if error == "mismatching_state")
            );
        }
    }

    #[test]
    fn missing_code_or_bad_url_is_refused() {
        assert!(matches!(
            authorization_code("http://localhost:8080/callback?state=xyz", Some("xyz")),
            Err(OAuthError::Authentication { .. })
        ));
        assert!(matches!(
            authorization_code("code=abc", None),
            Err(OAuthError::Authentication { .. })
        ));
    }
}
