use chrono::{serde::ts_seconds_option, DateTime, Duration, Utc};
use oauth2::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

/// HTTP response returned by authenticated requests.
pub type Response = oauth2::HttpResponse;

/// Token issued by the token endpoint.
///
/// Every field the endpoint returned beyond the well-known ones is kept in
/// `extra`, so the token serializes back to the mapping it was built from.
/// Two exceptions: a space-delimited `scope` string comes back as a list, and
/// tokens issued by [`BasicSession`](crate::BasicSession) gain an `expires_at`
/// when the endpoint only sent `expires_in`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(
        default,
        with = "ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "deserialize_scope",
        skip_serializing_if = "Option::is_none"
    )]
    pub scope: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: None,
            expires_in: None,
            expires_at: None,
            scope: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets `expires_in` and the absolute `expires_at` it implies from now.
    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self.expires_at = expires_at_from_now(seconds);
        self
    }

    /// Fill in `expires_at` from `expires_in` unless the endpoint sent one.
    pub(crate) fn derive_expires_at(&mut self) {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.and_then(expires_at_from_now);
        }
    }

    /// Tokens without expiry metadata never expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires_at| expires_at <= Utc::now())
            .unwrap_or(false)
    }
}

fn expires_at_from_now(seconds: u64) -> Option<DateTime<Utc>> {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|d| Utc::now().checked_add_signed(d))
}

/// Token endpoints send `scope` space-delimited; stored tokens carry a list.
fn deserialize_scope<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scope {
        Delimited(String),
        List(Vec<String>),
    }

    Ok(Option::<Scope>::deserialize(deserializer)?.map(|scope| match scope {
        Scope::Delimited(scope) => scope.split_whitespace().map(str::to_owned).collect(),
        Scope::List(scope) => scope,
    }))
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Authorization URL to send the user to, along with the CSRF state it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

/// Transport options passed through unchanged to the resource request (and to
/// its retry, if one happens).
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }
}
