use oauth2::basic::BasicErrorResponse;
use oauth2::http::header::{ACCEPT, AUTHORIZATION};
use oauth2::http::{HeaderValue, Method, StatusCode};
use oauth2::HttpResponse;
use url::Url;

use crate::common::{RequestBody, RequestOptions, Response, Token};
use crate::config::ClientAuthMethod;
use crate::error::OAuthError;

/// Client credentials presented for one token grant.
pub(super) struct ClientCredentials<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub method: ClientAuthMethod,
}

/// POST a grant to the token endpoint and read the body back as a [`Token`].
pub(super) async fn request_token<'a>(
    client: &reqwest::Client,
    token_url: &Url,
    mut params: Vec<(&'a str, &'a str)>,
    credentials: ClientCredentials<'a>,
) -> Result<Token, OAuthError> {
    if credentials.method == ClientAuthMethod::RequestBody {
        params.push(("client_id", credentials.client_id));
        params.push(("client_secret", credentials.client_secret));
    }

    let mut builder = client
        .post(token_url.clone())
        .header(ACCEPT, "application/json")
        .form(&params);

    if credentials.method == ClientAuthMethod::Basic {
        builder = builder.basic_auth(credentials.client_id, Some(credentials.client_secret));
    }

    let response = builder.send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    parse_token_response(status, &body)
}

fn parse_token_response(status: StatusCode, body: &[u8]) -> Result<Token, OAuthError> {
    // An error body is an error whatever the status says.
    if let Ok(error) = serde_json::from_slice::<BasicErrorResponse>(body) {
        return Err(error.into());
    }

    if !status.is_success() {
        return Err(OAuthError::authentication(
            "token_request_failed",
            Some(format!(
                "Token endpoint returned {}: {}",
                status,
                String::from_utf8_lossy(body)
            )),
        ));
    }

    let mut token: Token = serde_json::from_slice(body)?;
    token.derive_expires_at();
    Ok(token)
}

pub(super) async fn send_resource_request(
    client: &reqwest::Client,
    token: Option<&Token>,
    method: &Method,
    url: &str,
    options: &RequestOptions,
) -> Result<Response, OAuthError> {
    let mut builder = client
        .request(method.clone(), url)
        .headers(options.headers.clone());

    if !options.query.is_empty() {
        builder = builder.query(&options.query);
    }

    builder = match &options.body {
        Some(RequestBody::Bytes(bytes)) => builder.body(bytes.clone()),
        Some(RequestBody::Json(value)) => builder.json(value),
        None => builder,
    };

    if let Some(token) = token {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
            .map_err(|_| {
                OAuthError::authentication(
                    "invalid_token",
                    Some("Access token contains characters not allowed in a header".to_string()),
                )
            })?;
        value.set_sensitive(true);
        builder = builder.header(AUTHORIZATION, value);
    }

    Ok(into_response(builder.send().await?).await?)
}

async fn into_response(response: reqwest::Response) -> Result<HttpResponse, reqwest::Error> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    let mut http_response = HttpResponse::new(body);
    *http_response.status_mut() = status;
    *http_response.headers_mut() = headers;

    Ok(http_response)
}
