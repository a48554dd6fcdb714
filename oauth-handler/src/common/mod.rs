mod models;

pub use models::{AuthorizationRequest, RequestBody, RequestOptions, Response, Token};
