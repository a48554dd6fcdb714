mod settings;

pub use settings::{ClientAuthMethod, OAuthSettings};
