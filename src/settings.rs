use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::session::DEFAULT_SESSION_TTL_SECS;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub backend_url: Url,
    pub backend_api_key: String,
    pub debug: bool,
    pub auth_token: String,
    pub enable_swagger: bool,
    pub port: u16,
    pub import_session_ttl_secs: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // APP_BACKEND_URL -> backend_url
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("backend_url", "http://localhost:54321")?
            .set_default("backend_api_key", "")?
            .set_default("debug", false)?
            .set_default("auth_token", "default-token-change-me")?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .set_default("import_session_ttl_secs", DEFAULT_SESSION_TTL_SECS)?
            .build()?;

        config.try_deserialize()
    }
}
