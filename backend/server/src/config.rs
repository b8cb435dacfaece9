use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_SECRETS_DIR: &str = "/run/secrets";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {message}")]
    Invalid { key: String, message: String },

    #[error("Secret {0} not found in secrets dir or environment")]
    MissingSecret(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub supabase_url: String,
    pub supabase_key: String,
    pub meta_graph_url: String,
    pub meta_api_version: String,
    pub meta_access_token: Option<String>,
    pub max_batch_size: usize,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env();

        let meta_access_token = secrets.optional("META_ACCESS_TOKEN");
        if meta_access_token.is_none() {
            warn!("META_ACCESS_TOKEN not set, spend checks will fail until it is provided");
        }

        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            supabase_url: try_load::<String>("SUPABASE_URL", "http://localhost:54321")?
                .trim_end_matches('/')
                .to_string(),
            supabase_key: secrets.required("SUPABASE_SERVICE_ROLE_KEY")?,
            meta_graph_url: try_load::<String>("META_GRAPH_URL", "https://graph.facebook.com")?
                .trim_end_matches('/')
                .to_string(),
            meta_api_version: try_load("META_API_VERSION", "v19.0")?,
            meta_access_token,
            max_batch_size: try_load("MAX_BATCH_SIZE", "100")?,
            upstream_timeout: Duration::from_secs(try_load("UPSTREAM_TIMEOUT_SECS", "30")?),
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse_value(key, &raw)
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        }
    })
}

/// Docker secrets first, then a same-named environment variable for local runs.
struct Secrets {
    dir: PathBuf,
}

impl Secrets {
    fn from_env() -> Self {
        Self {
            dir: var("SECRETS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_DIR)),
        }
    }

    fn optional(&self, secret_name: &str) -> Option<String> {
        let path = self.dir.join(secret_name);

        match read_to_string(&path) {
            Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Ok(_) => {
                warn!("Secret file {} is empty", path.display());
                var(secret_name)
            }
            Err(e) => {
                info!("Failed to read {secret_name} from file ({e}), trying environment");
                var(secret_name)
            }
        }
    }

    fn required(&self, secret_name: &str) -> Result<String, ConfigError> {
        self.optional(secret_name)
            .ok_or_else(|| ConfigError::MissingSecret(secret_name.to_string()))
    }
}
