//! Saver configuration

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use eyre::{eyre, Result, WrapErr};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use url::Url;

/// Saver configuration
#[derive(Clone)]
pub struct Config {
    /// Unique saver instance ID
    pub saver_id: String,
    /// Registry name of the watched chain
    pub chain_name: String,

    /// Solana JSON-RPC URL
    pub solana_rpc_url: String,
    /// Solana pubsub URL
    pub solana_ws_url: String,
    /// Bridge program id
    pub program_id: Pubkey,

    /// Oldest signature catchup walks back to; `None` disables catchup
    pub from_tx: Option<Signature>,
    /// Explicit catchup switch
    pub disable_catchup: bool,

    /// Registry LCD REST base URL
    pub registry_url: String,
    /// Broadcaster service URL
    pub broadcaster_url: String,

    /// HTTP bind address
    pub bind_address: String,
    /// HTTP port for revote, health and metrics
    pub health_port: u16,

    /// Listener reconnect and catchup retry backoff in milliseconds
    pub reconnect_backoff_ms: u64,
    /// Deadline for outbound HTTP requests in milliseconds
    pub request_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }

        let default_id = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| format!("saver-{}", std::process::id()));

        let program_id = env::var("PROGRAM_ID").map_err(|_| eyre!("PROGRAM_ID required"))?;
        let program_id = Pubkey::from_str(program_id.trim())
            .map_err(|e| eyre!("Invalid PROGRAM_ID {}: {}", program_id, e))?;

        let from_tx = match env::var("FROM_TX") {
            Ok(s) if !s.trim().is_empty() => Some(
                Signature::from_str(s.trim()).map_err(|e| eyre!("Invalid FROM_TX {}: {}", s, e))?,
            ),
            _ => None,
        };

        let config = Self {
            saver_id: env::var("SAVER_ID").unwrap_or(default_id),
            chain_name: env::var("CHAIN_NAME").unwrap_or_else(|_| "solana".to_string()),

            solana_rpc_url: env::var("SOLANA_RPC_URL")
                .map_err(|_| eyre!("SOLANA_RPC_URL required"))?,
            solana_ws_url: env::var("SOLANA_WS_URL").unwrap_or_default(),
            program_id,

            from_tx,
            disable_catchup: env::var("DISABLE_CATCHUP")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),

            registry_url: env::var("REGISTRY_URL").map_err(|_| eyre!("REGISTRY_URL required"))?,
            broadcaster_url: env::var("BROADCASTER_URL")
                .map_err(|_| eyre!("BROADCASTER_URL required"))?,

            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()),
            health_port: env::var("HEALTH_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9100),

            reconnect_backoff_ms: env::var("RECONNECT_BACKOFF_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chain_name.trim().is_empty() {
            return Err(eyre!("CHAIN_NAME must not be empty"));
        }

        validate_url("SOLANA_RPC_URL", &self.solana_rpc_url, &["http", "https"])?;
        if !self.solana_ws_url.is_empty() {
            validate_url("SOLANA_WS_URL", &self.solana_ws_url, &["ws", "wss"])?;
        }
        validate_url("REGISTRY_URL", &self.registry_url, &["http", "https"])?;
        validate_url("BROADCASTER_URL", &self.broadcaster_url, &["http", "https"])?;

        if self.reconnect_backoff_ms == 0 {
            return Err(eyre!("RECONNECT_BACKOFF_MS must be greater than 0"));
        }
        if self.request_timeout_ms == 0 {
            return Err(eyre!("REQUEST_TIMEOUT_MS must be greater than 0"));
        }
        Ok(())
    }

    /// Catchup runs only with a stop signature and when not disabled
    pub fn catchup_enabled(&self) -> bool {
        !self.disable_catchup && self.from_tx.is_some()
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn validate_url(name: &str, value: &str, schemes: &[&str]) -> Result<()> {
    let url = Url::parse(value).wrap_err_with(|| format!("Invalid {}", name))?;
    if !schemes.contains(&url.scheme()) {
        return Err(eyre!(
            "{} must use one of {:?}, got {}",
            name,
            schemes,
            url.scheme()
        ));
    }
    Ok(())
}

/// Strip userinfo from URLs before they reach logs
fn redact_url(value: &str) -> String {
    match Url::parse(value) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            format!("{} (credentials redacted)", url)
        }
        Ok(_) => value.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("saver_id", &self.saver_id)
            .field("chain_name", &self.chain_name)
            .field("solana_rpc_url", &redact_url(&self.solana_rpc_url))
            .field("solana_ws_url", &redact_url(&self.solana_ws_url))
            .field("program_id", &self.program_id.to_string())
            .field("from_tx", &self.from_tx.map(|s| s.to_string()))
            .field("disable_catchup", &self.disable_catchup)
            .field("registry_url", &redact_url(&self.registry_url))
            .field("broadcaster_url", &redact_url(&self.broadcaster_url))
            .field("bind_address", &self.bind_address)
            .field("health_port", &self.health_port)
            .field("reconnect_backoff_ms", &self.reconnect_backoff_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}
