use std::env;
use std::time::Duration;

/// Relay configuration loaded from environment variables
///
/// Required:
/// - `GITTER_TOKEN`: bearer token for the upstream streaming API
/// - `GITTER_ROOM_ID`: room to stream messages from
/// - `SLACK_WEBHOOK_URL`: webhook that receives aggregated batches
///
/// Optional:
/// - `GITTER_STREAM_URL`: full upstream URL, overrides the room-derived one
/// - `WINDOW_MAX_ITEMS`: messages per micro-batch window (default: 10)
/// - `WINDOW_MAX_MS`: window duration in milliseconds (default: 1000)
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub gitter_token: String,
    pub stream_url: String,
    pub webhook_url: String,
    pub window_max_items: usize,
    pub window_max_ms: u64,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let gitter_token = env::var("GITTER_TOKEN")
            .map_err(|_| ConfigError::MissingVariable("GITTER_TOKEN".to_string()))?;

        let stream_url = match env::var("GITTER_STREAM_URL") {
            Ok(url) => url,
            Err(_) => {
                let room_id = env::var("GITTER_ROOM_ID")
                    .map_err(|_| ConfigError::MissingVariable("GITTER_ROOM_ID".to_string()))?;
                crate::source::stream_url(&room_id)
            }
        };
        require_http_url("GITTER_STREAM_URL", &stream_url)?;

        let webhook_url = env::var("SLACK_WEBHOOK_URL")
            .map_err(|_| ConfigError::MissingVariable("SLACK_WEBHOOK_URL".to_string()))?;
        require_http_url("SLACK_WEBHOOK_URL", &webhook_url)?;

        let window_max_items = parse_window_items(env::var("WINDOW_MAX_ITEMS").ok())?;
        let window_max_ms = parse_window_ms(env::var("WINDOW_MAX_MS").ok())?;

        Ok(Self {
            gitter_token,
            stream_url,
            webhook_url,
            window_max_items,
            window_max_ms,
        })
    }

    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_max_ms)
    }
}

fn require_http_url(name: &str, url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::InvalidValue(format!(
            "{} must start with http:// or https://",
            name
        )));
    }
    Ok(())
}

/// Window size knob. A bad value is a hard error rather than a silent
/// default, so a typo in deployment config is caught at startup.
fn parse_window_items(raw: Option<String>) -> Result<usize, ConfigError> {
    match raw {
        None => Ok(10),
        Some(s) => match s.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(ConfigError::InvalidValue(format!(
                "WINDOW_MAX_ITEMS must be a positive integer, got '{}'",
                s
            ))),
        },
    }
}

fn parse_window_ms(raw: Option<String>) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(1_000),
        Some(s) => match s.parse::<u64>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(ConfigError::InvalidValue(format!(
                "WINDOW_MAX_MS must be a positive integer, got '{}'",
                s
            ))),
        },
    }
}
