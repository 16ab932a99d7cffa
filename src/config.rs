use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_PORT: u16 = 3000;
/// Deployed frontend origin allowed through CORS.
const DEFAULT_FRONTEND_URL: &str = "https://youtubedownloaderitzsulex5.netlify.app";
/// Gateway base url the client tier talks to.
const DEFAULT_API_URL: &str = "http://localhost:8000";

const DEFAULT_PROVIDER_HOST: &str = "all-media-api.p.rapidapi.com";
/// Outbound calls to the provider fail after this budget instead of hanging.
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

const DEFAULT_PLAYER_BIN: &str = "mpv";
const DEFAULT_PLAYER_MAX_ATTEMPTS: u8 = 20;
const DEFAULT_PLAYER_POLL_INTERVAL_MS: u64 = 100;

/// Configuration for the extraction provider call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// RapidAPI host of the extraction provider
    #[serde(default = "default_provider_host")]
    pub host: String,

    /// Timeout for the detail call in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PROVIDER_HOST.to_string(),
            timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        }
    }
}

fn default_provider_host() -> String {
    DEFAULT_PROVIDER_HOST.to_string()
}

fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

/// Configuration for the preview player
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// External player binary
    #[serde(default = "default_player_bin")]
    pub bin: String,

    /// Creation attempts before the preview is declared unavailable
    #[serde(default = "default_player_max_attempts")]
    pub max_attempts: u8,

    /// Base delay between attempts in milliseconds
    #[serde(default = "default_player_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            bin: DEFAULT_PLAYER_BIN.to_string(),
            max_attempts: DEFAULT_PLAYER_MAX_ATTEMPTS,
            poll_interval_ms: DEFAULT_PLAYER_POLL_INTERVAL_MS,
        }
    }
}

fn default_player_bin() -> String {
    DEFAULT_PLAYER_BIN.to_string()
}

fn default_player_max_attempts() -> u8 {
    DEFAULT_PLAYER_MAX_ATTEMPTS
}

fn default_player_poll_interval_ms() -> u64 {
    DEFAULT_PLAYER_POLL_INTERVAL_MS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Port the gateway daemon binds on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origin allowed through CORS
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Gateway base url used by client commands
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub player: PlayerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            provider: ProviderConfig::default(),
            player: PlayerConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_frontend_url() -> String {
    DEFAULT_FRONTEND_URL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Config {
    fn validate(&self) {
        if self.provider.timeout_secs == 0 {
            panic!("provider.timeout_secs must be greater than 0");
        }

        if self.player.max_attempts == 0 {
            panic!("player.max_attempts must be greater than 0");
        }

        if self.player.poll_interval_ms == 0 {
            panic!("player.poll_interval_ms must be greater than 0");
        }

        url::Url::parse(&self.frontend_url).expect("frontend_url is not a valid url");
        url::Url::parse(&self.api_url).expect("api_url is not a valid url");
    }

    /// Env always wins over the config file.
    fn apply_env(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            self.port = port.parse().expect("PORT is not a number");
        }

        if let Ok(frontend_url) = std::env::var("FRONTEND_URL") {
            if !frontend_url.is_empty() {
                self.frontend_url = frontend_url;
            }
        }

        if let Ok(api_url) = std::env::var("API_URL") {
            if !api_url.is_empty() {
                self.api_url = api_url;
            }
        }
    }

    pub fn load() -> Self {
        let path = std::env::var("YTD_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = Self::load_with(Path::new(&path));
        config.apply_env();
        config.validate();

        config
    }

    pub fn load_with(path: &Path) -> Self {
        // create new if does not exist
        if !path.exists() {
            std::fs::write(path, serde_yml::to_string(&Self::default()).unwrap())
                .expect("failed to write default config");
        }

        let config_str = std::fs::read_to_string(path).expect("config file is not readable");
        let config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.validate();

        config
    }
}
