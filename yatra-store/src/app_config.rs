use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use yatra_catalog::FareConfig;
use yatra_order::ReconciliationPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub fares: FareConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub drafts: DraftConfig,
    #[serde(default)]
    pub tickets: TicketConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,
    #[serde(default)]
    pub reconciliation: ReconciliationPolicy,
    /// Latency of the simulated wallet round-trip
    #[serde(default = "default_simulated_latency")]
    pub simulated_latency_ms: u64,
}

impl PaymentConfig {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            gateway_timeout_secs: default_gateway_timeout(),
            reconciliation: ReconciliationPolicy::default(),
            simulated_latency_ms: default_simulated_latency(),
        }
    }
}

fn default_gateway_timeout() -> u64 {
    30
}

fn default_simulated_latency() -> u64 {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/session.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DraftConfig {
    /// Keep the in-progress booking across restarts
    #[serde(default)]
    pub persist: bool,
    pub path: PathBuf,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            persist: false,
            path: PathBuf::from("data/draft.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TicketConfig {
    pub output_dir: PathBuf,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("tickets"),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(Path::new("config"))
    }

    /// Layered load: `default`, then `{RUN_MODE}`, then `local`, then `YATRA__*` variables
    pub fn load_from(dir: &Path) -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let file = |name: &str| dir.join(name).to_string_lossy().into_owned();

        let s = config::Config::builder()
            .add_source(config::File::with_name(&file("default")))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&file(&run_mode)).required(false))
            // Developer machine overrides, not checked in
            .add_source(config::File::with_name(&file("local")).required(false))
            // Eg. `YATRA__BACKEND__BASE_URL=https://api.example.com`
            .add_source(
                config::Environment::with_prefix("YATRA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
