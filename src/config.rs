use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Optional config file read from the working directory.
pub const CONFIG_FILE: &str = "vidgrab.toml";

/// Prefix for environment overrides, e.g. `VIDGRAB_BACKEND_URL`.
pub const ENV_PREFIX: &str = "VIDGRAB_";

/// Client settings. Every field has a default so an empty environment works.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the download service.
    pub backend_url: String,
    /// Folder the retrieved files are written to.
    pub download_folder: String,
    /// Period between progress queries.
    pub poll_interval_ms: u64,
    /// Pause between saving the file and resetting the session.
    pub settle_delay_ms: u64,
    /// How long the success notification stays visible.
    pub notice_duration_ms: u64,
    /// Timeout applied to each backend request.
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".to_string(),
            download_folder: "./downloads".to_string(),
            poll_interval_ms: 1000,
            settle_delay_ms: 1000,
            notice_duration_ms: 3000,
            request_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Defaults, then `vidgrab.toml`, then `VIDGRAB_*` variables.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic.
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
