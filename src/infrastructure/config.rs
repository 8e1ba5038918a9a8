use crate::application::channel::ViewProfile;
use crate::domain::window::{Shift, ShiftTable};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub dashboard: DashboardSettings,
    #[serde(default)]
    pub hourly: HourlySettings,
    #[serde(default)]
    pub shifts: Vec<Shift>,
    #[serde(default)]
    pub status: StatusSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    #[serde(default = "default_http_base")]
    pub http_base: String,
    /// Derived from `http_base` when absent.
    pub ws_base: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    #[serde(default = "default_dashboard_resync_secs")]
    pub resync_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HourlySettings {
    #[serde(default = "default_hourly_resync_secs")]
    pub resync_secs: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StatusSettings {
    pub listen: Option<SocketAddr>,
}

fn default_http_base() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_dashboard_resync_secs() -> u64 {
    30
}

fn default_hourly_resync_secs() -> u64 {
    60
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            http_base: default_http_base(),
            ws_base: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            resync_secs: default_dashboard_resync_secs(),
        }
    }
}

impl Default for HourlySettings {
    fn default() -> Self {
        Self {
            resync_secs: default_hourly_resync_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl BackendSettings {
    pub fn http_base(&self) -> &str {
        self.http_base.trim_end_matches('/')
    }

    pub fn ws_base(&self) -> String {
        if let Some(ws) = &self.ws_base {
            return ws.trim_end_matches('/').to_string();
        }
        let http = self.http_base();
        if let Some(rest) = http.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = http.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            http.to_string()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl MonitorConfig {
    pub fn shift_table(&self) -> ShiftTable {
        ShiftTable::new(self.shifts.clone())
    }

    pub fn dashboard_profile(&self) -> ViewProfile {
        ViewProfile::dashboard(Duration::from_secs(self.dashboard.resync_secs))
    }

    pub fn hourly_profile(&self) -> ViewProfile {
        ViewProfile::hourly(
            Duration::from_secs(self.hourly.resync_secs),
            Duration::from_secs(self.hourly.reconnect_delay_secs),
        )
    }
}

/// Load `path` (optional, any format the config crate understands) overlaid with
/// `MONITOR__SECTION__KEY` environment variables.
pub fn load_monitor_config(path: &Path) -> anyhow::Result<MonitorConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("MONITOR")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
