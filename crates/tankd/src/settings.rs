use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tankd_transport::BindScope;

use crate::exit::{CliError, DATA_INVALID, INTERNAL};

/// Deployment settings shared by the tankd processes, loaded from one YAML
/// file. Every field has a default so a missing file or a partial file
/// works out of the box.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub gpio: GpioSettings,
    pub supervisor: SupervisorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpioSettings {
    /// Where clients find the gpio service.
    pub addr: String,
    pub port: u16,
    /// Bind all interfaces instead of loopback only.
    pub bind_all: bool,
    /// Sensor reading cache lifetime, seconds.
    pub cache_expire: f64,
    /// Initial reading of the simulated tank sensor.
    pub sim_temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorSettings {
    pub port: u16,
    /// The supervisor serves a remote gateway, so it defaults to all
    /// interfaces.
    pub bind_all: bool,
    /// Where accepted params are persisted between runs.
    pub params_file: PathBuf,
    /// Start the control loop on supervisor startup with the persisted
    /// params, like a reboot-safe deployment wants.
    pub autostart: bool,
}

impl Default for GpioSettings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1".to_string(),
            port: 7070,
            bind_all: false,
            cache_expire: 2.0,
            sim_temperature: 22.0,
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            port: 7071,
            bind_all: true,
            params_file: PathBuf::from("storage/supervisor/params.yaml"),
            autostart: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gpio: GpioSettings::default(),
            supervisor: SupervisorSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|err| {
            CliError::new(INTERNAL, format!("cannot read {}: {err}", path.display()))
        })?;
        serde_yaml::from_str(&text).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("invalid settings in {}: {err}", path.display()),
            )
        })
    }

    /// `host:port` of the gpio service, for RPC clients.
    pub fn gpio_target(&self) -> String {
        format!("{}:{}", self.gpio.addr, self.gpio.port)
    }

    pub fn gpio_scope(&self) -> BindScope {
        if self.gpio.bind_all {
            BindScope::All
        } else {
            BindScope::Loopback
        }
    }

    pub fn supervisor_scope(&self) -> BindScope {
        if self.supervisor.bind_all {
            BindScope::All
        } else {
            BindScope::Loopback
        }
    }
}
