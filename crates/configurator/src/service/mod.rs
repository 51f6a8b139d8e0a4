//! Local services that consume rendered templates.

pub mod stub;
pub mod systemd;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

pub use stub::RecordingServiceManager;
pub use systemd::SystemdServiceManager;

/// How a service picks up new configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartMode {
    Reload,
    #[default]
    Restart,
}

impl RestartMode {
    /// The `systemctl` verb for this mode.
    pub fn verb(&self) -> &'static str {
        match self {
            RestartMode::Reload => "reload",
            RestartMode::Restart => "restart",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDef {
    pub name: String,
    pub unit: String,
    pub restart_mode: RestartMode,
    /// Names of the templates this service consumes.
    pub templates: Vec<String>,
}

impl ServiceDef {
    /// A service whose unit shares its name, restarted on change.
    pub fn new(name: impl Into<String>, templates: Vec<String>) -> Self {
        let name = name.into();
        Self {
            unit: name.clone(),
            name,
            restart_mode: RestartMode::default(),
            templates,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_restart_mode(mut self, mode: RestartMode) -> Self {
        self.restart_mode = mode;
        self
    }
}

/// Process supervisor able to make a service pick up new configuration.
#[async_trait]
pub trait ServiceManager: Send + Sync {
    async fn reload(&self, service: &ServiceDef) -> Result<(), ServiceError>;
}
