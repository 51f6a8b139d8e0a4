//! K8s-style resource types for the configuration directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::memory::{
    DEFAULT_REFRESH_INTERVAL, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_WAIT, DEFAULT_SOURCE_CONCURRENCY,
};
use crate::service::RestartMode;

/// The API version for all configurator resources.
pub const API_VERSION: &str = "configurator.io/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Settings,
    Profile,
    Template,
    Service,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Settings => write!(f, "Settings"),
            ResourceKind::Profile => write!(f, "Profile"),
            ResourceKind::Template => write!(f, "Template"),
            ResourceKind::Service => write!(f, "Service"),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "settings" => Ok(ResourceKind::Settings),
            "profile" => Ok(ResourceKind::Profile),
            "template" => Ok(ResourceKind::Template),
            "service" => Ok(ResourceKind::Service),
            _ => Err(format!("Unknown resource kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource<T> {
    pub api_version: String,
    pub kind: ResourceKind,
    pub metadata: ObjectMeta,
    pub spec: T,
}

impl<T> Resource<T> {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Global agent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSpec {
    /// Seconds between cycles.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Seconds between retries.
    #[serde(default = "default_retry_wait")]
    pub retry_wait: u64,

    #[serde(default)]
    pub source: SourceSettings,

    /// Identifier sent to the configuration source. A random one is
    /// generated when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_directory: Option<String>,
}

impl Default for SettingsSpec {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            retry_count: default_retry_count(),
            retry_wait: default_retry_wait(),
            source: SourceSettings::default(),
            client_id: None,
            runtime_directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of profiles fetched at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

fn default_retry_count() -> u32 {
    DEFAULT_RETRY_COUNT
}

fn default_retry_wait() -> u64 {
    DEFAULT_RETRY_WAIT.as_secs()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    DEFAULT_SOURCE_CONCURRENCY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSpec {
    pub application: String,
    pub environment: String,
    pub profile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    /// Template file, relative to the configuration directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    /// Inline template body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Output file, relative to the runtime directory.
    pub dst: String,

    #[serde(default)]
    pub profiles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Defaults to the resource name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systemd_unit: Option<String>,

    #[serde(default)]
    pub restart_mode: RestartMode,

    #[serde(default)]
    pub templates: Vec<String>,
}

pub type SettingsResource = Resource<SettingsSpec>;
pub type ProfileResource = Resource<ProfileSpec>;
pub type TemplateResource = Resource<TemplateSpec>;
pub type ServiceResource = Resource<ServiceSpec>;

#[derive(Debug, Clone)]
pub enum AnyResource {
    Settings(SettingsResource),
    Profile(ProfileResource),
    Template(TemplateResource),
    Service(ServiceResource),
}

impl AnyResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            AnyResource::Settings(_) => ResourceKind::Settings,
            AnyResource::Profile(_) => ResourceKind::Profile,
            AnyResource::Template(_) => ResourceKind::Template,
            AnyResource::Service(_) => ResourceKind::Service,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AnyResource::Settings(r) => r.name(),
            AnyResource::Profile(r) => r.name(),
            AnyResource::Template(r) => r.name(),
            AnyResource::Service(r) => r.name(),
        }
    }
}

/// Header parsed first to find out which resource a document holds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHeader {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
}
