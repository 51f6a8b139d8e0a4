//! Configuration source collaborators.
//!
//! The source is queried once per profile and may answer "unchanged" when the
//! caller's version hint is still current.

pub mod http;
pub mod stub;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::profile::{LoadedProfile, ProfileDef};

pub use http::HttpConfigurationSource;
pub use stub::StubSource;

/// One `get_configuration` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRequest {
    pub application: String,
    pub environment: String,
    pub profile: String,
    /// Version the caller already holds, if any.
    pub client_configuration_version: Option<String>,
    pub client_id: String,
}

impl ConfigurationRequest {
    pub fn for_profile(def: &ProfileDef, version: Option<&str>, client_id: &str) -> Self {
        Self {
            application: def.application.clone(),
            environment: def.environment.clone(),
            profile: def.profile.clone(),
            client_configuration_version: version.map(str::to_string),
            client_id: client_id.to_string(),
        }
    }
}

/// New content returned by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub content: Vec<u8>,
    pub configuration_version: String,
    pub content_type: String,
}

impl Payload {
    /// Builds the validated snapshot for the profile named `name`.
    pub fn into_profile(self, name: &str) -> LoadedProfile {
        LoadedProfile::new(
            name,
            Some(&self.configuration_version),
            &self.content,
            &self.content_type,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// Nothing changed since `client_configuration_version`.
    Unchanged,
    Updated(Payload),
}

#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    async fn get_configuration(
        &self,
        request: &ConfigurationRequest,
    ) -> Result<Fetched, SourceError>;
}
