//! Pipeline operations.
//!
//! Each operation mutates [`Memory`] and returns the failures it hit, keyed
//! by the entity (profile, template or service) they concern. An empty map
//! means success. Operations never fail across this boundary: expected
//! failures are recorded in the map.

pub mod apply_all_profiles;
pub mod compile_templates;
pub mod generate_all_templates;
pub mod recovery;
pub mod refresh_all_profiles;
pub mod refresh_profile;
pub mod reload_services;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::OperationError;
use crate::memory::Memory;

pub use apply_all_profiles::ApplyAllProfiles;
pub use compile_templates::CompileTemplates;
pub use generate_all_templates::GenerateAllTemplates;
pub use recovery::{AcceptPartialRefresh, ResetStaging, RestoreGeneratedTemplates};
pub use refresh_all_profiles::RefreshAllProfiles;
pub use refresh_profile::RefreshProfile;
pub use reload_services::ReloadServices;

/// Failures of one operation run, keyed by entity name.
pub type ErrorMap = BTreeMap<String, Vec<OperationError>>;

#[async_trait]
pub trait Operation: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, memory: &mut Memory) -> ErrorMap;
}

/// Appends `error` to the failures recorded for `key`.
pub fn record(errors: &mut ErrorMap, key: &str, error: impl Into<OperationError>) {
    errors.entry(key.to_string()).or_default().push(error.into());
}

/// Renders an error map for operators: `{name: [error, ...], ...}`.
pub fn describe(errors: &ErrorMap) -> String {
    let entries: Vec<String> = errors
        .iter()
        .map(|(name, list)| {
            let messages: Vec<String> = list.iter().map(|e| e.to_string()).collect();
            format!("{}: [{}]", name, messages.join(", "))
        })
        .collect();
    format!("{{{}}}", entries.join(", "))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::logging::RecordingLogger;
    use crate::memory::Memory;
    use crate::profile::{LoadedProfile, ProfileDef};
    use crate::service::RecordingServiceManager;
    use crate::source::StubSource;

    pub struct Fixture {
        pub source: Arc<StubSource>,
        pub services: Arc<RecordingServiceManager>,
        pub logger: Arc<RecordingLogger>,
        pub memory: Memory,
    }

    pub fn fixture() -> Fixture {
        let source = Arc::new(StubSource::new());
        let services = Arc::new(RecordingServiceManager::new());
        let logger = Arc::new(RecordingLogger::new());
        let memory = Memory::new(source.clone(), services.clone())
            .with_logger(logger.clone())
            .with_client_id("test-client");
        Fixture {
            source,
            services,
            logger,
            memory,
        }
    }

    pub fn json_profile(name: &str, version: &str, body: &str) -> LoadedProfile {
        LoadedProfile::new(name, Some(version), body.as_bytes(), "application/json")
    }

    pub fn def(application: &str, environment: &str, profile: &str) -> ProfileDef {
        ProfileDef::new(application, environment, profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;

    #[test]
    fn test_describe() {
        let mut errors = ErrorMap::new();
        assert_eq!(describe(&errors), "{}");

        record(&mut errors, "source0", SourceError::Timeout("slow".to_string()));
        record(&mut errors, "source0", SourceError::MissingVersion);
        assert_eq!(
            describe(&errors),
            "{source0: [Configuration source timed out: slow, Configuration source response is missing the configuration version]}"
        );
    }
}
