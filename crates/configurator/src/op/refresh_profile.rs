use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::{record, ErrorMap, Operation};
use crate::error::OperationError;
use crate::logging::{event_data, LogLevel};
use crate::memory::Memory;
use crate::source::{ConfigurationRequest, Fetched};

/// Re-fetches the profile held in `applying_profile`, using its version as
/// the hint, and replaces it when the source has something newer.
pub struct RefreshProfile;

#[async_trait]
impl Operation for RefreshProfile {
    fn name(&self) -> &'static str {
        "RefreshProfile"
    }

    async fn execute(&self, memory: &mut Memory) -> ErrorMap {
        let mut errors = ErrorMap::new();

        let Some(applying) = memory.applying_profile.as_ref() else {
            return errors;
        };
        let name = applying.name().to_string();
        let version = applying.version().map(str::to_string);

        let Some(def) = memory.profile_defs.get(&name) else {
            record(
                &mut errors,
                &name,
                OperationError::Unknown {
                    kind: "profile",
                    name: name.clone(),
                },
            );
            return errors;
        };

        let request = ConfigurationRequest::for_profile(def, version.as_deref(), &memory.client_id);
        let source = Arc::clone(&memory.source);

        let payload = match source.get_configuration(&request).await {
            Ok(Fetched::Updated(payload))
                if version.as_deref() != Some(payload.configuration_version.as_str()) =>
            {
                payload
            }
            Ok(_) => {
                memory.log(
                    LogLevel::Warning,
                    "no_update",
                    event_data(json!({ "name": name, "version": version })),
                );
                return errors;
            }
            Err(e) => {
                warn!(profile = %name, "Failed to refresh profile: {}", e);
                record(&mut errors, &name, e);
                return errors;
            }
        };

        let profile = payload.into_profile(&name);
        if profile.has_errors() {
            record(
                &mut errors,
                &name,
                OperationError::InvalidProfile(profile.errors().clone()),
            );
            return errors;
        }

        memory.log(
            LogLevel::Notice,
            "updated_profile",
            event_data(json!({
                "name": name,
                "previous_version": version,
                "new_version": profile.version(),
            })),
        );
        memory.applying_profile = Some(profile);
        errors
    }
}
