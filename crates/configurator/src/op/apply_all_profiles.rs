use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{record, ErrorMap, Operation};
use crate::error::OperationError;
use crate::logging::{event_data, LogLevel};
use crate::memory::Memory;

/// Folds every staged profile into `applied_profiles`, in name order.
///
/// Profiles that are invalid or not defined are left out and recorded.
/// `applying_profile` belongs to the single-profile refresh path and is not
/// touched here.
pub struct ApplyAllProfiles;

#[async_trait]
impl Operation for ApplyAllProfiles {
    fn name(&self) -> &'static str {
        "ApplyAllProfiles"
    }

    async fn execute(&self, memory: &mut Memory) -> ErrorMap {
        let mut errors = ErrorMap::new();

        let mut staged = std::mem::take(&mut memory.profiles_to_apply);
        staged.sort_by(|a, b| a.name().cmp(b.name()));

        for profile in staged {
            let name = profile.name().to_string();

            if !memory.profile_defs.contains_key(&name) {
                record(
                    &mut errors,
                    &name,
                    OperationError::Unknown {
                        kind: "profile",
                        name: name.clone(),
                    },
                );
                continue;
            }
            if profile.has_errors() {
                record(
                    &mut errors,
                    &name,
                    OperationError::InvalidProfile(profile.errors().clone()),
                );
                continue;
            }

            debug!(profile = %name, version = ?profile.version(), "Applying profile");
            memory.log(
                LogLevel::Info,
                "applied_profile",
                event_data(json!({ "name": name, "version": profile.version() })),
            );
            memory.applied_profiles.insert(name, profile);
        }

        errors
    }
}
