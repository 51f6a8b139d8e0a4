use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use tracing::{debug, warn};

use super::{record, ErrorMap, Operation};
use crate::error::{OperationError, SourceError};
use crate::logging::{event_data, LogLevel};
use crate::memory::Memory;
use crate::source::{ConfigurationRequest, Fetched};

/// Fetches every defined profile and stages the ones whose version moved.
///
/// Fetches run concurrently up to `source_concurrency`; their outcomes are
/// folded into memory afterwards, in profile-name order. One failing profile
/// never prevents the others from being staged.
pub struct RefreshAllProfiles;

struct Outcome {
    name: String,
    previous_version: Option<String>,
    result: Result<Fetched, SourceError>,
}

#[async_trait]
impl Operation for RefreshAllProfiles {
    fn name(&self) -> &'static str {
        "RefreshAllProfiles"
    }

    async fn execute(&self, memory: &mut Memory) -> ErrorMap {
        let mut errors = ErrorMap::new();

        let requests: Vec<(String, Option<String>, ConfigurationRequest)> = memory
            .profile_defs
            .iter()
            .map(|(name, def)| {
                let previous = memory.applied_version(name).map(str::to_string);
                let request =
                    ConfigurationRequest::for_profile(def, previous.as_deref(), &memory.client_id);
                (name.clone(), previous, request)
            })
            .collect();

        let source = Arc::clone(&memory.source);
        let mut outcomes: Vec<Outcome> = stream::iter(requests)
            .map(|(name, previous_version, request)| {
                let source = Arc::clone(&source);
                async move {
                    let result = source.get_configuration(&request).await;
                    Outcome {
                        name,
                        previous_version,
                        result,
                    }
                }
            })
            .buffer_unordered(memory.source_concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.name.cmp(&b.name));

        memory.profiles_to_apply.clear();

        for outcome in outcomes {
            let payload = match outcome.result {
                Ok(Fetched::Updated(payload)) => payload,
                Ok(Fetched::Unchanged) => {
                    debug!(profile = %outcome.name, "Profile unchanged");
                    continue;
                }
                Err(e) => {
                    warn!(profile = %outcome.name, "Failed to fetch profile: {}", e);
                    record(&mut errors, &outcome.name, e);
                    continue;
                }
            };

            if outcome.previous_version.as_deref() == Some(payload.configuration_version.as_str()) {
                debug!(profile = %outcome.name, "Source returned the applied version");
                continue;
            }

            let profile = payload.into_profile(&outcome.name);
            if profile.has_errors() {
                warn!(profile = %outcome.name, "Fetched profile is invalid");
                record(
                    &mut errors,
                    &outcome.name,
                    OperationError::InvalidProfile(profile.errors().clone()),
                );
                continue;
            }

            memory.log(
                LogLevel::Notice,
                "updated_profile",
                event_data(json!({
                    "name": outcome.name,
                    "previous_version": outcome.previous_version,
                    "new_version": profile.version(),
                })),
            );
            memory.profiles_to_apply.push(profile);
        }

        memory.last_refresh_time = Some(chrono::Utc::now().timestamp());
        errors
    }
}
