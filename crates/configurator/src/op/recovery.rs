//! Recovery-track operations.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use super::{record, ErrorMap, Operation};
use crate::logging::{event_data, LogLevel};
use crate::memory::Memory;
use crate::template::{diverges, write_if_changed};

/// Lets a bulk refresh that failed for some profiles continue with the ones
/// that were staged successfully.
pub struct AcceptPartialRefresh;

#[async_trait]
impl Operation for AcceptPartialRefresh {
    fn name(&self) -> &'static str {
        "AcceptPartialRefresh"
    }

    async fn execute(&self, memory: &mut Memory) -> ErrorMap {
        let staged: Vec<&str> = memory.profiles_to_apply.iter().map(|p| p.name()).collect();
        warn!(staged = ?staged, "Continuing with a partial refresh");
        memory.log(
            LogLevel::Warning,
            "partial_refresh",
            event_data(json!({ "staged": staged })),
        );
        ErrorMap::new()
    }
}

/// Drops everything staged this cycle. Services already queued for reload
/// stay queued.
pub struct ResetStaging;

#[async_trait]
impl Operation for ResetStaging {
    fn name(&self) -> &'static str {
        "ResetStaging"
    }

    async fn execute(&self, memory: &mut Memory) -> ErrorMap {
        let dropped = memory.profiles_to_apply.len() + usize::from(memory.applying_profile.is_some());
        memory.profiles_to_apply.clear();
        memory.applying_profile = None;
        info!(dropped, "Reset staged profiles");
        ErrorMap::new()
    }
}

/// Puts every last-good render back on disk where the file diverges from it.
pub struct RestoreGeneratedTemplates;

#[async_trait]
impl Operation for RestoreGeneratedTemplates {
    fn name(&self) -> &'static str {
        "RestoreGeneratedTemplates"
    }

    async fn execute(&self, memory: &mut Memory) -> ErrorMap {
        let mut errors = ErrorMap::new();

        for (name, generated) in &memory.generated_templates {
            if !diverges(&generated.path, &generated.content).await {
                continue;
            }

            match write_if_changed(&generated.path, &generated.content).await {
                Ok(true) => {
                    let consumers = memory.dependencies.services_for_template(name);
                    warn!(template = %name, path = %generated.path.display(), "Restored template");
                    memory.log(
                        LogLevel::Warning,
                        "restored_template",
                        event_data(json!({
                            "name": name,
                            "path": generated.path.display().to_string(),
                        })),
                    );
                    memory.services_to_reload.extend(consumers);
                }
                Ok(false) => {}
                Err(e) => record(&mut errors, name, e),
            }
        }

        errors
    }
}
