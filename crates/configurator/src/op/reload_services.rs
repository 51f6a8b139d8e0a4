use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use super::{record, ErrorMap, Operation};
use crate::error::OperationError;
use crate::logging::{event_data, LogLevel};
use crate::memory::Memory;

/// Reloads every service in `services_to_reload`, in name order.
///
/// Services that reload are removed from the set. Failed ones stay queued.
pub struct ReloadServices;

#[async_trait]
impl Operation for ReloadServices {
    fn name(&self) -> &'static str {
        "ReloadServices"
    }

    async fn execute(&self, memory: &mut Memory) -> ErrorMap {
        let mut errors = ErrorMap::new();
        let manager = Arc::clone(&memory.service_manager);
        let pending: Vec<String> = memory.services_to_reload.iter().cloned().collect();

        for name in pending {
            let Some(service) = memory.service_defs.get(&name).cloned() else {
                memory.services_to_reload.remove(&name);
                record(
                    &mut errors,
                    &name,
                    OperationError::Unknown {
                        kind: "service",
                        name: name.clone(),
                    },
                );
                continue;
            };

            match manager.reload(&service).await {
                Ok(()) => {
                    memory.services_to_reload.remove(&name);
                    memory.log(
                        LogLevel::Notice,
                        "reloaded_service",
                        event_data(json!({
                            "name": name,
                            "unit": service.unit,
                            "mode": service.restart_mode.verb(),
                        })),
                    );
                }
                Err(e) => {
                    warn!(service = %name, "Failed to reload service: {}", e);
                    record(&mut errors, &name, e);
                }
            }
        }

        errors
    }
}
