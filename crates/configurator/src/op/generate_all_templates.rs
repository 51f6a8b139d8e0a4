use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use super::{record, ErrorMap, Operation};
use crate::error::TemplateError;
use crate::logging::{event_data, LogLevel};
use crate::memory::Memory;
use crate::template::{write_if_changed, GeneratedTemplate};

/// Renders templates whose inputs moved and writes the ones whose output
/// changed, queuing their consumers for reload.
///
/// A template is re-rendered when it was never generated or when any of its
/// input profiles is now applied at a version other than the one recorded
/// with its last render. Otherwise the cached render stands.
pub struct GenerateAllTemplates;

#[async_trait]
impl Operation for GenerateAllTemplates {
    fn name(&self) -> &'static str {
        "GenerateAllTemplates"
    }

    async fn execute(&self, memory: &mut Memory) -> ErrorMap {
        let mut errors = ErrorMap::new();
        let defs: Vec<_> = memory.template_defs.values().cloned().collect();

        for def in defs {
            let inputs: BTreeMap<String, String> = def
                .profiles
                .iter()
                .filter_map(|p| {
                    memory
                        .applied_version(p)
                        .map(|version| (p.clone(), version.to_string()))
                })
                .collect();
            let path = def.output_path(&memory.runtime_directory);

            let cached = memory
                .generated_templates
                .get(&def.name)
                .is_some_and(|g| g.inputs == inputs && g.path == path);
            if cached {
                debug!(template = %def.name, "Inputs unchanged, reusing render");
                continue;
            }

            let Some(compiled) = memory.compiled_templates.get(&def.name) else {
                record(&mut errors, &def.name, TemplateError::NotCompiled);
                continue;
            };

            let content = match compiled.render(&memory.applied_profiles) {
                Ok(content) => content,
                Err(e) => {
                    warn!(template = %def.name, "Failed to render template: {}", e);
                    record(&mut errors, &def.name, e);
                    continue;
                }
            };

            let changed = match write_if_changed(&path, &content).await {
                Ok(changed) => changed,
                Err(e) => {
                    warn!(template = %def.name, "Failed to write template: {}", e);
                    record(&mut errors, &def.name, e);
                    continue;
                }
            };

            if changed {
                let consumers = memory.dependencies.services_for_template(&def.name);
                memory.log(
                    LogLevel::Info,
                    "generated_template",
                    event_data(json!({
                        "name": def.name,
                        "path": path.display().to_string(),
                        "services": consumers,
                    })),
                );
                memory.services_to_reload.extend(consumers);
            }

            memory.generated_templates.insert(
                def.name.clone(),
                GeneratedTemplate {
                    path,
                    content,
                    inputs,
                },
            );
        }

        errors
    }
}
