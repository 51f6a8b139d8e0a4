use async_trait::async_trait;
use tracing::debug;

use super::{record, ErrorMap, Operation};
use crate::error::TemplateError;
use crate::memory::Memory;
use crate::template::CompiledTemplate;

/// Parses every template body. Runs once, before the first cycle.
pub struct CompileTemplates;

#[async_trait]
impl Operation for CompileTemplates {
    fn name(&self) -> &'static str {
        "CompileTemplates"
    }

    async fn execute(&self, memory: &mut Memory) -> ErrorMap {
        let mut errors = ErrorMap::new();
        memory.compiled_templates.clear();

        for (name, def) in &memory.template_defs {
            let compiled = match def.body().and_then(|body| CompiledTemplate::compile(&body)) {
                Ok(compiled) => compiled,
                Err(e) => {
                    record(&mut errors, name, e);
                    continue;
                }
            };

            let undeclared: Vec<&str> = compiled
                .referenced_profiles()
                .into_iter()
                .filter(|profile| !def.profiles.iter().any(|p| p.as_str() == *profile))
                .collect();
            if !undeclared.is_empty() {
                for profile in undeclared {
                    record(
                        &mut errors,
                        name,
                        TemplateError::UndeclaredProfile {
                            profile: profile.to_string(),
                        },
                    );
                }
                continue;
            }

            debug!(template = %name, "Compiled template");
            memory.compiled_templates.insert(name.clone(), compiled);
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;
    use crate::op::testing::fixture;
    use crate::template::TemplateDef;

    #[tokio::test]
    async fn test_compiles_all_templates() {
        let mut fx = fixture();
        fx.memory = fx
            .memory
            .with_template(TemplateDef::inline(
                "app",
                "port={{ app.port }}",
                "app.conf",
                vec!["app".into()],
            ))
            .with_template(TemplateDef::inline("static", "x=1", "static.conf", vec![]));

        let errors = CompileTemplates.execute(&mut fx.memory).await;

        assert!(errors.is_empty());
        assert_eq!(
            fx.memory.compiled_templates.keys().collect::<Vec<_>>(),
            vec!["app", "static"]
        );
    }

    #[tokio::test]
    async fn test_records_per_template_failures() {
        let mut fx = fixture();
        fx.memory = fx
            .memory
            .with_template(TemplateDef::inline("broken", "{{ app.port", "a.conf", vec!["app".into()]))
            .with_template(TemplateDef::inline("sneaky", "{{ db.host }}", "b.conf", vec!["app".into()]))
            .with_template(TemplateDef::inline("fine", "{{ app }}", "c.conf", vec!["app".into()]));

        let errors = CompileTemplates.execute(&mut fx.memory).await;

        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["broken", "sneaky"]);
        assert_eq!(
            errors["sneaky"],
            vec![OperationError::from(TemplateError::UndeclaredProfile {
                profile: "db".into()
            })]
        );
        assert_eq!(
            fx.memory.compiled_templates.keys().collect::<Vec<_>>(),
            vec!["fine"]
        );
    }
}
