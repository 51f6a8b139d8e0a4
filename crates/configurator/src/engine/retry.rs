//! Retry preparation.
//!
//! Before a downstream stage is retried, the profiles feeding the entities
//! that failed are refreshed one at a time, so a fix published upstream in
//! the meantime is picked up by the retry.

use std::collections::BTreeSet;

use tracing::debug;

use super::state::Stage;
use crate::memory::Memory;
use crate::op::{ErrorMap, Operation, RefreshProfile};

/// Applied profiles implicated in the failures of `stage`.
pub fn implicated_profiles(memory: &Memory, stage: Stage, errors: &ErrorMap) -> BTreeSet<String> {
    let deps = &memory.dependencies;
    let profiles: BTreeSet<String> = match stage {
        Stage::GenerateAllTemplates => errors
            .keys()
            .flat_map(|template| deps.profiles_for_template(template))
            .collect(),
        Stage::ReloadServices => errors
            .keys()
            .flat_map(|service| deps.profiles_for_service(service))
            .collect(),
        _ => BTreeSet::new(),
    };

    profiles
        .into_iter()
        .filter(|name| memory.applied_profiles.contains_key(name))
        .collect()
}

/// Runs [`RefreshProfile`] for each named applied profile and applies any
/// newer version it finds. Returns the refresh failures, which do not stop
/// the retry.
pub async fn refresh_implicated(memory: &mut Memory, profiles: &BTreeSet<String>) -> ErrorMap {
    let mut errors = ErrorMap::new();

    for name in profiles {
        let Some(current) = memory.applied_profiles.get(name).cloned() else {
            continue;
        };
        let previous = current.version().map(str::to_string);

        memory.applying_profile = Some(current);
        for (key, list) in RefreshProfile.execute(memory).await {
            errors.entry(key).or_default().extend(list);
        }

        if let Some(refreshed) = memory.applying_profile.take() {
            if refreshed.version() != previous.as_deref() {
                debug!(profile = %name, version = ?refreshed.version(), "Applied refreshed profile before retry");
                memory.applied_profiles.insert(name.clone(), refreshed);
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OperationError, SourceError, TemplateError};
    use crate::op::testing::{def, fixture, json_profile, Fixture};
    use crate::service::ServiceDef;
    use crate::template::TemplateDef;

    fn graph() -> Fixture {
        let mut fx = fixture();
        fx.memory = fx
            .memory
            .with_profile("web", def("web", "prod", "main"))
            .with_profile("tls", def("tls", "prod", "main"))
            .with_template(TemplateDef::inline("site", "{{ web }}", "site", vec!["web".into()]))
            .with_template(TemplateDef::inline("certs", "{{ tls }}", "certs", vec!["tls".into()]))
            .with_service(ServiceDef::new("nginx", vec!["site".into(), "certs".into()]));
        fx.memory
            .applied_profiles
            .insert("web".into(), json_profile("web", "v1", "{}"));
        fx.memory
            .applied_profiles
            .insert("tls".into(), json_profile("tls", "v1", "{}"));
        fx
    }

    fn failure(key: &str) -> ErrorMap {
        let mut errors = ErrorMap::new();
        crate::op::record(&mut errors, key, OperationError::from(TemplateError::NotCompiled));
        errors
    }

    #[test]
    fn test_implicated_profiles() {
        let fx = graph();
        assert_eq!(
            implicated_profiles(&fx.memory, Stage::GenerateAllTemplates, &failure("site")),
            BTreeSet::from(["web".to_string()])
        );
        assert_eq!(
            implicated_profiles(&fx.memory, Stage::ReloadServices, &failure("nginx")),
            BTreeSet::from(["tls".to_string(), "web".to_string()])
        );
        assert!(implicated_profiles(&fx.memory, Stage::RefreshAllProfiles, &failure("web")).is_empty());
    }

    #[tokio::test]
    async fn test_refresh_implicated_applies_newer_versions() {
        let mut fx = graph();
        fx.source
            .updated("web", "v2", r#"{"fixed": true}"#, "application/json")
            .failing("tls", SourceError::Timeout("slow".into()));

        let profiles = BTreeSet::from(["tls".to_string(), "web".to_string()]);
        let errors = refresh_implicated(&mut fx.memory, &profiles).await;

        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["tls"]);
        assert_eq!(fx.memory.applied_version("web"), Some("v2"));
        assert_eq!(fx.memory.applied_version("tls"), Some("v1"));
        assert!(fx.memory.applying_profile.is_none());
    }
}
