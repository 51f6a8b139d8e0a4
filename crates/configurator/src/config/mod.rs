//! Configuration directory: loading, validation and conversion into the
//! definitions the pipeline runs on.

pub mod loader;
pub mod resource;

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use loader::{ConfigLoader, LoadedConfig};
pub use resource::{ResourceKind, SettingsSpec, API_VERSION};

use crate::error::ConfigError;
use crate::memory::Memory;
use crate::profile::{is_symbol, ProfileDef};
use crate::service::{ServiceDef, ServiceManager};
use crate::source::ConfigurationSource;
use crate::template::{TemplateDef, TemplateSource};

/// Loads and validates the configuration directory.
pub fn load(config_dir: impl Into<PathBuf>) -> Result<LoadedConfig, ConfigError> {
    let config = ConfigLoader::new(config_dir).load()?;
    config.validate()?;
    Ok(config)
}

impl LoadedConfig {
    /// Settings, or the defaults when the directory holds none.
    pub fn settings_spec(&self) -> SettingsSpec {
        self.settings
            .as_ref()
            .map(|s| s.spec.clone())
            .unwrap_or_default()
    }

    /// Checks names, template bodies, cross references and settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for profile in &self.profiles {
            if !is_symbol(profile.name()) {
                return Err(ConfigError::InvalidName {
                    kind: ResourceKind::Profile.to_string(),
                    name: profile.name().to_string(),
                });
            }
        }

        let profiles: HashSet<&str> = self.profiles.iter().map(|p| p.name()).collect();
        for template in &self.templates {
            if template.spec.src.is_some() == template.spec.body.is_some() {
                return Err(ConfigError::TemplateBody {
                    name: template.name().to_string(),
                });
            }
            for profile in &template.spec.profiles {
                if !profiles.contains(profile.as_str()) {
                    return Err(ConfigError::UnknownReference {
                        kind: ResourceKind::Template.to_string(),
                        name: template.name().to_string(),
                        target_kind: ResourceKind::Profile.to_string(),
                        target: profile.clone(),
                    });
                }
            }
        }

        let templates: HashSet<&str> = self.templates.iter().map(|t| t.name()).collect();
        for service in &self.services {
            for template in &service.spec.templates {
                if !templates.contains(template.as_str()) {
                    return Err(ConfigError::UnknownReference {
                        kind: ResourceKind::Service.to_string(),
                        name: service.name().to_string(),
                        target_kind: ResourceKind::Template.to_string(),
                        target: template.clone(),
                    });
                }
            }
        }

        let settings = self.settings_spec();
        if settings.refresh_interval == 0 {
            return Err(ConfigError::Validation(
                "refreshInterval must be at least 1 second".to_string(),
            ));
        }
        if settings.source.concurrency == 0 {
            return Err(ConfigError::Validation(
                "source.concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn profile_defs(&self) -> BTreeMap<String, ProfileDef> {
        self.profiles
            .iter()
            .map(|r| {
                let spec = &r.spec;
                (
                    r.name().to_string(),
                    ProfileDef::new(&spec.application, &spec.environment, &spec.profile),
                )
            })
            .collect()
    }

    pub fn template_defs(&self) -> BTreeMap<String, TemplateDef> {
        self.templates
            .iter()
            .map(|r| {
                let source = match (&r.spec.src, &r.spec.body) {
                    (Some(src), _) => TemplateSource::File(self.directory.join(src)),
                    (None, body) => TemplateSource::Inline(body.clone().unwrap_or_default()),
                };
                let def = TemplateDef {
                    name: r.name().to_string(),
                    source,
                    destination: PathBuf::from(&r.spec.dst),
                    profiles: r.spec.profiles.clone(),
                };
                (def.name.clone(), def)
            })
            .collect()
    }

    pub fn service_defs(&self) -> BTreeMap<String, ServiceDef> {
        self.services
            .iter()
            .map(|r| {
                let unit = r
                    .spec
                    .systemd_unit
                    .clone()
                    .unwrap_or_else(|| r.name().to_string());
                let def = ServiceDef::new(r.name(), r.spec.templates.clone())
                    .with_unit(unit)
                    .with_restart_mode(r.spec.restart_mode);
                (def.name.clone(), def)
            })
            .collect()
    }

    /// Builds the pipeline's initial memory from this configuration.
    pub fn build_memory(
        &self,
        source: Arc<dyn ConfigurationSource>,
        service_manager: Arc<dyn ServiceManager>,
    ) -> Memory {
        let settings = self.settings_spec();

        let mut memory = Memory::new(source, service_manager)
            .with_refresh_interval(Duration::from_secs(settings.refresh_interval))
            .with_retry(settings.retry_count, Duration::from_secs(settings.retry_wait));

        memory.configuration_directory = self.directory.clone();
        if let Some(dir) = &settings.runtime_directory {
            memory.runtime_directory = PathBuf::from(dir);
        }
        if let Some(client_id) = settings.client_id {
            memory.client_id = client_id;
        }
        memory.source_concurrency = settings.source.concurrency;
        memory.profile_defs = self.profile_defs();
        memory.template_defs = self.template_defs();
        memory.service_defs = self.service_defs();
        memory.rebuild_dependencies();
        memory
    }
}
