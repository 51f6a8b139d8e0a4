//! The pipeline's shared state record.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::state::NextState;
use crate::logging::{EventData, EventLogger, LogLevel};
use crate::profile::{LoadedProfile, ProfileDef};
use crate::service::{ServiceDef, ServiceManager};
use crate::source::ConfigurationSource;
use crate::template::{CompiledTemplate, GeneratedTemplate, TemplateDef};

pub const DEFAULT_CONFIGURATION_DIRECTORY: &str = "/etc/configurator";
pub const DEFAULT_RUNTIME_DIRECTORY: &str = "/run/configurator";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_secs(2);
pub const DEFAULT_SOURCE_CONCURRENCY: usize = 4;

/// Which templates read which profiles, and which services consume which
/// templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    profile_templates: BTreeMap<String, BTreeSet<String>>,
    template_profiles: BTreeMap<String, BTreeSet<String>>,
    template_services: BTreeMap<String, BTreeSet<String>>,
    service_templates: BTreeMap<String, BTreeSet<String>>,
}

impl Dependencies {
    pub fn build(
        templates: &BTreeMap<String, TemplateDef>,
        services: &BTreeMap<String, ServiceDef>,
    ) -> Self {
        let mut deps = Self::default();

        for (name, template) in templates {
            for profile in &template.profiles {
                deps.profile_templates
                    .entry(profile.clone())
                    .or_default()
                    .insert(name.clone());
                deps.template_profiles
                    .entry(name.clone())
                    .or_default()
                    .insert(profile.clone());
            }
        }

        for (name, service) in services {
            for template in &service.templates {
                deps.template_services
                    .entry(template.clone())
                    .or_default()
                    .insert(name.clone());
                deps.service_templates
                    .entry(name.clone())
                    .or_default()
                    .insert(template.clone());
            }
        }

        deps
    }

    pub fn templates_for_profile(&self, profile: &str) -> BTreeSet<String> {
        self.profile_templates.get(profile).cloned().unwrap_or_default()
    }

    pub fn services_for_template(&self, template: &str) -> BTreeSet<String> {
        self.template_services.get(template).cloned().unwrap_or_default()
    }

    pub fn profiles_for_template(&self, template: &str) -> BTreeSet<String> {
        self.template_profiles.get(template).cloned().unwrap_or_default()
    }

    /// Services affected by a change to `profile`, through the templates
    /// that read it.
    pub fn services_for_profile(&self, profile: &str) -> BTreeSet<String> {
        self.templates_for_profile(profile)
            .iter()
            .flat_map(|template| self.services_for_template(template))
            .collect()
    }

    /// Profiles feeding `service`, through the templates it consumes.
    pub fn profiles_for_service(&self, service: &str) -> BTreeSet<String> {
        self.service_templates
            .get(service)
            .into_iter()
            .flatten()
            .flat_map(|template| self.profiles_for_template(template))
            .collect()
    }
}

/// The blackboard every operation reads and writes.
///
/// Owned by the engine and lent to one operation at a time.
pub struct Memory {
    pub configuration_directory: PathBuf,
    pub runtime_directory: PathBuf,
    /// Completed cycles.
    pub run_count: u64,
    pub client_id: String,
    pub refresh_interval: Duration,
    /// Maximum number of concurrent fetches during a bulk refresh.
    pub source_concurrency: usize,

    pub profile_defs: BTreeMap<String, ProfileDef>,
    pub template_defs: BTreeMap<String, TemplateDef>,
    pub service_defs: BTreeMap<String, ServiceDef>,
    pub dependencies: Dependencies,

    pub logger: Option<Arc<dyn EventLogger>>,
    pub source: Arc<dyn ConfigurationSource>,
    pub service_manager: Arc<dyn ServiceManager>,

    pub applied_profiles: BTreeMap<String, LoadedProfile>,
    pub applying_profile: Option<LoadedProfile>,
    pub profiles_to_apply: Vec<LoadedProfile>,
    pub compiled_templates: BTreeMap<String, CompiledTemplate>,
    pub generated_templates: BTreeMap<String, GeneratedTemplate>,
    pub services_to_reload: BTreeSet<String>,
    /// Epoch seconds of the last bulk refresh.
    pub last_refresh_time: Option<i64>,

    pub next_state: NextState,
    pub retry_count: u32,
    pub retries_left: u32,
    pub retry_wait: Duration,
    pub early_exit: bool,
}

impl Memory {
    pub fn new(
        source: Arc<dyn ConfigurationSource>,
        service_manager: Arc<dyn ServiceManager>,
    ) -> Self {
        Self {
            configuration_directory: PathBuf::from(DEFAULT_CONFIGURATION_DIRECTORY),
            runtime_directory: PathBuf::from(DEFAULT_RUNTIME_DIRECTORY),
            run_count: 0,
            client_id: uuid::Uuid::new_v4().to_string(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            source_concurrency: DEFAULT_SOURCE_CONCURRENCY,
            profile_defs: BTreeMap::new(),
            template_defs: BTreeMap::new(),
            service_defs: BTreeMap::new(),
            dependencies: Dependencies::default(),
            logger: None,
            source,
            service_manager,
            applied_profiles: BTreeMap::new(),
            applying_profile: None,
            profiles_to_apply: Vec::new(),
            compiled_templates: BTreeMap::new(),
            generated_templates: BTreeMap::new(),
            services_to_reload: BTreeSet::new(),
            last_refresh_time: None,
            next_state: NextState::Starting,
            retry_count: DEFAULT_RETRY_COUNT,
            retries_left: DEFAULT_RETRY_COUNT,
            retry_wait: DEFAULT_RETRY_WAIT,
            early_exit: false,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn EventLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_profile(mut self, name: impl Into<String>, def: ProfileDef) -> Self {
        self.profile_defs.insert(name.into(), def);
        self
    }

    pub fn with_template(mut self, def: TemplateDef) -> Self {
        self.template_defs.insert(def.name.clone(), def);
        self.rebuild_dependencies();
        self
    }

    pub fn with_service(mut self, def: ServiceDef) -> Self {
        self.service_defs.insert(def.name.clone(), def);
        self.rebuild_dependencies();
        self
    }

    pub fn with_runtime_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_directory = dir.into();
        self
    }

    pub fn with_retry(mut self, count: u32, wait: Duration) -> Self {
        self.retry_count = count;
        self.retries_left = count;
        self.retry_wait = wait;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_early_exit(mut self, early_exit: bool) -> Self {
        self.early_exit = early_exit;
        self
    }

    pub fn rebuild_dependencies(&mut self) {
        self.dependencies = Dependencies::build(&self.template_defs, &self.service_defs);
    }

    /// Emits a structured event; a no-op without a logger.
    pub fn log(&self, level: LogLevel, event_type: &str, data: EventData) {
        if let Some(logger) = &self.logger {
            logger.log(level, event_type, data);
        }
    }

    /// Version of the applied profile `name`, if any.
    pub fn applied_version(&self, name: &str) -> Option<&str> {
        self.applied_profiles.get(name).and_then(LoadedProfile::version)
    }

    pub fn reset_retries(&mut self) {
        self.retries_left = self.retry_count;
    }
}
