//! Builders for configuration-directory resources.

#![allow(dead_code)]

use configurator::config::resource::{
    ObjectMeta, ProfileSpec, Resource, ResourceKind, ServiceSpec, SettingsSpec, TemplateSpec,
    API_VERSION,
};
use configurator::service::RestartMode;
use serde::Serialize;

fn resource<T: Serialize>(kind: ResourceKind, name: &str, spec: T) -> String {
    let resource = Resource {
        api_version: API_VERSION.to_string(),
        kind,
        metadata: ObjectMeta {
            name: name.to_string(),
            ..Default::default()
        },
        spec,
    };
    serde_yaml::to_string(&resource).expect("Failed to serialize resource")
}

/// Builder for the `Settings` resource.
pub struct SettingsBuilder {
    spec: SettingsSpec,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        let mut spec = SettingsSpec::default();
        spec.source.base_url = Some("http://127.0.0.1:2772".to_string());
        spec.client_id = Some("integration".to_string());
        Self { spec }
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.spec.retry_count = count;
        self
    }

    pub fn retry_wait(mut self, seconds: u64) -> Self {
        self.spec.retry_wait = seconds;
        self
    }

    pub fn refresh_interval(mut self, seconds: u64) -> Self {
        self.spec.refresh_interval = seconds;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.spec.source.concurrency = concurrency;
        self
    }

    pub fn build(self) -> String {
        resource(ResourceKind::Settings, "settings", self.spec)
    }
}

pub fn profile_yaml(name: &str, application: &str) -> String {
    resource(
        ResourceKind::Profile,
        name,
        ProfileSpec {
            application: application.to_string(),
            environment: "test".to_string(),
            profile: "test".to_string(),
        },
    )
}

pub fn template_yaml(name: &str, body: &str, dst: &str, profiles: &[&str]) -> String {
    resource(
        ResourceKind::Template,
        name,
        TemplateSpec {
            src: None,
            body: Some(body.to_string()),
            dst: dst.to_string(),
            profiles: profiles.iter().map(|p| p.to_string()).collect(),
        },
    )
}

pub fn template_file_yaml(name: &str, src: &str, dst: &str, profiles: &[&str]) -> String {
    resource(
        ResourceKind::Template,
        name,
        TemplateSpec {
            src: Some(src.to_string()),
            body: None,
            dst: dst.to_string(),
            profiles: profiles.iter().map(|p| p.to_string()).collect(),
        },
    )
}

pub fn service_yaml(name: &str, templates: &[&str]) -> String {
    resource(
        ResourceKind::Service,
        name,
        ServiceSpec {
            systemd_unit: Some(format!("{}.service", name)),
            restart_mode: RestartMode::Reload,
            templates: templates.iter().map(|t| t.to_string()).collect(),
        },
    )
}
