//! Loads the configuration directory.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use walkdir::WalkDir;

use super::resource::{
    AnyResource, ProfileResource, ResourceHeader, ResourceKind, ServiceResource, SettingsResource,
    TemplateResource, API_VERSION,
};
use crate::error::ConfigError;

/// Everything found in the configuration directory.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub directory: PathBuf,
    pub settings: Option<SettingsResource>,
    pub profiles: Vec<ProfileResource>,
    pub templates: Vec<TemplateResource>,
    pub services: Vec<ServiceResource>,
}

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Loads every resource under the configuration directory. Hidden entries
    /// and files without a `.yaml`/`.yml` extension are skipped.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        if !self.config_dir.is_dir() {
            return Err(ConfigError::DirectoryNotFound(self.config_dir.clone()));
        }

        let mut config = LoadedConfig {
            directory: self.config_dir.clone(),
            settings: None,
            profiles: Vec::new(),
            templates: Vec::new(),
            services: Vec::new(),
        };
        let mut seen: HashSet<(ResourceKind, String)> = HashSet::new();

        let mut paths: Vec<PathBuf> = WalkDir::new(&self.config_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|path| path.is_file() && self.is_resource_file(path))
            .collect();
        paths.sort();

        for path in paths {
            let resource = self.load_file(&path).inspect_err(|e| {
                log::warn!("Failed to load {}: {}", path.display(), e);
            })?;

            let kind = resource.kind();
            if !seen.insert((kind, resource.name().to_string())) {
                return Err(ConfigError::DuplicateName {
                    kind: kind.to_string(),
                    name: resource.name().to_string(),
                });
            }

            match resource {
                AnyResource::Settings(r) => {
                    if let Some(existing) = &config.settings {
                        return Err(ConfigError::DuplicateName {
                            kind: kind.to_string(),
                            name: existing.name().to_string(),
                        });
                    }
                    config.settings = Some(r);
                }
                AnyResource::Profile(r) => config.profiles.push(r),
                AnyResource::Template(r) => config.templates.push(r),
                AnyResource::Service(r) => config.services.push(r),
            }
        }

        log::debug!(
            "Loaded {} profiles, {} templates, {} services from {}",
            config.profiles.len(),
            config.templates.len(),
            config.services.len(),
            self.config_dir.display()
        );

        Ok(config)
    }

    fn is_resource_file(&self, path: &Path) -> bool {
        if let Ok(relative) = path.strip_prefix(&self.config_dir) {
            let has_hidden_component = relative.components().any(|c| {
                c.as_os_str()
                    .to_str()
                    .map(|s| s.starts_with('.'))
                    .unwrap_or(false)
            });
            if has_hidden_component {
                return false;
            }
        }

        matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        )
    }

    pub fn load_file(&self, path: &Path) -> Result<AnyResource, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        parse_resource(&content, path)
    }
}

/// Parses one resource document.
pub fn parse_resource(content: &str, path: &Path) -> Result<AnyResource, ConfigError> {
    let header: ResourceHeader = parse_yaml(content, path)?;

    if header.api_version != API_VERSION {
        return Err(ConfigError::InvalidApiVersion {
            path: path.to_path_buf(),
            version: header.api_version,
            expected: API_VERSION.to_string(),
        });
    }

    let kind: ResourceKind = header.kind.parse().map_err(|_| ConfigError::UnknownKind {
        path: path.to_path_buf(),
        kind: header.kind.clone(),
    })?;

    Ok(match kind {
        ResourceKind::Settings => AnyResource::Settings(parse_yaml(content, path)?),
        ResourceKind::Profile => AnyResource::Profile(parse_yaml(content, path)?),
        ResourceKind::Template => AnyResource::Template(parse_yaml(content, path)?),
        ResourceKind::Service => AnyResource::Service(parse_yaml(content, path)?),
    })
}

fn parse_yaml<T: DeserializeOwned>(content: &str, path: &Path) -> Result<T, ConfigError> {
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
