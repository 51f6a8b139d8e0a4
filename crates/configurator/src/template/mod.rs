//! Template definitions, compilation, rendering and output.

pub mod compiled;
pub mod writer;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::TemplateError;

pub use compiled::CompiledTemplate;
pub use writer::{diverges, write_if_changed};

/// Where a template body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    Inline(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDef {
    pub name: String,
    pub source: TemplateSource,
    /// Output path, relative to the runtime directory unless absolute.
    pub destination: PathBuf,
    /// Names of the profiles the template reads.
    pub profiles: Vec<String>,
}

impl TemplateDef {
    pub fn inline(
        name: impl Into<String>,
        body: impl Into<String>,
        destination: impl Into<PathBuf>,
        profiles: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: TemplateSource::Inline(body.into()),
            destination: destination.into(),
            profiles,
        }
    }

    /// Reads the template body.
    pub fn body(&self) -> Result<String, TemplateError> {
        match &self.source {
            TemplateSource::Inline(body) => Ok(body.clone()),
            TemplateSource::File(path) => {
                std::fs::read_to_string(path).map_err(|e| TemplateError::ReadSource {
                    path: path.clone(),
                    message: e.to_string(),
                })
            }
        }
    }

    pub fn output_path(&self, runtime_directory: &Path) -> PathBuf {
        runtime_directory.join(&self.destination)
    }
}

/// Last successful render of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedTemplate {
    pub path: PathBuf,
    pub content: String,
    /// Version of every input profile the render was produced from.
    pub inputs: BTreeMap<String, String>,
}
