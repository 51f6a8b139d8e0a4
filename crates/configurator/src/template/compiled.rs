use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::TemplateError;
use crate::profile::{LoadedProfile, ProfileContents};

static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)((?:\.[A-Za-z0-9_-]+)*)$").unwrap()
});

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { profile: String, path: Vec<String> },
}

/// A parsed template body: literal text interleaved with
/// `{{ profile }}` / `{{ profile.key.path }}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    segments: Vec<Segment>,
}

impl CompiledTemplate {
    pub fn compile(body: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = body;
        let mut offset = 0;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }

            let inner_start = start + OPEN.len();
            let end = rest[inner_start..]
                .find(CLOSE)
                .ok_or(TemplateError::Unterminated {
                    offset: offset + start,
                })?;

            let inner = rest[inner_start..inner_start + end].trim();
            let caps = RE_PLACEHOLDER
                .captures(inner)
                .ok_or_else(|| TemplateError::InvalidPlaceholder {
                    placeholder: inner.to_string(),
                })?;

            let profile = caps[1].to_string();
            let path = caps[2]
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            segments.push(Segment::Placeholder { profile, path });

            let consumed = inner_start + end + CLOSE.len();
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Names of every profile a placeholder reads.
    pub fn referenced_profiles(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder { profile, .. } => Some(profile.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Renders against the applied profiles.
    pub fn render(
        &self,
        profiles: &BTreeMap<String, LoadedProfile>,
    ) -> Result<String, TemplateError> {
        let mut output = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder { profile, path } => {
                    let contents = profiles
                        .get(profile)
                        .and_then(LoadedProfile::contents)
                        .ok_or_else(|| TemplateError::ProfileNotApplied {
                            profile: profile.clone(),
                        })?;
                    output.push_str(&render_value(contents, profile, path)?);
                }
            }
        }

        Ok(output)
    }
}

fn render_value(
    contents: &ProfileContents,
    profile: &str,
    path: &[String],
) -> Result<String, TemplateError> {
    let value = contents
        .lookup(path)
        .ok_or_else(|| TemplateError::MissingKey {
            profile: profile.to_string(),
            path: path.join("."),
        })?;

    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}
