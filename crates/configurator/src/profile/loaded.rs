//! A single fetched, validated profile snapshot.
//!
//! Construction never fails: malformed input produces a profile whose
//! `has_errors()` is true, with the offending fields listed in `errors()`.

use std::collections::BTreeMap;

use serde_json::Value;

use super::is_symbol;

/// Content types a profile payload may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Json,
    Yaml,
    Text,
}

impl ContentType {
    /// Canonical names of the supported content types.
    pub const SUPPORTED: &'static [&'static str] =
        &["application/json", "application/x-yaml", "text/plain"];

    /// Parses a declared content type, ignoring parameters such as `charset`.
    pub fn parse(declared: &str) -> Option<Self> {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" => Some(ContentType::Json),
            "application/x-yaml" | "application/yaml" | "text/yaml" => Some(ContentType::Yaml),
            "text/plain" => Some(ContentType::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Yaml => "application/x-yaml",
            ContentType::Text => "text/plain",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded profile contents.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileContents {
    /// Decoded JSON or YAML document.
    Structured(Value),
    /// Plain text payload, verbatim.
    Text(String),
}

impl ProfileContents {
    /// Looks up a dotted key path. An empty path returns the whole document.
    /// Numeric segments index into arrays.
    pub fn lookup(&self, path: &[String]) -> Option<Value> {
        match self {
            ProfileContents::Text(text) if path.is_empty() => Some(Value::String(text.clone())),
            ProfileContents::Text(_) => None,
            ProfileContents::Structured(value) => {
                let mut current = value;
                for segment in path {
                    current = match current {
                        Value::Object(map) => map.get(segment)?,
                        Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                        _ => return None,
                    };
                }
                Some(current.clone())
            }
        }
    }
}

/// Field of a [`LoadedProfile`] that a validation issue is recorded against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProfileField {
    Name,
    Version,
    Contents,
    ContentType,
}

impl std::fmt::Display for ProfileField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileField::Name => write!(f, "name"),
            ProfileField::Version => write!(f, "version"),
            ProfileField::Contents => write!(f, "contents"),
            ProfileField::ContentType => write!(f, "content_type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    MustBePresent,
    MustBeSymbol,
    MustBeValidUtf8,
    UnsupportedContentType(String),
    MalformedJson(String),
    MalformedYaml(String),
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::MustBePresent => write!(f, "must be present"),
            ValidationIssue::MustBeSymbol => write!(f, "must be a symbol"),
            ValidationIssue::MustBeValidUtf8 => write!(f, "must be valid UTF-8"),
            ValidationIssue::UnsupportedContentType(declared) => write!(
                f,
                "must be one of {} (got '{}')",
                ContentType::SUPPORTED.join(", "),
                declared
            ),
            ValidationIssue::MalformedJson(message) => write!(f, "invalid JSON: {}", message),
            ValidationIssue::MalformedYaml(message) => write!(f, "invalid YAML: {}", message),
        }
    }
}

type Issues = BTreeMap<ProfileField, Vec<ValidationIssue>>;

/// One fetched instance of a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProfile {
    name: String,
    version: Option<String>,
    contents: Option<ProfileContents>,
    content_type: Option<ContentType>,
    declared_content_type: String,
    // Issues found while decoding the payload; they cannot change afterwards.
    decode_issues: Issues,
    errors: Issues,
}

impl LoadedProfile {
    pub fn new(
        name: &str,
        version: Option<&str>,
        payload: impl AsRef<[u8]>,
        content_type: &str,
    ) -> Self {
        let mut decode_issues = Issues::new();
        let parsed_type = ContentType::parse(content_type);

        let contents = match parsed_type {
            Some(kind) => match decode(kind, payload.as_ref()) {
                Ok(contents) => Some(contents),
                Err(issue) => {
                    decode_issues
                        .entry(ProfileField::Contents)
                        .or_default()
                        .push(issue);
                    None
                }
            },
            None => {
                decode_issues
                    .entry(ProfileField::ContentType)
                    .or_default()
                    .push(ValidationIssue::UnsupportedContentType(
                        content_type.to_string(),
                    ));
                None
            }
        };

        let mut profile = Self {
            name: name.to_string(),
            version: version.map(str::to_string),
            contents,
            content_type: parsed_type,
            declared_content_type: content_type.to_string(),
            decode_issues,
            errors: Issues::new(),
        };
        profile.errors = profile.validate();
        profile
    }

    /// Re-runs every check and returns the issues found, keyed by field.
    pub fn validate(&self) -> BTreeMap<ProfileField, Vec<ValidationIssue>> {
        let mut issues = Issues::new();

        if self.name.is_empty() {
            issues
                .entry(ProfileField::Name)
                .or_default()
                .push(ValidationIssue::MustBePresent);
        } else if !is_symbol(&self.name) {
            issues
                .entry(ProfileField::Name)
                .or_default()
                .push(ValidationIssue::MustBeSymbol);
        }

        if self.version.as_deref().map_or(true, str::is_empty) {
            issues
                .entry(ProfileField::Version)
                .or_default()
                .push(ValidationIssue::MustBePresent);
        }

        for (field, list) in &self.decode_issues {
            issues.entry(*field).or_default().extend(list.iter().cloned());
        }

        issues
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn contents(&self) -> Option<&ProfileContents> {
        self.contents.as_ref()
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    /// The content type string as the source declared it.
    pub fn declared_content_type(&self) -> &str {
        &self.declared_content_type
    }

    pub fn errors(&self) -> &BTreeMap<ProfileField, Vec<ValidationIssue>> {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn decode(kind: ContentType, payload: &[u8]) -> Result<ProfileContents, ValidationIssue> {
    match kind {
        ContentType::Json => serde_json::from_slice::<Value>(payload)
            .map(ProfileContents::Structured)
            .map_err(|e| ValidationIssue::MalformedJson(e.to_string())),
        ContentType::Yaml => {
            if payload.iter().all(u8::is_ascii_whitespace) {
                return Err(ValidationIssue::MustBePresent);
            }
            serde_yaml::from_slice::<Value>(payload)
                .map(ProfileContents::Structured)
                .map_err(|e| ValidationIssue::MalformedYaml(e.to_string()))
        }
        ContentType::Text => {
            if payload.is_empty() {
                return Err(ValidationIssue::MustBePresent);
            }
            std::str::from_utf8(payload)
                .map(|text| ProfileContents::Text(text.to_string()))
                .map_err(|_| ValidationIssue::MustBeValidUtf8)
        }
    }
}
