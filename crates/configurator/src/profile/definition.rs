use serde::{Deserialize, Serialize};

/// Where a profile lives in the configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileDef {
    pub application: String,
    pub environment: String,
    pub profile: String,
}

impl ProfileDef {
    pub fn new(
        application: impl Into<String>,
        environment: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            application: application.into(),
            environment: environment.into(),
            profile: profile.into(),
        }
    }
}

impl std::fmt::Display for ProfileDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.application, self.environment, self.profile)
    }
}
