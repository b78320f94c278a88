//! Registry identifiers for bricks

use crate::errors::{PipelineConfigurationError, PipelineError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn registry_id_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(@[a-z0-9._-]+/)?[a-z0-9._-]+(/[a-z0-9._-]+)*$")
            .expect("registry id pattern is valid")
    })
}

/// Identifier a brick is registered under, e.g. `@pixiebrix/identity`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegistryId(String);

impl RegistryId {
    /// Parse and validate a registry id
    pub fn parse(value: impl Into<String>) -> Result<Self, PipelineError> {
        let value = value.into();
        if registry_id_regex().is_match(&value) {
            Ok(Self(value))
        } else {
            Err(PipelineConfigurationError::new(format!("Invalid registry id: {}", value)).into())
        }
    }

    /// Id of a built-in brick; the literal must be a valid id
    pub(crate) fn builtin(value: &'static str) -> Self {
        debug_assert!(registry_id_regex().is_match(value), "invalid builtin id {}", value);
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scope portion of the id (`@pixiebrix`), if any
    pub fn scope(&self) -> Option<&str> {
        if self.0.starts_with('@') {
            self.0.split('/').next()
        } else {
            None
        }
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RegistryId {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RegistryId> for String {
    fn from(id: RegistryId) -> Self {
        id.0
    }
}

impl AsRef<str> for RegistryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
