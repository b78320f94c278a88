//! apiVersion policy table
//!
//! A pipeline declares an `apiVersion`, and the interpreter derives a fixed set
//! of behavior toggles from it. The toggles are resolved once per run and
//! carried by value in the run options so every layer sees the same answer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared interpreter version of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    V1,
    V2,
    #[default]
    V3,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
            ApiVersion::V3 => "v3",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" => Ok(ApiVersion::V1),
            "v2" => Ok(ApiVersion::V2),
            "v3" => Ok(ApiVersion::V3),
            other => Err(format!("Unknown apiVersion: {}", other)),
        }
    }
}

/// Behavior toggles derived from an [`ApiVersion`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersionOptions {
    /// Bare config strings are rendered as mustache templates
    pub implicit_mustache: bool,

    /// Un-keyed step output is not flattened into the render scope
    pub explicit_data_flow: bool,

    /// `@mod` is injected into the render scope
    pub extend_mod_variable: bool,

    /// Template output is HTML-escaped
    pub autoescape: bool,

    /// Missing variables are render errors instead of undefined
    pub strict_variables: bool,
}

impl ApiVersionOptions {
    pub fn strict(mut self) -> Self {
        self.strict_variables = true;
        self
    }
}

/// Look up the behavior toggles for a version
pub fn api_version_options(version: ApiVersion) -> ApiVersionOptions {
    match version {
        ApiVersion::V1 => ApiVersionOptions {
            implicit_mustache: true,
            explicit_data_flow: false,
            extend_mod_variable: false,
            autoescape: true,
            strict_variables: false,
        },
        ApiVersion::V2 | ApiVersion::V3 => ApiVersionOptions {
            implicit_mustache: false,
            explicit_data_flow: true,
            extend_mod_variable: true,
            autoescape: false,
            strict_variables: false,
        },
    }
}

impl From<ApiVersion> for ApiVersionOptions {
    fn from(version: ApiVersion) -> Self {
        api_version_options(version)
    }
}
