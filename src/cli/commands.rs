//! CLI command definitions

use crate::core::api_version::ApiVersion;
use crate::core::config::parse_input_override;
use crate::persistence::StateNamespace;
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;

/// Run a pipeline document
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Input overrides (key=value); JSON values keep their type
    #[arg(long, value_parser = parse_key_value)]
    pub input: Vec<(String, Value)>,

    /// Override the document's apiVersion
    #[arg(long)]
    pub api_version: Option<ApiVersion>,

    /// Run without a panel host; renderers end the run
    #[arg(long)]
    pub headless: bool,

    /// Path to the state database
    #[arg(long)]
    pub state_db: Option<PathBuf>,

    /// Keep mod state in memory only
    #[arg(long)]
    pub no_state: bool,

    /// Print the step trace after the run
    #[arg(long)]
    pub trace: bool,

    /// Output the result as compact JSON only
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline document
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List the built-in bricks
#[derive(Debug, Args, Clone)]
pub struct BricksCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show persisted mod state
#[derive(Debug, Args, Clone)]
pub struct StateCommand {
    /// Mod whose state to show
    #[arg(long)]
    pub mod_id: Option<String>,

    /// State namespace (mod, private or shared)
    #[arg(long, default_value_t = StateNamespace::Mod)]
    pub namespace: StateNamespace,

    /// Path to the state database
    #[arg(long)]
    pub state_db: Option<PathBuf>,

    /// List stored state keys instead
    #[arg(long)]
    pub keys: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, Value), String> {
    parse_input_override(s).map_err(|e| e.to_string())
}
