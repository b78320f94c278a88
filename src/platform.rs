//! Host platform capabilities

use serde::{Deserialize, Serialize};
use std::fmt;

/// A feature a brick may need from its host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformCapability {
    /// Page DOM access
    Dom,
    /// Mod/page state storage
    State,
    /// A surface renderers can draw into
    PanelHost,
    /// Outbound HTTP
    Http,
    /// Clipboard access
    Clipboard,
}

impl fmt::Display for PlatformCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlatformCapability::Dom => "dom",
            PlatformCapability::State => "state",
            PlatformCapability::PanelHost => "panel-host",
            PlatformCapability::Http => "http",
            PlatformCapability::Clipboard => "clipboard",
        };
        f.write_str(name)
    }
}

/// Element a root-aware brick is anchored to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "selector")]
pub enum ElementRef {
    #[default]
    Document,
    /// An element, identified by selector
    Element(String),
}

/// The environment a run executes in
pub trait Platform: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> &[PlatformCapability];

    fn has_capability(&self, capability: PlatformCapability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Platform without a visual host
#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    capabilities: Vec<PlatformCapability>,
}

impl HeadlessPlatform {
    /// Headless host with state storage only
    pub fn new() -> Self {
        Self {
            capabilities: vec![PlatformCapability::State],
        }
    }

    pub fn with_capabilities(capabilities: Vec<PlatformCapability>) -> Self {
        Self { capabilities }
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HeadlessPlatform {
    fn name(&self) -> &str {
        "headless"
    }

    fn capabilities(&self) -> &[PlatformCapability] {
        &self.capabilities
    }
}

/// Interactive terminal: renderers draw to the console
#[derive(Debug, Clone, Default)]
pub struct TerminalPlatform;

impl Platform for TerminalPlatform {
    fn name(&self) -> &str {
        "terminal"
    }

    fn capabilities(&self) -> &[PlatformCapability] {
        &[PlatformCapability::State, PlatformCapability::PanelHost]
    }
}
