//! Watch definitions: the JSON watch-file format and startup validation.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::Deserialize;

use crate::error::{Result, StakeoutError};
use crate::inspect::{ComparisonOperator, InspectContext, Operand};

/// Process-wide fallbacks for definitions that omit a field.
#[derive(Debug, Clone, Copy)]
pub struct WatchDefaults {
    /// Poll interval for definitions without their own.
    pub interval: Duration,
}

impl Default for WatchDefaults {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// One entry of the watch file. Immutable configuration, loaded once at
/// startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WatchDefinition {
    pub name: String,
    /// Used as the notification body when the watch passes.
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    /// Poll interval in seconds; the process default applies when omitted.
    #[serde(default)]
    pub interval: Option<u64>,
    /// Extra request headers, merged over the loader defaults.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// HTTP statuses allowed to pass inspection. A response outside this
    /// list fails the check without consulting the inspectors.
    pub status_codes: Vec<u16>,
    /// Conjunctive inspector group.
    #[serde(default)]
    pub all: Vec<NodeInspectorDefinition>,
    /// Disjunctive inspector group.
    #[serde(default)]
    pub any: Vec<NodeInspectorDefinition>,
    /// Tear the watch down after its first pass.
    #[serde(default)]
    pub stop_on_pass: bool,
}

impl WatchDefinition {
    /// Shape-level startup validation. Selector and regex compilation
    /// errors surface when the watch itself is built.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StakeoutError::Config("watch name must not be empty".to_string()));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(StakeoutError::Config(format!(
                "watch '{}': url must begin with http:// or https://",
                self.name
            )));
        }
        if self.interval == Some(0) {
            return Err(StakeoutError::Config(format!(
                "watch '{}': interval must be greater than zero",
                self.name
            )));
        }
        if self.status_codes.is_empty() {
            return Err(StakeoutError::Config(format!(
                "watch '{}': statusCodes is empty, the watch could never pass",
                self.name
            )));
        }
        if self.all.is_empty() && self.any.is_empty() {
            return Err(StakeoutError::Config(format!(
                "watch '{}': at least one inspector is required in all or any",
                self.name
            )));
        }
        Ok(())
    }
}

/// One selector-scoped inspection rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NodeInspectorDefinition {
    pub selector: String,
    #[serde(default)]
    pub context: InspectContext,
    /// Optional label used in logs instead of the selector.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub condition: ConditionDefinition,
}

/// The condition part of an inspection rule. All fields optional; an empty
/// condition means bare selector presence.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConditionDefinition {
    #[serde(default)]
    pub operator: Option<ComparisonOperator>,
    #[serde(default)]
    pub operand: Option<Operand>,
    #[serde(default)]
    pub negated: bool,
    /// `[pattern]` or `[pattern, flags]`.
    #[serde(rename = "match", default)]
    pub match_pattern: Option<Vec<String>>,
    #[serde(default)]
    pub any_change: bool,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Load and validate a watch file: a JSON array of [`WatchDefinition`]s.
pub fn load_watch_definitions(path: &Path) -> Result<Vec<WatchDefinition>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| StakeoutError::Config(format!("cannot read watch file {}: {e}", path.display())))?;
    let definitions: Vec<WatchDefinition> = serde_json::from_str(&raw)
        .map_err(|e| StakeoutError::Config(format!("watch file {} is malformed: {e}", path.display())))?;
    if definitions.is_empty() {
        return Err(StakeoutError::Config(format!(
            "watch file {} defines no watches",
            path.display()
        )));
    }
    for definition in &definitions {
        definition.validate()?;
    }
    info!("loaded {} watch definition(s) from {}", definitions.len(), path.display());
    Ok(definitions)
}
