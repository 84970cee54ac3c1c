use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;

use crate::orchestrator::{BatchOptions, ExecutionMode};
use crate::relay::DEFAULT_RELAY_CAPACITY;
use crate::tools::KNOWN_BUILTIN_TOOLS;
use crate::truncation::{DEFAULT_MAX_RESULT_SIZE, TruncationPolicy};

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("unclosed variable reference '${{' (missing '}}')")]
    UnclosedVarReference,
}

impl Config {
    /// Load configuration from a YAML file. A missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path.as_ref()).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents, |name| std::env::var(name).ok())?;
        Ok(serde_saphyr::from_str(&expanded)?)
    }
}

// ============================================================================
// Private Helpers (Serde Defaults)
// ============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    300
}

fn default_keep_alive_interval() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_max_result_size() -> usize {
    DEFAULT_MAX_RESULT_SIZE
}

fn default_relay_capacity() -> usize {
    DEFAULT_RELAY_CAPACITY
}

fn default_builtins() -> Vec<String> {
    KNOWN_BUILTIN_TOOLS.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}`, `${VAR:-default}` and `$$` in raw config text.
///
/// A `$` not followed by `{` or `$` is kept as is. Defaults are taken
/// literally; they are not expanded again.
fn expand_env_vars(
    input: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push('$');
            rest = tail;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body.find('}').ok_or(ConfigError::UnclosedVarReference)?;
            out.push_str(&resolve_reference(&body[..end], &lookup)?);
            rest = &body[end + 1..];
        } else {
            out.push('$');
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Resolve the inside of one `${...}` reference.
fn resolve_reference(
    reference: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let (name, default) = match reference.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (reference, None),
    };

    match (lookup(name), default) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.to_string()),
        (None, None) => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Applies to non-streaming routes only.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            keep_alive_interval_seconds: default_keep_alive_interval(),
        }
    }
}

// ============================================================================
// PipelineConfig
// ============================================================================

/// Defaults for batches. Requests may override each field.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default = "default_true")]
    pub streaming: bool,
    #[serde(default = "default_max_result_size")]
    pub max_result_size: usize,
    #[serde(default = "default_relay_capacity")]
    pub relay_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            streaming: default_true(),
            max_result_size: default_max_result_size(),
            relay_capacity: default_relay_capacity(),
        }
    }
}

impl PipelineConfig {
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            mode: self.mode,
            streaming: self.streaming,
            truncation: TruncationPolicy::new(self.max_result_size),
            relay_capacity: self.relay_capacity,
        }
    }
}

// ============================================================================
// ToolsConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ToolsConfig {
    /// Builtin tools to register, by name.
    #[serde(default = "default_builtins")]
    pub builtins: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            builtins: default_builtins(),
        }
    }
}
