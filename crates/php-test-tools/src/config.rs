//! Test Tools Configuration
//!
//! Settings for runtime creation and stack normalisation, loadable from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Install the forced-async opcode hook on async runtimes.
    #[serde(default = "default_force_async")]
    pub force_async: bool,
    /// Absolute install path of the embedded PHP runtime library.
    #[serde(default)]
    pub runtime_library_path: Option<String>,
    #[serde(default)]
    pub normalise: NormaliseConfig,
}

fn default_force_async() -> bool {
    true
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            force_async: default_force_async(),
            runtime_library_path: None,
            normalise: NormaliseConfig::default(),
        }
    }
}

impl ToolsConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).await?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded test tools config");
        Self::from_toml_str(&content)
    }
}

/// Stack normalisation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormaliseConfig {
    /// Path fragment identifying frames of the test runner.
    #[serde(default = "default_test_runner_path")]
    pub test_runner_path: String,
    #[serde(default = "default_test_runner_placeholder")]
    pub test_runner_placeholder: String,
    #[serde(default = "default_test_runner_marker")]
    pub test_runner_marker: String,
    /// Location prefixes identifying the host platform's internal modules.
    #[serde(default = "default_platform_prefixes")]
    pub platform_prefixes: Vec<String>,
    #[serde(default = "default_platform_placeholder")]
    pub platform_placeholder: String,
    #[serde(default = "default_platform_marker")]
    pub platform_marker: String,
    /// Replaces the runtime library's install path.
    #[serde(default = "default_runtime_placeholder")]
    pub runtime_placeholder: String,
}

fn default_test_runner_path() -> String {
    "/node_modules/mocha/".to_string()
}

fn default_test_runner_placeholder() -> String {
    "/path/to/test-runner".to_string()
}

fn default_test_runner_marker() -> String {
    "[test-runner internals]".to_string()
}

fn default_platform_prefixes() -> Vec<String> {
    vec!["node:internal/".to_string(), "internal/".to_string()]
}

fn default_platform_placeholder() -> String {
    "/path/to/platform-internals".to_string()
}

fn default_platform_marker() -> String {
    "[platform internals]".to_string()
}

fn default_runtime_placeholder() -> String {
    "/path/to/php-runtime".to_string()
}

impl Default for NormaliseConfig {
    fn default() -> Self {
        Self {
            test_runner_path: default_test_runner_path(),
            test_runner_placeholder: default_test_runner_placeholder(),
            test_runner_marker: default_test_runner_marker(),
            platform_prefixes: default_platform_prefixes(),
            platform_placeholder: default_platform_placeholder(),
            platform_marker: default_platform_marker(),
            runtime_placeholder: default_runtime_placeholder(),
        }
    }
}
