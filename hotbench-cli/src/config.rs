//! Configuration loading from hotbench.toml
//!
//! The file is discovered by walking up from the current directory, or
//! named explicitly with `--config`. Every setting is optional; command-line
//! flags override file values, which override engine defaults.

use hotbench::ToolchainConfig;
use hotbench_engine::{VerboseMode, parse_duration};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file
pub const CONFIG_FILE: &str = "hotbench.toml";

/// hotbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HotbenchConfig {
    /// Compiler settings
    #[serde(default)]
    pub toolchain: ToolchainSection,
    /// Workspace placement
    #[serde(default)]
    pub workspace: WorkspaceSection,
    /// Run settings
    #[serde(default)]
    pub runner: RunnerSection,
    /// Output settings
    #[serde(default)]
    pub output: OutputSection,
}

/// `[toolchain]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainSection {
    /// Compiler executable; `$RUSTC` or `rustc` on the search path otherwise
    #[serde(default)]
    pub rustc: Option<PathBuf>,
    /// Edition of the generated crate
    #[serde(default = "default_edition")]
    pub edition: String,
    /// `-C opt-level`
    #[serde(default = "default_opt_level")]
    pub opt_level: String,
    /// Extra compiler arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            rustc: None,
            edition: default_edition(),
            opt_level: default_opt_level(),
            extra_args: Vec::new(),
        }
    }
}

fn default_edition() -> String {
    "2021".to_string()
}
fn default_opt_level() -> String {
    "3".to_string()
}

impl ToolchainSection {
    /// Driver toolchain settings
    pub fn to_toolchain_config(&self) -> ToolchainConfig {
        ToolchainConfig {
            rustc: self.rustc.clone(),
            edition: self.edition.clone(),
            opt_level: self.opt_level.clone(),
            extra_args: self.extra_args.clone(),
        }
    }
}

/// `[workspace]`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceSection {
    /// Directory that receives workspaces (system temp dir if unset)
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// `[runner]`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunnerSection {
    /// Forks per benchmark
    #[serde(default)]
    pub forks: Option<u32>,
    /// Warmup iterations
    #[serde(default)]
    pub warmup_iterations: Option<u32>,
    /// Warmup iteration time (e.g., "500ms")
    #[serde(default)]
    pub warmup_time: Option<String>,
    /// Measurement iterations
    #[serde(default)]
    pub measurement_iterations: Option<u32>,
    /// Measurement iteration time (e.g., "1s")
    #[serde(default)]
    pub measurement_time: Option<String>,
    /// Per-fork timeout (e.g., "10m")
    #[serde(default)]
    pub timeout: Option<String>,
    /// Abort the run when a benchmark fails
    #[serde(default)]
    pub fail_on_error: Option<bool>,
}

impl RunnerSection {
    /// Parsed `warmup_time`
    pub fn warmup_time(&self) -> anyhow::Result<Option<Duration>> {
        parse_setting("runner.warmup_time", self.warmup_time.as_deref())
    }

    /// Parsed `measurement_time`
    pub fn measurement_time(&self) -> anyhow::Result<Option<Duration>> {
        parse_setting("runner.measurement_time", self.measurement_time.as_deref())
    }

    /// Parsed `timeout`
    pub fn timeout(&self) -> anyhow::Result<Option<Duration>> {
        parse_setting("runner.timeout", self.timeout.as_deref())
    }
}

fn parse_setting(key: &str, value: Option<&str>) -> anyhow::Result<Option<Duration>> {
    value
        .map(|v| parse_duration(v).map_err(|e| anyhow::anyhow!("invalid {key}: {e}")))
        .transpose()
}

/// Format of the result file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    /// Aligned table
    #[default]
    Text,
    /// Results plus run metadata
    Json,
}

/// `[output]`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSection {
    /// Progress verbosity: silent, normal or extra
    #[serde(default)]
    pub verbosity: Option<VerboseMode>,
    /// Result file format
    #[serde(default)]
    pub result_format: Option<ResultFormat>,
    /// Result file; results are not written anywhere else when unset
    #[serde(default)]
    pub result_file: Option<PathBuf>,
}

impl HotbenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let dir = std::env::current_dir().ok()?;
        Self::discover_from(&dir)
    }

    /// Walk up from `start` looking for [`CONFIG_FILE`]
    pub fn discover_from(start: &Path) -> Option<Self> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => {
                        tracing::debug!(path = %config_path.display(), "loaded configuration");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), error = %e, "ignoring unreadable configuration");
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HotbenchConfig::default();
        assert_eq!(config.toolchain.edition, "2021");
        assert_eq!(config.toolchain.opt_level, "3");
        assert!(config.workspace.root.is_none());
        assert!(config.runner.forks.is_none());
        assert_eq!(config.runner.timeout().unwrap(), None);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [toolchain]
            rustc = "/opt/rust/bin/rustc"
            extra_args = ["-C", "target-cpu=native"]

            [runner]
            forks = 2
            warmup_time = "200ms"
            timeout = "1m"

            [output]
            verbosity = "extra"
            result_format = "json"
        "#;

        let config: HotbenchConfig = toml::from_str(toml_str).unwrap();
        let toolchain = config.toolchain.to_toolchain_config();
        assert_eq!(toolchain.rustc, Some(PathBuf::from("/opt/rust/bin/rustc")));
        assert_eq!(toolchain.extra_args, ["-C", "target-cpu=native"]);
        // Defaults should still apply
        assert_eq!(toolchain.edition, "2021");

        assert_eq!(config.runner.forks, Some(2));
        assert_eq!(
            config.runner.warmup_time().unwrap(),
            Some(Duration::from_millis(200))
        );
        assert_eq!(config.runner.timeout().unwrap(), Some(Duration::from_secs(60)));
        assert_eq!(config.output.verbosity, Some(VerboseMode::Extra));
        assert_eq!(config.output.result_format, Some(ResultFormat::Json));
    }

    #[test]
    fn test_invalid_duration_names_the_key() {
        let config: HotbenchConfig =
            toml::from_str("[runner]\nmeasurement_time = \"soon\"\n").unwrap();
        let err = config.runner.measurement_time().unwrap_err();
        assert!(err.to_string().contains("runner.measurement_time"));
    }

    #[test]
    fn test_discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[workspace]\nroot = \"/scratch\"\n").unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let config = HotbenchConfig::discover_from(&nested).unwrap();
        assert_eq!(config.workspace.root, Some(PathBuf::from("/scratch")));
    }
}
