//! Configuration: LLM backend selection, project paths, polytope weight overrides.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::coordinator::polytope::Dim7;

/// User-facing LLM configuration (what lands in `polyphase.toml`/`config.yml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_api_key_env() -> String {
    "POLYPHASE_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_timeout_ms() -> u64 {
    120_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl LlmConfig {
    /// Resolve defaults (base_url per provider) into a config ready for client construction.
    pub fn resolve(&self) -> Result<ResolvedLlmConfig> {
        let base_url = self.base_url.clone().unwrap_or_else(|| match self.provider.as_str() {
            "openai" => "https://api.openai.com".to_string(),
            other => format!("https://api.{}.example", other),
        });

        Ok(ResolvedLlmConfig {
            provider: self.provider.clone(),
            model: self.model.clone(),
            base_url,
            api_key_env: self.api_key_env.clone(),
            max_tokens: self.max_tokens,
            timeout_ms: self.timeout_ms,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedLlmConfig {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl ResolvedLlmConfig {
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).context(format!("environment variable {} is not set", self.api_key_env))
    }
}

/// Per-phase `Dim7` weight overrides, config rather than an invariant - see
/// DESIGN.md's Open Question decision on re-deriving weights after
/// self-improvement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolytopeWeights {
    #[serde(default)]
    pub overrides: std::collections::HashMap<String, Dim7>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolyphaseConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    /// Iteration budget per phase run (B in the PhaseRunner algorithm).
    #[serde(default = "default_phase_iteration_budget")]
    pub phase_iteration_budget: u32,
    /// Global pipeline iteration budget; `None` means unbounded.
    #[serde(default)]
    pub pipeline_iteration_budget: Option<u32>,
    #[serde(default)]
    pub polytope: PolytopeWeights,
    /// Optional runtime-test command run after coding/debugging phases.
    #[serde(default)]
    pub runtime_test_command: Option<String>,
    #[serde(default)]
    pub runtime_test_log_file: Option<PathBuf>,
}

fn default_phase_iteration_budget() -> u32 {
    20
}

impl Default for PolyphaseConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            phase_iteration_budget: default_phase_iteration_budget(),
            pipeline_iteration_budget: None,
            polytope: PolytopeWeights::default(),
            runtime_test_command: None,
            runtime_test_log_file: None,
        }
    }
}

impl PolyphaseConfig {
    /// Load config from file, or use defaults - checks the candidate
    /// paths below before falling back to `Self::default()`.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            let content = std::fs::read_to_string(config_path)?;
            return Ok(serde_yaml::from_str(&content)?);
        }

        let default_paths = [Some(PathBuf::from("polyphase.yml")), dirs::config_dir().map(|p| p.join("polyphase/config.yml"))];
        for candidate in default_paths.into_iter().flatten() {
            if candidate.exists() {
                let content = std::fs::read_to_string(&candidate)?;
                return Ok(serde_yaml::from_str(&content)?);
            }
        }

        Ok(Self::default())
    }
}

/// Centralises the `.pipeline/` persisted-state layout under a project directory.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
}

impl ProjectPaths {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: project_dir.into(),
        }
    }

    fn pipeline_dir(&self) -> PathBuf {
        self.root.join(".pipeline")
    }

    pub fn state_file(&self) -> PathBuf {
        self.pipeline_dir().join("state.json")
    }

    pub fn pipeline_dir_for_store(&self) -> PathBuf {
        self.pipeline_dir()
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.pipeline_dir().join("snapshots")
    }

    pub fn threads_dir(&self) -> PathBuf {
        self.pipeline_dir().join("threads")
    }

    pub fn mailboxes_dir(&self) -> PathBuf {
        self.pipeline_dir().join("mailboxes")
    }

    pub fn issues_dir(&self) -> PathBuf {
        self.pipeline_dir().join("issues")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.pipeline_dir().join("backups")
    }

    /// Directory scanned for custom tool definitions (§4.2's
    /// `discoverCustom(dir)`); absent by default, created lazily by
    /// whoever drops a custom tool in.
    pub fn tools_dir(&self) -> PathBuf {
        self.pipeline_dir().join("tools")
    }

    pub fn ensure_layout(&self) -> std::io::Result<()> {
        for dir in [
            self.pipeline_dir(),
            self.snapshots_dir(),
            self.threads_dir(),
            self.mailboxes_dir(),
            self.issues_dir(),
            self.backups_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn project_path(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_budgets() {
        let config = PolyphaseConfig::default();
        assert_eq!(config.phase_iteration_budget, 20);
        assert!(config.pipeline_iteration_budget.is_none());
    }

    #[test]
    fn project_paths_lays_out_pipeline_dir() {
        let paths = ProjectPaths::new("/tmp/project");
        assert_eq!(paths.state_file(), PathBuf::from("/tmp/project/.pipeline/state.json"));
        assert_eq!(paths.threads_dir(), PathBuf::from("/tmp/project/.pipeline/threads"));
    }
}
