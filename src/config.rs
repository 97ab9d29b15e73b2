//! User configuration
//!
//! Stored at `~/.config/stacktrunk/config.toml` (XDG on Linux and macOS,
//! `%APPDATA%` on Windows). Personal preferences, not checked into git.
//!
//! ```toml
//! trunk = "main"
//! worktrees-dir = "worktrees"
//! bootstrap-files = ["CLAUDE.md", ".envrc"]
//! tabs = true
//! test-command = "cargo test"
//!
//! [assistant]
//! command = "claude"
//! env = ["ANTHROPIC_API_KEY"]
//!
//! [secrets]
//! command = "op read op://dev/{name}/credential"
//!
//! [mcp.servers.context7]
//! command = "npx -y @upstash/context7-mcp"
//! description = "Context7 (Documentation)"
//! ```
//!
//! `STACKTRUNK_TRUNK` overrides `trunk`. The file location itself can be
//! overridden with `--config` or `STACKTRUNK_CONFIG_PATH`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Context;
use color_print::cformat;
use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::path::format_path_for_display;
use crate::styling::{eprintln, warning_message};

/// Env var overriding the trunk branch
pub const TRUNK_ENV: &str = "STACKTRUNK_TRUNK";

/// Env var overriding the config file location
pub const CONFIG_PATH_ENV: &str = "STACKTRUNK_CONFIG_PATH";

static CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Set the config path override (called from the `--config` CLI flag)
pub fn set_config_path(path: PathBuf) {
    CONFIG_PATH.set(path).ok();
}

/// Location of the user config file.
///
/// Priority: `--config` flag, then `STACKTRUNK_CONFIG_PATH`, then the
/// platform config directory.
pub fn get_config_path() -> Option<PathBuf> {
    if let Some(path) = CONFIG_PATH.get() {
        return Some(path.clone());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    let strategy = choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("stacktrunk").join("config.toml"))
}

/// How the AI assistant is launched
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct AssistantSettings {
    pub command: String,
    pub args: Vec<String>,
    /// Secret names resolved through the secret provider and passed to the
    /// assistant as environment variables of the same name
    pub env: Vec<String>,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: Vec::new(),
            env: vec!["ANTHROPIC_API_KEY".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct SecretSettings {
    /// Shell command printing a secret; `{name}` is replaced by the secret
    /// name. When unset, secrets come from the environment only.
    pub command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct McpServer {
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct McpSettings {
    pub servers: IndexMap<String, McpServer>,
}

impl Default for McpSettings {
    fn default() -> Self {
        let server = |command: &str, description: &str| McpServer {
            command: command.to_string(),
            description: Some(description.to_string()),
        };
        let servers = [
            (
                "context7",
                server("npx -y @upstash/context7-mcp", "Context7 (Documentation)"),
            ),
            (
                "playwright",
                server("npx -y @playwright/mcp@latest", "Playwright (Browser)"),
            ),
            (
                "sequential-thinking",
                server(
                    "npx -y @modelcontextprotocol/server-sequential-thinking",
                    "Sequential Thinking",
                ),
            ),
        ]
        .into_iter()
        .map(|(name, server)| (name.to_string(), server))
        .collect();
        Self { servers }
    }
}

/// Effective settings: file contents with defaults and env overrides applied
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// Trunk branch dangling parent pointers fall back to
    pub trunk: Option<String>,
    /// Remote used for fast-forwards, pushes and start points
    pub remote: Option<String>,
    /// Directory (relative to the main worktree) holding all worktrees
    pub worktrees_dir: String,
    /// Files copied from the current worktree into every new worktree
    pub bootstrap_files: Vec<String>,
    /// Open a multiplexer tab per new worktree when inside tmux/zellij
    pub tabs: bool,
    /// Command `st stack-test` runs in each worktree of the stack
    pub test_command: Option<String>,
    pub assistant: AssistantSettings,
    pub secrets: SecretSettings,
    pub mcp: McpSettings,

    #[serde(flatten, default, skip_serializing)]
    pub(crate) unknown: HashMap<String, toml::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trunk: None,
            remote: None,
            worktrees_dir: "worktrees".to_string(),
            bootstrap_files: [
                "CLAUDE.md",
                "AGENTS.md",
                ".env",
                ".envrc",
                "devenv.nix",
                "devenv.yaml",
                "devenv.lock",
                ".mcp.json",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            tabs: true,
            test_command: None,
            assistant: AssistantSettings::default(),
            secrets: SecretSettings::default(),
            mcp: McpSettings::default(),
            unknown: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load from the config file (if present) and the environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut settings = match get_config_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path).with_context(|| {
                    format!("Failed to read {}", format_path_for_display(&path))
                })?;
                let settings = Self::from_toml(&contents).with_context(|| {
                    format!("Failed to parse {}", format_path_for_display(&path))
                })?;
                settings.warn_unknown_keys(&path);
                settings
            }
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(trunk) = lookup(TRUNK_ENV).filter(|t| !t.trim().is_empty()) {
            self.trunk = Some(trunk.trim().to_string());
        }
    }

    /// Top-level keys in the file that no setting recognises.
    pub fn unknown_keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.unknown.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn warn_unknown_keys(&self, path: &std::path::Path) {
        let keys = self.unknown_keys();
        if keys.is_empty() {
            return;
        }
        let path = format_path_for_display(path);
        log::warn!("Unknown config keys in {path}: {keys:?}");
        eprintln!(
            "{}",
            warning_message(cformat!(
                "Ignoring unknown keys in <bold>{path}</>: {}",
                keys.join(", ")
            ))
        );
    }

    /// Remote name for fetch/push, `origin` unless configured.
    pub fn remote(&self) -> &str {
        self.remote.as_deref().unwrap_or("origin")
    }
}
