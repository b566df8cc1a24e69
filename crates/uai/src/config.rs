//! User configuration stored in `~/.config/uai/config.toml`.
//!
//! The file holds one optional section per tool. Values are addressed with
//! dotted keys such as `claude.apiKey`; the set of keys is closed.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use uai_providers::api::DEFAULT_CLAUDE_MODEL;

/// Overrides the configuration directory
pub const CONFIG_DIR_ENV: &str = "UAI_CONFIG_DIR";

/// The config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

const NOT_SET: &str = "(not set)";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown config key '{key}'. Valid keys: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Expected KEY=VALUE, got '{0}'")]
    InvalidAssignment(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine home directory")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaudeSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

/// Contents of `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UaiConfig {
    #[serde(default)]
    pub claude: ClaudeSection,
    #[serde(default)]
    pub o3: SearchSection,
    #[serde(default)]
    pub gemini: GeminiSection,
    #[serde(default)]
    pub general: GeneralSection,
}

impl Default for UaiConfig {
    fn default() -> Self {
        Self {
            claude: ClaudeSection {
                api_key: None,
                model: Some(DEFAULT_CLAUDE_MODEL.to_string()),
            },
            o3: SearchSection::default(),
            gemini: GeminiSection::default(),
            general: GeneralSection {
                default_tool: Some("claude".to_string()),
                theme: Some("auto".to_string()),
            },
        }
    }
}

/// Every addressable configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ClaudeApiKey,
    ClaudeModel,
    O3Endpoint,
    O3ApiKey,
    GeminiApiKey,
    GeminiModel,
    DefaultTool,
    Theme,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::ClaudeApiKey,
        ConfigKey::ClaudeModel,
        ConfigKey::O3Endpoint,
        ConfigKey::O3ApiKey,
        ConfigKey::GeminiApiKey,
        ConfigKey::GeminiModel,
        ConfigKey::DefaultTool,
        ConfigKey::Theme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::ClaudeApiKey => "claude.apiKey",
            ConfigKey::ClaudeModel => "claude.model",
            ConfigKey::O3Endpoint => "o3.endpoint",
            ConfigKey::O3ApiKey => "o3.apiKey",
            ConfigKey::GeminiApiKey => "gemini.apiKey",
            ConfigKey::GeminiModel => "gemini.model",
            ConfigKey::DefaultTool => "general.defaultTool",
            ConfigKey::Theme => "general.theme",
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(
            self,
            ConfigKey::ClaudeApiKey | ConfigKey::O3ApiKey | ConfigKey::GeminiApiKey
        )
    }

    fn valid_keys() -> String {
        Self::ALL
            .iter()
            .map(ConfigKey::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownKey {
                key: s.to_string(),
                valid: Self::valid_keys(),
            })
    }
}

impl UaiConfig {
    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        match key {
            ConfigKey::ClaudeApiKey => self.claude.api_key.as_deref(),
            ConfigKey::ClaudeModel => self.claude.model.as_deref(),
            ConfigKey::O3Endpoint => self.o3.endpoint.as_deref(),
            ConfigKey::O3ApiKey => self.o3.api_key.as_deref(),
            ConfigKey::GeminiApiKey => self.gemini.api_key.as_deref(),
            ConfigKey::GeminiModel => self.gemini.model.as_deref(),
            ConfigKey::DefaultTool => self.general.default_tool.as_deref(),
            ConfigKey::Theme => self.general.theme.as_deref(),
        }
    }

    fn slot_mut(&mut self, key: ConfigKey) -> &mut Option<String> {
        match key {
            ConfigKey::ClaudeApiKey => &mut self.claude.api_key,
            ConfigKey::ClaudeModel => &mut self.claude.model,
            ConfigKey::O3Endpoint => &mut self.o3.endpoint,
            ConfigKey::O3ApiKey => &mut self.o3.api_key,
            ConfigKey::GeminiApiKey => &mut self.gemini.api_key,
            ConfigKey::GeminiModel => &mut self.gemini.model,
            ConfigKey::DefaultTool => &mut self.general.default_tool,
            ConfigKey::Theme => &mut self.general.theme,
        }
    }

    pub fn set(&mut self, key: ConfigKey, value: impl Into<String>) {
        *self.slot_mut(key) = Some(value.into());
    }

    /// Fill keys the file leaves unset from the environment.
    pub fn with_env_overlay(&self) -> Self {
        self.overlay_from(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    fn overlay_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = self.clone();
        let sources: [(ConfigKey, &[&str]); 4] = [
            (ConfigKey::ClaudeApiKey, &["ANTHROPIC_API_KEY"]),
            (ConfigKey::O3Endpoint, &["O3_MCP_ENDPOINT"]),
            (ConfigKey::O3ApiKey, &["O3_MCP_API_KEY"]),
            (ConfigKey::GeminiApiKey, &["GOOGLE_API_KEY", "GEMINI_API_KEY"]),
        ];

        for (key, vars) in sources {
            let slot = config.slot_mut(key);
            if slot.is_none() {
                *slot = vars.iter().find_map(|name| lookup(name));
            }
        }
        config
    }
}

/// Mask an API key for display, keeping the first and last four characters.
pub fn mask_api_key(api_key: Option<&str>) -> String {
    let Some(key) = api_key.filter(|k| !k.is_empty()) else {
        return NOT_SET.to_string();
    };

    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", prefix, "*".repeat((chars.len() - 8).max(4)), suffix)
}

/// Split `KEY=VALUE`; the value may itself contain `=`.
pub fn parse_assignment(input: &str) -> Result<(ConfigKey, String)> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidAssignment(input.to_string()))?;
    Ok((key.trim().parse()?, value.to_string()))
}

/// The configuration file plus its loaded contents
pub struct ConfigStore {
    path: PathBuf,
    config: UaiConfig,
}

impl ConfigStore {
    /// `$UAI_CONFIG_DIR`, falling back to `~/.config/uai`.
    pub fn default_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".config").join("uai"))
    }

    /// Load the config from `dir`, writing defaults when no file exists yet.
    pub fn load(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(CONFIG_FILE_NAME);

        if !path.exists() {
            let store = Self {
                path,
                config: UaiConfig::default(),
            };
            store.save()?;
            return Ok(store);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &UaiConfig {
        &self.config
    }

    fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.path, content).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<&str>> {
        Ok(self.config.get(key.parse()?))
    }

    pub fn set(&mut self, key: ConfigKey, value: String) -> Result<()> {
        self.config.set(key, value);
        self.save()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.config = UaiConfig::default();
        self.save()
    }

    /// Human-readable listing with API keys masked
    pub fn render_list(&self) -> String {
        let c = &self.config;
        let value = |v: Option<&str>| v.unwrap_or(NOT_SET).to_string();
        let mut out = String::new();

        let mut section = |title: String, rows: Vec<(&str, String)>| {
            out.push_str(&title);
            out.push('\n');
            for (label, v) in rows {
                out.push_str(&format!("  {:<14} {}\n", format!("{}:", label), v));
            }
            out.push('\n');
        };

        section(
            "Claude Code:".yellow().to_string(),
            vec![
                ("API Key", mask_api_key(c.claude.api_key.as_deref())),
                (
                    "Model",
                    c.claude.model.clone().unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string()),
                ),
            ],
        );
        section(
            "O3 MCP:".green().to_string(),
            vec![
                ("Endpoint", value(c.o3.endpoint.as_deref())),
                ("API Key", mask_api_key(c.o3.api_key.as_deref())),
            ],
        );
        section(
            "Gemini CLI:".magenta().to_string(),
            vec![
                ("API Key", mask_api_key(c.gemini.api_key.as_deref())),
                ("Model", value(c.gemini.model.as_deref())),
            ],
        );
        section(
            "General:".cyan().to_string(),
            vec![
                (
                    "Default tool",
                    c.general.default_tool.clone().unwrap_or_else(|| "claude".to_string()),
                ),
                ("Theme", c.general.theme.clone().unwrap_or_else(|| "auto".to_string())),
            ],
        );

        out.push_str(&format!("Config file: {}", self.path.display()).dimmed().to_string());
        out
    }
}
