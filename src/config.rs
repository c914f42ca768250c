use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main teamsim configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    pub completion: CompletionConfig,
    pub simulation: SimulationConfig,
    pub paths: PathsConfig,
    /// File this configuration was read from, if any
    #[serde(skip)]
    source: Option<PathBuf>,
}

/// Log verbosity written to the log file (RUST_LOG overrides it)
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" => Ok(LogLevel::Off),
            _ => eyre::bail!("Unknown log level: {}. Supported: trace, debug, info, warn, error, off", s),
        }
    }
}

/// Settings for the chat completion backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Model identifier sent with every request
    pub model: String,
    /// Generation ceiling (max output tokens)
    pub max_tokens: u32,
    /// Sampling temperature used when nothing else asks for one
    pub temperature: f32,
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of rounds when --rounds is not given
    pub rounds: usize,
    /// Temperature for persona turns (falls back to completion.temperature)
    pub temperature: Option<f32>,
    /// Opening user message
    pub opening_prompt: String,
    /// Persona names taking part, in speaking order (empty = whole catalog)
    pub roster: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of persona YAML files
    pub personas: PathBuf,
}

pub const DEFAULT_OPENING_PROMPT: &str = "The team of designers and the client are having a discussion about designing a new alarm clock. Each agent will contribute their opinion and ideas.";

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            max_tokens: 200,
            temperature: 0.5,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rounds: 5,
            temperature: Some(0.7),
            opening_prompt: DEFAULT_OPENING_PROMPT.to_string(),
            roster: Vec::new(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            personas: Config::teamsim_dir().join("personas"),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        if let Ok(env_path) = std::env::var("TEAMSIM_CONFIG") {
            let path = PathBuf::from(env_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from TEAMSIM_CONFIG: {}", e);
                    }
                }
            }
        }

        // $TEAMSIM_DIR/teamsim.yaml, then ~/.config/teamsim/teamsim.yaml
        let path = Self::config_file();
        if path.exists() {
            match Self::load_from_file(&path) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }

        // Try ./teamsim.yaml (for development)
        let local_config = PathBuf::from("teamsim.yaml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load local config: {}", e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let mut config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.source = Some(path.as_ref().to_path_buf());

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Write this configuration back to the file it came from, or to the
    /// default config file when it was built from defaults
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = self.source.clone().unwrap_or_else(Self::config_file);
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let yaml_str = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(&config_path, yaml_str).context("Failed to write config file")?;
        Ok(config_path)
    }

    /// Get the teamsim directory (config file, .env, personas)
    pub fn teamsim_dir() -> PathBuf {
        std::env::var("TEAMSIM_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("teamsim"))
    }

    pub fn config_file() -> PathBuf {
        Self::teamsim_dir().join("teamsim.yaml")
    }

    /// Expand a path that may contain ~ or env vars
    pub fn expand_path(path: &Path) -> PathBuf {
        let path_str = path.to_string_lossy();
        let expanded = shellexpand::full(&path_str).unwrap_or_else(|_| path_str.clone());
        PathBuf::from(expanded.as_ref())
    }

    pub fn personas_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.personas)
    }

    /// Resolve the API key from the environment, then from <teamsim_dir>/.env
    pub fn api_key(&self) -> Result<String> {
        let env_var = self.completion.api_key_env.as_str();

        if let Ok(key) = std::env::var(env_var)
            && !key.trim().is_empty()
        {
            return Ok(key);
        }

        let env_file = Self::teamsim_dir().join(".env");
        if env_file.exists() {
            let content = fs::read_to_string(&env_file).context("Failed to read .env file")?;
            if let Some(value) = find_env_value(&content, env_var) {
                return Ok(value);
            }
        }

        eyre::bail!(
            "Missing API key: {} not found in environment or {}",
            env_var,
            env_file.display()
        )
    }
}

/// Look up KEY=value in dotenv-style content
fn find_env_value(content: &str, name: &str) -> Option<String> {
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, value)) = line.split_once('=')
            && key.trim() == name
        {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            return Some(value.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.completion.model, "gpt-4");
        assert_eq!(config.completion.max_tokens, 200);
        assert_eq!(config.simulation.rounds, 5);
        assert_eq!(config.simulation.temperature, Some(0.7));
        assert!(config.simulation.roster.is_empty());
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
completion:
  model: gpt-4o-mini
simulation:
  rounds: 2
  roster: [Client, Presenter]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.completion.max_tokens, 200);
        assert_eq!(config.simulation.rounds, 2);
        assert_eq!(config.simulation.roster, vec!["Client", "Presenter"]);
        assert_eq!(config.simulation.opening_prompt, DEFAULT_OPENING_PROMPT);
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Off.as_filter(), "off");
    }

    #[test]
    fn test_expand_path_no_expansion() {
        let path = PathBuf::from("/usr/local/share");
        assert_eq!(Config::expand_path(&path), PathBuf::from("/usr/local/share"));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = Config::expand_path(&PathBuf::from("~/personas"));
        assert!(!expanded.to_string_lossy().contains('~'));
        assert!(expanded.to_string_lossy().ends_with("personas"));
    }

    #[test]
    fn test_find_env_value() {
        let content = "# comment\nOTHER=1\nexport OPENAI_API_KEY=\"sk-test\"\n";
        assert_eq!(find_env_value(content, "OPENAI_API_KEY"), Some("sk-test".to_string()));
        assert_eq!(find_env_value(content, "MISSING"), None);
    }

    #[test]
    fn test_api_key_from_env() {
        let mut config = Config::default();
        config.completion.api_key_env = "TEAMSIM_TEST_API_KEY".to_string();
        // SAFETY: Test runs single-threaded, env var is test-specific
        unsafe {
            std::env::set_var("TEAMSIM_TEST_API_KEY", "sk-from-env");
        }
        assert_eq!(config.api_key().unwrap(), "sk-from-env");
        unsafe {
            std::env::remove_var("TEAMSIM_TEST_API_KEY");
        }
    }

    #[test]
    fn test_save_writes_back_to_loaded_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("custom.yaml");
        fs::write(&path, "simulation:\n  rounds: 9\n").unwrap();

        let mut config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.simulation.rounds, 9);

        config.simulation.rounds = 2;
        assert_eq!(config.save().unwrap(), path);

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.simulation.rounds, 2);
        assert!(!fs::read_to_string(&path).unwrap().contains("source"));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let yaml_str = serde_yaml::to_string(&config).expect("Failed to serialize");
        let parsed: Config = serde_yaml::from_str(&yaml_str).expect("Failed to deserialize");
        assert_eq!(parsed.completion.model, config.completion.model);
        assert_eq!(parsed.simulation.rounds, config.simulation.rounds);
    }
}
