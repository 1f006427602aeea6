//! Configuration system (layered: code > env > config file).

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::AbacusError;
use crate::models::LanguageModel;

/// Config file name inside the abacus home directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Layered configuration for abacus.
///
/// Values set in code win over environment variables, which win over the
/// config file. Maps are shared behind `Arc<RwLock<..>>` so clones observe
/// later updates.
#[derive(Clone)]
pub struct AbacusConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
    model: Arc<RwLock<Option<String>>>,
    max_iterations: Arc<RwLock<Option<usize>>>,
    home_dir: PathBuf,
}

impl fmt::Debug for AbacusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<String> = self
            .api_keys
            .read()
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("AbacusConfig")
            .field("api_keys_for", &providers)
            .field("base_urls", &self.base_urls)
            .field("model", &self.model)
            .field("max_iterations", &self.max_iterations)
            .field("home_dir", &self.home_dir)
            .finish()
    }
}

impl Default for AbacusConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk config file (`~/.abacus/config.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
}

impl ConfigFile {
    /// Read a config file; a missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self, AbacusError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(AbacusError::Io(err)),
        };
        toml::from_str(&raw).map_err(|e| {
            AbacusError::Configuration(format!("invalid {}: {e}", path.display()))
        })
    }
}

impl AbacusConfig {
    /// Create an empty config rooted at the default home directory.
    pub fn new() -> Self {
        Self::with_home_dir(default_home_dir())
    }

    /// Create an empty config rooted at `home_dir`.
    pub fn with_home_dir(home_dir: PathBuf) -> Self {
        Self {
            api_keys: Arc::new(RwLock::new(HashMap::new())),
            base_urls: Arc::new(RwLock::new(HashMap::new())),
            model: Arc::new(RwLock::new(None)),
            max_iterations: Arc::new(RwLock::new(None)),
            home_dir,
        }
    }

    /// Load the config file, then environment variables on top of it.
    ///
    /// `.env` is read when present. `ABACUS_HOME` relocates the home directory.
    pub fn from_env() -> Result<Self, AbacusError> {
        let _ = dotenvy::dotenv();
        let home_dir = std::env::var("ABACUS_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home_dir());
        let config = Self::with_home_dir(home_dir);
        let file = ConfigFile::load(&config.config_path())?;
        config.apply_file(&file);

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.set_api_key("openai", key.clone());
            config.set_api_key("openai-compatible", key);
        }
        if let Ok(key) = std::env::var("OPENAI_COMPAT_API_KEY") {
            config.set_api_key("openai-compatible", key);
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.set_base_url("openai", url.clone());
            config.set_base_url("openai-compatible", url);
        }
        if let Ok(url) = std::env::var("OPENAI_COMPAT_BASE_URL") {
            config.set_base_url("openai-compatible", url);
        }
        if let Ok(model) = std::env::var("ABACUS_MODEL") {
            config.set_model(model);
        }
        if let Ok(raw) = std::env::var("ABACUS_MAX_ITERATIONS") {
            let n = raw.parse::<usize>().map_err(|_| {
                AbacusError::Configuration(format!("ABACUS_MAX_ITERATIONS must be a number, got '{raw}'"))
            })?;
            config.set_max_iterations(Some(n));
        }

        tracing::debug!(config = ?config, "configuration loaded");
        Ok(config)
    }

    fn apply_file(&self, file: &ConfigFile) {
        if let Some(ref key) = file.api_key {
            self.set_api_key("openai", key.clone());
            self.set_api_key("openai-compatible", key.clone());
        }
        if let Some(ref url) = file.base_url {
            self.set_base_url("openai", url.clone());
            self.set_base_url("openai-compatible", url.clone());
        }
        if let Some(ref model) = file.model {
            self.set_model(model.clone());
        }
        if file.max_iterations.is_some() {
            self.set_max_iterations(file.max_iterations);
        }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.home_dir.join(CONFIG_FILE_NAME)
    }

    /// Directory holding per-thread history and checkpoints.
    pub fn threads_dir(&self) -> PathBuf {
        self.home_dir.join("threads")
    }

    pub fn set_api_key(&self, provider: &str, key: String) {
        if let Ok(mut keys) = self.api_keys.write() {
            keys.insert(provider.to_string(), key);
        }
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys.read().ok()?.get(provider).cloned()
    }

    pub fn set_base_url(&self, provider: &str, url: String) {
        if let Ok(mut urls) = self.base_urls.write() {
            urls.insert(provider.to_string(), url);
        }
    }

    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        self.base_urls.read().ok()?.get(provider).cloned()
    }

    pub fn set_model(&self, model: String) {
        if let Ok(mut slot) = self.model.write() {
            *slot = Some(model);
        }
    }

    /// The configured model, or the default `openai:gpt-4o`.
    pub fn model(&self) -> Result<LanguageModel, AbacusError> {
        match self.model.read().ok().and_then(|m| m.clone()) {
            Some(selector) => selector.parse(),
            None => Ok(LanguageModel::default()),
        }
    }

    pub fn set_max_iterations(&self, limit: Option<usize>) {
        if let Ok(mut slot) = self.max_iterations.write() {
            *slot = limit;
        }
    }

    pub fn max_iterations(&self) -> Option<usize> {
        self.max_iterations.read().ok().and_then(|m| *m)
    }
}

fn default_home_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".abacus"))
        .unwrap_or_else(|| PathBuf::from(".abacus"))
}
