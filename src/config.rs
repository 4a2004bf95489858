//! TOML configuration.
//!
//! Every key is optional; a missing file at the default location means
//! "use the defaults".
//!
//! ```toml
//! auth_dir = "/home/me/.config/note-copy"
//!
//! [http]
//! timeout_secs = 30
//!
//! [sites.danbooru]
//! cooldown_secs = 1
//!
//! [sites.gelbooru]
//! base_url = "https://gelbooru.com"
//! cooldown_secs = 15
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{NoteCopyError, Result};

const APP_DIR: &str = "note-copy";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Directory holding `<site>_auth.json` credential files.
    #[serde(default)]
    pub auth_dir: Option<PathBuf>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub sites: SitesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("note-copy/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SitesConfig {
    #[serde(default)]
    pub danbooru: SiteConfig,
    #[serde(default)]
    pub gelbooru: SiteConfig,
}

/// Per-site settings. Keys left out of a `[sites.<name>]` table fall back
/// to that site's defaults when the config is loaded.
#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub cooldown_secs: Option<f64>,
}

fn default_enabled() -> bool {
    true
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            cooldown_secs: None,
        }
    }
}

impl SiteConfig {
    /// The configured base URL, or `default` without a trailing slash.
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn cooldown_or(&self, default: Duration) -> Duration {
        self.cooldown_secs
            .map(Duration::from_secs_f64)
            .unwrap_or(default)
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Resolve the credential directory: the configured one, or
    /// `<user config dir>/note-copy`.
    pub fn auth_dir(&self) -> PathBuf {
        self.auth_dir.clone().unwrap_or_else(default_app_dir)
    }
}

/// `<user config dir>/note-copy`, or `./.note-copy` when the platform has none.
pub fn default_app_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR)))
}

pub fn default_config_path() -> PathBuf {
    default_app_dir().join(CONFIG_FILE)
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        NoteCopyError::InvalidConfig(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| {
        NoteCopyError::InvalidConfig(format!(
            "failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    validate(&config)?;
    Ok(config)
}

/// Load the config at `path` if given, otherwise the default location,
/// falling back to defaults when the default file does not exist.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => {
            let default = default_config_path();
            if default.is_file() {
                load_config(&default)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.http.timeout_secs == 0 {
        return Err(NoteCopyError::InvalidConfig(
            "http.timeout_secs must be > 0".to_string(),
        ));
    }

    for (name, site) in [
        ("danbooru", &config.sites.danbooru),
        ("gelbooru", &config.sites.gelbooru),
    ] {
        if let Some(url) = &site.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(NoteCopyError::InvalidConfig(format!(
                    "sites.{}.base_url must start with http:// or https://, got '{}'",
                    name, url
                )));
            }
        }
        if let Some(secs) = site.cooldown_secs {
            if !secs.is_finite() || secs < 0.0 {
                return Err(NoteCopyError::InvalidConfig(format!(
                    "sites.{}.cooldown_secs must be a non-negative number",
                    name
                )));
            }
        }
    }

    Ok(())
}
