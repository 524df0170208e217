//! Configuration management for xstudio.
//!
//! Loads configuration from ${XSTUDIO_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::transform::XsltVersion;

/// Environment variable overriding `service_url`.
pub const SERVICE_URL_ENV: &str = "XSTUDIO_SERVICE_URL";

/// Editor timing and behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub transform_debounce_ms: u64,
    pub tree_debounce_ms: u64,
    pub highlight_ms: u64,
    pub auto_update: bool,
    pub default_xslt_version: XsltVersion,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            transform_debounce_ms: 500,
            tree_debounce_ms: 400,
            highlight_ms: 1000,
            auto_update: true,
            default_xslt_version: XsltVersion::V1_0,
        }
    }
}

/// Preview surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub default_zoom: f64,
    pub measure_delay_ms: u64,
    pub max_height: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            default_zoom: 1.0,
            measure_delay_ms: 50,
            max_height: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write a daily rolling log file under `$XSTUDIO_HOME/logs`.
    pub file: bool,
    /// Filter used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: false,
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service_url: String,
    pub request_timeout_secs: u64,
    pub editor: EditorConfig,
    pub preview: PreviewConfig,
    pub logging: LoggingConfig,
}

/// Returns the default config template with comments.
///
/// Embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// New comments/sections from the template stay present while the user's
/// values win.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, item) in source.iter() {
        match (target.get_mut(key), item) {
            (Some(Item::Table(section)), Item::Table(user_section)) => {
                merge_items(section, user_section);
            }
            (_, Item::None) => {}
            _ => target[key] = item.clone(),
        }
    }
}

/// Checks that `raw` is an absolute http(s) URL. Returns it without a
/// trailing slash.
pub fn validate_service_url(raw: &str) -> Result<String> {
    let parsed =
        url::Url::parse(raw.trim()).with_context(|| format!("Invalid service URL '{raw}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("Service URL must use http or https, got '{raw}'");
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

pub mod paths {
    //! Path resolution for xstudio configuration and data directories.
    //!
    //! XSTUDIO_HOME resolution order:
    //! 1. XSTUDIO_HOME environment variable (if set)
    //! 2. ~/.config/xstudio (default)

    use std::path::PathBuf;

    pub fn xstudio_home() -> PathBuf {
        if let Ok(home) = std::env::var("XSTUDIO_HOME")
            && !home.is_empty()
        {
            return PathBuf::from(home);
        }

        default_home().expect("Could not determine home directory")
    }

    /// `~/.config/xstudio`, when the home directory is known.
    pub fn default_home() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".config").join("xstudio"))
    }

    pub fn config_path() -> PathBuf {
        xstudio_home().join("config.toml")
    }

    /// Persisted session state.
    pub fn state_path() -> PathBuf {
        xstudio_home().join("state.json")
    }

    pub fn logs_dir() -> PathBuf {
        xstudio_home().join("logs")
    }
}

impl Config {
    pub const DEFAULT_SERVICE_URL: &'static str = "http://127.0.0.1:8000";
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Loads configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Service URL after the environment override, validated.
    pub fn effective_service_url(&self) -> Result<String> {
        let raw = std::env::var(SERVICE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.service_url.clone());
        validate_service_url(&raw)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Saves only `service_url` to a config file.
    ///
    /// Creates the file from the template if it doesn't exist; otherwise the
    /// user's values are merged into the latest template.
    pub fn save_service_url_to(path: &Path, service_url: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let service_url = validate_service_url(service_url)?;

        let base = if path.exists() {
            let existing = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&existing)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = base.parse().context("Failed to parse config")?;
        doc["service_url"] = value(service_url.as_str());

        Self::write_config(path, &doc.to_string())
    }

    /// Initializes a new config file with the commented template.
    ///
    /// Fails if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: Self::DEFAULT_SERVICE_URL.to_string(),
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            editor: EditorConfig::default(),
            preview: PreviewConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_default_home_is_under_user_home() {
        let Some(home) = dirs::home_dir() else {
            assert!(paths::default_home().is_none());
            return;
        };
        let default = paths::default_home().unwrap();
        assert!(default.is_absolute());
        assert_eq!(default, home.join(".config").join("xstudio"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.service_url, "http://127.0.0.1:8000");
        assert_eq!(config.editor.transform_debounce_ms, 500);
        assert_eq!(config.editor.tree_debounce_ms, 400);
        assert_eq!(config.preview.max_height, 2000);
        assert!(config.editor.auto_update);
    }

    #[test]
    fn test_template_matches_defaults() {
        let parsed: Config = toml::from_str(default_config_template()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.service_url, defaults.service_url);
        assert_eq!(parsed.request_timeout_secs, defaults.request_timeout_secs);
        assert_eq!(
            parsed.editor.highlight_ms,
            defaults.editor.highlight_ms
        );
        assert_eq!(
            parsed.editor.default_xslt_version,
            defaults.editor.default_xslt_version
        );
        assert_eq!(parsed.logging.filter, defaults.logging.filter);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[editor]\nauto_update = false\ndefault_xslt_version = \"3.0\"\n",
        )
        .unwrap();
        let config = Config::load_from(&path).unwrap();
        assert!(!config.editor.auto_update);
        assert_eq!(config.editor.default_xslt_version, XsltVersion::V3_0);
        assert_eq!(config.editor.transform_debounce_ms, 500);
    }

    #[test]
    fn test_invalid_version_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[editor]\ndefault_xslt_version = \"4.0\"\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::init(&path).unwrap();
        assert!(path.exists());
        assert!(Config::init(&path).is_err());
    }

    #[test]
    fn test_save_service_url_preserves_user_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "request_timeout_secs = 5\n").unwrap();
        Config::save_service_url_to(&path, "http://transform.local:9000").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("# Base URL of the transformation service."));
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.service_url, "http://transform.local:9000");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_validate_service_url() {
        assert_eq!(
            validate_service_url(" https://xslt.example.com/ ").unwrap(),
            "https://xslt.example.com"
        );
        assert!(validate_service_url("ftp://xslt.example.com").is_err());
    }

    #[test]
    fn test_save_service_url_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(Config::save_service_url_to(&path, "not a url").is_err());
        assert!(!path.exists());
    }
}
