//! Typed lookup of settings in `app.ini` at the application root.
//!
//! Every getter re-reads and re-parses the file, so edits are visible to the next call.
//! A missing file reads as an empty document: lookups then fail with `SectionNotFound`.
//! Secrets such as the OpenAI key come from the environment, not from this file.

pub mod ini;

use std::path::{Path, PathBuf};

pub use ini::{IniDocument, DEFAULT_SECTION};

use crate::paths;

/// Config file name, resolved against the application root.
pub const APP_CONFIG_FILE: &str = "app.ini";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("no section: {0:?}")]
    SectionNotFound(String),
    #[error("no option {key:?} in section {section:?}")]
    KeyNotFound { section: String, key: String },
    #[error("[{section}] {key} = {value:?} is not a valid {expected}")]
    TypeConversion {
        section: String,
        key: String,
        value: String,
        expected: &'static str,
    },
    #[error("bad interpolation in [{section}] {key}: {message}")]
    Interpolation {
        section: String,
        key: String,
        message: String,
    },
}

impl ConfigError {
    /// True when the section or option simply is not there (callers often fall back to a default).
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            ConfigError::SectionNotFound(_) | ConfigError::KeyNotFound { .. }
        )
    }
}

/// Path of `app.ini` under the application root.
pub fn config_path() -> PathBuf {
    paths::append_path(APP_CONFIG_FILE)
}

/// Reads typed values from one INI file. Holds only the path.
#[derive(Debug, Clone)]
pub struct ConfigReader {
    path: PathBuf,
}

impl Default for ConfigReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigReader {
    /// Reader for `app.ini` at the application root.
    pub fn new() -> Self {
        Self {
            path: config_path(),
        }
    }

    /// Reader for a specific file (e.g. injected at startup or in tests).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file now.
    pub fn load(&self) -> Result<IniDocument, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("config file not found, treating as empty: {}", self.path.display());
                String::new()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        IniDocument::parse(&text).inspect_err(|e| {
            log::warn!("failed to parse {}: {}", self.path.display(), e);
        })
    }

    pub fn get_string(&self, section: &str, key: &str) -> Result<String, ConfigError> {
        self.load()?.get(section, key)
    }

    pub fn get_int(&self, section: &str, key: &str) -> Result<i64, ConfigError> {
        let value = self.get_string(section, key)?;
        parse_int(&value).ok_or_else(|| conversion_error(section, key, value, "integer"))
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Result<bool, ConfigError> {
        let value = self.get_string(section, key)?;
        parse_bool(&value).ok_or_else(|| conversion_error(section, key, value, "boolean"))
    }

    pub fn get_float(&self, section: &str, key: &str) -> Result<f64, ConfigError> {
        let value = self.get_string(section, key)?;
        parse_float(&value).ok_or_else(|| conversion_error(section, key, value, "float"))
    }
}

/// String value from `app.ini`.
pub fn get_string(section: &str, key: &str) -> Result<String, ConfigError> {
    ConfigReader::new().get_string(section, key)
}

/// Integer value from `app.ini`.
pub fn get_int(section: &str, key: &str) -> Result<i64, ConfigError> {
    ConfigReader::new().get_int(section, key)
}

/// Boolean value from `app.ini` (`1/yes/true/on`, `0/no/false/off`, any case).
pub fn get_bool(section: &str, key: &str) -> Result<bool, ConfigError> {
    ConfigReader::new().get_bool(section, key)
}

/// Float value from `app.ini`.
pub fn get_float(section: &str, key: &str) -> Result<f64, ConfigError> {
    ConfigReader::new().get_float(section, key)
}

fn conversion_error(section: &str, key: &str, value: String, expected: &'static str) -> ConfigError {
    ConfigError::TypeConversion {
        section: section.to_string(),
        key: key.to_string(),
        value,
        expected,
    }
}

/// Decimal integer with optional sign; single underscores between digits are allowed.
fn parse_int(text: &str) -> Option<i64> {
    strip_digit_separators(text.trim())?.parse().ok()
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn parse_float(text: &str) -> Option<f64> {
    strip_digit_separators(text.trim())?.parse().ok()
}

/// Remove `_` digit separators. `None` if any `_` lacks an ASCII digit on either side.
fn strip_digit_separators(t: &str) -> Option<String> {
    let bytes = t.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'_' {
            continue;
        }
        let before = i.checked_sub(1).map(|j| bytes[j]);
        let after = bytes.get(i + 1).copied();
        if !before.is_some_and(|c| c.is_ascii_digit()) || !after.is_some_and(|c| c.is_ascii_digit()) {
            return None;
        }
    }
    Some(t.replace('_', ""))
}

// --- Settings consumed by the CLI ---

/// Section in `app.ini` holding chat service settings.
pub const OPENAI_SECTION: &str = "openai";

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_SERVICE_ID: &str = "dv";

/// Chat service settings from `[openai]`. Absent keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiSettings {
    /// Model name (default "gpt-3.5-turbo").
    pub model: String,
    /// API base URL; `None` means the public OpenAI endpoint.
    pub base_url: Option<String>,
    /// Id the chat service is registered under in the kernel (default "dv").
    pub service_id: String,
    /// Stream completion deltas to stdout as they arrive (default false).
    pub stream: bool,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            service_id: DEFAULT_SERVICE_ID.to_string(),
            stream: false,
        }
    }
}

impl OpenAiSettings {
    /// Load from the reader's file. Missing section or keys use defaults; anything else
    /// (unreadable file, parse error, bad boolean) is returned.
    pub fn load(reader: &ConfigReader) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let model = optional(reader.get_string(OPENAI_SECTION, "model"))?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.model);
        let base_url = optional(reader.get_string(OPENAI_SECTION, "base_url"))?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let service_id = optional(reader.get_string(OPENAI_SECTION, "service_id"))?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.service_id);
        let stream = optional(reader.get_bool(OPENAI_SECTION, "stream"))?.unwrap_or(defaults.stream);
        Ok(Self {
            model,
            base_url,
            service_id,
            stream,
        })
    }
}

fn optional<T>(res: Result<T, ConfigError>) -> Result<Option<T>, ConfigError> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_missing() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Env var holding the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Resolve the OpenAI API key from the environment. Empty or whitespace-only counts as unset.
pub fn resolve_openai_api_key() -> Option<String> {
    std::env::var(OPENAI_API_KEY_ENV).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}
