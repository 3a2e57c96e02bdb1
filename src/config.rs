//! Optional TOML configuration (`moodle2pretext.toml`).

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

use crate::options::{BuildOptions, ReferenceErrorPolicy};

const CONFIG_NAMESPACE: &str = "moodle2pretext";
const CONFIG_FILENAME: &str = "moodle2pretext.toml";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ConverterConfig {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub runner: RunnerSection,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct BuildSection {
    #[serde(alias = "onReferenceError")]
    pub on_reference_error: Option<ReferenceErrorPolicy>,
    #[serde(alias = "runExamples")]
    pub run_examples: Option<bool>,
    #[serde(alias = "bookTitle")]
    pub book_title: Option<String>,
    #[serde(alias = "chapterTitle")]
    pub chapter_title: Option<String>,
    pub overwrite: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RunnerSection {
    #[serde(alias = "python")]
    pub interpreter: Option<String>,
    #[serde(alias = "timeout")]
    pub timeout_secs: Option<u64>,
}

impl ConverterConfig {
    /// Overlay the values present in the file onto `options`.
    pub fn apply(&self, mut options: BuildOptions) -> BuildOptions {
        if let Some(policy) = self.build.on_reference_error {
            options.on_reference_error = policy;
        }
        if let Some(run_examples) = self.build.run_examples {
            options.run_examples = run_examples;
        }
        if let Some(title) = normalize_field(self.build.book_title.as_deref()) {
            options.book_title = title;
        }
        if let Some(title) = normalize_field(self.build.chapter_title.as_deref()) {
            options.chapter_title = title;
        }
        if let Some(overwrite) = self.build.overwrite {
            options.overwrite = overwrite;
        }
        if let Some(interpreter) = normalize_field(self.runner.interpreter.as_deref()) {
            options.interpreter = interpreter;
        }
        if let Some(secs) = self.runner.timeout_secs {
            options.timeout = Duration::from_secs(secs);
        }
        options
    }
}

fn normalize_field(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[derive(Debug, Clone)]
pub struct ConfigLoadResult {
    pub config: ConverterConfig,
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to determine configuration directory via XDG environment variables")]
    MissingConfigDir,
    #[error("config file {0:?} does not exist")]
    NotFound(PathBuf),
    #[error("failed to read config file at {path:?}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config file at {path:?}: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
        path: PathBuf,
    },
}

/// Load an explicit config file, or the default one if it exists.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<ConfigLoadResult>, ConfigError> {
    let path = match explicit {
        Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
        Some(path) => path.to_path_buf(),
        None => match resolve_config_path() {
            Ok(path) if path.exists() => path,
            Ok(_) | Err(ConfigError::MissingConfigDir) => return Ok(None),
            Err(err) => return Err(err),
        },
    };

    let config_text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        source,
        path: path.clone(),
    })?;
    let config = parse_config(&config_text, &path)?;
    Ok(Some(ConfigLoadResult { config, path }))
}

pub fn parse_config(text: &str, path: &Path) -> Result<ConverterConfig, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

pub fn resolve_config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_home_dir()?
        .join(CONFIG_NAMESPACE)
        .join(CONFIG_FILENAME))
}

fn config_home_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(dir));
    }

    #[cfg(windows)]
    if let Some(dir) = env::var_os("APPDATA") {
        return Ok(PathBuf::from(dir));
    }

    if let Some(home) = env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".config"));
    }

    Err(ConfigError::MissingConfigDir)
}
