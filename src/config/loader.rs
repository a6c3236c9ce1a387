//! Configuration loading and discovery for `assetline.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{
    AssembleConfig, ImagesConfig, PipelineConfig, ProjectConfig, ScriptsConfig, ServerConfig,
    SpriteConfig, StylesConfig, WatchConfig,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILENAME: &str = "assetline.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse assetline.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override source root
    pub src: Option<PathBuf>,
    /// Override distribution root
    pub out: Option<PathBuf>,
    /// Override dev server port
    pub port: Option<u16>,
    /// Disable the image cache
    pub no_cache: bool,
}

/// Find assetline.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find assetline.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an assetline.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns a default
/// configuration.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: PipelineConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no assetline.toml is found.
///
/// The project name is taken from the current directory name.
pub fn default_config() -> PipelineConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    PipelineConfig {
        project: ProjectConfig {
            name: project_name,
            src: PathBuf::from("app"),
            out: PathBuf::from("dist"),
        },
        styles: StylesConfig::default(),
        scripts: ScriptsConfig::default(),
        images: ImagesConfig::default(),
        sprite: SpriteConfig::default(),
        assemble: AssembleConfig::default(),
        server: ServerConfig::default(),
        watch: WatchConfig::default(),
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut PipelineConfig, overrides: &CliOverrides) {
    if let Some(ref src) = overrides.src {
        config.project.src = src.clone();
    }

    if let Some(ref out) = overrides.out {
        config.project.out = out.clone();
    }

    if let Some(port) = overrides.port {
        config.server.port = port;
    }

    if overrides.no_cache {
        config.images.cache = false;
    }
}

/// Load the project configuration and its root directory.
///
/// The root is the directory holding the config file, or the current
/// directory when none is found. Overrides are merged and the result is
/// validated again.
pub fn load_project(
    path: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<(PipelineConfig, PathBuf), ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    let (mut config, root) = match config_path {
        Some(p) => {
            tracing::debug!("using config {}", p.display());
            let config = load_config_file(&p)?;
            let root = match p.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                Some(dir) => dir.to_path_buf(),
                None => env::current_dir()?,
            };
            (config, root)
        }
        None => {
            tracing::debug!("no {} found, using defaults", CONFIG_FILENAME);
            (default_config(), env::current_dir()?)
        }
    };

    merge_cli_overrides(&mut config, overrides);
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok((config, root))
}
