//! Configuration schema types for `assetline.toml`
//!
//! Defines the structure and validation rules for an asset pipeline project.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Source root served by the dev server
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Distribution output directory
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("app")
}

fn default_out() -> PathBuf {
    PathBuf::from("dist")
}

/// Stylesheet compilation settings. Paths are relative to the source root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Stylesheet entry point
    #[serde(default = "default_style_entry")]
    pub entry: PathBuf,
    /// Compiled, minified stylesheet
    #[serde(default = "default_style_output")]
    pub output: PathBuf,
    /// Browserslist queries used for vendor prefixing
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
    /// Globs that trigger a stylesheet rebuild
    #[serde(default = "default_style_watch")]
    pub watch: Vec<String>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: default_style_entry(),
            output: default_style_output(),
            browsers: default_browsers(),
            watch: default_style_watch(),
        }
    }
}

fn default_style_entry() -> PathBuf {
    PathBuf::from("scss/style.scss")
}

fn default_style_output() -> PathBuf {
    PathBuf::from("css/style.min.css")
}

fn default_browsers() -> Vec<String> {
    vec!["last 10 versions".to_string()]
}

fn default_style_watch() -> Vec<String> {
    vec!["scss/**/*.scss".to_string()]
}

/// Script bundling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Ordered script inputs, relative to the project root
    #[serde(default = "default_script_inputs")]
    pub inputs: Vec<PathBuf>,
    /// Bundled output, relative to the source root
    #[serde(default = "default_script_output")]
    pub output: PathBuf,
    /// Globs that trigger a rebuild. The bundle output is always excluded.
    #[serde(default = "default_script_watch")]
    pub watch: Vec<String>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            inputs: default_script_inputs(),
            output: default_script_output(),
            watch: default_script_watch(),
        }
    }
}

fn default_script_inputs() -> Vec<PathBuf> {
    vec![PathBuf::from("node_modules/jquery/dist/jquery.js"), PathBuf::from("app/js/main.js")]
}

fn default_script_output() -> PathBuf {
    PathBuf::from("js/main.min.js")
}

fn default_script_watch() -> Vec<String> {
    vec!["js/**/*.js".to_string()]
}

/// Image optimization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Images directory, relative to the source root
    #[serde(default = "default_images_dir")]
    pub dir: PathBuf,
    /// Skip recompression of unchanged files
    #[serde(default = "default_true")]
    pub cache: bool,
    /// Cache directory, relative to the project root
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { dir: default_images_dir(), cache: true, cache_dir: default_cache_dir() }
    }
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".assetline-cache/images")
}

fn default_true() -> bool {
    true
}

/// SVG sprite settings. Paths are relative to the source root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteConfig {
    /// Directory holding the icon SVGs
    #[serde(default = "default_icons")]
    pub icons: PathBuf,
    /// Generated sprite sheet
    #[serde(default = "default_sprite_output")]
    pub output: PathBuf,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self { icons: default_icons(), output: default_sprite_output() }
    }
}

fn default_icons() -> PathBuf {
    PathBuf::from("images/icons")
}

fn default_sprite_output() -> PathBuf {
    PathBuf::from("images/sprite.svg")
}

/// Distribution assembly settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembleConfig {
    /// Globs copied from the source root into the distribution root
    #[serde(default = "default_assemble_globs")]
    pub globs: Vec<String>,
}

impl Default for AssembleConfig {
    fn default() -> Self {
        Self { globs: default_assemble_globs() }
    }
}

fn default_assemble_globs() -> Vec<String> {
    vec!["**/*.html".to_string(), "css/style.min.css".to_string(), "js/main.min.js".to_string()]
}

/// Dev server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Watch mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Globs that force a full page reload
    #[serde(default = "default_markup")]
    pub markup: Vec<String>,
}

fn default_debounce_ms() -> u32 {
    100
}

fn default_markup() -> Vec<String> {
    vec!["**/*.html".to_string()]
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), markup: default_markup() }
    }
}

/// Complete assetline.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub sprite: SpriteConfig,
    #[serde(default)]
    pub assemble: AssembleConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "scripts.inputs")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assetline.toml: '{}' {}", self.field, self.message)
    }
}

impl PipelineConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        if self.project.src == self.project.out {
            errors.push(ConfigValidationError {
                field: "project.out".to_string(),
                message: "must differ from project.src".to_string(),
            });
        }

        if self.styles.browsers.is_empty() {
            errors.push(ConfigValidationError {
                field: "styles.browsers".to_string(),
                message: "must contain at least one query".to_string(),
            });
        }

        if self.scripts.inputs.is_empty() {
            errors.push(ConfigValidationError {
                field: "scripts.inputs".to_string(),
                message: "must list at least one script".to_string(),
            });
        }

        if self.sprite.output.starts_with(&self.sprite.icons) {
            errors.push(ConfigValidationError {
                field: "sprite.output".to_string(),
                message: "must live outside the icons directory".to_string(),
            });
        }

        let globs = self
            .styles
            .watch
            .iter()
            .map(|g| ("styles.watch", g))
            .chain(self.scripts.watch.iter().map(|g| ("scripts.watch", g)))
            .chain(self.assemble.globs.iter().map(|g| ("assemble.globs", g)))
            .chain(self.watch.markup.iter().map(|g| ("watch.markup", g)));
        for (field, pattern) in globs {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: format!("invalid glob '{}': {}", pattern, e),
                });
            }
        }

        if self.watch.debounce_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        errors
    }
}
