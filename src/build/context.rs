//! Build context containing configuration and resolved paths for a project.

use crate::config::PipelineConfig;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for task runs.
///
/// All path getters return absolute paths: source-relative config values are
/// joined onto the source root, project-relative ones onto the project root.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: PipelineConfig,
    /// Project root directory (where assetline.toml is located)
    project_root: PathBuf,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: PipelineConfig, project_root: PathBuf) -> Self {
        Self { config, project_root }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the source root.
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.src)
    }

    /// Get the distribution root.
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Resolve a path relative to the source root.
    pub fn resolve_src(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.src_dir().join(path)
        }
    }

    pub fn style_entry(&self) -> PathBuf {
        self.resolve_src(&self.config.styles.entry)
    }

    pub fn style_output(&self) -> PathBuf {
        self.resolve_src(&self.config.styles.output)
    }

    /// Script inputs in bundle order.
    pub fn script_inputs(&self) -> Vec<PathBuf> {
        self.config.scripts.inputs.iter().map(|p| self.resolve_path(p)).collect()
    }

    pub fn script_output(&self) -> PathBuf {
        self.resolve_src(&self.config.scripts.output)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.resolve_src(&self.config.images.dir)
    }

    /// Where optimized images land: the images directory mirrored under the
    /// distribution root.
    pub fn images_out_dir(&self) -> PathBuf {
        let dir = &self.config.images.dir;
        let relative = if dir.is_absolute() {
            dir.strip_prefix(self.src_dir()).map(Path::to_path_buf).unwrap_or_else(|_| {
                dir.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("images"))
            })
        } else {
            dir.clone()
        };
        self.out_dir().join(relative)
    }

    /// Image cache directory, or `None` when caching is disabled.
    pub fn image_cache_dir(&self) -> Option<PathBuf> {
        self.config.images.cache.then(|| self.resolve_path(&self.config.images.cache_dir))
    }

    pub fn icons_dir(&self) -> PathBuf {
        self.resolve_src(&self.config.sprite.icons)
    }

    pub fn sprite_output(&self) -> PathBuf {
        self.resolve_src(&self.config.sprite.output)
    }

    /// Get the source-relative path of a file, if it lives under the source root.
    pub fn relative_to_src<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(self.src_dir()).ok()
    }
}

/// Glob for `pattern` under `dir`. Glob metacharacters in `dir` itself
/// are escaped so they match literally.
pub fn glob_under(dir: &Path, pattern: &str) -> String {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    format!("{}/{}", base.trim_end_matches(['/', '\\']), pattern)
}
