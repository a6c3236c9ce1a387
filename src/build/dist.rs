//! Distribution tree cleaning and assembly.

use crate::build::{glob_under, BuildContext, TaskError, TaskErrorKind};
use glob::glob;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Remove the distribution root.
///
/// Succeeds when the directory does not exist. Refuses to delete a
/// directory that is, or contains, the project root or the source root.
pub fn clean_dist(ctx: &BuildContext) -> Result<(), TaskError> {
    let out_dir = ctx.out_dir();
    let out = match out_dir.canonicalize() {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(TaskError::io(&out_dir, e)),
    };

    for protected in [ctx.project_root().to_path_buf(), ctx.src_dir()] {
        let protected = protected.canonicalize().unwrap_or(protected);
        if protected.starts_with(&out) {
            return Err(TaskError::new(
                TaskErrorKind::Config,
                format!(
                    "refusing to remove {}: it contains {}",
                    out_dir.display(),
                    protected.display()
                ),
            ));
        }
    }

    match fs::remove_dir_all(&out) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(TaskError::io(&out_dir, e)),
        _ => {
            tracing::debug!(dir = %out_dir.display(), "distribution cleaned");
            Ok(())
        }
    }
}

/// Copy every file matching the configured globs from the source root into
/// the distribution root, preserving relative paths.
pub fn assemble(ctx: &BuildContext) -> Result<Vec<PathBuf>, TaskError> {
    let src_dir = ctx.src_dir();
    let out_dir = ctx.out_dir();

    let mut sources = BTreeSet::new();
    for pattern in &ctx.config().assemble.globs {
        let matches = match_pattern(&src_dir, pattern)?;
        if matches.is_empty() && !is_wildcard(pattern) {
            return Err(TaskError::new(
                TaskErrorKind::NotFound,
                format!("{}: no such file", src_dir.join(pattern).display()),
            ));
        }
        sources.extend(matches);
    }

    let mut outputs = Vec::with_capacity(sources.len());
    for source in sources {
        let Ok(relative) = source.strip_prefix(&src_dir) else {
            continue;
        };
        // Skip anything already inside the distribution root.
        if source.starts_with(&out_dir) {
            continue;
        }
        let dest = out_dir.join(relative);
        copy_file(&source, &dest)?;
        outputs.push(dest);
    }

    tracing::debug!(count = outputs.len(), dir = %out_dir.display(), "distribution assembled");
    Ok(outputs)
}

/// Files under `base` matching `pattern`, sorted.
fn match_pattern(base: &Path, pattern: &str) -> Result<Vec<PathBuf>, TaskError> {
    let entries = glob(&glob_under(base, pattern)).map_err(|e| {
        TaskError::new(TaskErrorKind::Config, format!("invalid glob '{}': {}", pattern, e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!("error reading path: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

fn is_wildcard(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn copy_file(source: &Path, dest: &Path) -> Result<(), TaskError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
    }
    fs::copy(source, dest).map_err(|e| TaskError::io(source, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn setup() -> (TempDir, BuildContext) {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        (temp, ctx)
    }

    #[test]
    fn test_clean_missing_dir() {
        let (_temp, ctx) = setup();
        clean_dist(&ctx).unwrap();
        clean_dist(&ctx).unwrap();
    }

    #[test]
    fn test_clean_removes_everything() {
        let (temp, ctx) = setup();
        create_test_file(temp.path(), "dist/stray.txt", "old");
        create_test_file(temp.path(), "dist/nested/deep.css", "old");

        clean_dist(&ctx).unwrap();
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn test_clean_refuses_project_root() {
        let temp = TempDir::new().unwrap();
        let mut config = default_config();
        config.project.out = PathBuf::from(".");
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        create_test_file(temp.path(), "app/index.html", "<html></html>");

        let err = clean_dist(&ctx).unwrap_err();
        assert_eq!(err.kind, TaskErrorKind::Config);
        assert!(temp.path().join("app/index.html").exists());
    }

    #[test]
    fn test_assemble_copies_matches() {
        let (temp, ctx) = setup();
        create_test_file(temp.path(), "app/index.html", "<html></html>");
        create_test_file(temp.path(), "app/pages/about.html", "<html>about</html>");
        create_test_file(temp.path(), "app/css/style.min.css", "a{}");
        create_test_file(temp.path(), "app/js/main.min.js", "var a;");
        create_test_file(temp.path(), "app/js/main.js", "var a = 1;");

        let outputs = assemble(&ctx).unwrap();
        let dist = temp.path().join("dist");

        assert_eq!(outputs.len(), 4);
        assert_eq!(fs::read_to_string(dist.join("pages/about.html")).unwrap(), "<html>about</html>");
        assert!(dist.join("index.html").exists());
        assert!(dist.join("css/style.min.css").exists());
        assert!(dist.join("js/main.min.js").exists());
        assert!(!dist.join("js/main.js").exists());
    }

    #[test]
    fn test_assemble_missing_literal() {
        let (temp, ctx) = setup();
        create_test_file(temp.path(), "app/index.html", "<html></html>");
        create_test_file(temp.path(), "app/css/style.min.css", "a{}");

        let err = assemble(&ctx).unwrap_err();
        assert_eq!(err.kind, TaskErrorKind::NotFound);
        assert!(err.message.contains("main.min.js"));
    }

    #[test]
    fn test_assemble_wildcard_may_match_nothing() {
        let (temp, ctx) = setup();
        create_test_file(temp.path(), "app/css/style.min.css", "a{}");
        create_test_file(temp.path(), "app/js/main.min.js", "var a;");

        let outputs = assemble(&ctx).unwrap();
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn test_is_wildcard() {
        assert!(is_wildcard("**/*.html"));
        assert!(is_wildcard("img/icon?.png"));
        assert!(!is_wildcard("css/style.min.css"));
    }
}
