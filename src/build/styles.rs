//! Stylesheet compilation.
//!
//! The entry point is compiled from SCSS with `grass`, then minified and
//! vendor-prefixed by `lightningcss` for the configured browserslist range.
//! A failed compile leaves the previous output untouched.

use crate::build::{BuildContext, TaskError, TaskErrorKind};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use std::fs;
use std::path::{Path, PathBuf};

/// Compile the configured stylesheet entry and write the minified output.
pub fn build_styles(ctx: &BuildContext) -> Result<Vec<PathBuf>, TaskError> {
    let entry = ctx.style_entry();
    let output = ctx.style_output();

    let css = compile_stylesheet(&entry, &ctx.config().styles.browsers)?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
    }
    fs::write(&output, css).map_err(|e| TaskError::io(&output, e))?;

    tracing::debug!(output = %output.display(), "stylesheet written");
    Ok(vec![output])
}

/// Compile an SCSS entry into minified, prefixed CSS.
pub fn compile_stylesheet(entry: &Path, browsers: &[String]) -> Result<String, TaskError> {
    if !entry.is_file() {
        return Err(TaskError::new(
            TaskErrorKind::NotFound,
            format!("stylesheet entry not found: {}", entry.display()),
        ));
    }

    let mut options = grass::Options::default().style(grass::OutputStyle::Compressed);
    if let Some(dir) = entry.parent() {
        options = options.load_path(dir);
    }

    let compiled = grass::from_path(entry, &options).map_err(|e| {
        TaskError::new(TaskErrorKind::StyleCompile, format!("{}: {}", entry.display(), e))
    })?;

    prefix_and_minify(&compiled, browsers)
}

/// Apply vendor prefixes for the browserslist queries and minify.
///
/// lightningcss never emits the old `-ms-grid` syntax, so grid layouts get
/// no IE prefixes whatever the queries say.
pub fn prefix_and_minify(css: &str, browsers: &[String]) -> Result<String, TaskError> {
    let browsers = Browsers::from_browserslist(browsers.iter().map(String::as_str)).map_err(|e| {
        TaskError::new(TaskErrorKind::Config, format!("invalid browserslist query: {}", e))
    })?;
    let targets = Targets { browsers, ..Targets::default() };

    let style_error = |e: String| TaskError::new(TaskErrorKind::StyleCompile, e);

    let mut sheet =
        StyleSheet::parse(css, ParserOptions::default()).map_err(|e| style_error(e.to_string()))?;
    sheet
        .minify(MinifyOptions { targets, ..MinifyOptions::default() })
        .map_err(|e| style_error(e.to_string()))?;
    let printed = sheet
        .to_css(PrinterOptions { minify: true, targets, ..PrinterOptions::default() })
        .map_err(|e| style_error(e.to_string()))?;

    Ok(printed.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn browsers() -> Vec<String> {
        vec!["last 10 versions".to_string()]
    }

    #[test]
    fn test_compile_nested_scss() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("style.scss");
        fs::write(&entry, "$accent: #ff0000;\n.nav { a { color: $accent; } }\n").unwrap();

        let css = compile_stylesheet(&entry, &browsers()).unwrap();
        assert!(css.contains(".nav a"));
        assert!(css.contains("red") || css.contains("#f00"));
        assert!(!css.contains('\n'));
    }

    #[test]
    fn test_compile_resolves_partials() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("_vars.scss"), "$gap: 4px;").unwrap();
        let entry = temp.path().join("style.scss");
        fs::write(&entry, "@import 'vars';\n.grid { margin: $gap; }\n").unwrap();

        let css = compile_stylesheet(&entry, &browsers()).unwrap();
        assert!(css.contains("margin:4px"));
    }

    #[test]
    fn test_compile_adds_vendor_prefixes() {
        let css = prefix_and_minify(".a { user-select: none; }", &browsers()).unwrap();
        assert!(css.contains("-webkit-user-select"));
    }

    #[test]
    fn test_grid_has_no_ms_prefix() {
        let css = prefix_and_minify(".g { display: grid; }", &["ie 11".to_string()]).unwrap();
        assert!(css.contains("display:grid"), "{}", css);
        assert!(!css.contains("-ms-grid"), "{}", css);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("style.scss");
        fs::write(&entry, ".a { display: flex; .b { color: blue; } }").unwrap();

        let first = compile_stylesheet(&entry, &browsers()).unwrap();
        let second = compile_stylesheet(&entry, &browsers()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_compile_error_kind() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("style.scss");
        fs::write(&entry, ".a { color: $undefined; }").unwrap();

        let err = compile_stylesheet(&entry, &browsers()).unwrap_err();
        assert_eq!(err.kind, TaskErrorKind::StyleCompile);
    }

    #[test]
    fn test_missing_entry() {
        let temp = TempDir::new().unwrap();
        let err = compile_stylesheet(&temp.path().join("nope.scss"), &browsers()).unwrap_err();
        assert_eq!(err.kind, TaskErrorKind::NotFound);
    }

    #[test]
    fn test_invalid_browserslist() {
        let err = prefix_and_minify(".a{}", &["not a real query !!".to_string()]).unwrap_err();
        assert_eq!(err.kind, TaskErrorKind::Config);
    }
}
