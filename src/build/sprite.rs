//! SVG sprite sheet generation in stack mode.
//!
//! Every icon occupies the same box; a `:target` rule shows the one named by
//! the URL fragment. Icons lose their `fill`, `stroke` and `style`
//! attributes so they take color from the page.

use crate::build::svg::{parse_icon, Icon};
use crate::build::{glob_under, BuildContext, TaskError, TaskErrorKind};
use std::fs;
use std::path::{Path, PathBuf};

const SPRITE_HEADER: &str = concat!(
    r#"<?xml version="1.0" encoding="utf-8"?>"#,
    r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
    "<style>:root>svg{display:none}:root>svg:target{display:block}</style>",
);

/// Build the sprite sheet from the configured icons directory.
///
/// Returns `None` when there are no icons; any previous sprite is removed.
pub fn build_sprite(ctx: &BuildContext) -> Result<Option<PathBuf>, TaskError> {
    let output = ctx.sprite_output();
    let icons = collect_icons(&ctx.icons_dir())?;

    if icons.is_empty() {
        if output.exists() {
            fs::remove_file(&output).map_err(|e| TaskError::io(&output, e))?;
        }
        tracing::debug!(icons = %ctx.icons_dir().display(), "no icons, sprite not written");
        return Ok(None);
    }

    let sprite = repair_entities(&pack_stack(&icons));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
    }
    fs::write(&output, sprite).map_err(|e| TaskError::io(&output, e))?;

    tracing::debug!(count = icons.len(), output = %output.display(), "sprite written");
    Ok(Some(output))
}

/// Parse every `*.svg` directly inside `dir`, sorted by file name.
///
/// A missing directory yields no icons.
pub fn collect_icons(dir: &Path) -> Result<Vec<Icon>, TaskError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }

    let entries = glob::glob(&glob_under(dir, "*.svg"))
        .map_err(|e| TaskError::new(TaskErrorKind::Config, e.to_string()))?;
    let mut paths: Vec<PathBuf> = entries.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let source = fs::read_to_string(path).map_err(|e| TaskError::io(path, e))?;
            let id = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            parse_icon(&id, &source).map_err(|e| {
                TaskError::new(TaskErrorKind::Sprite, format!("{}: {}", path.display(), e))
            })
        })
        .collect()
}

/// Assemble icons into a stack-mode sprite document.
pub fn pack_stack(icons: &[Icon]) -> String {
    let mut out = String::from(SPRITE_HEADER);
    for icon in icons {
        out.push_str(&icon.to_nested_svg());
    }
    out.push_str("</svg>");
    out
}

/// Undo `>` characters that an upstream transform escaped.
pub fn repair_entities(sprite: &str) -> String {
    sprite.replace("&gt;", ">")
}
