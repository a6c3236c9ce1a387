//! Script bundling.
//!
//! Inputs are concatenated in their configured order, then minified with
//! `minify-js`. A minification failure is reported as a warning and the
//! previous bundle is left in place, so a broken script never stops the
//! watch loop.

use crate::build::{BuildContext, TaskError, TaskErrorKind};
use minify_js::{minify, Session, TopLevelMode};
use std::fs;
use std::path::PathBuf;

/// Outcome of a script bundle run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleOutcome {
    /// A fresh bundle was written
    Written(PathBuf),
    /// Minification failed; the existing bundle is stale
    Stale { warning: String },
}

/// Concatenate, minify and write the configured scripts.
pub fn build_scripts(ctx: &BuildContext) -> Result<BundleOutcome, TaskError> {
    let output = ctx.script_output();
    let source = concat_scripts(&ctx.script_inputs())?;

    let minified = match minify_script(&source) {
        Ok(code) => code,
        Err(e) => {
            tracing::warn!(output = %output.display(), "{}", e);
            return Ok(BundleOutcome::Stale { warning: e.to_string() });
        }
    };

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
    }
    fs::write(&output, minified).map_err(|e| TaskError::io(&output, e))?;

    Ok(BundleOutcome::Written(output))
}

/// Join script files in order, one newline between files.
pub fn concat_scripts(inputs: &[PathBuf]) -> Result<String, TaskError> {
    let mut parts = Vec::with_capacity(inputs.len());
    for input in inputs {
        parts.push(fs::read_to_string(input).map_err(|e| TaskError::io(input, e))?);
    }
    Ok(parts.join("\n"))
}

/// Minify a JavaScript source.
pub fn minify_script(source: &str) -> Result<Vec<u8>, TaskError> {
    let session = Session::new();
    let mut out = Vec::new();
    minify(&session, TopLevelMode::Global, source.as_bytes(), &mut out)
        .map_err(|e| TaskError::new(TaskErrorKind::ScriptMinify, format!("{:?}", e)))?;
    Ok(out)
}
