//! Assetline - front-end asset pipeline
//!
//! This library provides functionality to:
//! - Compile SCSS into minified, prefixed CSS
//! - Bundle and minify scripts
//! - Pack icon SVGs into a sprite sheet and optimize images
//! - Assemble a distribution tree for release
//! - Serve the source tree with live reload while watching for changes

pub mod build;
pub mod cli;
pub mod config;
pub mod server;
pub mod watch;
