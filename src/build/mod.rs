//! Build pipeline for front-end assets.
//!
//! Each [`Task`] turns part of the source tree into build outputs:
//! - **Styles**: SCSS entry to minified, prefixed CSS
//! - **Scripts**: ordered inputs concatenated and minified
//! - **Sprite**: icon SVGs packed into one stack-mode sprite
//! - **Images**: every image compressed into the distribution tree
//! - **Clean** / **Assemble**: reset and fill the distribution tree
//!
//! # Example
//!
//! ```ignore
//! use assetline::build::{BuildContext, TaskRunner};
//! use assetline::config::load_config;
//!
//! let config = load_config(None)?;
//! let runner = TaskRunner::new(BuildContext::new(config, project_root));
//!
//! let result = runner.release();
//! println!("{}", result.summary());
//! ```

pub mod cache;
pub mod context;
pub mod dist;
pub mod graph;
pub mod images;
pub mod result;
pub mod scripts;
pub mod sprite;
pub mod styles;
pub mod svg;
pub mod task;

pub use cache::ImageCache;
pub use context::*;
pub use graph::*;
pub use images::{CompressorChain, CompressorOptions, ImageOptimizer, OptimizeReport};
pub use result::*;
pub use task::*;
