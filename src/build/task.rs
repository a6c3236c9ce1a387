//! Task definitions.
//!
//! A task is one named, individually runnable step of the pipeline.

use std::str::FromStr;

/// A runnable pipeline task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {
    /// Compile the stylesheet entry into minified, prefixed CSS
    Styles,
    /// Concatenate and minify the ordered script inputs
    Scripts,
    /// Pack the icon SVGs into one sprite sheet
    Sprite,
    /// Optimize every image into the distribution tree
    Images,
    /// Delete the distribution tree
    Clean,
    /// Copy markup, CSS and JS into the distribution tree
    Assemble,
}

impl Task {
    /// All tasks, in declaration order.
    pub const ALL: [Task; 6] =
        [Task::Styles, Task::Scripts, Task::Sprite, Task::Images, Task::Clean, Task::Assemble];

    /// Tasks whose first run starts develop mode.
    pub const DEVELOP: [Task; 3] = [Task::Styles, Task::Scripts, Task::Sprite];

    /// Release sequence. Each step must succeed before the next starts.
    pub const RELEASE: [Task; 3] = [Task::Clean, Task::Images, Task::Assemble];

    /// Command-line name of the task.
    pub fn name(&self) -> &'static str {
        match self {
            Task::Styles => "styles",
            Task::Scripts => "scripts",
            Task::Sprite => "sprite",
            Task::Images => "images",
            Task::Clean => "clean",
            Task::Assemble => "assemble",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown task name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task '{0}'")]
pub struct UnknownTask(pub String);

impl FromStr for Task {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Task::ALL.into_iter().find(|t| t.name() == s).ok_or_else(|| UnknownTask(s.to_string()))
    }
}
