//! Command-line interface implementation
//!
//! Parses arguments, installs logging, loads the project and dispatches to
//! the command implementations in [`build`].

mod build;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::build::{BuildContext, Task};
use crate::config::{load_project, CliOverrides};

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;

/// Assetline - build styles, scripts, sprites and images for a static site
#[derive(Parser)]
#[command(name = "aline")]
#[command(about = "Assetline - front-end asset pipeline with a live-reload dev server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to assetline.toml (default: search upward from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Source root override
    #[arg(long, global = true)]
    pub src: Option<PathBuf>,

    /// Distribution root override
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Build, serve and rebuild on change with live reload (default)
    Dev {
        /// Dev server port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Clean, optimize images and assemble the distribution tree
    #[command(alias = "build")]
    Release {
        /// Recompress every image instead of using the cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Compile the stylesheet
    Styles,
    /// Bundle and minify scripts
    Scripts,
    /// Pack icons into the SVG sprite
    Sprite,
    /// Optimize images into the distribution tree
    Images {
        /// Recompress every image instead of using the cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Delete the distribution tree
    Clean,
    /// Copy markup, styles and scripts into the distribution tree
    Assemble,
    /// Run the dev server only
    Serve {
        /// Dev server port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Rebuild on change without a server
    Watch,
}

impl Commands {
    /// The single task this command runs, if it is a task command.
    pub fn task(&self) -> Option<Task> {
        match self {
            Commands::Styles => Some(Task::Styles),
            Commands::Scripts => Some(Task::Scripts),
            Commands::Sprite => Some(Task::Sprite),
            Commands::Images { .. } => Some(Task::Images),
            Commands::Clean => Some(Task::Clean),
            Commands::Assemble => Some(Task::Assemble),
            _ => None,
        }
    }

    fn port(&self) -> Option<u16> {
        match self {
            Commands::Dev { port } | Commands::Serve { port } => *port,
            _ => None,
        }
    }

    fn no_cache(&self) -> bool {
        match self {
            Commands::Release { no_cache } | Commands::Images { no_cache } => *no_cache,
            _ => false,
        }
    }
}

impl Cli {
    /// The command to run; develop mode when none is given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Dev { port: None })
    }

    /// Config overrides from global flags and the command's own flags.
    pub fn overrides(&self) -> CliOverrides {
        let command = self.command();
        CliOverrides {
            src: self.src.clone(),
            out: self.out.clone(),
            port: command.port(),
            no_cache: command.no_cache(),
        }
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "assetline=debug" } else { "assetline=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (config, project_root) = match load_project(cli.config.as_deref(), &cli.overrides()) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let ctx = BuildContext::new(config, project_root);

    let command = cli.command();
    if let Some(task) = command.task() {
        return build::run_task(ctx, task);
    }
    match command {
        Commands::Release { .. } => build::run_release(ctx),
        Commands::Serve { .. } => build::run_serve(ctx),
        Commands::Watch => build::run_watch(ctx),
        _ => build::run_dev(ctx),
    }
}
