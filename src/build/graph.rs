//! Task graph: single task runs, the release sequence and develop mode.

use crate::build::dist::{assemble, clean_dist};
use crate::build::images::{build_images, ImageOptimizer};
use crate::build::scripts::{build_scripts, BundleOutcome};
use crate::build::sprite::build_sprite;
use crate::build::styles::build_styles;
use crate::build::{BuildContext, BuildResult, BuildStatus, Task, TaskError, TaskResult};
use crate::server::{self, LiveReload, ServerError};
use crate::watch::{self, Action, WatchError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Error that ends develop mode.
#[derive(Debug, Error)]
pub enum DevelopError {
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// What a builder produced.
enum Outcome {
    Built(Vec<PathBuf>),
    Skipped(Vec<String>),
}

/// Runs tasks against one project.
pub struct TaskRunner {
    context: Arc<BuildContext>,
    optimizer: ImageOptimizer,
    reload: Option<LiveReload>,
}

impl TaskRunner {
    /// Create a runner with the project's image optimizer.
    pub fn new(context: BuildContext) -> Self {
        let optimizer = ImageOptimizer::from_context(&context);
        Self { context: Arc::new(context), optimizer, reload: None }
    }

    /// Replace the image optimizer.
    pub fn with_optimizer(mut self, optimizer: ImageOptimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Push successful outputs to connected browsers.
    pub fn with_live_reload(mut self, hub: LiveReload) -> Self {
        self.reload = Some(hub);
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Run one task to completion.
    ///
    /// Failures are logged here and returned in the result; they never panic
    /// or abort the caller.
    pub fn run(&self, task: Task) -> TaskResult {
        let start = Instant::now();
        tracing::info!("starting '{}'", task);

        let result = match self.execute(task) {
            Ok(Outcome::Built(outputs)) => TaskResult::success(task, outputs, start.elapsed()),
            Ok(Outcome::Skipped(warnings)) => {
                TaskResult::skipped(task, start.elapsed()).with_warnings(warnings)
            }
            Err(e) => TaskResult::failed(task, e, start.elapsed()),
        };

        match &result.status {
            BuildStatus::Failed(e) => tracing::error!("'{}' failed: {}", task, e),
            BuildStatus::Skipped => tracing::info!("'{}' skipped after {:?}", task, result.duration),
            BuildStatus::Success => {
                tracing::info!("finished '{}' after {:?}", task, result.duration);
                if let Some(hub) = &self.reload {
                    hub.notify(&result.outputs);
                }
            }
        }
        result
    }

    fn execute(&self, task: Task) -> Result<Outcome, TaskError> {
        let ctx = self.context.as_ref();
        match task {
            Task::Styles => build_styles(ctx).map(Outcome::Built),
            Task::Scripts => match build_scripts(ctx)? {
                BundleOutcome::Written(path) => Ok(Outcome::Built(vec![path])),
                BundleOutcome::Stale { warning } => Ok(Outcome::Skipped(vec![warning])),
            },
            Task::Sprite => Ok(match build_sprite(ctx)? {
                Some(path) => Outcome::Built(vec![path]),
                None => Outcome::Skipped(vec![]),
            }),
            Task::Images => {
                build_images(ctx, &self.optimizer).map(|report| Outcome::Built(report.outputs))
            }
            Task::Clean => clean_dist(ctx).map(|()| Outcome::Built(vec![])),
            Task::Assemble => assemble(ctx).map(Outcome::Built),
        }
    }

    /// Run tasks in order, stopping at the first failure.
    pub fn sequence(&self, tasks: &[Task]) -> BuildResult {
        let start = Instant::now();
        let mut result = BuildResult::new();

        for &task in tasks {
            let task_result = self.run(task);
            let failed = task_result.status.is_failure();
            result.add_result(task_result);
            if failed {
                break;
            }
        }

        result.with_duration(start.elapsed())
    }

    /// Clean, optimize images, assemble. Strictly sequential.
    pub fn release(&self) -> BuildResult {
        self.sequence(&Task::RELEASE)
    }
}

/// Run the develop-mode builders concurrently on the blocking pool.
pub async fn initial_builds(runner: Arc<TaskRunner>) -> Vec<TaskResult> {
    let mut set = JoinSet::new();
    for task in Task::DEVELOP {
        let runner = runner.clone();
        set.spawn_blocking(move || runner.run(task));
    }

    let mut results = Vec::with_capacity(Task::DEVELOP.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!("builder task panicked: {}", e),
        }
    }
    results.sort_by_key(|r| r.task);
    results
}

/// Serve the source root with live reload until `cancel` fires.
pub async fn run_server(
    ctx: &BuildContext,
    hub: LiveReload,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let server = &ctx.config().server;
    server::serve(&server.host, server.port, ctx.src_dir(), hub, cancel).await
}

/// Watch the source root, rebuilding and reloading until `cancel` fires.
///
/// Each rebuild runs on the blocking pool; the next batch waits for it.
pub async fn run_watcher(
    runner: Arc<TaskRunner>,
    hub: Option<LiveReload>,
    cancel: CancellationToken,
) -> Result<(), WatchError> {
    let ctx = runner.context.clone();
    watch::watch(&ctx, cancel, move |action| {
        let runner = runner.clone();
        let hub = hub.clone();
        async move {
            match action {
                Action::Run(task) => {
                    if let Err(e) = tokio::task::spawn_blocking(move || runner.run(task)).await {
                        tracing::error!("builder task panicked: {}", e);
                    }
                }
                Action::Reload => {
                    if let Some(hub) = hub {
                        hub.reload();
                    }
                }
            }
        }
    })
    .await
}

/// Develop mode: initial builds, dev server and watcher, all concurrent.
///
/// Returns once `cancel` fires. If the server or the watcher fails the
/// token is cancelled so the other side stops too.
pub async fn develop(
    runner: Arc<TaskRunner>,
    hub: LiveReload,
    cancel: CancellationToken,
) -> Result<(), DevelopError> {
    let ctx = runner.context.clone();

    let server = {
        let cancel = cancel.clone();
        let hub = hub.clone();
        async move {
            let result = run_server(&ctx, hub, cancel.clone()).await;
            if result.is_err() {
                cancel.cancel();
            }
            result
        }
    };

    let watcher = {
        let cancel = cancel.clone();
        let runner = runner.clone();
        async move {
            let result = run_watcher(runner, Some(hub), cancel.clone()).await;
            if result.is_err() {
                cancel.cancel();
            }
            result
        }
    };

    let (_, served, watched) = tokio::join!(initial_builds(runner), server, watcher);
    served?;
    watched?;
    Ok(())
}
