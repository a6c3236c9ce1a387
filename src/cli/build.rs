//! Task, release and long-running command implementations

use std::process::ExitCode;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{develop, run_server, run_watcher, BuildContext, BuildResult, Task, TaskRunner};
use crate::server::LiveReload;

fn report(result: &BuildResult) -> ExitCode {
    if result.is_success() {
        println!("{}", result.summary());
        ExitCode::from(EXIT_SUCCESS)
    } else {
        eprintln!("{}", result.summary());
        ExitCode::from(EXIT_ERROR)
    }
}

/// Run a single task
pub fn run_task(ctx: BuildContext, task: Task) -> ExitCode {
    report(&TaskRunner::new(ctx).sequence(&[task]))
}

/// Run the release sequence
pub fn run_release(ctx: BuildContext) -> ExitCode {
    report(&TaskRunner::new(ctx).release())
}

fn runtime() -> Option<Runtime> {
    match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => Some(rt),
        Err(e) => {
            tracing::error!("failed to start runtime: {}", e);
            None
        }
    }
}

/// Cancel `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("stopping");
            token.cancel();
        }
    });
}

fn exit_with<E: std::fmt::Display>(result: Result<(), E>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run develop mode until Ctrl+C
pub fn run_dev(ctx: BuildContext) -> ExitCode {
    let Some(rt) = runtime() else {
        return ExitCode::from(EXIT_ERROR);
    };
    let hub = LiveReload::new(ctx.src_dir());
    let runner = Arc::new(TaskRunner::new(ctx).with_live_reload(hub.clone()));
    let cancel = CancellationToken::new();

    exit_with(rt.block_on(async {
        cancel_on_ctrl_c(cancel.clone());
        develop(runner, hub, cancel).await
    }))
}

/// Run the dev server until Ctrl+C
pub fn run_serve(ctx: BuildContext) -> ExitCode {
    let Some(rt) = runtime() else {
        return ExitCode::from(EXIT_ERROR);
    };
    let hub = LiveReload::new(ctx.src_dir());
    let cancel = CancellationToken::new();

    exit_with(rt.block_on(async {
        cancel_on_ctrl_c(cancel.clone());
        run_server(&ctx, hub, cancel).await
    }))
}

/// Rebuild on change until Ctrl+C
pub fn run_watch(ctx: BuildContext) -> ExitCode {
    let Some(rt) = runtime() else {
        return ExitCode::from(EXIT_ERROR);
    };
    let runner = Arc::new(TaskRunner::new(ctx));
    let cancel = CancellationToken::new();

    exit_with(rt.block_on(async {
        cancel_on_ctrl_c(cancel.clone());
        run_watcher(runner, None, cancel).await
    }))
}
