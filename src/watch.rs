//! Watch mode: map source changes to builder runs.
//!
//! A [`WatchTable`] is built once from the configuration. Debounced batches
//! of changed paths are turned into a de-duplicated list of [`Action`]s, so a
//! batch touching ten stylesheets still triggers one style build.

use crate::build::{BuildContext, Task};
use glob::{MatchOptions, Pattern};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind, Debouncer};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    #[error("failed to watch path: {0}")]
    WatchPath(#[source] notify::Error),
    #[error("source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("invalid watch glob '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// What to do about a batch of changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Run a builder
    Run(Task),
    /// Tell browsers to reload the page
    Reload,
}

/// One row of the watch table.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub include: Vec<Pattern>,
    pub exclude: Vec<Pattern>,
    pub action: Action,
}

impl Subscription {
    fn new(include: &[String], exclude: &[String], action: Action) -> Result<Self, WatchError> {
        Ok(Self { include: compile(include)?, exclude: compile(exclude)?, action })
    }

    /// Whether a source-relative path triggers this subscription.
    pub fn matches(&self, relative: &Path) -> bool {
        let options = MatchOptions { require_literal_separator: true, ..MatchOptions::new() };
        self.include.iter().any(|p| p.matches_path_with(relative, options))
            && !self.exclude.iter().any(|p| p.matches_path_with(relative, options))
    }
}

fn compile(globs: &[String]) -> Result<Vec<Pattern>, WatchError> {
    globs
        .iter()
        .map(|g| {
            Pattern::new(g).map_err(|source| WatchError::Pattern { pattern: g.clone(), source })
        })
        .collect()
}

/// Escaped glob for a path relative to the source root, with `/` separators.
fn source_glob(ctx: &BuildContext, path: &Path) -> String {
    let absolute = ctx.resolve_src(path);
    let relative = ctx.relative_to_src(&absolute).unwrap_or(path);
    Pattern::escape(&relative.to_string_lossy().replace('\\', "/"))
}

/// Subscriptions from source globs to actions.
#[derive(Debug, Clone)]
pub struct WatchTable {
    root: PathBuf,
    canonical_root: Option<PathBuf>,
    subscriptions: Vec<Subscription>,
}

impl WatchTable {
    pub fn new(root: impl Into<PathBuf>, subscriptions: Vec<Subscription>) -> Self {
        let root = root.into();
        let canonical_root = root.canonicalize().ok();
        Self { root, canonical_root, subscriptions }
    }

    /// Build the table for a project.
    ///
    /// The script bundle output is always excluded from the script globs so
    /// that writing the bundle never retriggers the bundler.
    pub fn from_context(ctx: &BuildContext) -> Result<Self, WatchError> {
        let config = ctx.config();
        let icons = format!("{}/*.svg", source_glob(ctx, &config.sprite.icons));
        let bundle = source_glob(ctx, &config.scripts.output);

        let subscriptions = vec![
            Subscription::new(&config.styles.watch, &[], Action::Run(Task::Styles))?,
            Subscription::new(&[icons], &[], Action::Run(Task::Sprite))?,
            Subscription::new(&config.scripts.watch, &[bundle], Action::Run(Task::Scripts))?,
            Subscription::new(&config.watch.markup, &[], Action::Reload)?,
        ];
        Ok(Self::new(ctx.src_dir(), subscriptions))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root)
            .ok()
            .or_else(|| self.canonical_root.as_ref().and_then(|r| path.strip_prefix(r).ok()))
    }

    /// Actions triggered by a batch of changed paths, in table order, each at
    /// most once. Paths outside the source root are ignored.
    pub fn actions_for(&self, paths: &[PathBuf]) -> Vec<Action> {
        let relative: Vec<&Path> = paths.iter().filter_map(|p| self.relative(p)).collect();
        self.subscriptions
            .iter()
            .filter(|s| relative.iter().any(|p| s.matches(p)))
            .map(|s| s.action)
            .collect()
    }
}

/// Feed path batches through the table until the channel closes or `cancel` fires.
pub async fn drive<F, Fut>(
    table: &WatchTable,
    mut batches: mpsc::UnboundedReceiver<Vec<PathBuf>>,
    cancel: CancellationToken,
    mut on_action: F,
) where
    F: FnMut(Action) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = batches.recv() => batch,
        };
        let Some(paths) = batch else {
            break;
        };

        for path in &paths {
            if let Some(name) = path.file_name() {
                tracing::debug!("changed: {}", name.to_string_lossy());
            }
        }
        for action in table.actions_for(&paths) {
            on_action(action).await;
        }
    }
    tracing::debug!("watch loop stopped");
}

/// Start a debounced recursive watcher on `src_dir`.
///
/// Changed paths arrive on the returned channel, one batch per debounce
/// window. The watcher stops when the returned [`Debouncer`] is dropped.
pub fn spawn_watcher(
    src_dir: &Path,
    debounce: Duration,
) -> Result<(Debouncer<RecommendedWatcher>, mpsc::UnboundedReceiver<Vec<PathBuf>>), WatchError> {
    if !src_dir.is_dir() {
        return Err(WatchError::SourceNotFound(src_dir.to_path_buf()));
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| match result {
        Ok(events) => {
            let paths: Vec<PathBuf> = events
                .into_iter()
                .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                .map(|e| e.path)
                .collect();
            if !paths.is_empty() {
                // Receiver gone means the loop has stopped.
                let _ = tx.send(paths);
            }
        }
        Err(error) => tracing::warn!("watch error: {:?}", error),
    })
    .map_err(WatchError::WatcherInit)?;

    debouncer.watcher().watch(src_dir, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;

    Ok((debouncer, rx))
}

/// Watch the project's source root and dispatch actions until `cancel` fires.
pub async fn watch<F, Fut>(
    ctx: &BuildContext,
    cancel: CancellationToken,
    on_action: F,
) -> Result<(), WatchError>
where
    F: FnMut(Action) -> Fut,
    Fut: Future<Output = ()>,
{
    let table = WatchTable::from_context(ctx)?;
    let debounce = Duration::from_millis(u64::from(ctx.config().watch.debounce_ms));
    let (_debouncer, batches) = spawn_watcher(table.root(), debounce)?;

    tracing::info!("watching {} for changes", table.root().display());
    drive(&table, batches, cancel, on_action).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::sync::{Arc, Mutex};

    fn table() -> WatchTable {
        let ctx = BuildContext::new(default_config(), PathBuf::from("/project"));
        WatchTable::from_context(&ctx).unwrap()
    }

    fn src(relative: &str) -> PathBuf {
        Path::new("/project/app").join(relative)
    }

    #[test]
    fn test_table_rows() {
        let table = table();
        let actions: Vec<_> = table.subscriptions().iter().map(|s| s.action).collect();
        assert_eq!(
            actions,
            vec![
                Action::Run(Task::Styles),
                Action::Run(Task::Sprite),
                Action::Run(Task::Scripts),
                Action::Reload
            ]
        );
        assert_eq!(table.subscriptions()[1].include[0].as_str(), "images/icons/*.svg");
        assert_eq!(table.subscriptions()[2].exclude[0].as_str(), "js/main.min.js");
    }

    #[test]
    fn test_script_change_runs_bundler_once() {
        let actions = table().actions_for(&[src("js/main.js"), src("js/lib/util.js")]);
        assert_eq!(actions, vec![Action::Run(Task::Scripts)]);
    }

    #[test]
    fn test_bundle_output_is_ignored() {
        assert!(table().actions_for(&[src("js/main.min.js")]).is_empty());
    }

    #[test]
    fn test_style_and_markup() {
        let actions = table().actions_for(&[
            src("scss/_vars.scss"),
            src("scss/style.scss"),
            src("index.html"),
            src("pages/about.html"),
        ]);
        assert_eq!(actions, vec![Action::Run(Task::Styles), Action::Reload]);
    }

    #[test]
    fn test_icons_not_nested() {
        let table = table();
        assert_eq!(table.actions_for(&[src("images/icons/arrow.svg")]), vec![Action::Run(Task::Sprite)]);
        assert!(table.actions_for(&[src("images/icons/old/arrow.svg")]).is_empty());
        assert!(table.actions_for(&[src("images/sprite.svg")]).is_empty());
    }

    #[test]
    fn test_generated_stylesheet_is_ignored() {
        assert!(table().actions_for(&[src("css/style.min.css")]).is_empty());
    }

    #[test]
    fn test_paths_outside_source_ignored() {
        assert!(table().actions_for(&[PathBuf::from("/project/dist/index.html")]).is_empty());
    }

    #[test]
    fn test_custom_script_globs_still_exclude_bundle() {
        let mut config = default_config();
        config.scripts.watch = vec!["**/*.js".to_string()];
        let ctx = BuildContext::new(config, PathBuf::from("/project"));
        let table = WatchTable::from_context(&ctx).unwrap();

        assert!(table.actions_for(&[src("js/main.min.js")]).is_empty());
        assert_eq!(table.actions_for(&[src("vendor/x.js")]), vec![Action::Run(Task::Scripts)]);
    }

    #[test]
    fn test_spawn_watcher_missing_source() {
        let err = spawn_watcher(Path::new("/nonexistent/assetline/src"), Duration::from_millis(10))
            .err()
            .unwrap();
        assert!(matches!(err, WatchError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_drive_dispatches_batches() {
        let table = table();
        let (tx, rx) = mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));

        tx.send(vec![src("js/main.js"), src("js/main.min.js")]).unwrap();
        tx.send(vec![src("index.html")]).unwrap();
        drop(tx);

        let sink = seen.clone();
        drive(&table, rx, CancellationToken::new(), move |action| {
            let sink = sink.clone();
            async move { sink.lock().unwrap().push(action) }
        })
        .await;

        assert_eq!(*seen.lock().unwrap(), vec![Action::Run(Task::Scripts), Action::Reload]);
    }

    #[tokio::test]
    async fn test_drive_stops_on_cancel() {
        let table = table();
        let (_tx, rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
        let cancel = CancellationToken::new();
        cancel.cancel();

        drive(&table, rx, cancel, |_| async {}).await;
    }

    #[tokio::test]
    async fn test_watch_runs_bundler_when_script_changes() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("app/js")).unwrap();
        std::fs::write(root.join("app/js/main.js"), "var a = 1;\n").unwrap();
        let mut config = default_config();
        config.watch.debounce_ms = 50;
        let ctx = BuildContext::new(config, root.clone());

        let (seen_tx, mut seen) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let watcher = tokio::spawn(async move {
            watch(&ctx, stop, move |action| {
                let seen_tx = seen_tx.clone();
                async move {
                    let _ = seen_tx.send(action);
                }
            })
            .await
        });

        // Let the watcher register before touching the file.
        tokio::time::sleep(Duration::from_millis(300)).await;
        std::fs::write(root.join("app/js/main.js"), "var a = 2;\n").unwrap();

        let first = tokio::time::timeout(Duration::from_secs(10), seen.recv()).await.unwrap();
        assert_eq!(first, Some(Action::Run(Task::Scripts)));

        cancel.cancel();
        watcher.await.unwrap().unwrap();
        while let Ok(action) = seen.try_recv() {
            assert_eq!(action, Action::Run(Task::Scripts));
        }
    }
}
