//! Watch/rebuild coordination.
//!
//! Each watch group owns one worker task fed by a single-slot channel. A source
//! change fills the slot; while the worker is busy, further changes find the
//! slot full and are dropped, so edits during a rebuild coalesce into at most
//! one rerun and a group never runs twice at once. Groups run independently
//! of each other.
//!
//! Reloads are driven by a second watcher on the output directory rather than
//! by task completion, so anything that lands in the output refreshes the
//! browser. While any group is mid-sequence those reloads are held back: a
//! sequence that cleans before it regenerates would otherwise reload onto
//! missing pages.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::RecursiveMode;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use kiln_build::{PipelineConfig, Task, TaskRunner};

use crate::groups::{relative_path, shallow_source_dirs, source_dirs, GroupKind, WatchGroups};
use crate::livereload::{reload, ReloadHub};
use crate::server::ServerError;
use crate::watcher::{FileWatcher, WatchEvent};

/// How long output changes are collected before one reload is sent.
pub const RELOAD_SETTLE: Duration = Duration::from_millis(100);

/// Wires source watchers to rebuild tasks and output watchers to reloads.
pub struct Coordinator {
    runner: Arc<dyn TaskRunner>,
    hub: ReloadHub,
    groups: Arc<WatchGroups>,
    root: PathBuf,
    source_dirs: Vec<PathBuf>,
    shallow_dirs: Vec<PathBuf>,
    output_dir: PathBuf,
    in_flight: InFlight,
}

/// Running coordinator. Dropping it does not stop the spawned tasks.
pub struct CoordinatorHandle {
    pub tasks: Vec<JoinHandle<()>>,
}

/// Count of group sequences currently running.
#[derive(Clone)]
pub struct InFlight {
    count: Arc<watch::Sender<usize>>,
}

impl InFlight {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
        }
    }

    /// Mark a sequence as running until the guard drops.
    pub fn enter(&self) -> InFlightGuard {
        self.count.send_modify(|n| *n += 1);
        InFlightGuard {
            count: Arc::clone(&self.count),
        }
    }

    pub fn is_idle(&self) -> bool {
        *self.count.borrow() == 0
    }

    /// Resolve once no sequence is running.
    pub async fn idle(&self) {
        let mut rx = self.count.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for InFlight {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InFlightGuard {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n -= 1);
    }
}

impl Coordinator {
    /// Create a coordinator for a pipeline configuration.
    ///
    /// `root` is the directory relative paths in `config` are resolved
    /// against.
    pub fn new(
        runner: Arc<dyn TaskRunner>,
        hub: ReloadHub,
        config: &PipelineConfig,
        root: &Path,
    ) -> Result<Self, ServerError> {
        let root = root
            .canonicalize()
            .map_err(|e| ServerError::WatchError(format!("{}: {}", root.display(), e)))?;

        let groups = WatchGroups::from_config(config, &root)?;

        Ok(Self {
            runner,
            hub,
            groups: Arc::new(groups),
            source_dirs: source_dirs(config)
                .into_iter()
                .map(|d| root.join(d))
                .collect(),
            shallow_dirs: shallow_source_dirs(config)
                .into_iter()
                .map(|d| root.join(d))
                .collect(),
            output_dir: root.join(&config.output_dir),
            in_flight: InFlight::new(),
            root,
        })
    }

    /// Start watching. Must be called inside a tokio runtime.
    pub fn start(self) -> Result<CoordinatorHandle, ServerError> {
        let mut tasks = Vec::new();
        let mut workers = HashMap::new();

        for group in self.groups.iter() {
            let (tx, handle) = spawn_group_worker(
                group.kind(),
                group.tasks().to_vec(),
                Arc::clone(&self.runner),
                self.in_flight.clone(),
            );
            workers.insert(group.kind(), tx);
            tasks.push(handle);
        }

        let (mut source_watcher, source_rx) = FileWatcher::new(&self.source_dirs)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;
        for dir in &self.shallow_dirs {
            source_watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| ServerError::WatchError(e.to_string()))?;
        }

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| ServerError::WatchError(format!("{}: {}", self.output_dir.display(), e)))?;
        let (output_watcher, output_rx) = FileWatcher::new(std::slice::from_ref(&self.output_dir))
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let groups = Arc::clone(&self.groups);
        let root = self.root.clone();
        tasks.push(tokio::spawn(async move {
            dispatch_sources(source_rx, &groups, &root, &workers).await;
            // Keep watcher alive
            drop(source_watcher);
        }));

        let groups = Arc::clone(&self.groups);
        let root = self.root;
        let hub = self.hub;
        let in_flight = self.in_flight;
        tasks.push(tokio::spawn(async move {
            forward_reloads(output_rx, &groups, &root, &hub, &in_flight).await;
            drop(output_watcher);
        }));

        tracing::info!("Watching {} source groups", self.groups.iter().count());

        Ok(CoordinatorHandle { tasks })
    }
}

/// Spawn the worker for one group. Returns the trigger sender and the task.
pub fn spawn_group_worker(
    kind: GroupKind,
    tasks: Vec<Task>,
    runner: Arc<dyn TaskRunner>,
    in_flight: InFlight,
) -> (mpsc::Sender<()>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        while rx.recv().await.is_some() {
            let _running = in_flight.enter();
            run_sequence(&runner, kind, &tasks).await;
        }
    });

    (tx, handle)
}

/// Run a group's tasks in order on the blocking pool.
///
/// A failure is sent to the runner's notifier and ends the sequence; it never
/// propagates. Returns whether every task succeeded.
pub async fn run_sequence(runner: &Arc<dyn TaskRunner>, kind: GroupKind, tasks: &[Task]) -> bool {
    tracing::info!("Change in {}, rebuilding", kind);

    for &task in tasks {
        let task_runner = Arc::clone(runner);
        let outcome = tokio::task::spawn_blocking(move || task_runner.run_task(task)).await;

        let message = match outcome {
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("task did not complete: {}", e),
        };

        runner.notifier().notify(task.name(), &message);
        return false;
    }

    true
}

/// Route source events to group workers.
async fn dispatch_sources(
    mut rx: mpsc::Receiver<WatchEvent>,
    groups: &WatchGroups,
    root: &Path,
    workers: &HashMap<GroupKind, mpsc::Sender<()>>,
) {
    while let Some(event) = rx.recv().await {
        let rel = relative_path(root, event.path());

        for kind in groups.route(&rel) {
            tracing::debug!("{} -> {}", rel, kind);
            if let Some(tx) = workers.get(&kind) {
                // Full means a rerun is already pending
                let _ = tx.try_send(());
            }
        }
    }
}

/// Turn output changes into reloads, one per settle window. A window only
/// closes once no group sequence is running.
pub async fn forward_reloads(
    mut rx: mpsc::Receiver<WatchEvent>,
    groups: &WatchGroups,
    root: &Path,
    hub: &ReloadHub,
    in_flight: &InFlight,
) {
    while let Some(event) = rx.recv().await {
        if !groups.triggers_reload(&relative_path(root, event.path())) {
            continue;
        }

        loop {
            tokio::time::sleep(RELOAD_SETTLE).await;
            if in_flight.is_idle() {
                break;
            }
            in_flight.idle().await;
        }
        while rx.try_recv().is_ok() {}

        reload(hub);
    }
}
