/// Refresh scheduler: the fetch → render → wait → fetch cycle.
///
/// The cycle runs on one worker thread that owns the `Dashboard`. The
/// outside world talks to it only through a command channel, which makes
/// cancellation explicit:
///
/// ```text
///   Idle ──select──▶ Fetching ──▶ Rendered ──▶ Waiting (N ticks) ──┐
///    ▲                  ▲                          │               │
///    └──clear───────────┴──────── select ──────────┘◀──elapsed─────┘
/// ```
///
/// - A new selection while `Waiting` abandons the countdown immediately.
/// - A new selection that arrives while `Fetching` discards the fetched view
///   unrendered and starts over for the new selection.
/// - Clearing the selection returns to `Idle`; `stop` ends the thread.

use crate::dashboard::{Dashboard, Selection};
use crate::config::DashboardConfig;
use crate::ingest::flood_api::FloodDataSource;
use crate::model::DashboardView;
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

// ---------------------------------------------------------------------------
// State and presenter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Fetching,
    Rendered,
    Waiting { remaining: u64, total: u64 },
    Stopped,
}

/// Receives the scheduler's output. Called on the worker thread.
pub trait Presenter: Send + 'static {
    fn render(&self, view: &DashboardView);

    /// Countdown tick while waiting for the next refresh.
    fn progress(&self, _remaining: u64, _total: u64) {}

    fn state_changed(&self, _state: SchedulerState) {}
}

/// Presenter that keeps the most recent view for other threads to read.
#[derive(Clone, Default)]
pub struct LatestView {
    view: Arc<Mutex<Option<DashboardView>>>,
}

impl LatestView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<DashboardView> {
        lock(&self.view).clone()
    }
}

impl Presenter for LatestView {
    fn render(&self, view: &DashboardView) {
        *lock(&self.view) = Some(view.clone());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Settings and commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub tick: Duration,
    pub interval_ticks: u64,
}

impl SchedulerSettings {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            tick: config.tick(),
            interval_ticks: config.interval_ticks(),
        }
    }
}

enum Command {
    Select(Selection),
    Stop,
}

/// Cheap, cloneable handle for driving a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: Sender<Command>,
    state: Arc<Mutex<SchedulerState>>,
}

impl SchedulerHandle {
    /// Change the selection and restart the cycle. Returns `false` if the
    /// scheduler has already stopped.
    pub fn select(&self, station: Option<String>, measure: Option<String>) -> bool {
        self.commands
            .send(Command::Select(Selection::new(station, measure)))
            .is_ok()
    }

    pub fn clear_selection(&self) -> bool {
        self.select(None, None)
    }

    pub fn state(&self) -> SchedulerState {
        *lock(&self.state)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct RefreshScheduler {
    handle: SchedulerHandle,
    worker: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Start the worker thread. It stays `Idle` until a station is selected.
    pub fn spawn<S, P>(dashboard: Dashboard<S>, presenter: P, settings: SchedulerSettings) -> Self
    where
        S: FloodDataSource + 'static,
        P: Presenter,
    {
        let (tx, rx) = mpsc::channel();
        let state = Arc::new(Mutex::new(SchedulerState::Idle));

        let worker_state = Arc::clone(&state);
        let worker = std::thread::Builder::new()
            .name("refresh-scheduler".to_string())
            .spawn(move || {
                let mut worker = Worker {
                    dashboard,
                    presenter,
                    settings,
                    commands: rx,
                    state: worker_state,
                };
                worker.run();
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn refresh scheduler thread");
                *lock(&state) = SchedulerState::Stopped;
                None
            }
        };

        Self {
            handle: SchedulerHandle {
                commands: tx,
                state,
            },
            worker,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn select(&self, station: Option<String>, measure: Option<String>) -> bool {
        self.handle.select(station, measure)
    }

    pub fn clear_selection(&self) -> bool {
        self.handle.clear_selection()
    }

    pub fn state(&self) -> SchedulerState {
        self.handle.state()
    }

    /// Stop the cycle and wait for the worker to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Block until the worker exits on its own (it never does unless stopped).
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("refresh scheduler thread panicked");
            }
        }
    }

    fn shutdown(&mut self) {
        let _ = self.handle.commands.send(Command::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("refresh scheduler thread panicked");
            }
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// What interrupted a fetch or a countdown.
enum Interrupt {
    Select(Selection),
    Stop,
}

struct Worker<S, P> {
    dashboard: Dashboard<S>,
    presenter: P,
    settings: SchedulerSettings,
    commands: Receiver<Command>,
    state: Arc<Mutex<SchedulerState>>,
}

impl<S: FloodDataSource, P: Presenter> Worker<S, P> {
    fn set_state(&self, state: SchedulerState) {
        *lock(&self.state) = state;
        self.presenter.state_changed(state);
    }

    fn run(&mut self) {
        loop {
            if self.dashboard.selection().is_empty() {
                self.set_state(SchedulerState::Idle);
                match self.commands.recv() {
                    Ok(Command::Select(selection)) => {
                        self.dashboard.select(selection);
                        continue;
                    }
                    Ok(Command::Stop) | Err(_) => break,
                }
            }

            self.set_state(SchedulerState::Fetching);
            let view = self.dashboard.refresh();

            match self.pending_interrupt() {
                Some(Interrupt::Stop) => break,
                Some(Interrupt::Select(selection)) => {
                    tracing::info!("selection changed during fetch; discarding stale view");
                    self.dashboard.select(selection);
                    continue;
                }
                None => {}
            }

            self.presenter.render(&view);
            self.set_state(SchedulerState::Rendered);

            match self.wait() {
                None => continue,
                Some(Interrupt::Select(selection)) => {
                    tracing::info!("selection changed while waiting; restarting cycle");
                    self.dashboard.select(selection);
                }
                Some(Interrupt::Stop) => break,
            }
        }

        self.set_state(SchedulerState::Stopped);
        tracing::info!("refresh scheduler stopped");
    }

    /// Drain queued commands without blocking. The latest selection wins;
    /// a stop request beats everything.
    fn pending_interrupt(&self) -> Option<Interrupt> {
        let mut latest = None;
        loop {
            match self.commands.try_recv() {
                Ok(Command::Select(selection)) => latest = Some(Interrupt::Select(selection)),
                Ok(Command::Stop) | Err(TryRecvError::Disconnected) => return Some(Interrupt::Stop),
                Err(TryRecvError::Empty) => return latest,
            }
        }
    }

    /// Count down one refresh interval, reporting each tick. Returns `None`
    /// when the interval elapses uninterrupted.
    fn wait(&self) -> Option<Interrupt> {
        let total = self.settings.interval_ticks;

        for elapsed in 0..total {
            let remaining = total - elapsed;
            self.set_state(SchedulerState::Waiting { remaining, total });
            self.presenter.progress(remaining, total);

            match self.commands.recv_timeout(self.settings.tick) {
                Ok(Command::Select(selection)) => {
                    return match self.pending_interrupt() {
                        Some(Interrupt::Stop) => Some(Interrupt::Stop),
                        Some(newer) => Some(newer),
                        None => Some(Interrupt::Select(selection)),
                    };
                }
                Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => {
                    return Some(Interrupt::Stop);
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        self.presenter.progress(0, total);
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
