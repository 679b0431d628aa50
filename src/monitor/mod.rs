//! Watches a process by name and keeps closing the matching handle in every
//! instance of it.

pub mod reconciler;
pub mod status;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    error::Result, iter::SnapshotConfig, kernel::Kernel, object::AliasRule, target::TargetSpec,
    utils::enable_debug_privilege,
};
pub use reconciler::{MonitoredProcess, Reconciler};
pub use status::{StatusCategory, StatusEvent};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Time between discovery passes.
    pub poll_interval: Duration,

    /// Minimum time between two probes of the same process.
    pub probe_interval: Duration,

    pub snapshot: SnapshotConfig,

    /// `None` restricts matching to plain substring and equality checks.
    pub alias_rule: Option<AliasRule>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(300),
            probe_interval: Duration::from_millis(500),
            snapshot: SnapshotConfig::default(),
            alias_rule: Some(AliasRule::default()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    /// Cancellation was requested but the worker has not exited yet.
    Stopping,
}

/// A running worker and the flag that cancels it.
struct Session {
    cancel: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl Session {
    fn request_stop(&self) {
        self.cancel.store(true, Ordering::Release);
        self.worker.thread().unpark();
    }

    fn join(self) {
        self.request_stop();
        if self.worker.join().is_err() {
            tracing::warn!("monitor worker panicked");
        }
    }
}

/// Owns at most one monitoring session at a time.
///
/// Status events are delivered through `events`; a dropped receiver is
/// ignored. Dropping the monitor stops a running session.
pub struct Monitor<K: Kernel + 'static> {
    kernel: Arc<K>,
    config: MonitorConfig,
    events: Sender<StatusEvent>,
    session: Option<Session>,
}

impl<K: Kernel + 'static> Monitor<K> {
    pub fn new(kernel: Arc<K>, config: MonitorConfig, events: Sender<StatusEvent>) -> Self {
        Self {
            kernel,
            config,
            events,
            session: None,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> MonitorState {
        match &self.session {
            None => MonitorState::Idle,
            Some(session) if session.worker.is_finished() => MonitorState::Idle,
            Some(session) if session.cancel.load(Ordering::Acquire) => MonitorState::Stopping,
            Some(_) => MonitorState::Running,
        }
    }

    /// Starts watching `target` on a dedicated worker thread.
    ///
    /// Returns `Ok(false)` without doing anything if a session is already
    /// running. A finished or cancelled session is reaped first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WorkerSpawn`] if the thread cannot be created.
    pub fn start(&mut self, target: TargetSpec) -> Result<bool> {
        if self.state() == MonitorState::Running {
            return Ok(false);
        }
        if let Some(session) = self.session.take() {
            session.join();
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let worker = {
            let kernel = Arc::clone(&self.kernel);
            let config = self.config.clone();
            let events = self.events.clone();
            let cancel = Arc::clone(&cancel);

            thread::Builder::new()
                .name("handlecut-monitor".into())
                .spawn(move || run(&*kernel, &config, target, &cancel, &events))?
        };

        self.session = Some(Session { cancel, worker });
        Ok(true)
    }

    /// Asks the worker to stop without waiting for it.
    pub fn request_stop(&self) -> bool {
        match &self.session {
            Some(session) if !session.worker.is_finished() => {
                session.request_stop();
                true
            }
            _ => false,
        }
    }

    /// Stops the session and waits for the worker to emit its final status.
    ///
    /// Returns `false` if there was no session.
    pub fn stop(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                session.join();
                true
            }
            None => false,
        }
    }
}

impl<K: Kernel + 'static> Drop for Monitor<K> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<K: Kernel + ?Sized>(
    kernel: &K,
    config: &MonitorConfig,
    target: TargetSpec,
    cancel: &AtomicBool,
    events: &Sender<StatusEvent>,
) {
    let emit = |event: StatusEvent| {
        tracing::info!(category = ?event.category(), "{event}");
        if events.send(event).is_err() {
            tracing::debug!("status receiver dropped");
        }
    };

    if !cancel.load(Ordering::Acquire) && !enable_debug_privilege(kernel) {
        tracing::warn!("SeDebugPrivilege unavailable, protected processes will be skipped");
    }

    emit(StatusEvent::Started {
        process: target.process().to_owned(),
        pattern: target.pattern().to_owned(),
    });

    let started = Instant::now();
    let mut reconciler = Reconciler::new(kernel, target, config);

    while !cancel.load(Ordering::Acquire) {
        reconciler.cycle(started.elapsed(), cancel, emit);
        wait(config.poll_interval, cancel);
    }

    emit(StatusEvent::Stopped);
}

/// Sleeps for `duration` or until `cancel` is set and the thread unparked.
fn wait(duration: Duration, cancel: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !cancel.load(Ordering::Acquire) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::park_timeout(remaining);
    }
}
