use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crate::{
    iter::{RecordSchema, SnapshotConfig, find_pids_by_name},
    kernel::{Kernel, ProcessAccess},
    monitor::{MonitorConfig, StatusEvent},
    object::{NameMatcher, try_close_matching_handle},
    target::TargetSpec,
    utils::SafeHandle,
};

/// Tracking state for one live instance of the watched process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitoredProcess {
    instance: u32,
    last_check: Option<Duration>,
    handle_closed: bool,
}

impl MonitoredProcess {
    /// Session-wide number, assigned in discovery order and never reused.
    pub fn instance(&self) -> u32 {
        self.instance
    }

    /// Session time of the last probe; `None` until the first one.
    pub fn last_check(&self) -> Option<Duration> {
        self.last_check
    }

    pub fn handle_closed(&self) -> bool {
        self.handle_closed
    }
}

/// The per-cycle state machine behind a monitoring session.
///
/// Time is passed in by the caller as an offset from the session start, so a
/// cycle never reads the clock itself.
pub struct Reconciler<'k, K: Kernel + ?Sized> {
    kernel: &'k K,
    target: TargetSpec,
    matcher: NameMatcher,
    snapshot: SnapshotConfig,
    probe_interval: Duration,
    tracked: HashMap<u32, MonitoredProcess>,
    last_instance: u32,
    wide_pid_warned: bool,
}

impl<'k, K: Kernel + ?Sized> Reconciler<'k, K> {
    pub fn new(kernel: &'k K, target: TargetSpec, config: &MonitorConfig) -> Self {
        let matcher = NameMatcher::new(target.pattern(), config.alias_rule.clone());
        Self {
            kernel,
            target,
            matcher,
            snapshot: config.snapshot,
            probe_interval: config.probe_interval,
            tracked: HashMap::new(),
            last_instance: 0,
            wide_pid_warned: false,
        }
    }

    pub fn process(&self, pid: u32) -> Option<&MonitoredProcess> {
        self.tracked.get(&pid)
    }

    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    /// Runs one discovery and probe pass.
    ///
    /// `cancel` is checked before discovery and before every probe; once it
    /// is set nothing further touches the kernel. A failed discovery leaves
    /// the tracking state as it was.
    pub fn cycle(&mut self, now: Duration, cancel: &AtomicBool, mut emit: impl FnMut(StatusEvent)) {
        if cancel.load(Ordering::Acquire) {
            return;
        }

        let pids = match find_pids_by_name(self.kernel, self.target.process()) {
            Ok(pids) => pids,
            Err(err) => {
                tracing::debug!(error = %err, "process discovery failed");
                return;
            }
        };

        for &pid in &pids {
            if !self.tracked.contains_key(&pid) {
                self.last_instance += 1;
                tracing::debug!(pid, instance = self.last_instance, "tracking process");
                self.warn_on_wide_pid(pid);
                self.tracked.insert(
                    pid,
                    MonitoredProcess {
                        instance: self.last_instance,
                        last_check: None,
                        handle_closed: false,
                    },
                );
            }
        }

        for &pid in &pids {
            if cancel.load(Ordering::Acquire) {
                return;
            }

            let Some(state) = self.tracked.get_mut(&pid) else {
                continue;
            };
            if state
                .last_check
                .is_some_and(|last| now.saturating_sub(last) < self.probe_interval)
            {
                continue;
            }
            state.last_check = Some(now);

            if !is_alive(self.kernel, pid) {
                continue;
            }

            let closed = try_close_matching_handle(self.kernel, &self.snapshot, pid, &self.matcher);
            if closed && !state.handle_closed {
                state.handle_closed = true;
                emit(StatusEvent::HandleClosed {
                    process: self.target.process().to_owned(),
                    instance: state.instance,
                    pid,
                });
            }
        }

        self.tracked.retain(|pid, state| {
            let present = pids.contains(pid);
            if !present {
                tracing::debug!(pid, instance = state.instance, "process exited");
            }
            present
        });
    }

    /// Legacy records keep 16 bits of the pid, so larger pids never match.
    fn warn_on_wide_pid(&mut self, pid: u32) {
        if self.wide_pid_warned
            || self.snapshot.schema != RecordSchema::LEGACY
            || pid <= u32::from(u16::MAX)
        {
            return;
        }
        self.wide_pid_warned = true;
        tracing::warn!(
            pid,
            "process id does not fit the legacy handle table, use extended records"
        );
    }
}

fn is_alive<K: Kernel + ?Sized>(kernel: &K, pid: u32) -> bool {
    SafeHandle::open_process(kernel, pid, ProcessAccess::QUERY_LIMITED_INFORMATION).is_ok()
}

#[cfg(test)]
mod tests {
    use std::{sync::atomic::AtomicBool, time::Duration};

    use super::Reconciler;
    use crate::{
        iter::{RecordSchema, SnapshotConfig},
        kernel::fake::FakeKernel,
        monitor::{MonitorConfig, StatusEvent},
        target::TargetSpec,
    };
    use pretty_assertions::assert_eq;

    fn config() -> MonitorConfig {
        MonitorConfig {
            snapshot: SnapshotConfig {
                initial_size: 4096,
                headroom: 4096,
                ..SnapshotConfig::default()
            },
            ..MonitorConfig::default()
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn target(process: &str) -> TargetSpec {
        TargetSpec::new(process, "lockfile").expect("target should be valid")
    }

    #[test]
    fn instances_follow_discovery_order() {
        let kernel = FakeKernel::new();
        kernel.add_process(30, "Target.exe");
        kernel.add_process(5, "Other.exe");
        kernel.add_process(10, "target.exe");
        kernel.add_process(20, "TARGET");

        let cancel = AtomicBool::new(false);
        let mut reconciler = Reconciler::new(&kernel, target("Target"), &config());
        reconciler.cycle(ms(0), &cancel, |_| {});

        let instance = |reconciler: &Reconciler<'_, FakeKernel>, pid| {
            reconciler.process(pid).map(|state| state.instance())
        };
        assert_eq!(reconciler.tracked_len(), 3);
        assert_eq!(instance(&reconciler, 30), Some(1));
        assert_eq!(instance(&reconciler, 10), Some(2));
        assert_eq!(instance(&reconciler, 20), Some(3));
        assert_eq!(instance(&reconciler, 5), None);

        kernel.remove_process(10);
        reconciler.cycle(ms(300), &cancel, |_| {});
        assert_eq!(instance(&reconciler, 10), None);

        // the system hands the pid out again
        kernel.add_process(10, "Target.exe");
        reconciler.cycle(ms(600), &cancel, |_| {});
        assert_eq!(instance(&reconciler, 10), Some(4));
        assert_eq!(instance(&reconciler, 30), Some(1));
    }

    #[test]
    fn probes_are_rate_limited() {
        let kernel = FakeKernel::new();
        kernel.add_process(100, "App.exe");

        let cancel = AtomicBool::new(false);
        let mut reconciler = Reconciler::new(&kernel, target("App"), &config());
        let last_check = |reconciler: &Reconciler<'_, FakeKernel>| {
            reconciler.process(100).and_then(|state| state.last_check())
        };

        reconciler.cycle(ms(0), &cancel, |_| {});
        assert_eq!(last_check(&reconciler), Some(ms(0)));

        reconciler.cycle(ms(300), &cancel, |_| {});
        assert_eq!(last_check(&reconciler), Some(ms(0)));

        reconciler.cycle(ms(499), &cancel, |_| {});
        assert_eq!(last_check(&reconciler), Some(ms(0)));

        reconciler.cycle(ms(600), &cancel, |_| {});
        assert_eq!(last_check(&reconciler), Some(ms(600)));
    }

    #[test]
    fn closed_event_fires_once_per_instance() {
        let kernel = FakeKernel::new();
        kernel.add_process(100, "App.exe");
        kernel.add_handle(100, 0x8, Some("\\Device\\NamedPipe\\x"));
        kernel.add_handle(100, 0xC, Some("\\BaseNamedObjects\\lockfile"));

        let cancel = AtomicBool::new(false);
        let mut reconciler = Reconciler::new(&kernel, target("App"), &config());
        let mut events = Vec::new();

        reconciler.cycle(ms(0), &cancel, |event| events.push(event));
        assert_eq!(
            events,
            vec![StatusEvent::HandleClosed {
                process: "App".into(),
                instance: 1,
                pid: 100,
            }]
        );
        assert_eq!(kernel.closed_remote_handles(), vec![(100, 0xC)]);

        // the application recreates its handle and it is closed again, silently
        kernel.add_handle(100, 0x10, Some("\\BaseNamedObjects\\lockfile"));
        reconciler.cycle(ms(600), &cancel, |event| events.push(event));
        assert_eq!(kernel.closed_remote_handles(), vec![(100, 0xC), (100, 0x10)]);
        assert_eq!(events.len(), 1);
        assert!(reconciler.process(100).is_some_and(|state| state.handle_closed()));

        assert!(kernel.remote_handle_open(100, 0x8));
        assert_eq!(kernel.open_local_handles(), 0);
        assert_eq!(kernel.invalid_closes(), 0);
        assert_eq!(kernel.allocations(), kernel.frees());
    }

    #[test]
    fn cancelled_cycle_touches_nothing() {
        let kernel = FakeKernel::new();
        kernel.add_process(100, "App.exe");
        kernel.add_handle(100, 0xC, Some("\\BaseNamedObjects\\lockfile"));

        let cancel = AtomicBool::new(true);
        let mut reconciler = Reconciler::new(&kernel, target("App"), &config());
        reconciler.cycle(ms(0), &cancel, |_| panic!("no events after cancellation"));

        assert_eq!(kernel.privileged_calls(), 0);
        assert_eq!(reconciler.tracked_len(), 0);
        assert!(kernel.remote_handle_open(100, 0xC));
    }

    #[test]
    fn failed_discovery_keeps_tracking_state() {
        let kernel = FakeKernel::new();
        kernel.add_process(100, "App.exe");

        let cancel = AtomicBool::new(false);
        let mut reconciler = Reconciler::new(&kernel, target("App"), &config());
        reconciler.cycle(ms(0), &cancel, |_| {});

        kernel.fail_process_listing(true);
        reconciler.cycle(ms(600), &cancel, |_| {});
        assert_eq!(reconciler.process(100).map(|state| state.instance()), Some(1));
        assert_eq!(reconciler.process(100).and_then(|state| state.last_check()), Some(ms(0)));
    }

    #[test]
    fn inaccessible_instance_is_still_tracked() {
        let kernel = FakeKernel::new();
        kernel.add_process(100, "App.exe");
        kernel.add_handle(100, 0xC, Some("\\BaseNamedObjects\\lockfile"));
        kernel.deny_access(100);

        let cancel = AtomicBool::new(false);
        let mut reconciler = Reconciler::new(&kernel, target("App"), &config());
        reconciler.cycle(ms(0), &cancel, |_| panic!("nothing can be closed"));

        assert_eq!(reconciler.process(100).and_then(|state| state.last_check()), Some(ms(0)));
        assert!(kernel.remote_handle_open(100, 0xC));
    }

    #[test]
    fn wide_pids_need_extended_records() {
        let kernel = FakeKernel::new();
        kernel.add_process(70_000, "App.exe");
        kernel.add_handle(70_000, 0xC, Some("\\BaseNamedObjects\\lockfile"));

        let cancel = AtomicBool::new(false);
        let mut reconciler = Reconciler::new(&kernel, target("App"), &config());
        reconciler.cycle(ms(0), &cancel, |_| panic!("legacy records cannot match this pid"));
        assert!(reconciler.wide_pid_warned);
        assert!(kernel.remote_handle_open(70_000, 0xC));

        let extended = MonitorConfig {
            snapshot: SnapshotConfig {
                schema: RecordSchema::EXTENDED,
                ..config().snapshot
            },
            ..config()
        };
        let mut reconciler = Reconciler::new(&kernel, target("App"), &extended);
        let mut events = Vec::new();
        reconciler.cycle(ms(0), &cancel, |event| events.push(event));
        assert!(!reconciler.wide_pid_warned);
        assert_eq!(kernel.closed_remote_handles(), vec![(70_000, 0xC)]);
        assert_eq!(events.len(), 1);
    }
}
