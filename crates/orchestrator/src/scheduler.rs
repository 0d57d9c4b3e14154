#![forbid(unsafe_code)]

use crate::attach::{AgentArgs, AttachExecutor, AttachProvider, Layout};
use crate::clock::Clock;
use crate::control::Connector;
use crate::domain::{Dependency, Pid};
use crate::error::Error;
use crate::probe::{ProcessProbe, TargetFilter};
use crate::process::{
    Credentials, Decision, DefaultInjectionPolicy, InjectionPolicy, ManagedProcess, ProcessContext,
    module_parameters,
};
use crate::registry::{ProcessHandle, Registry, StoreOutcome};
use crate::report::{self, EventId, HeartBeat, ProcessSummary};
use config::Config;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Capacity of the queue between discovery and detail probing. A full queue
/// blocks the scan.
pub const WORK_QUEUE_CAPACITY: usize = 500;

/// Floor for configured intervals; a zero period would make the timers spin.
const MIN_INTERVAL: Duration = Duration::from_millis(100);

const RECONCILE_CONCURRENCY: usize = 8;
const REPORT_CONCURRENCY: usize = 16;

pub struct Services {
    pub probe: Arc<dyn ProcessProbe>,
    pub attacher: Arc<dyn AttachProvider>,
    pub connector: Arc<dyn Connector>,
    pub clock: Arc<dyn Clock>,
}

/// Operator requests delivered from outside the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// New module parameters are available; flush every agent.
    ParametersChanged,
    /// Degrade every healthy agent.
    Degrade,
    DumpStatus,
}

struct Shared {
    intervals: config::Scheduler,
    probe: Arc<dyn ProcessProbe>,
    filter: TargetFilter,
    registry: Registry,
    policy: Box<dyn InjectionPolicy>,
    ctx: ProcessContext,
    blacklist: Vec<String>,
}

/// Discovers target processes and drives each one's agent toward what the
/// policy asks for.
pub struct Scheduler {
    shared: Arc<Shared>,
    work_tx: mpsc::Sender<Pid>,
    work_rx: mpsc::Receiver<Pid>,
}

impl Scheduler {
    pub fn new(config: &Config, layout: Layout, services: Services) -> Self {
        let args = AgentArgs::new(&layout, &config.agent);
        let attach = AttachExecutor::new(services.attacher, Arc::clone(&services.probe), layout, args);
        let ctx = ProcessContext {
            attach,
            connector: services.connector,
            credentials: Credentials::new(&config.agent),
            degrade_keep: config.agent.degrade_keep.iter().cloned().collect(),
            parameters: module_parameters(&config.modules),
        };
        let (work_tx, work_rx) = mpsc::channel(WORK_QUEUE_CAPACITY);

        let shared = Shared {
            intervals: config.scheduler.clone(),
            probe: services.probe,
            filter: TargetFilter::new(config.attach.executable_suffix.clone()),
            registry: Registry::new(),
            policy: Box::new(DefaultInjectionPolicy::new(&config.agent, services.clock)),
            ctx,
            blacklist: config.agent.cmdline_blacklist.clone(),
        };

        Self {
            shared: Arc::new(shared),
            work_tx,
            work_rx,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// One discovery pass. Returns how many pids were queued.
    pub async fn scan_once(&self) -> usize {
        self.shared.scan_once(&self.work_tx).await
    }

    /// Remove entries whose process is gone.
    pub fn sweep_liveness(&self) -> Vec<Pid> {
        self.shared.sweep_liveness()
    }

    /// Build and store the record for one queued pid.
    pub fn track(&self, pid: Pid) -> Option<StoreOutcome> {
        self.shared.track(pid)
    }

    /// Drain the work queue without blocking. For driving the scheduler one
    /// step at a time; `run_until` consumes the queue itself.
    #[doc(hidden)]
    pub fn pending_work(&mut self) -> Vec<Pid> {
        let mut pids = Vec::new();
        while let Ok(pid) = self.work_rx.try_recv() {
            pids.push(pid);
        }
        pids
    }

    /// Drain the work queue and track every pid in it.
    #[doc(hidden)]
    pub fn track_pending(&mut self) -> Vec<(Pid, StoreOutcome)> {
        self.pending_work()
            .into_iter()
            .filter_map(|pid| self.track(pid).map(|outcome| (pid, outcome)))
            .collect()
    }

    /// One reconciliation pass over every tracked process.
    pub async fn reconcile_once(&self) {
        self.shared.reconcile_once().await;
    }

    pub async fn handle_control(&self, event: ControlEvent) {
        self.shared.handle_control(event).await;
    }

    /// Log one report per tracked process.
    pub fn log_report(&self) -> Vec<ProcessSummary> {
        self.shared.log_report()
    }

    pub fn heartbeat(&self) -> HeartBeat {
        self.shared.heartbeat()
    }

    pub async fn report_dependencies(&self) -> BTreeMap<Pid, Vec<Dependency>> {
        self.shared.report_dependencies().await
    }

    /// Run every loop until `cancel` fires, then wait for them to drain.
    pub async fn run_until(
        self,
        cancel: CancellationToken,
        control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    ) -> Result<(), Error> {
        let Self {
            shared,
            work_tx,
            work_rx,
        } = self;

        let mut loops = JoinSet::new();
        loops.spawn(discovery_loop(Arc::clone(&shared), work_tx, cancel.clone()));
        loops.spawn(reconciliation_loop(
            Arc::clone(&shared),
            work_rx,
            control_rx,
            cancel.clone(),
        ));
        loops.spawn(report_loop(shared, cancel.clone()));

        let mut result = Ok(());
        while let Some(joined) = loops.join_next().await {
            if let Err(err) = joined {
                warn!(%err, "scheduler loop aborted");
                cancel.cancel();
                result = Err(err.into());
            }
        }
        info!("scheduler stopped");
        result
    }
}

impl Shared {
    async fn scan_once(&self, work_tx: &mpsc::Sender<Pid>) -> usize {
        let mut queued = 0;
        for pid in self.probe.list_pids() {
            if !self.filter.is_target_executable(self.probe.as_ref(), pid) {
                continue;
            }
            if work_tx.send(pid).await.is_err() {
                break;
            }
            queued += 1;
        }
        trace!(queued, "scan finished");
        queued
    }

    fn sweep_liveness(&self) -> Vec<Pid> {
        let gone = self.registry.sweep(self.probe.as_ref());
        for pid in &gone {
            self.clean_run_dir(*pid);
        }
        gone
    }

    fn track(&self, pid: Pid) -> Option<StoreOutcome> {
        let details = self.probe.details(pid)?;
        if self.registry.is_tracked(pid, details.start_time) {
            return Some(StoreOutcome::AlreadyTracked);
        }
        let process = ManagedProcess::discover(pid, details, self.ctx.attach.layout(), &self.blacklist);
        Some(self.registry.store(process))
    }

    async fn reconcile_once(&self) {
        stream::iter(self.registry.handles())
            .for_each_concurrent(RECONCILE_CONCURRENCY, |(pid, handle)| self.reconcile(pid, handle))
            .await;
    }

    async fn reconcile(&self, pid: Pid, handle: ProcessHandle) {
        if !self.probe.exists(pid) {
            if self.registry.remove(pid).is_some() {
                info!(event_id = EventId::ProcessShutdown.code(), pid, "java process exited");
                self.clean_run_dir(pid);
            }
            return;
        }

        let mut process = handle.lock().await;
        match self.policy.decide(process.status(), process.is_blacklisted()) {
            Decision::Attach => {
                process.inject(&self.ctx).await;
            }
            Decision::Shutdown => {
                process.shutdown(&self.ctx).await;
            }
            Decision::Hold(reason) => {
                trace!(pid, status = %process.status(), ?reason, "no action");
            }
        }

        if process.pending_degrade() {
            process.degrade(&self.ctx).await;
        }
        process.apply_parameter_update(&self.ctx).await;
    }

    async fn handle_control(&self, event: ControlEvent) {
        info!(?event, "control event");
        match event {
            ControlEvent::ParametersChanged => {
                let mut marked = 0;
                for (_, handle) in self.registry.handles() {
                    if handle.lock().await.mark_parameters_changed() {
                        marked += 1;
                    }
                }
                info!(processes = marked, "parameter update queued");
            }
            ControlEvent::Degrade => {
                let mut marked = 0;
                for (_, handle) in self.registry.handles() {
                    if handle.lock().await.request_degrade() {
                        marked += 1;
                    }
                }
                info!(processes = marked, "degrade queued");
            }
            ControlEvent::DumpStatus => self.dump_status().await,
        }
    }

    async fn dump_status(&self) {
        for (pid, handle) in self.registry.handles() {
            let mut process = handle.lock().await;
            if let Err(err) = process.refresh_modules(&self.ctx).await {
                warn!(pid, %err, "failed to list agent modules");
            }
            info!(
                event_id = EventId::Watch.code(),
                pid,
                payload = %report::to_json(&process.summary()),
                "process status"
            );
        }
        info!(processes = self.registry.len(), "status dump finished");
    }

    fn log_report(&self) -> Vec<ProcessSummary> {
        let summaries = self.registry.summaries();
        for summary in &summaries {
            info!(
                event_id = EventId::Watch.code(),
                pid = summary.pid,
                status = %summary.status,
                payload = %report::to_json(summary),
                "process report"
            );
        }
        summaries
    }

    fn heartbeat(&self) -> HeartBeat {
        let mut heartbeat = HeartBeat::new();
        for summary in self.registry.summaries() {
            heartbeat.append(&summary);
        }
        info!(
            event_id = EventId::HeartBeat.code(),
            processes = heartbeat.processes.len(),
            payload = %report::to_json(&heartbeat),
            "heartbeat"
        );
        heartbeat
    }

    async fn report_dependencies(&self) -> BTreeMap<Pid, Vec<Dependency>> {
        let results: Vec<_> = stream::iter(self.registry.handles())
            .map(|(pid, handle)| async move {
                // A process busy attaching or flushing is picked up next round.
                let Ok(mut process) = handle.try_lock() else {
                    debug!(pid, "process busy, skipping dependency query");
                    return None;
                };
                if !process.status().is_serving() {
                    return None;
                }
                Some((pid, process.dependencies(&self.ctx).await))
            })
            .buffer_unordered(REPORT_CONCURRENCY)
            .collect()
            .await;

        let mut dependencies = BTreeMap::new();
        for (pid, result) in results.into_iter().flatten() {
            match result {
                Ok(found) => {
                    dependencies.insert(pid, found);
                }
                Err(err) => warn!(event_id = EventId::Dependency.code(), pid, %err, "dependency query failed"),
            }
        }

        if !dependencies.is_empty() {
            info!(
                event_id = EventId::Dependency.code(),
                processes = dependencies.len(),
                payload = %report::to_json(&dependencies),
                "dependency report"
            );
        }
        dependencies
    }

    /// Best effort removal of the agent's run directory.
    fn clean_run_dir(&self, pid: Pid) {
        let dir = self.ctx.attach.layout().run_dir(pid);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!(pid, ?dir, "run directory removed"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(pid, ?dir, %err, "failed to remove run directory"),
        }
    }
}

fn ticker(period: Duration, immediate: bool) -> Interval {
    let period = period.max(MIN_INTERVAL);
    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn discovery_loop(shared: Arc<Shared>, work_tx: mpsc::Sender<Pid>, cancel: CancellationToken) {
    let mut scan = ticker(shared.intervals.scan_interval, true);
    let mut liveness = ticker(shared.intervals.liveness_interval, false);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = scan.tick() => {
                if cancel.run_until_cancelled(shared.scan_once(&work_tx)).await.is_none() {
                    break;
                }
            }
            _ = liveness.tick() => {
                shared.sweep_liveness();
            }
        }
    }
    debug!("discovery loop stopped");
}

async fn reconciliation_loop(
    shared: Arc<Shared>,
    mut work_rx: mpsc::Receiver<Pid>,
    mut control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    cancel: CancellationToken,
) {
    let mut inject = ticker(shared.intervals.inject_interval, true);
    let mut builders = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(pid) = work_rx.recv() => {
                let shared = Arc::clone(&shared);
                builders.spawn_blocking(move || shared.track(pid));
            }
            Some(event) = control_rx.recv() => {
                if cancel.run_until_cancelled(shared.handle_control(event)).await.is_none() {
                    break;
                }
            }
            _ = inject.tick() => {
                if cancel.run_until_cancelled(shared.reconcile_once()).await.is_none() {
                    break;
                }
            }
            Some(joined) = builders.join_next(), if !builders.is_empty() => {
                if let Err(err) = joined {
                    warn!(%err, "process detail task failed");
                }
            }
        }
    }

    builders.shutdown().await;
    debug!("reconciliation loop stopped");
}

async fn report_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut log_report = ticker(shared.intervals.log_report_interval, false);
    let mut heartbeat = ticker(shared.intervals.heartbeat_interval, false);
    let mut dependency = ticker(shared.intervals.dependency_interval, false);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = log_report.tick() => {
                shared.log_report();
            }
            _ = heartbeat.tick() => {
                shared.heartbeat();
            }
            _ = dependency.tick() => {
                cancel.run_until_cancelled(shared.report_dependencies()).await;
            }
        }
    }
    debug!("report loop stopped");
}
