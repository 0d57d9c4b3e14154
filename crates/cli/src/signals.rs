#![forbid(unsafe_code)]

use orchestrator::ControlEvent;
use std::io;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// SIGHUP: new module parameters were published.
    ParametersChanged,
    /// SIGUSR1
    DumpStatus,
    /// SIGUSR2
    Degrade,
    /// SIGINT or SIGTERM
    Shutdown,
}

impl SignalEvent {
    /// The scheduler request this signal stands for. `None` for shutdown,
    /// which is handled by cancelling the scheduler.
    pub fn control_event(self) -> Option<ControlEvent> {
        match self {
            Self::ParametersChanged => Some(ControlEvent::ParametersChanged),
            Self::DumpStatus => Some(ControlEvent::DumpStatus),
            Self::Degrade => Some(ControlEvent::Degrade),
            Self::Shutdown => None,
        }
    }
}

/// Forward process signals as [`SignalEvent`]s until the receiver goes away.
pub async fn wait_for_signal(tx: UnboundedSender<SignalEvent>) -> io::Result<()> {
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sigusr2 = signal(SignalKind::user_defined2())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    debug!("signal handlers installed");

    loop {
        let event = tokio::select! {
            _ = sighup.recv() => SignalEvent::ParametersChanged,
            _ = sigusr1.recv() => SignalEvent::DumpStatus,
            _ = sigusr2.recv() => SignalEvent::Degrade,
            _ = sigint.recv() => SignalEvent::Shutdown,
            _ = sigterm.recv() => SignalEvent::Shutdown,
        };
        if tx.send(event).is_err() {
            return Ok(());
        }
    }
}
