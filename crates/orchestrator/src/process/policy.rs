#![forbid(unsafe_code)]

use crate::clock::Clock;
use crate::domain::InjectionStatus;
use config::AgentMode;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// The mode asks for nothing to be done in this status.
    Mode(AgentMode),
    OutsideAttachHour { current: u32, allowed: u8 },
    Blacklisted,
    /// Exited and degraded agents are left alone.
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Attach,
    Shutdown,
    Hold(HoldReason),
}

pub trait InjectionPolicy: Send + Sync {
    /// Decide the corrective action for a process in `status`.
    fn decide(&self, status: InjectionStatus, blacklisted: bool) -> Decision;
}

#[derive(Clone)]
pub struct DefaultInjectionPolicy {
    mode: AgentMode,
    attach_hour: Option<u8>,
    clock: Arc<dyn Clock>,
}

impl DefaultInjectionPolicy {
    pub fn new(agent: &config::Agent, clock: Arc<dyn Clock>) -> Self {
        Self {
            mode: agent.mode,
            attach_hour: agent.attach_hour,
            clock,
        }
    }

    fn attach_allowed_now(&self) -> Result<(), HoldReason> {
        match self.attach_hour {
            None => Ok(()),
            Some(allowed) => {
                let current = self.clock.local_hour();
                if current == u32::from(allowed) {
                    Ok(())
                } else {
                    Err(HoldReason::OutsideAttachHour { current, allowed })
                }
            }
        }
    }
}

impl InjectionPolicy for DefaultInjectionPolicy {
    fn decide(&self, status: InjectionStatus, blacklisted: bool) -> Decision {
        match status {
            InjectionStatus::NotInjected => {
                if self.mode != AgentMode::Dynamic {
                    return Decision::Hold(HoldReason::Mode(self.mode));
                }
                if blacklisted {
                    return Decision::Hold(HoldReason::Blacklisted);
                }
                match self.attach_allowed_now() {
                    Ok(()) => Decision::Attach,
                    Err(reason) => Decision::Hold(reason),
                }
            }
            status if status.is_injected() => {
                if self.mode == AgentMode::Disable {
                    Decision::Shutdown
                } else {
                    Decision::Hold(HoldReason::Mode(self.mode))
                }
            }
            _ => Decision::Hold(HoldReason::Settled),
        }
    }
}
