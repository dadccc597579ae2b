//! Bus group - one port with up to five connectors
//!
//! Owns the connectors, the poll scheduler and the exclusive port
//! registration. `open`/`close` keep a reference count behind a tokio mutex:
//!
//! ```text
//! open   0 → 1 : claim port, control = 0x04, arm poller
//! close  1 → 0 : disarm poller, control = 0x00, release port
//! ```
//!
//! The poller is armed exactly while the count is non-zero, and the port is
//! claimed exactly while the count is non-zero.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::bus::{SharedBus, TickReport};
use super::connector::Connector;
use super::control::{ControlType, ControlTypeMask, MAX_CONNECTORS};
use super::error::{LifecycleError, SetupError};
use super::scheduler::Scheduler;
use crate::config::{ConfigError, PollSettings};
use crate::input::InputBackend;
use crate::port::{PortProvider, CONTROL_IDLE, CONTROL_INERT};

/// Observable lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupState {
    Idle,
    Active,
}

struct Lifecycle {
    used: usize,
    scheduler: Scheduler,
}

pub struct BusGroup {
    number: u32,
    bus: Arc<SharedBus>,
    period: Duration,
    lifecycle: Mutex<Lifecycle>,
}

/// Validates connector codes; index `i` of the result is connector `i`.
fn parse_assignments(
    codes: &[i32],
) -> Result<[Option<ControlType>; MAX_CONNECTORS], ConfigError> {
    if codes.len() > MAX_CONNECTORS {
        return Err(ConfigError::TooManyDevices {
            count: codes.len(),
            max: MAX_CONNECTORS,
        });
    }

    let mut assignments = [None; MAX_CONNECTORS];
    for (index, &code) in codes.iter().enumerate() {
        assignments[index] = ControlType::from_code(code).inspect_err(|_| {
            warn!("Control type {} unknown at connector {}", code, index);
        })?;
    }

    if assignments.iter().all(Option::is_none) {
        error!("No valid devices specified");
        return Err(ConfigError::NoDevices);
    }
    Ok(assignments)
}

fn unregister_all(connectors: &mut [Option<Connector>]) {
    for connector in connectors.iter_mut().filter_map(Option::take) {
        debug!("Unregistering {}", connector.phys());
        connector.unregister();
    }
}

impl BusGroup {
    /// Sets up port `number` with the given connector codes.
    ///
    /// Either every connector is registered and the port is held, or nothing
    /// is left behind.
    pub fn configure(
        number: u32,
        codes: &[i32],
        provider: &dyn PortProvider,
        backend: &dyn InputBackend,
        settings: &PollSettings,
    ) -> Result<Self, SetupError> {
        info!("Configuring port {} with control types {:?}", number, codes);
        settings.validate()?;
        let assignments = parse_assignments(codes)?;

        let port = provider.find_port(number).inspect_err(|e| {
            error!("Port {} unavailable: {}", number, e);
        })?;

        let mut connectors: [Option<Connector>; MAX_CONNECTORS] = Default::default();
        for (index, control_type) in assignments.iter().enumerate() {
            let Some(control_type) = *control_type else {
                continue;
            };
            match Connector::register(port.name(), index, control_type, backend) {
                Ok(connector) => connectors[index] = Some(connector),
                Err(e) => {
                    error!(
                        "Failed to register connector {} on {}: {}",
                        index,
                        port.name(),
                        e
                    );
                    unregister_all(&mut connectors);
                    return Err(e.into());
                }
            }
        }

        let bus = Arc::new(SharedBus::new(port, connectors, settings.settle_delay()));
        let period = settings.refresh_interval();
        info!(
            "Port {} ready as {}: combined mask {:#04x}",
            number,
            bus.port_name(),
            bus.masks().any()
        );

        Ok(Self {
            number,
            lifecycle: Mutex::new(Lifecycle {
                used: 0,
                scheduler: Scheduler::new(bus.clone(), period),
            }),
            bus,
            period,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn port_name(&self) -> &str {
        self.bus.port_name()
    }

    pub fn masks(&self) -> &ControlTypeMask {
        self.bus.masks()
    }

    pub fn assignment(&self, index: usize) -> Option<ControlType> {
        self.bus.assignment(index)
    }

    /// Indices of configured connectors.
    pub fn connectors(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_CONNECTORS).filter(move |&index| self.assignment(index).is_some())
    }

    pub async fn open_count(&self) -> usize {
        self.lifecycle.lock().await.used
    }

    pub async fn state(&self) -> GroupState {
        if self.lifecycle.lock().await.scheduler.is_active() {
            GroupState::Active
        } else {
            GroupState::Idle
        }
    }

    /// Runs one tick outside the scheduler.
    pub fn poll_once(&self) -> TickReport {
        self.bus.poll_once()
    }

    fn take_scheduler(&self, lifecycle: &mut Lifecycle) -> Scheduler {
        std::mem::replace(
            &mut lifecycle.scheduler,
            Scheduler::new(self.bus.clone(), self.period),
        )
    }

    /// Opens connector `index` on behalf of a consumer.
    ///
    /// Waiting for the group lock is abandoned with
    /// [`LifecycleError::Aborted`] once `cancel` fires.
    pub async fn open(
        &self,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        if self.assignment(index).is_none() {
            return Err(LifecycleError::UnknownConnector(index));
        }

        let mut lifecycle = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Open of {}/control{} aborted", self.port_name(), index);
                return Err(LifecycleError::Aborted);
            }
            guard = self.lifecycle.lock() => guard,
        };

        if lifecycle.used == 0 {
            {
                let mut devices = self.bus.lock();
                devices.port.claim().inspect_err(|e| {
                    error!("Failed to claim {}: {}", self.port_name(), e);
                })?;
                devices.port.write_control(CONTROL_IDLE);
            }
            info!("Claimed {}", self.port_name());
            let scheduler = self.take_scheduler(&mut lifecycle);
            lifecycle.scheduler = scheduler.arm();
        }
        lifecycle.used += 1;
        debug!(
            "Opened {}/control{}, {} users",
            self.port_name(),
            index,
            lifecycle.used
        );
        Ok(())
    }

    /// Closes connector `index`. Never fails; an unmatched close is ignored.
    pub async fn close(&self, index: usize) {
        if self.assignment(index).is_none() {
            warn!("Close of unconfigured connector {} ignored", index);
            return;
        }

        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.used == 0 {
            warn!(
                "Close of {}/control{} without matching open ignored",
                self.port_name(),
                index
            );
            return;
        }

        lifecycle.used -= 1;
        if lifecycle.used == 0 {
            let scheduler = self.take_scheduler(&mut lifecycle);
            lifecycle.scheduler = scheduler.disarm().await;
            self.release_port();
        }
        debug!(
            "Closed {}/control{}, {} users",
            self.port_name(),
            index,
            lifecycle.used
        );
    }

    fn release_port(&self) {
        let mut devices = self.bus.lock();
        devices.port.write_control(CONTROL_INERT);
        devices.port.release();
        info!("Released {}", self.port_name());
    }

    /// Stops polling if still open, unregisters every device and drops the
    /// port registration.
    pub async fn teardown(self) {
        info!("Tearing down port {} ({})", self.number, self.port_name());
        {
            let mut lifecycle = self.lifecycle.lock().await;
            if lifecycle.used > 0 {
                warn!(
                    "{} still has {} users at teardown",
                    self.port_name(),
                    lifecycle.used
                );
                let scheduler = self.take_scheduler(&mut lifecycle);
                lifecycle.scheduler = scheduler.disarm().await;
                lifecycle.used = 0;
                self.release_port();
            }
        }

        let mut devices = self.bus.lock();
        unregister_all(&mut devices.connectors);
    }
}
