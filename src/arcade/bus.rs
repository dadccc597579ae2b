//! Per-group bus state shared between the lifecycle manager and the poll task

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::codec::read_raw_sample;
use super::connector::Connector;
use super::control::{ControlType, ControlTypeMask, MAX_CONNECTORS};
use crate::port::ParallelPort;

/// Port plus connector sinks, locked for the duration of one tick
pub struct BusDevices {
    pub port: Box<dyn ParallelPort>,
    pub connectors: [Option<Connector>; MAX_CONNECTORS],
}

/// Outcome of one tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Full read cycles performed
    pub reads: usize,
    /// Device frames closed
    pub frames: usize,
}

pub struct SharedBus {
    port_name: String,
    assignments: [Option<ControlType>; MAX_CONNECTORS],
    masks: ControlTypeMask,
    settle_delay: Duration,
    devices: Mutex<BusDevices>,
}

impl SharedBus {
    pub fn new(
        port: Box<dyn ParallelPort>,
        connectors: [Option<Connector>; MAX_CONNECTORS],
        settle_delay: Duration,
    ) -> Self {
        let mut masks = ControlTypeMask::default();
        let mut assignments = [None; MAX_CONNECTORS];
        for connector in connectors.iter().flatten() {
            masks.insert(connector.control_type(), connector.status_bit());
            assignments[connector.index()] = Some(connector.control_type());
        }

        Self {
            port_name: port.name().to_string(),
            assignments,
            masks,
            settle_delay,
            devices: Mutex::new(BusDevices { port, connectors }),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn masks(&self) -> &ControlTypeMask {
        &self.masks
    }

    pub fn assignment(&self, index: usize) -> Option<ControlType> {
        self.assignments.get(index).copied().flatten()
    }

    /// Locks port and sinks. A poisoned lock is recovered; the bus has no
    /// invariant a panicking tick could break.
    pub fn lock(&self) -> MutexGuard<'_, BusDevices> {
        self.devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// One tick: a fresh read cycle per assigned control type, each followed
    /// by that type's decode.
    pub fn poll_once(&self) -> TickReport {
        let mut devices = self.lock();
        let devices = &mut *devices;
        let mut report = TickReport::default();

        for control_type in self.masks.active_types() {
            let sample = read_raw_sample(devices.port.as_mut(), self.settle_delay);
            report.reads += 1;
            report.frames += control_type
                .layout()
                .decode(&sample, &mut devices.connectors);
        }

        debug!(
            "Tick on {}: {} reads, {} frames",
            self.port_name, report.reads, report.frames
        );
        report
    }
}
