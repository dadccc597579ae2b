//! Event monitor - consumer side of the channel backend
//!
//! Drivers report the full state of every device on every tick. The monitor
//! keeps the last committed frame per device and only surfaces what changed
//! when a sync marker arrives.

use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::channel::{DeviceId, EventReceiver, InputEvent, InputEventKind};
use super::{AbsAxis, KeyCode};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateChange {
    Axis {
        device: DeviceId,
        axis: AbsAxis,
        value: i32,
    },
    Key {
        device: DeviceId,
        key: KeyCode,
        pressed: bool,
    },
}

#[derive(Clone, Debug, Default)]
struct Frame {
    axes: HashMap<AbsAxis, i32>,
    keys: HashMap<KeyCode, bool>,
}

#[derive(Debug, Default)]
struct DeviceState {
    name: String,
    committed: Frame,
    pending: Frame,
}

#[derive(Debug, Default)]
pub struct EventMonitor {
    devices: HashMap<DeviceId, DeviceState>,
    frames: u64,
}

impl EventMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Feeds one event; returns the changes committed by it.
    pub fn handle(&mut self, event: InputEvent) -> Vec<StateChange> {
        let device = event.device;
        match event.kind {
            InputEventKind::Registered { info, capabilities } => {
                info!(
                    "Device {} appeared: {} ({}), {} axes, {} keys",
                    device,
                    info.name,
                    info.phys,
                    capabilities.axes.len(),
                    capabilities.keys.len()
                );
                self.devices.insert(
                    device,
                    DeviceState {
                        name: info.name,
                        ..Default::default()
                    },
                );
                Vec::new()
            }
            InputEventKind::Unregistered => {
                if let Some(state) = self.devices.remove(&device) {
                    info!("Device {} removed: {}", device, state.name);
                }
                Vec::new()
            }
            InputEventKind::Axis { axis, value } => {
                match self.devices.get_mut(&device) {
                    Some(state) => {
                        state.pending.axes.insert(axis, value);
                    }
                    None => warn!("Axis report for unknown device {}", device),
                }
                Vec::new()
            }
            InputEventKind::Key { key, pressed } => {
                match self.devices.get_mut(&device) {
                    Some(state) => {
                        state.pending.keys.insert(key, pressed);
                    }
                    None => warn!("Key report for unknown device {}", device),
                }
                Vec::new()
            }
            InputEventKind::Sync => self.commit(device),
        }
    }

    fn commit(&mut self, device: DeviceId) -> Vec<StateChange> {
        let Some(state) = self.devices.get_mut(&device) else {
            warn!("Sync for unknown device {}", device);
            return Vec::new();
        };
        self.frames += 1;

        let mut changes = Vec::new();
        for (&axis, &value) in &state.pending.axes {
            let previous = state.committed.axes.get(&axis).copied().unwrap_or(0);
            if previous != value {
                changes.push(StateChange::Axis {
                    device,
                    axis,
                    value,
                });
            }
        }
        for (&key, &pressed) in &state.pending.keys {
            let previous = state.committed.keys.get(&key).copied().unwrap_or(false);
            if previous != pressed {
                changes.push(StateChange::Key {
                    device,
                    key,
                    pressed,
                });
            }
        }

        state.committed.axes.extend(state.pending.axes.drain());
        state.committed.keys.extend(state.pending.keys.drain());

        for change in &changes {
            match change {
                StateChange::Axis { axis, value, .. } => {
                    info!("{}: axis {:?} = {}", state.name, axis, value)
                }
                StateChange::Key { key, pressed, .. } => {
                    info!(
                        "{}: {} {}",
                        state.name,
                        key,
                        if *pressed { "pressed" } else { "released" }
                    )
                }
            }
        }
        changes
    }
}

// Public interface for spawning the monitor
pub struct MonitorHandle {
    task: JoinHandle<EventMonitor>,
}

impl MonitorHandle {
    pub fn spawn(mut receiver: EventReceiver) -> Self {
        info!("Spawning input event monitor");
        let task = tokio::spawn(async move {
            let mut monitor = EventMonitor::new();
            while let Some(event) = receiver.recv().await {
                monitor.handle(event);
            }
            debug!(
                "Input channel closed after {} frames, monitor stopping",
                monitor.frames()
            );
            monitor
        });
        Self { task }
    }

    /// Waits until every sender is gone and returns the final monitor state.
    pub async fn join(self) -> Option<EventMonitor> {
        match self.task.await {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                warn!("Input monitor task failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Capabilities, DeviceInfo};
    use chrono::Local;

    fn event(device: DeviceId, kind: InputEventKind) -> InputEvent {
        InputEvent {
            device,
            kind,
            timestamp: Local::now(),
        }
    }

    fn registered(device: DeviceId) -> InputEvent {
        event(
            device,
            InputEventKind::Registered {
                info: DeviceInfo {
                    name: "Arcade Cabinet Control".to_string(),
                    phys: "sim0/control0".to_string(),
                    bustype: 0x15,
                    vendor: 1,
                    product: 1,
                    version: 0x100,
                },
                capabilities: Capabilities::default(),
            },
        )
    }

    fn key(device: DeviceId, key: KeyCode, pressed: bool) -> InputEvent {
        event(device, InputEventKind::Key { key, pressed })
    }

    #[test]
    fn repeated_frames_produce_no_changes() {
        let mut monitor = EventMonitor::new();
        monitor.handle(registered(0));

        monitor.handle(key(0, KeyCode::Btn0, true));
        let first = monitor.handle(event(0, InputEventKind::Sync));
        assert_eq!(
            first,
            vec![StateChange::Key {
                device: 0,
                key: KeyCode::Btn0,
                pressed: true
            }]
        );

        monitor.handle(key(0, KeyCode::Btn0, true));
        let second = monitor.handle(event(0, InputEventKind::Sync));
        assert!(second.is_empty());
        assert_eq!(monitor.frames(), 2);
    }

    #[test]
    fn idle_axis_is_not_a_change() {
        let mut monitor = EventMonitor::new();
        monitor.handle(registered(3));
        monitor.handle(event(
            3,
            InputEventKind::Axis {
                axis: AbsAxis::Y,
                value: 0,
            },
        ));
        assert!(monitor.handle(event(3, InputEventKind::Sync)).is_empty());

        monitor.handle(event(
            3,
            InputEventKind::Axis {
                axis: AbsAxis::Y,
                value: 1,
            },
        ));
        let changes = monitor.handle(event(3, InputEventKind::Sync));
        assert_eq!(
            changes,
            vec![StateChange::Axis {
                device: 3,
                axis: AbsAxis::Y,
                value: 1
            }]
        );
    }

    #[test]
    fn unregister_forgets_device() {
        let mut monitor = EventMonitor::new();
        monitor.handle(registered(1));
        assert_eq!(monitor.device_count(), 1);
        monitor.handle(event(1, InputEventKind::Unregistered));
        assert_eq!(monitor.device_count(), 0);
        assert!(monitor.handle(event(1, InputEventKind::Sync)).is_empty());
    }
}
