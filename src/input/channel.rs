//! Channel-backed input backend
//!
//! Every report becomes an [`InputEvent`] on a tokio mpsc channel, in the
//! order it was made. Only per-tick reports count against the capacity and
//! are dropped once it is reached; registration and unregistration are
//! always delivered, so the consumer never keeps a device the driver has
//! already removed. The receiving end is usually an
//! [`EventMonitor`](super::monitor::EventMonitor).

use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, warn};

use super::{AbsAxis, Capabilities, DeviceInfo, EventSink, InputBackend, InputError, KeyCode};

pub type DeviceId = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum InputEventKind {
    Registered {
        info: DeviceInfo,
        capabilities: Capabilities,
    },
    Axis {
        axis: AbsAxis,
        value: i32,
    },
    Key {
        key: KeyCode,
        pressed: bool,
    },
    Sync,
    Unregistered,
}

impl InputEventKind {
    /// Per-tick reports, as opposed to device lifecycle events.
    pub fn is_report(&self) -> bool {
        matches!(
            self,
            InputEventKind::Axis { .. } | InputEventKind::Key { .. } | InputEventKind::Sync
        )
    }
}

// Input event with chrono timestamp
#[derive(Debug, Clone)]
pub struct InputEvent {
    pub device: DeviceId,
    pub kind: InputEventKind,
    pub timestamp: DateTime<Local>,
}

/// Reports queued but not yet received, shared by both channel ends.
#[derive(Debug)]
struct ReportBudget {
    queued: AtomicUsize,
    capacity: usize,
}

impl ReportBudget {
    fn try_reserve(&self) -> bool {
        self.queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
                (queued < self.capacity).then_some(queued + 1)
            })
            .is_ok()
    }

    fn give_back(&self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct ChannelBackend {
    sender: mpsc::UnboundedSender<InputEvent>,
    budget: Arc<ReportBudget>,
    next_device: AtomicU32,
}

impl ChannelBackend {
    /// `capacity` bounds the reports waiting in the channel.
    pub fn new(capacity: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let budget = Arc::new(ReportBudget {
            queued: AtomicUsize::new(0),
            capacity,
        });
        debug!("Created input event channel with report capacity {}", capacity);
        (
            Self {
                sender,
                budget: budget.clone(),
                next_device: AtomicU32::new(0),
            },
            EventReceiver { receiver, budget },
        )
    }
}

impl InputBackend for ChannelBackend {
    fn register_device(
        &self,
        info: &DeviceInfo,
        capabilities: &Capabilities,
    ) -> Result<Box<dyn EventSink>, InputError> {
        let device = self.next_device.fetch_add(1, Ordering::Relaxed);
        let event = InputEvent {
            device,
            kind: InputEventKind::Registered {
                info: info.clone(),
                capabilities: capabilities.clone(),
            },
            timestamp: Local::now(),
        };

        if self.sender.send(event).is_err() {
            error!("Failed to announce device {}: receiver dropped", info.name);
            return Err(InputError::BackendClosed(format!(
                "{} ({}): event receiver dropped",
                info.name, info.phys
            )));
        }

        info!(
            "Registered input device {} as {} at {}",
            device, info.name, info.phys
        );
        Ok(Box::new(ChannelSink {
            device,
            phys: info.phys.clone(),
            sender: self.sender.clone(),
            budget: self.budget.clone(),
        }))
    }
}

/// Receiving end of a [`ChannelBackend`]
pub struct EventReceiver {
    receiver: mpsc::UnboundedReceiver<InputEvent>,
    budget: Arc<ReportBudget>,
}

impl EventReceiver {
    /// Waits for the next event; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<InputEvent> {
        let event = self.receiver.recv().await?;
        Some(self.settle(event))
    }

    pub fn try_recv(&mut self) -> Result<InputEvent, TryRecvError> {
        let event = self.receiver.try_recv()?;
        Ok(self.settle(event))
    }

    fn settle(&self, event: InputEvent) -> InputEvent {
        if event.kind.is_report() {
            self.budget.give_back();
        }
        event
    }
}

pub struct ChannelSink {
    device: DeviceId,
    phys: String,
    sender: mpsc::UnboundedSender<InputEvent>,
    budget: Arc<ReportBudget>,
}

impl ChannelSink {
    fn event(&self, kind: InputEventKind) -> InputEvent {
        InputEvent {
            device: self.device,
            kind,
            timestamp: Local::now(),
        }
    }

    fn report(&self, kind: InputEventKind) {
        if !self.budget.try_reserve() {
            warn!("Dropped input report for {}: channel full", self.phys);
            return;
        }
        if self.sender.send(self.event(kind)).is_err() {
            self.budget.give_back();
            warn!("Dropped input report for {}: receiver gone", self.phys);
        }
    }
}

impl EventSink for ChannelSink {
    fn report_axis(&mut self, axis: AbsAxis, value: i32) {
        self.report(InputEventKind::Axis { axis, value });
    }

    fn report_key(&mut self, key: KeyCode, pressed: bool) {
        self.report(InputEventKind::Key { key, pressed });
    }

    fn sync(&mut self) {
        self.report(InputEventKind::Sync);
    }

    fn unregister(self: Box<Self>) {
        info!("Unregistering input device {} at {}", self.device, self.phys);
        if self
            .sender
            .send(self.event(InputEventKind::Unregistered))
            .is_err()
        {
            warn!("Receiver gone before {} was unregistered", self.phys);
        }
    }
}
