#![allow(dead_code)]

use arcadeport::config::PollSettings;
use arcadeport::input::channel::{ChannelBackend, EventReceiver, InputEvent, InputEventKind};
use arcadeport::input::monitor::{EventMonitor, StateChange};
use arcadeport::input::{Capabilities, DeviceInfo, EventSink, InputBackend, InputError};
use arcadeport::port::simulated::{SimulatedPanel, SimulatedPort};
use arcadeport::port::{ParallelPort, PortError, PortProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Mutex};

/// Poll settings without the settle delay so tests do not sleep the thread.
pub fn fast_settings() -> PollSettings {
    PollSettings {
        refresh_interval_ms: 10,
        settle_delay_us: 0,
    }
}

pub fn drain(rx: &mut EventReceiver) -> Vec<InputEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub fn count(events: &[InputEvent], predicate: impl Fn(&InputEventKind) -> bool) -> usize {
    events.iter().filter(|event| predicate(&event.kind)).count()
}

pub fn registrations(events: &[InputEvent]) -> usize {
    count(events, |kind| matches!(kind, InputEventKind::Registered { .. }))
}

pub fn unregistrations(events: &[InputEvent]) -> usize {
    count(events, |kind| matches!(kind, InputEventKind::Unregistered))
}

pub fn syncs(events: &[InputEvent]) -> usize {
    count(events, |kind| matches!(kind, InputEventKind::Sync))
}

/// Runs events through a monitor and returns every committed change.
pub fn changes(events: Vec<InputEvent>) -> Vec<StateChange> {
    let mut monitor = EventMonitor::new();
    events
        .into_iter()
        .flat_map(|event| monitor.handle(event))
        .collect()
}

/// Channel backend that refuses the registration with index `fail_at`.
pub struct FailingBackend {
    inner: ChannelBackend,
    fail_at: usize,
    calls: AtomicUsize,
}

impl FailingBackend {
    pub fn new(fail_at: usize) -> (Self, EventReceiver) {
        Self::with_capacity(fail_at, 64)
    }

    pub fn with_capacity(fail_at: usize, capacity: usize) -> (Self, EventReceiver) {
        let (inner, rx) = ChannelBackend::new(capacity);
        (
            Self {
                inner,
                fail_at,
                calls: AtomicUsize::new(0),
            },
            rx,
        )
    }
}

impl InputBackend for FailingBackend {
    fn register_device(
        &self,
        info: &DeviceInfo,
        capabilities: &Capabilities,
    ) -> Result<Box<dyn EventSink>, InputError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_at {
            return Err(InputError::RegistrationFailed(format!(
                "{} refused",
                info.phys
            )));
        }
        self.inner.register_device(info, capabilities)
    }
}

/// Port whose first claim blocks until the test lets it through, keeping
/// the group lock held by the opener for as long as the test needs.
pub struct GatedPort {
    inner: SimulatedPort,
    gate: Option<(std_mpsc::Sender<()>, std_mpsc::Receiver<()>)>,
}

impl ParallelPort for GatedPort {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn claim(&mut self) -> Result<(), PortError> {
        if let Some((entered, release)) = self.gate.take() {
            let _ = entered.send(());
            let _ = release.recv();
        }
        self.inner.claim()
    }

    fn release(&mut self) {
        self.inner.release()
    }

    fn write_data(&mut self, value: u8) {
        self.inner.write_data(value)
    }

    fn write_control(&mut self, value: u8) {
        self.inner.write_control(value)
    }

    fn read_status(&mut self) -> u8 {
        self.inner.read_status()
    }
}

pub struct GatedProvider {
    panel: SimulatedPanel,
    gate: Mutex<Option<(std_mpsc::Sender<()>, std_mpsc::Receiver<()>)>>,
}

impl GatedProvider {
    /// Returns the provider, a receiver signalled once the claim is
    /// blocked, and the sender that lets it continue.
    pub fn new(
        panel: SimulatedPanel,
    ) -> (Self, std_mpsc::Receiver<()>, std_mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        (
            Self {
                panel,
                gate: Mutex::new(Some((entered_tx, release_rx))),
            },
            entered_rx,
            release_tx,
        )
    }
}

impl PortProvider for GatedProvider {
    fn find_port(&self, _number: u32) -> Result<Box<dyn ParallelPort>, PortError> {
        let gate = self.gate.lock().unwrap().take();
        Ok(Box::new(GatedPort {
            inner: self.panel.open()?,
            gate,
        }))
    }
}
