//! Simulated cabinet panel
//!
//! Models the external latch logic of a real panel: the status byte depends
//! on which strobe line is currently asserted and on which (connector,
//! sample position) pairs are held down. Every register access is recorded
//! so the strobe sequence can be inspected afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::{ParallelPort, PortError, PortProvider, CONTROL_INIT, DATA_RELEASED};
use crate::arcade::codec::{SAMPLE_LEN, STATUS_FLIP};

/// One recorded register access
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortOp {
    Claim,
    Release,
    Data(u8),
    Control(u8),
    Status(u8),
}

#[derive(Debug, Default)]
struct PanelState {
    ops: Vec<PortOp>,
    registered: bool,
    claimed: bool,
    claims: usize,
    releases: usize,
    refuse_claim: bool,
    data: u8,
    control: u8,
    // Active-high status bits held down at each sample position
    held: [u8; SAMPLE_LEN],
}

impl PanelState {
    /// Sample position selected by the current line pattern, if exactly one
    /// strobe line is asserted.
    fn strobed_position(&self) -> Option<usize> {
        if self.data != DATA_RELEASED {
            let low = !self.data;
            return (low.count_ones() == 1).then(|| low.trailing_zeros() as usize);
        }
        if self.control == 0 {
            return Some(10);
        }
        if self.control & CONTROL_INIT == 0 {
            return None;
        }
        let lines = self.control & !CONTROL_INIT;
        if lines.count_ones() != 1 {
            return None;
        }
        match lines.trailing_zeros() {
            0 => Some(8),
            1 => Some(9),
            3 => Some(11),
            _ => None,
        }
    }
}

/// Inspection and stimulus handle for one simulated panel.
#[derive(Clone, Debug)]
pub struct SimulatedPanel {
    name: String,
    state: Arc<Mutex<PanelState>>,
}

impl SimulatedPanel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(PanelState {
                data: DATA_RELEASED,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Holds (`true`) or lets go of the line behind `status_bit` at `position`.
    pub fn set_line(&self, status_bit: u8, position: usize, held: bool) {
        let mut state = self.lock();
        if let Some(bits) = state.held.get_mut(position) {
            if held {
                *bits |= status_bit;
            } else {
                *bits &= !status_bit;
            }
        }
    }

    pub fn release_all(&self) {
        self.lock().held = [0; SAMPLE_LEN];
    }

    /// Makes the next claims fail as if another driver held the port.
    pub fn refuse_claims(&self, refuse: bool) {
        self.lock().refuse_claim = refuse;
    }

    pub fn ops(&self) -> Vec<PortOp> {
        self.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    pub fn claims(&self) -> usize {
        self.lock().claims
    }

    pub fn releases(&self) -> usize {
        self.lock().releases
    }

    pub fn is_claimed(&self) -> bool {
        self.lock().claimed
    }

    pub fn is_registered(&self) -> bool {
        self.lock().registered
    }

    pub fn control(&self) -> u8 {
        self.lock().control
    }

    /// Registers the panel exclusively and returns its port.
    pub fn open(&self) -> Result<SimulatedPort, PortError> {
        let mut state = self.lock();
        if state.registered {
            return Err(PortError::Busy(self.name.clone()));
        }
        state.registered = true;
        debug!("Registered simulated port {}", self.name);
        Ok(SimulatedPort {
            panel: self.clone(),
        })
    }
}

pub struct SimulatedPort {
    panel: SimulatedPanel,
}

impl ParallelPort for SimulatedPort {
    fn name(&self) -> &str {
        &self.panel.name
    }

    fn claim(&mut self) -> Result<(), PortError> {
        let mut state = self.panel.lock();
        if state.refuse_claim {
            return Err(PortError::Busy(self.panel.name.clone()));
        }
        state.claimed = true;
        state.claims += 1;
        state.ops.push(PortOp::Claim);
        Ok(())
    }

    fn release(&mut self) {
        let mut state = self.panel.lock();
        state.claimed = false;
        state.releases += 1;
        state.ops.push(PortOp::Release);
    }

    fn write_data(&mut self, value: u8) {
        let mut state = self.panel.lock();
        state.data = value;
        state.ops.push(PortOp::Data(value));
    }

    fn write_control(&mut self, value: u8) {
        let mut state = self.panel.lock();
        state.control = value;
        state.ops.push(PortOp::Control(value));
    }

    fn read_status(&mut self) -> u8 {
        let mut state = self.panel.lock();
        let active = state
            .strobed_position()
            .map(|position| state.held[position])
            .unwrap_or(0);
        let status = active ^ STATUS_FLIP;
        state.ops.push(PortOp::Status(status));
        status
    }
}

impl Drop for SimulatedPort {
    fn drop(&mut self) {
        self.panel.lock().registered = false;
        debug!("Unregistered simulated port {}", self.panel.name);
    }
}

/// Provider handing out simulated panels by port number
#[derive(Clone, Debug, Default)]
pub struct SimulatedProvider {
    panels: HashMap<u32, SimulatedPanel>,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a panel behind port `number` and returns its handle.
    pub fn add_port(&mut self, number: u32) -> SimulatedPanel {
        let panel = SimulatedPanel::new(format!("sim{}", number));
        info!("Attached simulated panel {}", panel.name());
        self.panels.insert(number, panel.clone());
        panel
    }

    pub fn panel(&self, number: u32) -> Option<&SimulatedPanel> {
        self.panels.get(&number)
    }
}

impl PortProvider for SimulatedProvider {
    fn find_port(&self, number: u32) -> Result<Box<dyn ParallelPort>, PortError> {
        let panel = self.panels.get(&number).ok_or(PortError::NotFound(number))?;
        Ok(Box::new(panel.open()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_line_is_visible_only_at_its_position() {
        let panel = SimulatedPanel::new("sim0");
        let mut port = panel.open().unwrap();
        panel.set_line(0x40, 2, true);

        port.write_data(!(1 << 2));
        assert_eq!(port.read_status() ^ STATUS_FLIP, 0x40);

        port.write_data(!(1 << 3));
        assert_eq!(port.read_status() ^ STATUS_FLIP, 0);
    }

    #[test]
    fn inverted_init_line_selects_position_ten() {
        let panel = SimulatedPanel::new("sim0");
        let mut port = panel.open().unwrap();
        panel.set_line(0x08, 10, true);
        panel.set_line(0x10, 11, true);

        port.write_data(DATA_RELEASED);
        port.write_control(0x00);
        assert_eq!(port.read_status() ^ STATUS_FLIP, 0x08);

        port.write_control((1 << 3) | CONTROL_INIT);
        assert_eq!(port.read_status() ^ STATUS_FLIP, 0x10);

        port.write_control(CONTROL_INIT);
        assert_eq!(port.read_status() ^ STATUS_FLIP, 0);
    }

    #[test]
    fn port_is_registered_exclusively_until_dropped() {
        let mut provider = SimulatedProvider::new();
        let panel = provider.add_port(0);

        let port = provider.find_port(0).unwrap();
        assert!(panel.is_registered());
        assert!(matches!(provider.find_port(0), Err(PortError::Busy(_))));

        drop(port);
        assert!(!panel.is_registered());
        assert!(provider.find_port(0).is_ok());
    }

    #[test]
    fn unknown_port_is_not_found() {
        let provider = SimulatedProvider::new();
        assert!(matches!(provider.find_port(3), Err(PortError::NotFound(3))));
    }

    #[test]
    fn refused_claim_is_reported_busy() {
        let panel = SimulatedPanel::new("sim0");
        let mut port = panel.open().unwrap();
        panel.refuse_claims(true);

        assert!(matches!(port.claim(), Err(PortError::Busy(_))));
        assert_eq!(panel.claims(), 0);
    }
}
