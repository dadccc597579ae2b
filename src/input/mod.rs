//! Input event subsystem seam
//!
//! Decoded button and axis values leave the driver through two traits:
//!
//! 1. [`InputBackend`] - registers one device per active connector
//! 2. [`EventSink`] - per-device handle that receives reports and sync markers
//!
//! # Architecture
//!
//! ```text
//! Poll tick ──► Decoder ──► EventSink ──► (backend) ──► Consumer
//!                           report_axis / report_key / sync
//! ```
//!
//! The sink does not de-duplicate. Every tick reports the full state of a
//! device followed by a sync marker; consumers compare against the previous
//! frame themselves (see [`monitor`]).

pub mod channel;
pub mod codes;
pub mod monitor;

pub use codes::{AbsAxis, KeyCode};

/// Linux input bus type for parallel-port devices.
pub const BUS_PARPORT: u16 = 0x15;
/// Vendor id reported for every cabinet control.
pub const ARCADE_VENDOR: u16 = 0x0001;
/// Device version reported for every cabinet control.
pub const ARCADE_VERSION: u16 = 0x0100;

/// Identity of a registered device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub phys: String,
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

/// Range of an absolute axis as announced at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbsInfo {
    pub axis: AbsAxis,
    pub min: i32,
    pub max: i32,
    pub fuzz: i32,
    pub flat: i32,
}

/// Symbolic capability set of a device
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub axes: Vec<AbsInfo>,
    pub keys: Vec<KeyCode>,
}

impl Capabilities {
    pub fn has_axis(&self, axis: AbsAxis) -> bool {
        self.axes.iter().any(|info| info.axis == axis)
    }

    pub fn has_key(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Failed to register input device: {0}")]
    RegistrationFailed(String),

    #[error("Input backend closed: {0}")]
    BackendClosed(String),
}

/// Device registration side of the input subsystem.
pub trait InputBackend: Send + Sync {
    /// Registers a device and hands back the sink that feeds it.
    fn register_device(
        &self,
        info: &DeviceInfo,
        capabilities: &Capabilities,
    ) -> Result<Box<dyn EventSink>, InputError>;
}

/// Per-device output handle.
///
/// Reports are buffered by the backend until [`EventSink::sync`] closes the
/// frame.
pub trait EventSink: Send {
    fn report_axis(&mut self, axis: AbsAxis, value: i32);

    fn report_key(&mut self, key: KeyCode, pressed: bool);

    /// Closes the current frame.
    fn sync(&mut self);

    /// Removes the device from the input subsystem.
    fn unregister(self: Box<Self>);
}
