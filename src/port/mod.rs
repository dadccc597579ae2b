//! Bus transport seam
//!
//! A cabinet bus is a byte-wide parallel port with three registers:
//!
//! - **data** (8 output lines, the primary strobe group)
//! - **control** (4 output lines, the secondary strobe group; the INIT line
//!   at bit 2 works inverted and doubles as the idle pattern)
//! - **status** (5 input lines at bits 3..7, one per connector)
//!
//! Two backends implement [`ParallelPort`]: a [`simulated`] panel that
//! records every register access, and a [`gpio`] wiring through `rppal`.

pub mod gpio;
pub mod simulated;

/// INIT line of the control register.
pub const CONTROL_INIT: u8 = 0x04;
/// Control pattern while the bus is claimed and between read cycles.
pub const CONTROL_IDLE: u8 = CONTROL_INIT;
/// Control pattern while the bus is not in use.
pub const CONTROL_INERT: u8 = 0x00;
/// Data pattern with every primary line released.
pub const DATA_RELEASED: u8 = 0xFF;

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("No such parallel port: {0}")]
    NotFound(u32),

    #[error("Port busy already: {0}")]
    Busy(String),

    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

/// Register-level access to one exclusively registered port.
pub trait ParallelPort: Send {
    /// Port name used to build connector phys paths.
    fn name(&self) -> &str;

    fn claim(&mut self) -> Result<(), PortError>;

    fn release(&mut self);

    fn write_data(&mut self, value: u8);

    fn write_control(&mut self, value: u8);

    fn read_status(&mut self) -> u8;
}

/// Port discovery. The returned port is registered exclusively until dropped.
pub trait PortProvider: Send + Sync {
    fn find_port(&self, number: u32) -> Result<Box<dyn ParallelPort>, PortError>;
}
