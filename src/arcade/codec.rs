//! Bus codec - one strobe/read cycle over the shared bus
//!
//! ```text
//! settle ──► data  = !(1<<0) .. !(1<<7)   read 8 status bytes   (positions 0..7)
//!        ──► data  = 0xFF
//!        ──► ctrl  = 0x05, 0x06, 0x00, 0x0C read 4 status bytes (positions 8..11)
//!        ──► ctrl  = 0x04
//! ```
//!
//! Position 10 is strobed by dropping the whole control group to zero: the
//! INIT line works inverted, so that is the one pattern asserting it.
//! Callers must serialize cycles on the same port.

use std::time::Duration;

use crate::port::{ParallelPort, CONTROL_IDLE, CONTROL_INERT, CONTROL_INIT, DATA_RELEASED};

/// Bytes in one raw sample.
pub const SAMPLE_LEN: usize = 12;
/// Positions strobed through the data lines.
pub const PRIMARY_LEN: usize = 8;
/// Position strobed through the inverted INIT line.
pub const RESERVED_POSITION: usize = 10;
/// Turns the active-low status lines into active-high bits.
pub const STATUS_FLIP: u8 = 0x7F;
/// Settle time before the first strobe.
pub const SETTLE_DELAY: Duration = Duration::from_micros(15);

/// One sampled byte per strobe position
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawSample([u8; SAMPLE_LEN]);

impl RawSample {
    pub fn from_bytes(bytes: [u8; SAMPLE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8; SAMPLE_LEN] {
        &self.0
    }

    pub fn byte(&self, position: usize) -> u8 {
        self.0[position]
    }

    /// Whether the line behind `status_bit` was active at `position`.
    pub fn is_set(&self, position: usize, status_bit: u8) -> bool {
        self.0[position] & status_bit != 0
    }
}

/// Data pattern strobing primary position `position`: exactly one line low.
pub fn primary_pattern(position: usize) -> u8 {
    !(1u8 << position)
}

/// Control pattern strobing secondary position `position` (8..=11).
pub fn secondary_pattern(position: usize) -> u8 {
    if position == RESERVED_POSITION {
        CONTROL_INERT
    } else {
        (1u8 << (position - PRIMARY_LEN)) | CONTROL_INIT
    }
}

/// Runs one full read cycle and returns the normalized sample.
///
/// No validation happens here; a bus in an undefined electrical state yields
/// whatever bits are present.
pub fn read_raw_sample(port: &mut dyn ParallelPort, settle: Duration) -> RawSample {
    let mut data = [0u8; SAMPLE_LEN];

    if !settle.is_zero() {
        std::thread::sleep(settle);
    }

    for (position, byte) in data.iter_mut().enumerate().take(PRIMARY_LEN) {
        port.write_data(primary_pattern(position));
        *byte = port.read_status() ^ STATUS_FLIP;
    }

    port.write_data(DATA_RELEASED);

    for (position, byte) in data.iter_mut().enumerate().skip(PRIMARY_LEN) {
        port.write_control(secondary_pattern(position));
        *byte = port.read_status() ^ STATUS_FLIP;
    }

    port.write_control(CONTROL_IDLE);

    RawSample(data)
}
