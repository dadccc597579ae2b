//! GPIO-wired cabinet bus on a Raspberry Pi
//!
//! The three port registers are mapped onto individual pins through `rppal`:
//! data and control bits drive output pins, status bits 3..7 are read from
//! pulled-up input pins. Pins are acquired when the port is found and held
//! until it is dropped, so a second user of the same pins gets an error.
//!
//! A parallel port presents BUSY (status bit 7) inverted. The assembled
//! status byte inverts that bit too, so both backends read the same way.

use rppal::gpio::{Gpio, InputPin, OutputPin};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::{ParallelPort, PortError, PortProvider};

/// Lowest status bit wired to a pin.
const STATUS_SHIFT: usize = 3;
/// Status bits the port hardware inverts (BUSY).
const STATUS_INVERTED: u8 = 0x80;

/// BCM pin numbers for one port
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct GpioPortConfig {
    pub port: u32,
    /// Data bits 0..7
    pub data: [u8; 8],
    /// Control bits 0..3
    pub control: [u8; 4],
    /// Status bits 3..7
    pub status: [u8; 5],
}

impl Default for GpioPortConfig {
    fn default() -> Self {
        Self {
            port: 0,
            data: [2, 3, 4, 17, 27, 22, 10, 9],
            control: [11, 5, 6, 13],
            status: [19, 26, 16, 20, 21],
        }
    }
}

pub struct GpioPort {
    name: String,
    data: Vec<OutputPin>,
    control: Vec<OutputPin>,
    status: Vec<InputPin>,
    claimed: bool,
}

/// Status register value for pin levels of status bits 3..7.
fn status_from_levels(levels: impl IntoIterator<Item = bool>) -> u8 {
    let raw = levels
        .into_iter()
        .enumerate()
        .filter(|(_, high)| *high)
        .fold(0u8, |status, (offset, _)| {
            status | 1 << (offset + STATUS_SHIFT)
        });
    raw ^ STATUS_INVERTED
}

fn write_pins(pins: &mut [OutputPin], value: u8) {
    for (bit, pin) in pins.iter_mut().enumerate() {
        if value & (1 << bit) != 0 {
            pin.set_high();
        } else {
            pin.set_low();
        }
    }
}

impl GpioPort {
    pub fn open(config: &GpioPortConfig) -> Result<Self, PortError> {
        let gpio = Gpio::new()?;
        let outputs = |pins: &[u8]| -> Result<Vec<OutputPin>, PortError> {
            pins.iter()
                .map(|&pin| -> Result<OutputPin, PortError> {
                    Ok(gpio.get(pin)?.into_output())
                })
                .collect()
        };

        let data = outputs(&config.data)?;
        let control = outputs(&config.control)?;
        let status = config
            .status
            .iter()
            .map(|&pin| -> Result<InputPin, PortError> {
                Ok(gpio.get(pin)?.into_input_pullup())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let name = format!("gpio{}", config.port);
        info!(
            "Opened {} (data {:?}, control {:?}, status {:?})",
            name, config.data, config.control, config.status
        );
        Ok(Self {
            name,
            data,
            control,
            status,
            claimed: false,
        })
    }
}

impl ParallelPort for GpioPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn claim(&mut self) -> Result<(), PortError> {
        if self.claimed {
            return Err(PortError::Busy(self.name.clone()));
        }
        self.claimed = true;
        debug!("Claimed {}", self.name);
        Ok(())
    }

    fn release(&mut self) {
        self.claimed = false;
        debug!("Released {}", self.name);
    }

    fn write_data(&mut self, value: u8) {
        write_pins(&mut self.data, value);
    }

    fn write_control(&mut self, value: u8) {
        write_pins(&mut self.control, value);
    }

    fn read_status(&mut self) -> u8 {
        status_from_levels(self.status.iter().map(InputPin::is_high))
    }
}

/// Provider resolving port numbers to configured pin-outs
#[derive(Clone, Debug, Default)]
pub struct GpioProvider {
    ports: HashMap<u32, GpioPortConfig>,
}

impl GpioProvider {
    pub fn new(configs: &[GpioPortConfig]) -> Self {
        Self {
            ports: configs
                .iter()
                .map(|config| (config.port, config.clone()))
                .collect(),
        }
    }
}

impl PortProvider for GpioProvider {
    fn find_port(&self, number: u32) -> Result<Box<dyn ParallelPort>, PortError> {
        let config = self.ports.get(&number).ok_or(PortError::NotFound(number))?;
        Ok(Box::new(GpioPort::open(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_port_is_not_found() {
        let provider = GpioProvider::new(&[GpioPortConfig::default()]);
        assert!(matches!(provider.find_port(1), Err(PortError::NotFound(1))));
    }

    #[test]
    fn idle_lines_decode_as_released() {
        use crate::arcade::codec::STATUS_FLIP;
        use crate::arcade::STATUS_BITS;

        // Pulled-up pins with nothing pressed
        let idle = status_from_levels([true; 5]);
        assert_eq!(idle, 0x78);
        for bit in STATUS_BITS {
            assert_eq!((idle ^ STATUS_FLIP) & bit, 0, "bit {:#04x}", bit);
        }
    }

    #[test]
    fn grounded_lines_decode_as_pressed() {
        use crate::arcade::codec::STATUS_FLIP;

        // Connector 1 (bit 7) and connector 4 (bit 3) pulled low
        let status = status_from_levels([false, true, true, true, false]);
        assert_eq!((status ^ STATUS_FLIP) & 0x80, 0x80);
        assert_eq!((status ^ STATUS_FLIP) & 0x08, 0x08);
        assert_eq!((status ^ STATUS_FLIP) & 0x70, 0);
    }

    #[test]
    fn default_pinout_has_no_shared_pins() {
        let config = GpioPortConfig::default();
        let mut pins: Vec<u8> = config
            .data
            .iter()
            .chain(&config.control)
            .chain(&config.status)
            .copied()
            .collect();
        pins.sort_unstable();
        pins.dedup();
        assert_eq!(pins.len(), 8 + 4 + 5);
    }
}
