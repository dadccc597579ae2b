use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;

/// Number of connector positions on one bus.
pub const MAX_CONNECTORS: usize = 5;

/// Status-register bit carrying each connector's signal, by connector index.
pub const STATUS_BITS: [u8; MAX_CONNECTORS] = [0x40, 0x80, 0x20, 0x10, 0x08];

/// Logical layout assigned to a connector
///
/// Configuration code 0 means "no control"; it is represented as `None`
/// wherever an assignment is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlType {
    Arcade,
    Key1,
    Key2,
    Key3,
}

impl ControlType {
    /// Poll order within a tick.
    pub const ALL: [ControlType; 4] = [
        ControlType::Arcade,
        ControlType::Key1,
        ControlType::Key2,
        ControlType::Key3,
    ];

    /// Parses a configuration code: 0 = none, 1 = Arcade, 2..4 = Key1..Key3.
    pub fn from_code(code: i32) -> Result<Option<Self>, ConfigError> {
        match code {
            0 => Ok(None),
            1 => Ok(Some(ControlType::Arcade)),
            2 => Ok(Some(ControlType::Key1)),
            3 => Ok(Some(ControlType::Key2)),
            4 => Ok(Some(ControlType::Key3)),
            other => Err(ConfigError::UnknownControlType(other)),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            ControlType::Arcade => 1,
            ControlType::Key1 => 2,
            ControlType::Key2 => 3,
            ControlType::Key3 => 4,
        }
    }

    fn index(self) -> usize {
        self.code() as usize - 1
    }

    /// Device name announced to the input subsystem.
    pub fn device_name(self) -> &'static str {
        match self {
            ControlType::Arcade => "Arcade Cabinet Control",
            ControlType::Key1 => "Arcade Cabinet Control Key1",
            ControlType::Key2 => "Arcade Cabinet Control Key2",
            ControlType::Key3 => "Arcade Cabinet Control Key3",
        }
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Combined status bits per control type
///
/// Membership of a single connector is tested with [`contains`](Self::contains).
/// [`is_active`](Self::is_active) tests a status byte against the OR of every
/// connector sharing a type: with two Key1 connectors on 0x40 and 0x80, a byte
/// carrying only 0x40 counts as active for Key1 as a whole. This does not say
/// which of the two connectors produced the signal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlTypeMask {
    any: u8,
    by_type: [u8; 4],
}

impl ControlTypeMask {
    pub fn insert(&mut self, control_type: ControlType, status_bit: u8) {
        self.any |= status_bit;
        self.by_type[control_type.index()] |= status_bit;
    }

    pub fn mask(&self, control_type: ControlType) -> u8 {
        self.by_type[control_type.index()]
    }

    /// OR of every assigned connector's status bit.
    pub fn any(&self) -> u8 {
        self.any
    }

    pub fn is_empty(&self) -> bool {
        self.any == 0
    }

    pub fn contains(&self, control_type: ControlType, status_bit: u8) -> bool {
        self.mask(control_type) & status_bit == status_bit && status_bit != 0
    }

    pub fn is_active(&self, control_type: ControlType, byte: u8) -> bool {
        self.mask(control_type) & byte != 0
    }

    /// Types with at least one connector, in poll order.
    pub fn active_types(&self) -> impl Iterator<Item = ControlType> + '_ {
        ControlType::ALL
            .into_iter()
            .filter(move |control_type| self.mask(*control_type) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_types() {
        assert_eq!(ControlType::from_code(0).unwrap(), None);
        assert_eq!(
            ControlType::from_code(1).unwrap(),
            Some(ControlType::Arcade)
        );
        assert_eq!(ControlType::from_code(4).unwrap(), Some(ControlType::Key3));
        for control_type in ControlType::ALL {
            assert_eq!(
                ControlType::from_code(control_type.code() as i32).unwrap(),
                Some(control_type)
            );
        }
    }

    #[test]
    fn codes_outside_range_are_rejected() {
        for code in [-1, 5, 42, i32::MAX] {
            assert!(matches!(
                ControlType::from_code(code),
                Err(ConfigError::UnknownControlType(c)) if c == code
            ));
        }
    }

    #[test]
    fn shared_type_masks_are_ored() {
        let mut masks = ControlTypeMask::default();
        masks.insert(ControlType::Key1, STATUS_BITS[0]);
        masks.insert(ControlType::Key1, STATUS_BITS[1]);

        assert_eq!(masks.mask(ControlType::Key1), 0xC0);
        assert_eq!(masks.any(), 0xC0);
        // 0x40 alone still counts for the type as a whole
        assert!(masks.is_active(ControlType::Key1, 0x40));
        assert!(!masks.is_active(ControlType::Key1, 0x20));
        assert!(masks.contains(ControlType::Key1, 0x80));
        assert!(!masks.contains(ControlType::Key2, 0x80));
    }

    #[test]
    fn active_types_follow_poll_order() {
        let mut masks = ControlTypeMask::default();
        masks.insert(ControlType::Key3, STATUS_BITS[4]);
        masks.insert(ControlType::Arcade, STATUS_BITS[2]);

        let types: Vec<ControlType> = masks.active_types().collect();
        assert_eq!(types, vec![ControlType::Arcade, ControlType::Key3]);
        assert!(!masks.is_empty());
        assert!(ControlTypeMask::default().is_empty());
    }
}
