//! Layout-table decoder
//!
//! Every control type is described by a 12-entry table mapping a sample
//! position to what that line means. One decoder walks the table for each
//! connector assigned to the type and reports into the connector's sink.
//!
//! | Positions | Arcade                     | Key1 / Key2 / Key3        |
//! |-----------|----------------------------|---------------------------|
//! | 0, 1      | Y axis (up = -1, down = +1)| direction keys            |
//! | 2, 3      | X axis (left = -1, right = +1) | direction keys        |
//! | 4..7      | BTN_0..BTN_3               | action keys               |
//! | 8..11     | BTN_4..BTN_7               | extra / coin / start keys |

use tracing::debug;

use super::codec::{RawSample, SAMPLE_LEN};
use super::connector::Connector;
use super::control::ControlType;
use crate::input::{AbsAxis, AbsInfo, Capabilities, KeyCode};

/// Meaning of one sample position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// Pulls the axis toward -1 while active.
    AxisNegative(AbsAxis),
    /// Pulls the axis toward +1 while active.
    AxisPositive(AbsAxis),
    Key(KeyCode),
}

#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    pub control_type: ControlType,
    pub slots: [Slot; SAMPLE_LEN],
}

use KeyCode::*;
use Slot::{AxisNegative, AxisPositive, Key};

pub static ARCADE_LAYOUT: Layout = Layout {
    control_type: ControlType::Arcade,
    slots: [
        AxisNegative(AbsAxis::Y),
        AxisPositive(AbsAxis::Y),
        AxisNegative(AbsAxis::X),
        AxisPositive(AbsAxis::X),
        Key(Btn0),
        Key(Btn1),
        Key(Btn2),
        Key(Btn3),
        Key(Btn4),
        Key(Btn5),
        Key(Btn6),
        Key(Btn7),
    ],
};

pub static KEY1_LAYOUT: Layout = Layout {
    control_type: ControlType::Key1,
    slots: [
        Key(Up),
        Key(Down),
        Key(Left),
        Key(Right),
        Key(LeftCtrl),
        Key(LeftAlt),
        Key(Space),
        Key(LeftShift),
        Key(Z),
        Key(X),
        Key(Key5), // coin 1
        Key(Key1), // 1P start
    ],
};

pub static KEY2_LAYOUT: Layout = Layout {
    control_type: ControlType::Key2,
    slots: [
        Key(R),
        Key(F),
        Key(D),
        Key(G),
        Key(A),
        Key(S),
        Key(Q),
        Key(W),
        Key(I),
        Key(K),
        Key(Key6), // coin 2
        Key(Key2), // 2P start
    ],
};

pub static KEY3_LAYOUT: Layout = Layout {
    control_type: ControlType::Key3,
    slots: [
        Key(N),
        Key(M),
        Key(P),
        Key(L),
        Key(Enter),
        Key(Esc),
        Key(Tab),
        Key(Grave),
        Key(Key3), // 3P start
        Key(Key4), // 4P start
        Key(Key7), // coin 3
        Key(Key8), // coin 4
    ],
};

impl ControlType {
    pub fn layout(self) -> &'static Layout {
        match self {
            ControlType::Arcade => &ARCADE_LAYOUT,
            ControlType::Key1 => &KEY1_LAYOUT,
            ControlType::Key2 => &KEY2_LAYOUT,
            ControlType::Key3 => &KEY3_LAYOUT,
        }
    }
}

impl Layout {
    /// Capability set to announce when registering a device of this layout.
    pub fn capabilities(&self) -> Capabilities {
        let mut capabilities = Capabilities::default();
        for slot in &self.slots {
            match *slot {
                AxisNegative(axis) | AxisPositive(axis) => {
                    if !capabilities.has_axis(axis) {
                        capabilities.axes.push(AbsInfo {
                            axis,
                            min: -1,
                            max: 1,
                            fuzz: 0,
                            flat: 0,
                        });
                    }
                }
                Key(key) => capabilities.keys.push(key),
            }
        }
        capabilities
    }

    /// Axis values for the connector behind `status_bit`, indexed by axis.
    ///
    /// Opposite directions held together cancel to 0.
    pub fn axis_values(&self, sample: &RawSample, status_bit: u8) -> [Option<i32>; AbsAxis::COUNT] {
        let mut axes = [None; AbsAxis::COUNT];
        for (position, slot) in self.slots.iter().enumerate() {
            let (axis, direction) = match *slot {
                AxisNegative(axis) => (axis, -1),
                AxisPositive(axis) => (axis, 1),
                Key(_) => continue,
            };
            let value = axes[axis.index()].get_or_insert(0);
            if sample.is_set(position, status_bit) {
                *value += direction;
            }
        }
        axes
    }

    /// Decodes `sample` for every connector of this layout's type and closes
    /// each touched device's frame. Returns the number of devices touched.
    pub fn decode(&self, sample: &RawSample, connectors: &mut [Option<Connector>]) -> usize {
        let mut touched = 0;

        for connector in connectors
            .iter_mut()
            .flatten()
            .filter(|connector| connector.control_type() == self.control_type)
        {
            let status_bit = connector.status_bit();

            let axes = self.axis_values(sample, status_bit);
            for (axis, value) in AbsAxis::ALL.into_iter().zip(axes) {
                if let Some(value) = value {
                    connector.sink().report_axis(axis, value);
                }
            }

            for (position, slot) in self.slots.iter().enumerate() {
                if let Key(key) = *slot {
                    connector
                        .sink()
                        .report_key(key, sample.is_set(position, status_bit));
                }
            }

            connector.sink().sync();
            touched += 1;
        }

        debug!(
            "Decoded {} sample {:02x?} for {} devices",
            self.control_type,
            sample.bytes(),
            touched
        );
        touched
    }
}
