use serde::{Deserialize, Serialize};
use std::fmt;

// Absolute axis, numbered like the Linux ABS_* codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum AbsAxis {
    X = 0x00,
    Y = 0x01,
}

impl AbsAxis {
    pub const COUNT: usize = 2;
    pub const ALL: [AbsAxis; AbsAxis::COUNT] = [AbsAxis::X, AbsAxis::Y];

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

// Key and button codes, numbered like the Linux KEY_*/BTN_* codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum KeyCode {
    Esc = 1,
    Key1 = 2,
    Key2 = 3,
    Key3 = 4,
    Key4 = 5,
    Key5 = 6,
    Key6 = 7,
    Key7 = 8,
    Key8 = 9,
    Tab = 15,
    Q = 16,
    W = 17,
    R = 19,
    I = 23,
    P = 25,
    Enter = 28,
    LeftCtrl = 29,
    A = 30,
    S = 31,
    D = 32,
    F = 33,
    G = 34,
    K = 37,
    L = 38,
    Grave = 41,
    LeftShift = 42,
    Z = 44,
    X = 45,
    N = 49,
    M = 50,
    LeftAlt = 56,
    Space = 57,
    Up = 103,
    Left = 105,
    Right = 106,
    Down = 108,
    Btn0 = 0x100,
    Btn1 = 0x101,
    Btn2 = 0x102,
    Btn3 = 0x103,
    Btn4 = 0x104,
    Btn5 = 0x105,
    Btn6 = 0x106,
    Btn7 = 0x107,
}

impl KeyCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn is_button(self) -> bool {
        self.code() >= 0x100
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.is_button() { "BTN" } else { "KEY" };
        write!(f, "{}_{:?}({})", prefix, self, self.code())
    }
}
