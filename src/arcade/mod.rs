//! Arcade cabinet bus driver
//!
//! Up to five control panels share one byte-wide port. Each tick samples the
//! bus once per assigned control type and decodes the sample for every
//! connector of that type:
//!
//! 1. [`codec`] - strobe/read cycle producing a 12-byte [`RawSample`]
//! 2. [`decoder`] - layout tables turning samples into key/axis reports
//! 3. [`scheduler`] - 100 Hz poll task, armed while the group is open
//! 4. [`group`] - open/close reference counting and port ownership
//! 5. [`registry`] - all configured groups, with rollback on failure
//!
//! # Architecture
//!
//! ```text
//! Scheduler tick ──► Codec read ──► Decoder ──► EventSink (per connector)
//!       ▲                 │
//!       └── BusGroup ─────┘ (claim/release, open count)
//! ```

pub mod bus;
pub mod codec;
pub mod connector;
pub mod control;
pub mod decoder;
pub mod error;
pub mod group;
pub mod registry;
pub mod scheduler;

pub use codec::RawSample;
pub use control::{ControlType, ControlTypeMask, MAX_CONNECTORS, STATUS_BITS};
pub use error::{LifecycleError, SetupError};
pub use group::{BusGroup, GroupState};
pub use registry::ArcadeRegistry;
