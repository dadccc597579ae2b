//! Arcade cabinet control panels on a shared parallel bus
//!
//! Up to five panels are multiplexed onto one byte-wide port. The crate
//! samples the bus at 100 Hz while any consumer holds a device open and
//! turns the sampled bits into key and axis reports.
//!
//! - [`port`] - bus transport (simulated panel, GPIO wiring)
//! - [`arcade`] - codec, decoders, scheduler and lifecycle
//! - [`input`] - event sinks and the consumer-side monitor
//! - [`config`] - TOML configuration and port maps

pub mod arcade;
pub mod config;
pub mod input;
pub mod port;
