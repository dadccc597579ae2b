//! Error definitions for bus group setup and lifecycle

use thiserror::Error;

use crate::config::ConfigError;
use crate::input::InputError;
use crate::port::PortError;

/// Errors while configuring a bus group or the registry
#[derive(Debug, Error)]
pub enum SetupError {
    /// Invalid or inconsistent configuration values
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The port does not exist or is held by someone else
    #[error("Bus unavailable: {0}")]
    BusUnavailable(#[from] PortError),

    /// The input subsystem rejected a device
    #[error("Input registration failed: {0}")]
    Registration(#[from] InputError),

    /// No port map produced a bus group
    #[error("No arcade device configured")]
    NoDevice,
}

/// Errors returned by `open`
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Cancelled while waiting for the bus group lock
    #[error("Open aborted while waiting for the bus lock")]
    Aborted,

    #[error("Connector {0} is not configured")]
    UnknownConnector(usize),

    #[error("Bus unavailable: {0}")]
    BusUnavailable(#[from] PortError),
}
