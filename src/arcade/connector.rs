use std::fmt;

use super::control::{ControlType, STATUS_BITS};
use crate::input::{
    DeviceInfo, EventSink, InputBackend, InputError, ARCADE_VENDOR, ARCADE_VERSION, BUS_PARPORT,
};

/// One physical control-panel position with its registered device
pub struct Connector {
    index: usize,
    control_type: ControlType,
    status_bit: u8,
    phys: String,
    sink: Box<dyn EventSink>,
}

impl Connector {
    /// Registers the device for connector `index` on `port_name`.
    pub fn register(
        port_name: &str,
        index: usize,
        control_type: ControlType,
        backend: &dyn InputBackend,
    ) -> Result<Self, InputError> {
        let info = device_info(port_name, index, control_type);
        let capabilities = control_type.layout().capabilities();
        let sink = backend.register_device(&info, &capabilities)?;

        Ok(Self {
            index,
            control_type,
            status_bit: STATUS_BITS[index],
            phys: info.phys,
            sink,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn control_type(&self) -> ControlType {
        self.control_type
    }

    pub fn status_bit(&self) -> u8 {
        self.status_bit
    }

    pub fn phys(&self) -> &str {
        &self.phys
    }

    pub fn sink(&mut self) -> &mut dyn EventSink {
        self.sink.as_mut()
    }

    pub fn unregister(self) {
        self.sink.unregister();
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("index", &self.index)
            .field("control_type", &self.control_type)
            .field("status_bit", &format_args!("{:#04x}", self.status_bit))
            .field("phys", &self.phys)
            .finish_non_exhaustive()
    }
}

/// Identity announced for connector `index` of `port_name`.
pub fn device_info(port_name: &str, index: usize, control_type: ControlType) -> DeviceInfo {
    DeviceInfo {
        name: control_type.device_name().to_string(),
        phys: format!("{}/control{}", port_name, index),
        bustype: BUS_PARPORT,
        vendor: ARCADE_VENDOR,
        product: control_type.code(),
        version: ARCADE_VERSION,
    }
}
