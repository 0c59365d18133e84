//! Serial port discovery.
//!
//! Lists candidate devices and filters them by USB vendor/product ID. The
//! result is an ordered list with no size cap: every matching port is
//! returned, so callers that need a bounded list must decide for themselves
//! which entries to drop.

use std::fmt;

use tokio_serial::{SerialPortInfo, SerialPortType};

use crate::error::{Error, Result};

/// Default USB vendor ID searched for by the terminal tool.
pub const DEFAULT_VENDOR_ID: u16 = 0x1ABD;

/// A discovered serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// Short OS-facing name (e.g., "COM5" or "ttyUSB0").
    pub name: String,
    /// Full identifier used to open the port (e.g., "/dev/ttyUSB0").
    pub path: String,
    /// USB vendor ID, if the port is a USB device.
    pub vid: Option<u16>,
    /// USB product ID, if the port is a USB device.
    pub pid: Option<u16>,
}

impl PortDescriptor {
    /// Builds a descriptor from a path, deriving the name from its last component.
    #[must_use]
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(path.as_str()).to_string();
        Self {
            name,
            path,
            vid: None,
            pid: None,
        }
    }

    /// Returns true if `id` is this port's name or path.
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        self.path == id || self.name == id
    }

    /// Returns true if the port passes the VID/PID filter; zero disables a filter.
    #[must_use]
    pub fn is_match(&self, vendor_id: u16, product_id: u16) -> bool {
        if vendor_id == 0 && product_id == 0 {
            return true;
        }
        let vid_ok = vendor_id == 0 || self.vid == Some(vendor_id);
        let pid_ok = product_id == 0 || self.pid == Some(product_id);
        vid_ok && pid_ok
    }
}

impl From<SerialPortInfo> for PortDescriptor {
    fn from(info: SerialPortInfo) -> Self {
        let mut port = Self::from_path(info.port_name);
        if let SerialPortType::UsbPort(usb) = info.port_type {
            port.vid = Some(usb.vid);
            port.pid = Some(usb.pid);
        }
        port
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => write!(f, "{} ({vid:04x}:{pid:04x})", self.path),
            _ => write!(f, "{}", self.path),
        }
    }
}

/// Sort key placing ttyACM* first, then ttyUSB*, then everything else.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let numbered = |rest: &str| rest.parse::<usize>().unwrap_or(usize::MAX);
    if let Some(rest) = name.strip_prefix("ttyACM") {
        return (0, numbered(rest), name.to_string());
    }
    if let Some(rest) = name.strip_prefix("ttyUSB") {
        return (1, numbered(rest), name.to_string());
    }
    if let Some(rest) = name.strip_prefix("COM") {
        return (2, numbered(rest), name.to_string());
    }
    (3, 0, name.to_string())
}

/// Filters and orders `ports`.
#[must_use]
pub fn select(ports: Vec<PortDescriptor>, vendor_id: u16, product_id: u16) -> Vec<PortDescriptor> {
    let mut found: Vec<PortDescriptor> = ports
        .into_iter()
        .filter(|p| p.is_match(vendor_id, product_id))
        .collect();
    // Ties on the name key fall back to the path so duplicates end up adjacent.
    found.sort_by(|a, b| {
        port_sort_key(&a.name)
            .cmp(&port_sort_key(&b.name))
            .then_with(|| a.path.cmp(&b.path))
    });
    found.dedup_by(|a, b| a.path == b.path);
    found
}

/// Lists serial ports matching the given USB IDs.
///
/// An empty list means nothing matched; it is not an error.
pub fn find_ports(vendor_id: u16, product_id: u16) -> Result<Vec<PortDescriptor>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    let found = select(
        ports.into_iter().map(PortDescriptor::from).collect(),
        vendor_id,
        product_id,
    );
    tracing::debug!(
        "found {} ports for {:04x}:{:04x}",
        found.len(),
        vendor_id,
        product_id
    );
    Ok(found)
}

/// Returns the first port matching the given USB IDs.
pub fn find_port(vendor_id: u16, product_id: u16) -> Result<Option<PortDescriptor>> {
    Ok(find_ports(vendor_id, product_id)?.into_iter().next())
}
