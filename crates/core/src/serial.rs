//! Serial link to the expression controller, plus port auto-discovery.

use crate::error::TransportError;
use serialport::{SerialPortInfo, SerialPortType};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// A byte sink for newline-terminated text frames.
pub trait SerialLink: Send {
    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()>;

    /// Port path or other human-readable identifier.
    fn name(&self) -> &str;
}

/// A [`SerialLink`] backed by an OS serial port.
pub struct SerialPortLink {
    name: String,
    port: Box<dyn serialport::SerialPort>,
}

impl SerialPortLink {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .timeout(WRITE_TIMEOUT)
            .open()?;
        info!(port = path, baud_rate, "serial port opened");
        Ok(Self {
            name: path.to_string(),
            port,
        })
    }
}

impl SerialLink for SerialPortLink {
    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A USB vendor id with an optional product id; `None` matches any product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: Option<u16>,
}

impl UsbId {
    pub const fn new(vid: u16, pid: Option<u16>) -> Self {
        Self { vid, pid }
    }

    fn matches(&self, vid: u16, pid: u16) -> bool {
        self.vid == vid && self.pid.is_none_or(|p| p == pid)
    }
}

/// USB-UART bridges and native USB found on the expression controller boards.
pub const KNOWN_USB_IDS: &[UsbId] = &[
    // Silicon Labs CP210x
    UsbId::new(0x10C4, Some(0xEA60)),
    // WCH CH340
    UsbId::new(0x1A86, Some(0x7523)),
    // WCH CH9102
    UsbId::new(0x1A86, Some(0x55D4)),
    // Espressif native USB-Serial/JTAG
    UsbId::new(0x303A, None),
];

/// Last-resort substrings matched against the port description.
pub const DESCRIPTION_HINTS: &[&str] = &["USB", "CP210", "CH340"];

/// Picks the port most likely to be the expression controller.
///
/// Vendor/product ids win over description matching; within each pass the
/// first port in enumeration order is chosen.
pub fn select_port<'a>(ports: &'a [SerialPortInfo], known: &[UsbId]) -> Option<&'a SerialPortInfo> {
    let by_id = ports.iter().find(|port| match &port.port_type {
        SerialPortType::UsbPort(usb) => known.iter().any(|id| id.matches(usb.vid, usb.pid)),
        _ => false,
    });
    if by_id.is_some() {
        return by_id;
    }

    ports.iter().find(|port| {
        let description = describe(port);
        DESCRIPTION_HINTS.iter().any(|hint| description.contains(hint))
    })
}

fn describe(port: &SerialPortInfo) -> String {
    match &port.port_type {
        SerialPortType::UsbPort(usb) => [
            Some(port.port_name.as_str()),
            usb.manufacturer.as_deref(),
            usb.product.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" "),
        _ => port.port_name.clone(),
    }
}

/// Enumerates ports and returns the path of the best candidate, if any.
pub fn discover(known: &[UsbId]) -> Option<String> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!(error = %e, "serial port enumeration failed");
            return None;
        }
    };
    debug!(count = ports.len(), "enumerated serial ports");
    select_port(&ports, known).map(|port| port.port_name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb(name: &str, vid: u16, pid: u16, product: Option<&str>) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid,
                pid,
                serial_number: None,
                manufacturer: None,
                product: product.map(str::to_string),
            }),
        }
    }

    fn plain(name: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::Unknown,
        }
    }

    #[test]
    fn vendor_id_beats_description() {
        let ports = vec![
            usb("/dev/ttyUSB0", 0x0403, 0x6001, Some("FT232R USB UART")),
            usb("/dev/ttyACM0", 0x303A, 0x1001, None),
        ];
        let chosen = select_port(&ports, KNOWN_USB_IDS).unwrap();
        assert_eq!(chosen.port_name, "/dev/ttyACM0");
    }

    #[test]
    fn product_id_must_match_when_given() {
        let ports = vec![usb("/dev/ttyS9", 0x10C4, 0x0001, None)];
        assert!(select_port(&ports, KNOWN_USB_IDS).is_none());
    }

    #[test]
    fn falls_back_to_description_hints() {
        let ports = vec![
            plain("/dev/ttyS0"),
            usb("/dev/ttyS5", 0x0403, 0x6001, Some("CH340 serial converter")),
        ];
        let chosen = select_port(&ports, KNOWN_USB_IDS).unwrap();
        assert_eq!(chosen.port_name, "/dev/ttyS5");
    }

    #[test]
    fn usb_in_port_name_is_a_hint() {
        let ports = vec![plain("/dev/ttyS0"), plain("/dev/ttyUSB3")];
        assert_eq!(
            select_port(&ports, KNOWN_USB_IDS).unwrap().port_name,
            "/dev/ttyUSB3"
        );
    }

    #[test]
    fn nothing_matches() {
        let ports = vec![plain("/dev/ttyS0"), plain("/dev/ttyS1")];
        assert!(select_port(&ports, KNOWN_USB_IDS).is_none());
        assert!(select_port(&[], KNOWN_USB_IDS).is_none());
    }
}
